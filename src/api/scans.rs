//! Scan API endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::error::Result;
use crate::types::{ScanMode, ScanParams, ScanRecord, ScanResult};
use crate::AppState;

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 200;

/// Body of a start-scan request; missing fields take the configured defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub mode: Option<ScanMode>,
    pub sectors: Option<usize>,
    pub period: Option<usize>,
    pub std_dev: Option<f64>,
    pub ma_short: Option<usize>,
    pub ma_long: Option<usize>,
    pub min_squeeze_days: Option<usize>,
    pub limit: Option<usize>,
}

impl ScanRequest {
    pub fn apply(self, defaults: &ScanParams) -> ScanParams {
        ScanParams {
            mode: self.mode.unwrap_or(defaults.mode),
            sectors: self.sectors.unwrap_or(defaults.sectors),
            period: self.period.unwrap_or(defaults.period),
            std_dev: self.std_dev.unwrap_or(defaults.std_dev),
            ma_short: self.ma_short.unwrap_or(defaults.ma_short),
            ma_long: self.ma_long.unwrap_or(defaults.ma_long),
            min_squeeze_days: self.min_squeeze_days.unwrap_or(defaults.min_squeeze_days),
            limit: self.limit.or(defaults.limit),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartScanResponse {
    pub scan_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub scan_id: i64,
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteAllResponse {
    pub deleted: usize,
}

/// Query parameters for listing scans.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Create the scans router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_scan).get(list_scans).delete(delete_all_scans))
        .route("/latest", get(latest_scan))
        .route("/:id", get(get_scan).delete(delete_scan))
        .route("/:id/results", get(get_results))
        .route("/:id/cancel", post(cancel_scan))
}

/// Start a scan; returns its id immediately.
async fn start_scan(
    State(state): State<AppState>,
    body: Option<Json<ScanRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<StartScanResponse>>)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let params = request.apply(&state.config.scan_defaults);
    let scan_id = state.scanner.start_scan(params)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::new(StartScanResponse { scan_id })),
    ))
}

/// List recent scans, most recent first.
async fn list_scans(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<ScanRecord>>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
    Ok(Json(ApiResponse::new(state.scanner.list_scans(limit)?)))
}

/// Latest completed scan, `null` when none exists.
async fn latest_scan(State(state): State<AppState>) -> Result<Json<ApiResponse<Option<ScanRecord>>>> {
    Ok(Json(ApiResponse::new(state.scanner.latest_completed()?)))
}

async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ScanRecord>>> {
    Ok(Json(ApiResponse::new(state.scanner.get_scan_status(id)?)))
}

async fn get_results(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<ScanResult>>>> {
    Ok(Json(ApiResponse::new(state.scanner.get_scan_results(id)?)))
}

async fn delete_scan(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state.scanner.delete_scan(id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_all_scans(State(state): State<AppState>) -> Result<Json<ApiResponse<DeleteAllResponse>>> {
    let deleted = state.scanner.delete_all_scans()?;
    Ok(Json(ApiResponse::new(DeleteAllResponse { deleted })))
}

async fn cancel_scan(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CancelResponse>>> {
    let cancelled = state.scanner.cancel_scan(id)?;
    Ok(Json(ApiResponse::new(CancelResponse { scan_id: id, cancelled })))
}
