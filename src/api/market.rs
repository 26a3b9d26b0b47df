//! Sector and per-stock market endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use super::ApiResponse;
use crate::error::{AppError, Result};
use crate::types::{ChartSeries, ScanParams, SectorRanking};
use crate::AppState;

const MAX_SECTORS: usize = 50;

/// Query parameters for the hot sector listing.
#[derive(Debug, Deserialize)]
pub struct SectorsQuery {
    pub limit: Option<usize>,
}

/// Band parameters for the chart; missing fields take the configured defaults.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartQuery {
    pub period: Option<usize>,
    pub std_dev: Option<f64>,
    pub ma_short: Option<usize>,
    pub ma_long: Option<usize>,
}

pub fn sectors_router() -> Router<AppState> {
    Router::new().route("/hot", get(hot_sectors))
}

pub fn stocks_router() -> Router<AppState> {
    Router::new().route("/:code/chart", get(stock_chart))
}

/// Top sectors by recent change.
async fn hot_sectors(
    State(state): State<AppState>,
    Query(query): Query<SectorsQuery>,
) -> Result<Json<ApiResponse<Vec<SectorRanking>>>> {
    let limit = query
        .limit
        .unwrap_or(state.config.scan_defaults.sectors)
        .clamp(1, MAX_SECTORS);
    Ok(Json(ApiResponse::new(state.scanner.hot_sectors(limit).await?)))
}

/// Recent candles with Bollinger bands and band-width averages.
async fn stock_chart(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ApiResponse<ChartSeries>>> {
    let code = code.trim();
    if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::BadRequest(format!("Invalid stock code: {}", code)));
    }

    let defaults = &state.config.scan_defaults;
    let params = ScanParams {
        period: query.period.unwrap_or(defaults.period),
        std_dev: query.std_dev.unwrap_or(defaults.std_dev),
        ma_short: query.ma_short.unwrap_or(defaults.ma_short),
        ma_long: query.ma_long.unwrap_or(defaults.ma_long),
        ..defaults.clone()
    };
    let chart = state.scanner.analyze_symbol(code, &params).await?;
    Ok(Json(ApiResponse::new(chart)))
}
