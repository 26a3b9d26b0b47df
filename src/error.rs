use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures raised while resolving a universe or processing a symbol.
///
/// Per-symbol variants (`DataUnavailable`, `InsufficientHistory`) are skip
/// signals for the orchestrator, never scan failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("Insufficient history: {available} bars, {required} required")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Universe resolution failed: {0}")]
    UniverseResolution(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Invalid scan parameters: {0}")]
    InvalidParams(String),

    #[error("Scan cancelled")]
    Cancelled,
}

impl ScanError {
    /// Network-class failures that are worth retrying with a longer delay.
    pub fn is_transient(&self) -> bool {
        match self {
            ScanError::DataUnavailable { reason, .. } | ScanError::UniverseResolution(reason) => {
                let reason = reason.to_lowercase();
                reason.contains("timed out")
                    || reason.contains("timeout")
                    || reason.contains("connection")
                    || reason.contains("request failed")
            }
            _ => false,
        }
    }
}

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Scan(e @ ScanError::InvalidParams(_)) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Scan(e @ ScanError::InsufficientHistory { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            AppError::Scan(e @ ScanError::DataUnavailable { .. })
            | AppError::Scan(e @ ScanError::UniverseResolution(_)) => {
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            AppError::Scan(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Database(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Reqwest(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::SerdeJson(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let timeout = ScanError::DataUnavailable {
            symbol: "600000".to_string(),
            reason: "Request failed: operation timed out".to_string(),
        };
        assert!(timeout.is_transient());

        let empty = ScanError::DataUnavailable {
            symbol: "600000".to_string(),
            reason: "empty kline payload".to_string(),
        };
        assert!(!empty.is_transient());
        assert!(!ScanError::Cancelled.is_transient());
    }

    #[test]
    fn test_status_codes() {
        let resp = AppError::NotFound("scan 7".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = AppError::from(ScanError::InvalidParams("period".to_string())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AppError::from(ScanError::UniverseResolution("down".to_string())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
