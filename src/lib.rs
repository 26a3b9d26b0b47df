//! Squeeze Scanner - Bollinger Band squeeze detection and ranking for daily bars

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use std::sync::Arc;

use axum::Router;
use config::Config;
use services::ScanService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub scanner: Arc<ScanService>,
}

/// Build the HTTP application without middleware layers.
pub fn app(state: AppState) -> Router {
    api::router().with_state(state)
}
