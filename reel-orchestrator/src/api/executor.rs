//! Executor API Handler

use axum::{Json, extract::State};
use reel_core::domain::ExecutorStatus;

use super::AppState;

/// GET /executor/status
/// Plugin occupancy and leadership of this instance
pub async fn executor_status(State(state): State<AppState>) -> Json<ExecutorStatus> {
    Json(state.executor.status().await)
}
