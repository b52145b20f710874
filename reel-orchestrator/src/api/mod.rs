//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod dashboard;
pub mod error;
pub mod executor;
pub mod health;
pub mod job;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use reel_core::time::TimeProvider;
use tower_http::trace::TraceLayer;

use crate::engine::Executor;
use crate::health::{JobsHealthPolicy, PulseHealth};
use crate::repository::{CommandRepository, JobRepository, SemaphoreRepository};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobRepository>,
    pub commands: Arc<dyn CommandRepository>,
    pub semaphores: Arc<dyn SemaphoreRepository>,
    pub executor: Arc<Executor>,
    pub clock: Arc<dyn TimeProvider>,
    pub health: Arc<PulseHealth>,
    pub jobs_health: JobsHealthPolicy,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health checks
        .route("/health", get(health::health_check))
        .route("/health/pulse", get(health::pulse_health))
        .route("/health/store", get(health::store_health))
        .route("/health/semaphore", get(health::semaphore_health))
        .route("/health/jobs", get(health::jobs_health))
        // Executor
        .route("/executor/status", get(executor::executor_status))
        // Job endpoints
        .route("/job/order", post(job::submit_order))
        .route("/job/command", post(job::submit_command))
        .route("/job/{urn}", get(job::get_job_status))
        // Dashboard
        .route("/dashboard", get(dashboard::get_dashboard))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
