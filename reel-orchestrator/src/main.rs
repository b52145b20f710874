//! Reel Orchestrator
//!
//! Serves the HTTP API and runs the executor pulse loop next to it.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use reel_core::time::{SystemClock, TimeProvider};
use tokio::time;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reel_orchestrator::api::{self, AppState};
use reel_orchestrator::callback::HttpCallbackNotifier;
use reel_orchestrator::config::Config;
use reel_orchestrator::db;
use reel_orchestrator::engine::Executor;
use reel_orchestrator::health::{JobsHealthPolicy, PulseHealth};
use reel_orchestrator::plugins;
use reel_orchestrator::repository::Repositories;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "reel_orchestrator=debug,reel_plugins=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Reel Orchestrator...");

    let config = Config::from_env()?;
    config.validate()?;

    let clock: Arc<dyn TimeProvider> = Arc::new(SystemClock);
    let max_age = TimeDelta::from_std(config.semaphore_max_age)
        .context("semaphore_max_age is out of range")?;
    let health_window =
        TimeDelta::from_std(config.health_window).context("health_window is out of range")?;
    let jobs_health = JobsHealthPolicy {
        window: TimeDelta::from_std(config.jobs_health_window)
            .context("jobs_health_window is out of range")?,
        min_failures: config.jobs_health_min_failures,
        failure_ratio: config.jobs_health_failure_ratio,
    };

    let repositories = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let pool = db::create_pool(database_url)
                .await
                .context("Failed to create database pool")?;
            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            info!("Database ready");
            Repositories::postgres(pool, clock.clone(), max_age)
        }
        None => {
            info!("DATABASE_URL not set, using in-memory storage");
            Repositories::in_memory(clock.clone(), max_age)
        }
    };

    let setup = plugins::build(&config, clock.clone())?;
    let callbacks = Arc::new(HttpCallbackNotifier::new(clock.clone())?);
    let executor = Arc::new(Executor::new(
        repositories.clone(),
        callbacks,
        clock.clone(),
        setup.plugins,
        setup.planner,
        config.caller_id(),
    )?);
    let health = Arc::new(PulseHealth::new(health_window));

    let pulse_loop = tokio::spawn(run_pulses(
        executor.clone(),
        health.clone(),
        clock.clone(),
        config.pulse_interval,
    ));

    // Build router with all API endpoints
    let app = api::create_router(AppState {
        jobs: repositories.jobs.clone(),
        commands: repositories.commands.clone(),
        semaphores: repositories.semaphores.clone(),
        executor: executor.clone(),
        clock,
        health,
        jobs_health,
    });

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to start server")?;

    pulse_loop.abort();
    executor.shutdown().await?;
    info!("Orchestrator stopped");
    Ok(())
}

async fn run_pulses(
    executor: Arc<Executor>,
    health: Arc<PulseHealth>,
    clock: Arc<dyn TimeProvider>,
    period: std::time::Duration,
) {
    info!(
        "Starting executor {} (pulse interval: {:?})",
        executor.caller_id(),
        period
    );

    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match executor.pulse().await {
            Ok(()) => health.record_success(clock.now()),
            Err(e) => {
                error!("Error during pulse: {:#}", e);
                health.record_failure(clock.now(), &format!("{:#}", e));
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
