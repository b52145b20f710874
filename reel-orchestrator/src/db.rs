use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            urn VARCHAR(255) PRIMARY KEY,
            id UUID NOT NULL,
            source_urn VARCHAR(255),
            name TEXT NOT NULL,
            source JSONB NOT NULL,
            destination JSONB NOT NULL,
            priority SMALLINT NOT NULL DEFAULT 0,
            issued TIMESTAMPTZ NOT NULL,
            due_date TIMESTAMPTZ NOT NULL,
            end_time TIMESTAMPTZ,
            callback_url TEXT,
            plan JSONB,
            plan_state VARCHAR(20),
            last_modified TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_plan_state ON jobs(plan_state)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_end_time ON jobs(end_time DESC)")
        .execute(pool)
        .await?;

    // Create commands table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commands (
            job_urn VARCHAR(255) NOT NULL,
            kind VARCHAR(20) NOT NULL,
            username VARCHAR(255) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (job_urn, kind)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create semaphores table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS semaphores (
            id VARCHAR(255) PRIMARY KEY,
            owner VARCHAR(255),
            heartbeat TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
