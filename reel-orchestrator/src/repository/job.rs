//! Job Repository
//!
//! PostgreSQL job store. Essences and the plan are stored as JSONB next to a
//! derived `plan_state` column used for filtering.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reel_core::domain::{ExecutionState, Job, Priority};
use reel_core::time::TimeProvider;
use sqlx::PgPool;
use uuid::Uuid;

use super::{JobRepository, RepositoryError, Result};

const JOB_COLUMNS: &str = "urn, id, source_urn, name, source, destination, priority, issued, \
     due_date, end_time, callback_url, plan, last_modified";

pub struct PgJobRepository {
    pool: PgPool,
    clock: Arc<dyn TimeProvider>,
}

impl PgJobRepository {
    pub fn new(pool: PgPool, clock: Arc<dyn TimeProvider>) -> Self {
        Self { pool, clock }
    }

    async fn fetch(&self, filter: &str) -> Result<Vec<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE {filter} ORDER BY issued ASC");
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn terminal(&self, state: ExecutionState, since: Option<DateTime<Utc>>) -> Result<Vec<Job>> {
        let sql = format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE plan_state = $1 AND ($2::timestamptz IS NULL OR end_time >= $2)
            ORDER BY end_time ASC
            "#
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(state.as_str())
            .bind(since)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Job::try_from).collect()
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn add(&self, job: Job) -> Result<Job> {
        let row = JobRow::try_from(&job)?;
        let plan_state = plan_state(&job)?;

        let sql = format!(
            r#"
            INSERT INTO jobs ({JOB_COLUMNS}, plan_state)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (urn) DO NOTHING
            RETURNING {JOB_COLUMNS}
            "#
        );
        let stored = sqlx::query_as::<_, JobRow>(&sql)
            .bind(&row.urn)
            .bind(row.id)
            .bind(&row.source_urn)
            .bind(&row.name)
            .bind(&row.source)
            .bind(&row.destination)
            .bind(row.priority)
            .bind(row.issued)
            .bind(row.due_date)
            .bind(row.end_time)
            .bind(&row.callback_url)
            .bind(&row.plan)
            .bind(self.clock.now())
            .bind(plan_state)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::Duplicate(job.urn.clone()))?;

        Job::try_from(stored)
    }

    async fn update(&self, job: &Job) -> Result<Job> {
        let row = JobRow::try_from(job)?;
        let plan_state = plan_state(job)?;

        let sql = format!(
            r#"
            UPDATE jobs
            SET source_urn = $2, name = $3, source = $4, destination = $5, priority = $6,
                due_date = $7, end_time = $8, callback_url = $9, plan = $10, plan_state = $11,
                last_modified = GREATEST($12, last_modified + INTERVAL '1 microsecond')
            WHERE urn = $1 AND last_modified = $13
            RETURNING {JOB_COLUMNS}
            "#
        );
        let stored = sqlx::query_as::<_, JobRow>(&sql)
            .bind(&row.urn)
            .bind(&row.source_urn)
            .bind(&row.name)
            .bind(&row.source)
            .bind(&row.destination)
            .bind(row.priority)
            .bind(row.due_date)
            .bind(row.end_time)
            .bind(&row.callback_url)
            .bind(&row.plan)
            .bind(plan_state)
            .bind(self.clock.now())
            .bind(row.last_modified)
            .fetch_optional(&self.pool)
            .await?;

        match stored {
            Some(row) => Job::try_from(row),
            None if self.get(&job.urn).await?.is_some() => {
                Err(RepositoryError::Conflict(job.urn.clone()))
            }
            None => Err(RepositoryError::NotFound(job.urn.clone())),
        }
    }

    async fn get(&self, urn: &str) -> Result<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE urn = $1");
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(urn)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    async fn newest(&self) -> Result<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY issued DESC LIMIT 1");
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from).transpose()
    }

    async fn waiting_jobs(&self) -> Result<Vec<Job>> {
        self.fetch("plan_state IS NULL").await
    }

    async fn active_jobs(&self) -> Result<Vec<Job>> {
        self.fetch("plan_state IN ('queued', 'running')").await
    }

    async fn done_jobs(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Job>> {
        self.terminal(ExecutionState::Done, since).await
    }

    async fn failed_jobs(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Job>> {
        self.terminal(ExecutionState::Failed, since).await
    }

    async fn canceled_jobs(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Job>> {
        self.terminal(ExecutionState::Canceled, since).await
    }
}

fn plan_state(job: &Job) -> Result<Option<&'static str>> {
    Ok(job.plan_state()?.map(|state| state.as_str()))
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    urn: String,
    id: Uuid,
    source_urn: Option<String>,
    name: String,
    source: serde_json::Value,
    destination: serde_json::Value,
    priority: i16,
    issued: DateTime<Utc>,
    due_date: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    callback_url: Option<String>,
    plan: Option<serde_json::Value>,
    last_modified: DateTime<Utc>,
}

impl TryFrom<&Job> for JobRow {
    type Error = RepositoryError;

    fn try_from(job: &Job) -> Result<Self> {
        Ok(Self {
            urn: job.urn.clone(),
            id: job.id,
            source_urn: job.source_urn.clone(),
            name: job.name.clone(),
            source: serde_json::to_value(&job.source)?,
            destination: serde_json::to_value(&job.destination)?,
            priority: job.priority.weight(),
            issued: job.issued,
            due_date: job.due_date,
            end_time: job.end_time,
            callback_url: job.callback_url.clone(),
            plan: job.plan.as_ref().map(serde_json::to_value).transpose()?,
            last_modified: job.last_modified,
        })
    }
}

impl TryFrom<JobRow> for Job {
    type Error = RepositoryError;

    fn try_from(row: JobRow) -> Result<Self> {
        Ok(Job {
            id: row.id,
            urn: row.urn,
            source_urn: row.source_urn,
            name: row.name,
            source: serde_json::from_value(row.source)?,
            destination: serde_json::from_value(row.destination)?,
            priority: Priority::from_weight(row.priority),
            issued: row.issued,
            due_date: row.due_date,
            end_time: row.end_time,
            callback_url: row.callback_url,
            plan: row.plan.map(serde_json::from_value).transpose()?,
            last_modified: row.last_modified,
        })
    }
}
