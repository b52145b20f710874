//! Semaphore Repository
//!
//! PostgreSQL leader-election lease. Taking the lease is a single upsert so
//! two executors racing for it cannot both win.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reel_core::domain::Semaphore;
use reel_core::time::TimeProvider;
use sqlx::PgPool;

use super::{Result, SemaphoreRepository};

pub struct PgSemaphoreRepository {
    pool: PgPool,
    clock: Arc<dyn TimeProvider>,
    max_age: TimeDelta,
}

impl PgSemaphoreRepository {
    pub fn new(pool: PgPool, clock: Arc<dyn TimeProvider>, max_age: TimeDelta) -> Self {
        Self {
            pool,
            clock,
            max_age,
        }
    }
}

#[async_trait]
impl SemaphoreRepository for PgSemaphoreRepository {
    async fn acquire(&self, id: &str, caller: &str) -> Result<bool> {
        let now = self.clock.now();

        let result = sqlx::query(
            r#"
            INSERT INTO semaphores (id, owner, heartbeat)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                owner = EXCLUDED.owner,
                heartbeat = EXCLUDED.heartbeat
            WHERE semaphores.owner IS NULL
               OR semaphores.owner = EXCLUDED.owner
               OR semaphores.heartbeat < $4
            "#,
        )
        .bind(id)
        .bind(caller)
        .bind(now)
        .bind(now - self.max_age)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, id: &str, caller: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE semaphores SET owner = NULL WHERE id = $1 AND owner = $2")
            .bind(id)
            .bind(caller)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn probe(&self, id: &str) -> Result<Option<Semaphore>> {
        let row = sqlx::query_as::<_, SemaphoreRow>(
            "SELECT id, owner, heartbeat FROM semaphores WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    fn max_age(&self) -> TimeDelta {
        self.max_age
    }
}

#[derive(sqlx::FromRow)]
struct SemaphoreRow {
    id: String,
    owner: Option<String>,
    heartbeat: DateTime<Utc>,
}

impl From<SemaphoreRow> for Semaphore {
    fn from(row: SemaphoreRow) -> Self {
        Semaphore {
            id: row.id,
            owner: row.owner,
            heartbeat: row.heartbeat,
        }
    }
}
