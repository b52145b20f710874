//! Command Repository
//!
//! PostgreSQL store of pending commands, keyed by `(job_urn, kind)`.

use std::sync::Arc;

use async_trait::async_trait;
use reel_core::domain::{Command, CommandKind};
use reel_core::time::TimeProvider;
use sqlx::PgPool;

use super::{CommandRepository, RepositoryError, Result};

pub struct PgCommandRepository {
    pool: PgPool,
    clock: Arc<dyn TimeProvider>,
}

impl PgCommandRepository {
    pub fn new(pool: PgPool, clock: Arc<dyn TimeProvider>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl CommandRepository for PgCommandRepository {
    async fn add(&self, command: Command) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO commands (job_urn, kind, username, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_urn, kind) DO NOTHING
            "#,
        )
        .bind(&command.urn)
        .bind(command.kind.as_str())
        .bind(&command.username)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Duplicate(format!(
                "{} command for {}",
                command.kind.as_str(),
                command.urn
            )));
        }
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Command>> {
        let rows = sqlx::query_as::<_, CommandRow>(
            r#"
            SELECT job_urn, kind, username
            FROM commands
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Command::from).collect())
    }

    async fn remove(&self, command: &Command) -> Result<()> {
        sqlx::query("DELETE FROM commands WHERE job_urn = $1 AND kind = $2")
            .bind(&command.urn)
            .bind(command.kind.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct CommandRow {
    job_urn: String,
    kind: String,
    username: String,
}

impl From<CommandRow> for Command {
    fn from(row: CommandRow) -> Self {
        Command {
            kind: CommandKind::parse(&row.kind),
            urn: row.job_urn,
            username: row.username,
        }
    }
}
