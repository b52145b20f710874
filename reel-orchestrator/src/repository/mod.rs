//! Repository Module
//!
//! Persistence boundary of the orchestrator. Every store is an async trait
//! returning owned copies, with an in-memory implementation for tests and
//! the simulator and a PostgreSQL implementation for deployments.

mod command;
mod error;
mod job;
pub mod memory;
mod semaphore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reel_core::domain::{Command, Job, Semaphore};
use reel_core::time::TimeProvider;
use sqlx::PgPool;

pub use command::PgCommandRepository;
pub use error::{RepositoryError, Result};
pub use job::PgJobRepository;
pub use memory::{MemoryCommandRepository, MemoryJobRepository, MemorySemaphoreRepository};
pub use semaphore::PgSemaphoreRepository;

/// Default lifetime of a semaphore lease without heartbeat, in seconds
pub const DEFAULT_SEMAPHORE_MAX_AGE_SECS: i64 = 60;

/// Job store
///
/// Writes use optimistic concurrency on `last_modified`: an update only
/// succeeds when the caller's copy carries the stored stamp, and the stored
/// copy with a fresh stamp is returned.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn add(&self, job: Job) -> Result<Job>;

    async fn update(&self, job: &Job) -> Result<Job>;

    async fn get(&self, urn: &str) -> Result<Option<Job>>;

    /// Most recently issued job
    async fn newest(&self) -> Result<Option<Job>>;

    /// Jobs without a plan
    async fn waiting_jobs(&self) -> Result<Vec<Job>>;

    /// Jobs whose plan is Queued or Running
    async fn active_jobs(&self) -> Result<Vec<Job>>;

    async fn done_jobs(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Job>>;

    async fn failed_jobs(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Job>>;

    async fn canceled_jobs(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Job>>;
}

/// Pending command store
#[async_trait]
pub trait CommandRepository: Send + Sync {
    /// Store a command, rejecting a second pending one of the same kind
    async fn add(&self, command: Command) -> Result<()>;

    async fn all(&self) -> Result<Vec<Command>>;

    async fn remove(&self, command: &Command) -> Result<()>;
}

/// Leader-election lease store
#[async_trait]
pub trait SemaphoreRepository: Send + Sync {
    /// Take or refresh the lease
    ///
    /// Granted when the lease is free, already owned by `caller`, or its
    /// heartbeat is older than [`SemaphoreRepository::max_age`].
    async fn acquire(&self, id: &str, caller: &str) -> Result<bool>;

    /// Give up the lease, only honored for the owner
    async fn release(&self, id: &str, caller: &str) -> Result<bool>;

    async fn probe(&self, id: &str) -> Result<Option<Semaphore>>;

    fn max_age(&self) -> TimeDelta;
}

/// The set of stores the engine and the API work against
#[derive(Clone)]
pub struct Repositories {
    pub jobs: Arc<dyn JobRepository>,
    pub commands: Arc<dyn CommandRepository>,
    pub semaphores: Arc<dyn SemaphoreRepository>,
}

impl Repositories {
    pub fn in_memory(clock: Arc<dyn TimeProvider>, semaphore_max_age: TimeDelta) -> Self {
        Self {
            jobs: Arc::new(MemoryJobRepository::new(clock.clone())),
            commands: Arc::new(MemoryCommandRepository::new()),
            semaphores: Arc::new(MemorySemaphoreRepository::with_max_age(clock, semaphore_max_age)),
        }
    }

    pub fn postgres(pool: PgPool, clock: Arc<dyn TimeProvider>, semaphore_max_age: TimeDelta) -> Self {
        Self {
            jobs: Arc::new(PgJobRepository::new(pool.clone(), clock.clone())),
            commands: Arc::new(PgCommandRepository::new(pool.clone(), clock.clone())),
            semaphores: Arc::new(PgSemaphoreRepository::new(pool, clock, semaphore_max_age)),
        }
    }
}

/// Stamp for the next write, strictly after the previous one
pub(crate) fn next_stamp(now: DateTime<Utc>, previous: DateTime<Utc>) -> DateTime<Utc> {
    now.max(previous + TimeDelta::microseconds(1))
}
