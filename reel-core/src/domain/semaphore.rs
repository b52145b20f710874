//! Leader-election lease record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lease held by the primary executor, refreshed by its heartbeat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Semaphore {
    pub id: String,
    pub owner: Option<String>,
    pub heartbeat: DateTime<Utc>,
}
