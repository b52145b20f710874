//! Read-only status snapshots for observability

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::ExecutionTask;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStatus {
    pub urn: String,
    pub plugin_type: String,
    pub busy: bool,
    pub current_task: Option<ExecutionTask>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorStatus {
    pub plugins: Vec<PluginStatus>,
    pub timestamp: DateTime<Utc>,
    pub is_primary: bool,
}
