//! Plugin error types
//!
//! These are raised when the engine breaks a plugin guard. They point at a
//! scheduling bug or a misconfiguration and are not retried. Backend failures
//! during work are not reported through this type; they turn the task Failed.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PluginError>;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin {urn} already holds task {task}")]
    Busy { urn: String, task: String },

    #[error("Plugin {urn} rejected task {task}")]
    Rejected { urn: String, task: String },

    #[error("Task {task} is assigned to {expected}, not plugin {urn}")]
    UrnMismatch {
        urn: String,
        task: String,
        expected: String,
    },

    #[error("Task {0} has never been started and cannot be reassigned")]
    NotStarted(String),

    #[error("Task {0} is still running and cannot be released")]
    ReleaseWhileRunning(String),

    #[error("Plugin {urn} does not support {capability}")]
    Unsupported {
        urn: String,
        capability: &'static str,
    },

    #[error("Invalid plugin urn: {0}")]
    InvalidUrn(String),

    #[error("Plugin urn {urn} does not match backend type {expected}")]
    TypeMismatch { urn: String, expected: String },

    #[error("Backend of plugin {urn} failed: {source:#}")]
    Backend {
        urn: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PluginError {
    pub fn unsupported(urn: impl Into<String>, capability: &'static str) -> Self {
        Self::Unsupported {
            urn: urn.into(),
            capability,
        }
    }

    pub fn backend(urn: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Backend {
            urn: urn.into(),
            source,
        }
    }
}
