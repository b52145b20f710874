//! Engine errors

use reel_plugins::PluginError;
use thiserror::Error;

use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The plugin set cannot serve the configured pipeline
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal bookkeeping diverged
    #[error("Inconsistent engine state: {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Core(#[from] reel_core::Error),
}
