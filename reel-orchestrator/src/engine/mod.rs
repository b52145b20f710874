//! Scheduling engine
//!
//! - [`planner`]: turns waiting jobs into execution plans
//! - [`executor`]: leader-elected pulse driving plans through the plugins

pub mod error;
pub mod executor;
pub mod planner;

pub use error::{EngineError, Result};
pub use executor::{Executor, SEMAPHORE_ID};
pub use planner::{Planner, PlannerConfig, Route};
