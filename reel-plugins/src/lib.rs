//! Reel Plugins
//!
//! The plugin contract between the engine and backend integrations.
//!
//! A [`Plugin`] wraps one backend instance: the [`Backend`] trait carries the
//! integration specific work while the wrapper enforces the ownership guards
//! (assign, reassign, release, retry) and asks its [`CapacityPolicy`] whether
//! an idle instance may take new work.

pub mod backend;
pub mod backends;
pub mod capacity;
pub mod error;
pub mod plugin;

pub use backend::Backend;
pub use capacity::{CapacityPolicy, CapacityRegistry, Exclusive, SharedCapacity};
pub use capacity::workers::{FixedWorkers, HttpWorkerCount, WorkerCountSource};
pub use error::{PluginError, Result};
pub use plugin::Plugin;
