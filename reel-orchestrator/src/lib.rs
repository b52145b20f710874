//! Reel Orchestrator
//!
//! Accepts transcoding orders over HTTP, plans them onto plugin instances and
//! drives the plans to completion from a periodic executor pulse. Several
//! orchestrators may share one database; a semaphore lease elects the one
//! doing the work.

pub mod api;
pub mod callback;
pub mod config;
pub mod db;
pub mod engine;
pub mod health;
pub mod plugins;
pub mod repository;

#[cfg(test)]
mod testing;
