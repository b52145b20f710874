//! Reel Core
//!
//! Core types and abstractions for the Reel transcoding orchestrator.
//!
//! This crate contains:
//! - Domain types: essences, execution tasks and plans, jobs, commands
//! - Urn helpers and the time source abstraction
//! - DTOs: order intake, job status and dashboard views served over HTTP

pub mod domain;
pub mod dto;
pub mod error;
pub mod time;
pub mod urn;

pub use error::{Error, Result};
