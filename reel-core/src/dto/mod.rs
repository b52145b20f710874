//! Data Transfer Objects for the HTTP API
//!
//! This module contains the DTOs exchanged between the orchestrator API,
//! the client library and callback receivers. DTOs are views over domain
//! entities shaped for network transfer.

pub mod dashboard;
pub mod job;
pub mod order;
