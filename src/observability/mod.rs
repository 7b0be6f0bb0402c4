//! Observability
//!
//! Structured audit events for every invocation and teardown.

pub mod audit;
