//! Safety and cleanup
//!
//! Deterministic release of the scopes an invocation created.

pub mod teardown;
