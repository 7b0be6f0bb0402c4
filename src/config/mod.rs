//! Configuration and shared types
//!
//! Error taxonomy, lifecycle states and driver settings.

pub mod settings;
pub mod types;
