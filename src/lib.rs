//! isotask: isolated execution of declaratively configured tasks
//! Captures a configuration element tree, loads a task implementation inside a
//! version-isolated boundary, replays the configuration onto it, runs it, and
//! tears the boundary down deterministically.
//!
//! # Architecture
//!
//! ## Configuration Capture ([`capture`])
//! - [`capture::node`]: Ordered element tree of attributes and children
//! - [`capture::capture`]: Event-driven tree builder (`set_attribute` / `create_child`)
//! - [`capture::document`]: JSON element documents in and out
//!
//! ## Isolation Boundaries ([`boundary`])
//! - [`boundary::scope`]: Scoped loading environments with masked prefixes and release facilities
//! - [`boundary::registry`]: Versioned implementation catalog with host requirements
//! - [`boundary::policy`]: Boundary construction policies ("parallel world" layering)
//! - [`boundary::resolver`]: Strict-inside-boundary resolution, version gate, instantiation
//! - [`boundary::version`]: Dotted version numbers
//! - [`boundary::staging`]: Per-scope staging directories
//!
//! ## Replay ([`replay`])
//! - [`replay::target`]: Settable/creatable capability of replay targets
//! - [`replay::replayer`]: Depth-first, attributes-first replay
//!
//! ## Execution Control ([`exec`])
//! - [`exec::driver`]: Type-state enforced invocation sequence
//! - [`exec::ambient`]: Thread-local ambient boundary stack
//! - [`exec::implementation`]: Implementation contract and host context
//!
//! ## Safety & Cleanup ([`safety`])
//! - [`safety::teardown`]: Ownership-aware boundary teardown with graduated fallback
//!
//! ## Observability ([`observability`])
//! - [`observability::audit`]: Structured audit events
//!
//! ## Configuration ([`config`])
//! - [`config::settings`]: Driver settings
//! - [`config::types`]: Error taxonomy and shared identifiers
//!
//! ## Bundled Tasks ([`tasks`])
//! - [`tasks::echo`], [`tasks::properties`]
//!
//! # Design Principles
//!
//! 1. **Types prevent errors** - An invocation cannot skip or reorder steps
//! 2. **Teardown on every path** - Success, failure or panic, created scopes are released
//! 3. **Release only what you own** - Shared ancestor scopes are left to their owner
//! 4. **Stacked ambient context** - Nested invocations restore, never clobber

// Configuration Capture
pub mod capture;

// Isolation Boundaries
pub mod boundary;

// Replay
pub mod replay;

// Execution Control
pub mod exec;

// Safety & Cleanup
pub mod safety;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Bundled tasks
pub mod tasks;

// CLI entry point
pub mod cli;

pub use capture::{ConfigCapture, ConfigNode};
pub use config::types::{Result, TaskError};
pub use exec::{ExecutionDriver, ExecutionReport};
