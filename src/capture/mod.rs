//! Configuration capture
//!
//! Declarative configuration arrives as attribute/child events whose shape is
//! unknown at compile time; it is recorded as a [`ConfigNode`] tree and
//! replayed later onto whatever implementation gets resolved.

pub mod capture;
pub mod document;
pub mod node;

pub use capture::ConfigCapture;
pub use node::ConfigNode;
