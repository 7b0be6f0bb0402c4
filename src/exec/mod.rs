//! Isolated execution
//!
//! The typestate driver, the implementation contract it runs, and the
//! thread-local ambient context that nested invocations stack on.

pub mod ambient;
pub mod driver;
pub mod implementation;

pub use driver::{ExecutionDriver, ExecutionReport, Invocation};
pub use implementation::{ExecutionFailure, HostContext, Implementation};
