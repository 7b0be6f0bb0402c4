use crate::boundary::policy::BoundaryPolicy;
use crate::capture::node::ConfigNode;
use crate::config::types::{InvocationId, Result};
use crate::exec::driver::{ExecutionDriver, ExecutionReport};
use crate::replay::target::ReplayTarget;
use std::fmt;
use std::sync::Mutex;

/// Error raised by an implementation's `run()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    message: String,
}

impl ExecutionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<std::io::Error> for ExecutionFailure {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// A task implementation loaded inside an isolation boundary.
///
/// It is configured through [`ReplayTarget`] and then run exactly once.
pub trait Implementation: ReplayTarget {
    fn run(&mut self, host: &HostContext<'_>) -> std::result::Result<(), ExecutionFailure>;
}

/// What the host exposes to a running implementation.
pub struct HostContext<'a> {
    driver: &'a ExecutionDriver,
    task_name: String,
    invocation: InvocationId,
    depth: usize,
    messages: Mutex<Vec<String>>,
}

impl<'a> HostContext<'a> {
    pub(crate) fn new(
        driver: &'a ExecutionDriver,
        task_name: String,
        invocation: InvocationId,
        depth: usize,
    ) -> Self {
        Self {
            driver,
            task_name,
            invocation,
            depth,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn invocation(&self) -> InvocationId {
        self.invocation
    }

    /// Nesting level, 1 for a top-level invocation
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Log a task message and keep it for the execution report
    pub fn emit(&self, message: impl Into<String>) {
        let message = message.into();
        log::info!("[{}] {}", self.task_name, message);
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }

    /// Run another isolated task from inside this one.
    ///
    /// The current boundary becomes the caller environment of the nested run.
    pub fn execute_nested(
        &self,
        policy: &dyn BoundaryPolicy,
        config: &ConfigNode,
    ) -> Result<ExecutionReport> {
        self.driver.execute(policy, config)
    }

    pub(crate) fn into_messages(self) -> Vec<String> {
        self.messages.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}
