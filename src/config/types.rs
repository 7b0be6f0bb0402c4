/// Core types shared across the isotask system
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Identifier of one `ExecutionDriver::execute` call.
///
/// Scopes remember the invocation that created them; teardown only releases
/// scopes carrying its own id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(Uuid);

impl InvocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of one driver invocation.
///
/// `Idle -> BoundaryBuilt -> ImplementationResolved -> Configured -> Running -> Completed`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverState {
    #[serde(rename = "idle")]
    Idle,
    #[serde(rename = "boundary_built")]
    BoundaryBuilt,
    #[serde(rename = "implementation_resolved")]
    ImplementationResolved,
    #[serde(rename = "configured")]
    Configured,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverState::Idle => "idle",
            DriverState::BoundaryBuilt => "boundary_built",
            DriverState::ImplementationResolved => "implementation_resolved",
            DriverState::Configured => "configured",
            DriverState::Running => "running",
            DriverState::Completed => "completed",
            DriverState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Custom error types for isotask
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The host runtime cannot link the resolved implementation.
    #[error("Version mismatch: {implementation} {found} requires host {required} (running {host}). {hint}")]
    VersionMismatch {
        implementation: String,
        found: String,
        required: String,
        host: String,
        hint: String,
    },

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Instantiation error: cannot construct {implementation}: {reason}")]
    Instantiation {
        implementation: String,
        reason: String,
    },

    #[error("Replay error at {path}: {reason}")]
    Replay { path: String, reason: String },

    #[error("Execution error in {implementation}: {reason}")]
    Execution {
        implementation: String,
        reason: String,
    },

    #[error("Teardown error: {0}")]
    Teardown(String),

    /// An invocation failure whose teardown failed as well.
    #[error("{primary} (teardown also failed: {teardown})")]
    WithTeardown {
        #[source]
        primary: Box<TaskError>,
        teardown: Box<TaskError>,
    },
}

impl TaskError {
    /// The error that decided the invocation outcome.
    pub fn primary(&self) -> &TaskError {
        match self {
            TaskError::WithTeardown { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// Secondary teardown failure attached to a primary error, if any.
    pub fn teardown_cause(&self) -> Option<&TaskError> {
        match self {
            TaskError::WithTeardown { teardown, .. } => Some(teardown),
            _ => None,
        }
    }

    /// Attach a teardown failure. The receiver keeps precedence.
    pub fn with_teardown(self, teardown: TaskError) -> TaskError {
        TaskError::WithTeardown {
            primary: Box::new(self),
            teardown: Box::new(teardown),
        }
    }

    pub fn is_version_mismatch(&self) -> bool {
        matches!(self.primary(), TaskError::VersionMismatch { .. })
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self.primary(), TaskError::Resolution(_))
    }

    pub fn is_instantiation(&self) -> bool {
        matches!(self.primary(), TaskError::Instantiation { .. })
    }

    pub fn is_replay(&self) -> bool {
        matches!(self.primary(), TaskError::Replay { .. })
    }

    pub fn is_execution(&self) -> bool {
        matches!(self.primary(), TaskError::Execution { .. })
    }

    pub fn is_teardown(&self) -> bool {
        matches!(self.primary(), TaskError::Teardown(_))
    }
}

/// Convert errors to process exit codes for the CLI
impl From<&TaskError> for i32 {
    fn from(err: &TaskError) -> i32 {
        match err.primary() {
            TaskError::VersionMismatch { .. } => 3,
            TaskError::Resolution(_) => 4,
            TaskError::Instantiation { .. } => 5,
            TaskError::Replay { .. } => 6,
            TaskError::Execution { .. } => 1,
            TaskError::Teardown(_) => 7,
            TaskError::Config(_) => 78, // EX_CONFIG
            TaskError::Io(_) => 74,     // EX_IOERR
            TaskError::WithTeardown { .. } => 1,
        }
    }
}

/// Result type for isotask operations
pub type Result<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_unwraps_teardown_attachment() {
        let err = TaskError::Execution {
            implementation: "x".to_string(),
            reason: "boom".to_string(),
        }
        .with_teardown(TaskError::Teardown("close failed".to_string()));

        assert!(err.is_execution());
        assert!(!err.is_teardown());
        assert!(matches!(err.teardown_cause(), Some(TaskError::Teardown(_))));
        assert!(err.to_string().contains("teardown also failed"));
    }

    #[test]
    fn test_exit_codes_follow_primary() {
        let err = TaskError::Resolution("missing".to_string())
            .with_teardown(TaskError::Teardown("x".to_string()));
        assert_eq!(i32::from(&err), 4);
    }

    #[test]
    fn test_driver_state_names() {
        assert_eq!(DriverState::BoundaryBuilt.to_string(), "boundary_built");
        assert_eq!(
            serde_json::to_string(&DriverState::Failed).unwrap(),
            "\"failed\""
        );
    }

    #[test]
    fn test_invocation_ids_are_unique() {
        assert_ne!(InvocationId::new(), InvocationId::new());
    }
}
