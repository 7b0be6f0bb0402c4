/// Audit trail for isolated task invocations
/// Every invocation emits a structured event per lifecycle transition, correlated
/// by invocation id, parent invocation and nesting depth:
/// - lifecycle: start, boundary built, implementation resolved, configured, end
/// - failures: execution failure, version mismatch, invocation failed
/// - teardown: start, success, partial, failure, unavailable legacy release
/// Events are mirrored to `log` and, once `init_audit_logger` ran, appended to a
/// JSON-lines file.
use crate::config::types::{InvocationId, Result, TaskError};
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditSeverity {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    InvocationStart,
    BoundaryBuilt,
    ImplementationResolved,
    Configured,
    ExecutionEnd,

    ExecutionFailure,
    VersionMismatch,
    InvocationFailed,

    TeardownStart,
    TeardownSuccess,
    TeardownPartial,
    TeardownFailure,
    ReleaseUnavailable,
}

impl AuditEventType {
    pub fn default_severity(&self) -> AuditSeverity {
        match self {
            AuditEventType::InvocationStart
            | AuditEventType::BoundaryBuilt
            | AuditEventType::ImplementationResolved
            | AuditEventType::Configured
            | AuditEventType::ExecutionEnd
            | AuditEventType::TeardownStart
            | AuditEventType::TeardownSuccess => AuditSeverity::Low,

            AuditEventType::ReleaseUnavailable => AuditSeverity::Medium,
            AuditEventType::ExecutionFailure
            | AuditEventType::VersionMismatch
            | AuditEventType::InvocationFailed => AuditSeverity::High,
            AuditEventType::TeardownPartial => AuditSeverity::High,
            AuditEventType::TeardownFailure => AuditSeverity::Critical,
        }
    }
}

/// Correlation identifiers for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correlation {
    pub invocation_id: String,
    pub parent_invocation: Option<String>,
    pub depth: usize,
}

impl Correlation {
    pub fn new(invocation: InvocationId) -> Self {
        Self {
            invocation_id: invocation.to_string(),
            parent_invocation: None,
            depth: 1,
        }
    }

    pub fn with_parent(mut self, parent: Option<InvocationId>) -> Self {
        self.parent_invocation = parent.map(|p| p.to_string());
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub timestamp: DateTime<Utc>,
    pub details: String,
    pub correlation: Option<Correlation>,
    pub task: Option<String>,
    pub scope: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, details: impl Into<String>) -> Self {
        Self {
            event_type,
            severity: event_type.default_severity(),
            timestamp: Utc::now(),
            details: details.into(),
            correlation: None,
            task: None,
            scope: None,
            data: None,
        }
    }

    pub fn with_correlation(mut self, correlation: Correlation) -> Self {
        self.correlation = Some(correlation);
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_data<T: Serialize>(mut self, data: &T) -> Self {
        self.data = serde_json::to_value(data).ok();
        self
    }

    pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// One JSON line as written to the audit file
    pub fn to_json(&self) -> serde_json::Value {
        let mut entry = serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "event_type": self.event_type,
            "severity": self.severity,
            "details": self.details,
            "process_id": std::process::id(),
        });

        if let Some(correlation) = &self.correlation {
            entry["correlation"] = serde_json::json!({
                "invocation_id": correlation.invocation_id,
                "parent_invocation": correlation.parent_invocation,
                "depth": correlation.depth,
            });
        }
        if let Some(task) = &self.task {
            entry["task"] = serde_json::json!(task);
        }
        if let Some(scope) = &self.scope {
            entry["scope"] = serde_json::json!(scope);
        }
        if let Some(data) = &self.data {
            entry["data"] = data.clone();
        }
        entry
    }
}

/// Mirror an event to the standard logger at a level matching its severity
fn log_to_standard(event: &AuditEvent) {
    match event.severity {
        AuditSeverity::Critical | AuditSeverity::High => {
            error!("AUDIT {:?}: {}", event.event_type, event.details)
        }
        AuditSeverity::Medium => warn!("AUDIT {:?}: {}", event.event_type, event.details),
        AuditSeverity::Low => debug!("AUDIT {:?}: {}", event.event_type, event.details),
    }
}

pub struct AuditLogger {
    audit_file: Arc<Mutex<File>>,
    audit_path: PathBuf,
}

impl AuditLogger {
    pub fn new(audit_path: Option<PathBuf>) -> Result<Self> {
        let audit_path = audit_path.unwrap_or_else(default_audit_path);

        if let Some(parent) = audit_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    TaskError::Config(format!("Failed to create audit log directory: {}", e))
                })?;
            }
        }

        let audit_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&audit_path)
            .map_err(|e| TaskError::Config(format!("Failed to open audit log: {}", e)))?;

        Ok(Self {
            audit_file: Arc::new(Mutex::new(audit_file)),
            audit_path,
        })
    }

    pub fn log_event(&self, event: &AuditEvent) {
        log_to_standard(event);

        let entry = event.to_json();
        match self.audit_file.lock() {
            Ok(mut file) => {
                if let Err(e) = writeln!(file, "{}", entry) {
                    error!("Failed to write to audit log: {}", e);
                }
                if let Err(e) = file.flush() {
                    error!("Failed to flush audit log: {}", e);
                }
            }
            Err(_) => error!("Failed to acquire lock on audit file"),
        }
    }

    pub fn audit_path(&self) -> &Path {
        &self.audit_path
    }
}

fn default_audit_path() -> PathBuf {
    std::env::temp_dir().join("isotask").join("audit.log")
}

static AUDIT_LOGGER: OnceLock<AuditLogger> = OnceLock::new();

/// Initialize the global audit sink.
///
/// Without an explicit path the default under the temp dir is tried, then a
/// per-user file under `$HOME`. If nothing can be opened, events still go to
/// the standard logger.
pub fn init_audit_logger(audit_path: Option<PathBuf>) -> Result<()> {
    let logger = match AuditLogger::new(audit_path.clone()) {
        Ok(logger) => logger,
        Err(e) if audit_path.is_none() => {
            let fallback = std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir)
                .join(".isotask")
                .join("audit.log");
            match AuditLogger::new(Some(fallback)) {
                Ok(logger) => logger,
                Err(_) => {
                    warn!("Audit log unavailable, using standard logger only: {}", e);
                    return Ok(());
                }
            }
        }
        Err(e) => return Err(e),
    };

    let path = logger.audit_path().display().to_string();
    if AUDIT_LOGGER.set(logger).is_err() {
        warn!("Audit logger already initialized");
    } else {
        info!("Audit log at {}", path);
    }
    Ok(())
}

pub fn audit_logger() -> Option<&'static AuditLogger> {
    AUDIT_LOGGER.get()
}

pub fn log_event(event: AuditEvent) {
    match AUDIT_LOGGER.get() {
        Some(logger) => logger.log_event(&event),
        None => log_to_standard(&event),
    }
}

/// Convenience emitters used by the driver and teardown
pub mod events {
    use super::*;
    use crate::config::types::DriverState;
    use crate::safety::teardown::TeardownReport;

    pub fn invocation_start(correlation: &Correlation, task: &str) {
        log_event(
            AuditEvent::new(AuditEventType::InvocationStart, format!("Invocation of {}", task))
                .with_correlation(correlation.clone())
                .with_task(task),
        );
    }

    pub fn boundary_built(correlation: &Correlation, boundary: &str, scopes: usize) {
        log_event(
            AuditEvent::new(
                AuditEventType::BoundaryBuilt,
                format!("Boundary {} built from {} scope(s)", boundary, scopes),
            )
            .with_correlation(correlation.clone())
            .with_scope(boundary),
        );
    }

    pub fn implementation_resolved(correlation: &Correlation, task: &str, version: &str, scope: &str) {
        log_event(
            AuditEvent::new(
                AuditEventType::ImplementationResolved,
                format!("{} {} resolved from {}", task, version, scope),
            )
            .with_correlation(correlation.clone())
            .with_task(task)
            .with_scope(scope),
        );
    }

    pub fn configured(correlation: &Correlation, task: &str, attributes: usize, elements: usize) {
        log_event(
            AuditEvent::new(
                AuditEventType::Configured,
                format!("{} attribute(s), {} element(s) replayed", attributes, elements),
            )
            .with_correlation(correlation.clone())
            .with_task(task),
        );
    }

    pub fn execution_end(correlation: &Correlation, task: &str) {
        log_event(
            AuditEvent::new(AuditEventType::ExecutionEnd, format!("{} completed", task))
                .with_correlation(correlation.clone())
                .with_task(task),
        );
    }

    pub fn execution_failure(correlation: &Correlation, task: &str, reason: &str) {
        log_event(
            AuditEvent::new(AuditEventType::ExecutionFailure, reason.to_string())
                .with_correlation(correlation.clone())
                .with_task(task),
        );
    }

    pub fn version_mismatch(correlation: &Correlation, task: &str, reason: &str) {
        log_event(
            AuditEvent::new(AuditEventType::VersionMismatch, reason.to_string())
                .with_correlation(correlation.clone())
                .with_task(task),
        );
    }

    /// Terminal event of an aborted invocation
    pub fn invocation_failed(correlation: &Correlation, task: &str, failed_in: DriverState, reason: &str) {
        log_event(
            AuditEvent::new(
                AuditEventType::InvocationFailed,
                format!("{} failed in state {}: {}", task, failed_in, reason),
            )
            .with_correlation(correlation.clone())
            .with_task(task)
            .with_data(&serde_json::json!({
                "failed_in": failed_in,
                "state": DriverState::Failed,
            })),
        );
    }

    pub fn teardown_start(correlation: &Correlation, created: usize) {
        log_event(
            AuditEvent::new(
                AuditEventType::TeardownStart,
                format!("Tearing down {} created scope(s)", created),
            )
            .with_correlation(correlation.clone()),
        );
    }

    pub fn teardown_success(correlation: &Correlation, report: &TeardownReport) {
        log_event(
            AuditEvent::new(
                AuditEventType::TeardownSuccess,
                format!("{} scope(s) processed", report.outcomes.len()),
            )
            .with_correlation(correlation.clone())
            .with_data(report),
        );
    }

    pub fn teardown_partial(correlation: &Correlation, report: &TeardownReport, reason: &str) {
        log_event(
            AuditEvent::new(AuditEventType::TeardownPartial, reason.to_string())
                .with_correlation(correlation.clone())
                .with_data(report),
        );
    }

    pub fn teardown_failure(correlation: &Correlation, report: &TeardownReport, reason: &str) {
        log_event(
            AuditEvent::new(AuditEventType::TeardownFailure, reason.to_string())
                .with_correlation(correlation.clone())
                .with_data(report),
        );
    }

    pub fn release_unavailable(correlation: &Correlation, scope: &str, facility: &str, reason: &str) {
        log_event(
            AuditEvent::new(
                AuditEventType::ReleaseUnavailable,
                format!("{} unavailable: {}", facility, reason),
            )
            .with_correlation(correlation.clone())
            .with_scope(scope),
        );
    }
}
