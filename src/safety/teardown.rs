/// Boundary teardown
/// Walks the parent chain from the boundary used by one invocation up to, and
/// excluding, the caller scope captured before the boundary was built, and
/// releases every scope this invocation owns:
/// - explicit release facility: `LoaderScope::release`, idempotent
/// - legacy facility: best effort; "unavailable" is recorded and skipped,
///   any other failure is fatal
/// - no facility: skipped, reclaimed by normal lifetime rules
/// Scopes owned by another invocation (or by nobody) are never released here.
/// Failures do not stop the walk; they are aggregated into one TeardownError.
use crate::boundary::resolver::panic_message;
use crate::boundary::scope::{LegacyReleaseError, LoaderScope, ReleaseFacility, ReleaseStatus};
use crate::config::types::{InvocationId, TaskError};
use crate::exec::ambient;
use crate::observability::audit::{events, Correlation};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// What teardown did with one scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TeardownAction {
    Released { closed: usize },
    AlreadyReleased,
    LegacyReleased { facility: String },
    LegacyUnavailable { facility: String, reason: String },
    Skipped,
    Borrowed,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeOutcome {
    pub scope_id: u64,
    pub label: String,
    pub action: TeardownAction,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownReport {
    pub outcomes: Vec<ScopeOutcome>,
}

impl TeardownReport {
    pub fn failures(&self) -> impl Iterator<Item = &ScopeOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.action, TeardownAction::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn action_for(&self, label: &str) -> Option<&TeardownAction> {
        self.outcomes
            .iter()
            .find(|o| o.label == label)
            .map(|o| &o.action)
    }

    /// Aggregate fatal outcomes into one error
    pub fn error(&self) -> Option<TaskError> {
        let failed: Vec<String> = self
            .failures()
            .map(|o| match &o.action {
                TeardownAction::Failed { reason } => format!("{}: {}", o.label, reason),
                _ => o.label.clone(),
            })
            .collect();

        if failed.is_empty() {
            return None;
        }
        Some(TaskError::Teardown(format!(
            "{} scope(s) failed to release: {}",
            failed.len(),
            failed.join("; ")
        )))
    }
}

pub struct BoundaryTeardown {
    invocation: InvocationId,
    caller: Arc<LoaderScope>,
    correlation: Correlation,
}

impl BoundaryTeardown {
    pub fn new(invocation: InvocationId, caller: Arc<LoaderScope>) -> Self {
        Self {
            invocation,
            caller,
            correlation: Correlation::new(invocation),
        }
    }

    /// Audit correlation for nested invocations (parent id, depth)
    pub fn with_correlation(mut self, correlation: Correlation) -> Self {
        self.correlation = correlation;
        self
    }

    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    /// Tear down `boundary`'s chain, then any scope in `created` that was not
    /// on the chain (built by the policy but left dangling).
    pub fn run(
        &self,
        boundary: Option<&Arc<LoaderScope>>,
        created: &[Arc<LoaderScope>],
    ) -> TeardownReport {
        events::teardown_start(&self.correlation, created.len());
        let mut report = TeardownReport::default();
        let mut visited = HashSet::new();

        let mut cursor = boundary.cloned();
        while let Some(scope) = cursor {
            if scope.id() == self.caller.id() {
                break;
            }
            visited.insert(scope.id());
            report.outcomes.push(self.release_scope(&scope));
            cursor = scope.parent().cloned();
        }

        for scope in created.iter().rev() {
            if visited.insert(scope.id()) {
                debug!("Releasing scope {} outside the boundary chain", scope.label());
                report.outcomes.push(self.release_scope(scope));
            }
        }

        match report.error() {
            None => {
                info!(
                    "Teardown of invocation {} complete ({} scope(s))",
                    self.invocation,
                    report.outcomes.len()
                );
                events::teardown_success(&self.correlation, &report);
            }
            Some(err) => {
                warn!("Teardown of invocation {} failed: {}", self.invocation, err);
                let reason = err.to_string();
                if report.outcomes.iter().any(|o| {
                    matches!(
                        o.action,
                        TeardownAction::Released { .. } | TeardownAction::LegacyReleased { .. }
                    )
                }) {
                    events::teardown_partial(&self.correlation, &report, &reason);
                } else {
                    events::teardown_failure(&self.correlation, &report, &reason);
                }
            }
        }
        report
    }

    fn release_scope(&self, scope: &Arc<LoaderScope>) -> ScopeOutcome {
        let action = if scope.owner() != Some(self.invocation) {
            debug!(
                "Scope {} is owned by {:?}, leaving it to its owner",
                scope.label(),
                scope.owner()
            );
            TeardownAction::Borrowed
        } else if ambient::is_active(scope) {
            TeardownAction::Failed {
                reason: "scope is still the ambient context".to_string(),
            }
        } else {
            self.apply_facility(scope)
        };

        ScopeOutcome {
            scope_id: scope.id(),
            label: scope.label().to_string(),
            action,
        }
    }

    fn apply_facility(&self, scope: &LoaderScope) -> TeardownAction {
        match scope.facility() {
            ReleaseFacility::Explicit => match scope.release() {
                Ok(ReleaseStatus::Released { closed }) => TeardownAction::Released { closed },
                Ok(ReleaseStatus::AlreadyReleased) => TeardownAction::AlreadyReleased,
                Err(e) => TeardownAction::Failed {
                    reason: e.to_string(),
                },
            },
            ReleaseFacility::Legacy(hook) => {
                let facility = hook.facility_name().to_string();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook.release(scope)))
                    .unwrap_or_else(|payload| {
                        Err(LegacyReleaseError::Failed(panic_message(payload.as_ref())))
                    });
                match outcome {
                    Ok(()) => TeardownAction::LegacyReleased { facility },
                    Err(LegacyReleaseError::Unavailable(reason)) => {
                        debug!(
                            "Legacy release {} unavailable for scope {}: {}",
                            facility,
                            scope.label(),
                            reason
                        );
                        events::release_unavailable(&self.correlation, scope.label(), &facility, &reason);
                        TeardownAction::LegacyUnavailable { facility, reason }
                    }
                    Err(LegacyReleaseError::Failed(reason)) => TeardownAction::Failed {
                        reason: format!("{}: {}", facility, reason),
                    },
                }
            }
            ReleaseFacility::None => TeardownAction::Skipped,
        }
    }
}
