//! Execution driver
//!
//! One invocation moves through a fixed sequence of states, each a distinct
//! type so steps cannot be skipped or reordered:
//!
//! `Idle -> BoundaryBuilt -> ImplementationResolved -> Configured -> Completed`
//!
//! `run()` is the `Running` state; a failure there is reported as such. Any
//! step may instead produce an [`Aborted`] invocation, whose terminal state
//! is `Failed`. Both ends are finished by [`BoundaryTeardown`], so every
//! scope the invocation created is released before control returns to the
//! caller.
//!
//! Step ordering is enforced by the compiler; the cases under
//! `tests/typestate_compile_fail` pin that down.

use crate::boundary::policy::{BoundaryContext, BoundaryPolicy};
use crate::boundary::resolver::{panic_message, ImplementationResolver, ResolvedImplementation};
use crate::boundary::scope::LoaderScope;
use crate::boundary::version::VersionNumber;
use crate::capture::node::ConfigNode;
use crate::config::settings::DriverSettings;
use crate::config::types::{DriverState, InvocationId, Result, TaskError};
use crate::exec::ambient;
use crate::exec::implementation::{ExecutionFailure, HostContext};
use crate::observability::audit::{events, Correlation};
use crate::replay::replayer::{replay, ReplayStats};
use crate::safety::teardown::{BoundaryTeardown, TeardownReport};
use log::{debug, info, warn};
use serde::Serialize;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Type-state marker: nothing built yet
pub struct Idle;

/// Type-state marker: isolation boundary constructed
pub struct BoundaryBuilt;

/// Type-state marker: implementation located and instantiated
pub struct ImplementationResolved;

/// Type-state marker: configuration replayed onto the instance
pub struct Configured;

/// Type-state marker: `run()` returned normally
pub struct Completed;

/// Runtime name of a type-state marker
pub trait InvocationState {
    const STATE: DriverState;
}

impl InvocationState for Idle {
    const STATE: DriverState = DriverState::Idle;
}

impl InvocationState for BoundaryBuilt {
    const STATE: DriverState = DriverState::BoundaryBuilt;
}

impl InvocationState for ImplementationResolved {
    const STATE: DriverState = DriverState::ImplementationResolved;
}

impl InvocationState for Configured {
    const STATE: DriverState = DriverState::Configured;
}

impl InvocationState for Completed {
    const STATE: DriverState = DriverState::Completed;
}

/// Everything teardown needs, carried through every state
struct Lifecycle {
    id: InvocationId,
    parent: Option<InvocationId>,
    depth: usize,
    task_name: String,
    caller: Arc<LoaderScope>,
    boundary: Option<Arc<LoaderScope>>,
    created: Vec<Arc<LoaderScope>>,
    correlation: Correlation,
}

impl Lifecycle {
    fn teardown(&self) -> TeardownReport {
        BoundaryTeardown::new(self.id, Arc::clone(&self.caller))
            .with_correlation(self.correlation.clone())
            .run(self.boundary.as_ref(), &self.created)
    }
}

/// One invocation in state `S`
pub struct Invocation<'d, S> {
    driver: &'d ExecutionDriver,
    lifecycle: Lifecycle,
    resolved: Option<ResolvedImplementation>,
    replay: ReplayStats,
    messages: Vec<String>,
    _state: PhantomData<S>,
}

/// An invocation that failed at `failed_in`. Its scopes are still alive until
/// [`Aborted::finish`] tears them down.
pub struct Aborted {
    lifecycle: Lifecycle,
    resolved: Option<ResolvedImplementation>,
    failed_in: DriverState,
    error: TaskError,
}

/// Outcome of one transition
pub type Step<'d, S> = std::result::Result<Invocation<'d, S>, Aborted>;

impl<'d, S: InvocationState> Invocation<'d, S> {
    pub fn id(&self) -> InvocationId {
        self.lifecycle.id
    }

    pub fn state(&self) -> DriverState {
        S::STATE
    }

    pub fn task_name(&self) -> &str {
        &self.lifecycle.task_name
    }

    pub fn boundary(&self) -> Option<&Arc<LoaderScope>> {
        self.lifecycle.boundary.as_ref()
    }

    /// Audit correlation: this invocation, its parent and nesting depth
    pub fn correlation(&self) -> &Correlation {
        &self.lifecycle.correlation
    }

    fn advance<N>(self) -> Invocation<'d, N> {
        Invocation {
            driver: self.driver,
            lifecycle: self.lifecycle,
            resolved: self.resolved,
            replay: self.replay,
            messages: self.messages,
            _state: PhantomData,
        }
    }

    fn abort(self, error: TaskError) -> Aborted {
        self.abort_in(S::STATE, error)
    }

    fn abort_in(self, failed_in: DriverState, error: TaskError) -> Aborted {
        warn!(
            "Invocation {} of {} failed in state {}: {}",
            self.lifecycle.id, self.lifecycle.task_name, failed_in, error
        );
        Aborted {
            lifecycle: self.lifecycle,
            resolved: self.resolved,
            failed_in,
            error,
        }
    }

    fn boundary_or_abort(self) -> std::result::Result<(Self, Arc<LoaderScope>), Aborted> {
        match self.lifecycle.boundary.clone() {
            Some(boundary) => Ok((self, boundary)),
            None => Err(self.abort(TaskError::Resolution(
                "invocation has no boundary".to_string(),
            ))),
        }
    }
}

impl<'d> Invocation<'d, Idle> {
    /// Start an invocation. The caller scope is the ambient boundary when
    /// nested, otherwise the driver's root scope.
    pub fn new(driver: &'d ExecutionDriver, task_name: impl Into<String>) -> Self {
        let caller = ambient::current().unwrap_or_else(|| Arc::clone(&driver.root));
        let id = InvocationId::new();
        let parent = ambient::current_invocation();
        let depth = ambient::depth() + 1;
        let lifecycle = Lifecycle {
            id,
            parent,
            depth,
            task_name: task_name.into(),
            caller,
            boundary: None,
            created: Vec::new(),
            correlation: Correlation::new(id).with_parent(parent).with_depth(depth),
        };

        debug!(
            "Invocation {} of {} at depth {} (caller scope {})",
            lifecycle.id,
            lifecycle.task_name,
            lifecycle.depth,
            lifecycle.caller.label()
        );
        events::invocation_start(&lifecycle.correlation, &lifecycle.task_name);

        Invocation {
            driver,
            lifecycle,
            resolved: None,
            replay: ReplayStats::default(),
            messages: Vec::new(),
            _state: PhantomData,
        }
    }

    /// Let `policy` assemble the boundary below the caller scope.
    ///
    /// Scopes the policy built before failing or panicking are kept for
    /// teardown.
    pub fn build_boundary(mut self, policy: &dyn BoundaryPolicy) -> Step<'d, BoundaryBuilt> {
        let mut ctx = BoundaryContext::new(self.lifecycle.id, Arc::clone(&self.lifecycle.caller));
        let built = panic::catch_unwind(AssertUnwindSafe(|| policy.create_boundary(&mut ctx)))
            .unwrap_or_else(|payload| {
                Err(TaskError::Resolution(format!(
                    "boundary policy for {} {}",
                    policy.implementation_name(),
                    panic_message(payload.as_ref())
                )))
            });
        self.lifecycle.created = ctx.into_created();

        let boundary = match built {
            Ok(boundary) => boundary,
            Err(e) => return Err(self.abort(e)),
        };

        if !boundary.descends_from(&self.lifecycle.caller) {
            let reason = format!(
                "boundary {} is not parented at caller scope {}",
                boundary.label(),
                self.lifecycle.caller.label()
            );
            self.lifecycle.boundary = Some(boundary);
            return Err(self.abort(TaskError::Resolution(reason)));
        }

        info!(
            "Built boundary {} for {} ({} scope(s))",
            boundary.label(),
            self.lifecycle.task_name,
            self.lifecycle.created.len()
        );
        events::boundary_built(
            &self.lifecycle.correlation,
            boundary.label(),
            self.lifecycle.created.len(),
        );

        self.lifecycle.boundary = Some(boundary);
        Ok(self.advance())
    }
}

impl<'d> Invocation<'d, BoundaryBuilt> {
    pub fn resolve(self) -> Step<'d, ImplementationResolved> {
        let (mut this, boundary) = self.boundary_or_abort()?;

        let resolved = ImplementationResolver::new(&this.driver.host_version, &this.lifecycle.caller)
            .resolve(&boundary, &this.lifecycle.task_name);

        match resolved {
            Ok(resolved) => {
                events::implementation_resolved(
                    &this.lifecycle.correlation,
                    resolved.def.name(),
                    &resolved.def.version().to_string(),
                    resolved.defined_in.label(),
                );
                this.resolved = Some(resolved);
                Ok(this.advance())
            }
            Err(e) => {
                if e.is_version_mismatch() {
                    events::version_mismatch(
                        &this.lifecycle.correlation,
                        &this.lifecycle.task_name,
                        &e.to_string(),
                    );
                }
                Err(this.abort(e))
            }
        }
    }
}

impl<'d> Invocation<'d, ImplementationResolved> {
    /// Replay `config` onto the resolved instance. A target that panics
    /// fails the replay like one that rejects.
    pub fn configure(mut self, config: &ConfigNode) -> Step<'d, Configured> {
        let outcome = match self.resolved.as_mut() {
            Some(resolved) => {
                let instance = &mut resolved.instance;
                panic::catch_unwind(AssertUnwindSafe(|| replay(instance.as_mut(), config)))
                    .unwrap_or_else(|payload| {
                        Err(TaskError::Replay {
                            path: config.name().to_string(),
                            reason: panic_message(payload.as_ref()),
                        })
                    })
            }
            None => Err(TaskError::Resolution("no resolved implementation".to_string())),
        };

        match outcome {
            Ok(stats) => {
                events::configured(
                    &self.lifecycle.correlation,
                    &self.lifecycle.task_name,
                    stats.attributes,
                    stats.elements,
                );
                self.replay = stats;
                Ok(self.advance())
            }
            Err(e) => Err(self.abort(e)),
        }
    }
}

impl<'d> Invocation<'d, Configured> {
    /// Run the implementation with its boundary installed as the ambient
    /// context. The previous context is back in place before this returns,
    /// whatever `run()` did. A failure here is reported in state `Running`.
    pub fn run(self) -> Step<'d, Completed> {
        let (mut this, boundary) = self.boundary_or_abort()?;

        let implementation = match this.resolved.as_ref() {
            Some(r) => format!("{} {}", r.def.name(), r.def.version()),
            None => this.lifecycle.task_name.clone(),
        };

        let host = HostContext::new(
            this.driver,
            this.lifecycle.task_name.clone(),
            this.lifecycle.id,
            this.lifecycle.depth,
        );

        debug!(
            "Invocation {} {} -> {}: {} in {}",
            this.lifecycle.id,
            Configured::STATE,
            DriverState::Running,
            implementation,
            boundary.label()
        );
        let guard = ambient::install(boundary, this.lifecycle.id);
        let outcome = match this.resolved.as_mut() {
            Some(resolved) => {
                let instance = &mut resolved.instance;
                panic::catch_unwind(AssertUnwindSafe(|| instance.run(&host)))
                    .unwrap_or_else(|payload| {
                        Err(ExecutionFailure::new(
                            panic_message(payload.as_ref()),
                        ))
                    })
            }
            None => Err(ExecutionFailure::new(
                "no resolved implementation",
            )),
        };
        guard.restore();
        this.messages = host.into_messages();

        match outcome {
            Ok(()) => {
                events::execution_end(&this.lifecycle.correlation, &this.lifecycle.task_name);
                Ok(this.advance())
            }
            Err(failure) => {
                events::execution_failure(
                    &this.lifecycle.correlation,
                    &this.lifecycle.task_name,
                    failure.message(),
                );
                Err(this.abort_in(
                    DriverState::Running,
                    TaskError::Execution {
                        implementation,
                        reason: failure.message().to_string(),
                    },
                ))
            }
        }
    }
}

impl<'d> Invocation<'d, Completed> {
    /// Tear down and build the report. A teardown failure after a successful
    /// run is the invocation's error.
    pub fn finish(mut self) -> Result<ExecutionReport> {
        let resolved = self.resolved.take();
        let (implementation, version, defined_in) = match &resolved {
            Some(r) => (
                r.def.name().to_string(),
                r.def.version().to_string(),
                r.defined_in.label().to_string(),
            ),
            None => (self.lifecycle.task_name.clone(), String::new(), String::new()),
        };
        // The instance goes before the scopes it was loaded from.
        drop(resolved);

        let teardown = self.lifecycle.teardown();
        if let Some(err) = teardown.error() {
            return Err(err);
        }

        info!(
            "Invocation {} of {} completed",
            self.lifecycle.id, self.lifecycle.task_name
        );
        Ok(ExecutionReport {
            invocation: self.lifecycle.id,
            parent: self.lifecycle.parent,
            depth: self.lifecycle.depth,
            task_name: self.lifecycle.task_name,
            implementation,
            version,
            defined_in,
            state: Completed::STATE,
            replay: self.replay,
            messages: self.messages,
            teardown,
        })
    }
}

impl Aborted {
    pub fn error(&self) -> &TaskError {
        &self.error
    }

    /// Last state entered before the failure
    pub fn failed_in(&self) -> DriverState {
        self.failed_in
    }

    pub fn state(&self) -> DriverState {
        DriverState::Failed
    }

    /// Tear down whatever was built and return the original error, with any
    /// teardown failure attached as its secondary cause.
    pub fn finish(mut self) -> TaskError {
        drop(self.resolved.take());
        events::invocation_failed(
            &self.lifecycle.correlation,
            &self.lifecycle.task_name,
            self.failed_in,
            &self.error.to_string(),
        );

        if self.lifecycle.created.is_empty() && self.lifecycle.boundary.is_none() {
            debug!("Nothing to tear down for invocation {}", self.lifecycle.id);
            return self.error;
        }

        let teardown = self.lifecycle.teardown();
        match teardown.error() {
            Some(teardown_err) => self.error.with_teardown(teardown_err),
            None => self.error,
        }
    }
}

/// Summary of one successful invocation
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub invocation: InvocationId,
    pub parent: Option<InvocationId>,
    pub depth: usize,
    pub task_name: String,
    pub implementation: String,
    pub version: String,
    pub defined_in: String,
    pub state: DriverState,
    pub replay: ReplayStats,
    pub messages: Vec<String>,
    pub teardown: TeardownReport,
}

/// Entry point for isolated execution
pub struct ExecutionDriver {
    root: Arc<LoaderScope>,
    host_version: VersionNumber,
}

impl ExecutionDriver {
    pub fn new(root: Arc<LoaderScope>, settings: &DriverSettings) -> Result<Self> {
        Ok(Self::with_host_version(root, settings.host_version()?))
    }

    pub fn with_host_version(root: Arc<LoaderScope>, host_version: VersionNumber) -> Self {
        Self { root, host_version }
    }

    /// The host environment top-level invocations are isolated from
    pub fn root(&self) -> &Arc<LoaderScope> {
        &self.root
    }

    pub fn host_version(&self) -> &VersionNumber {
        &self.host_version
    }

    /// Build a boundary with `policy`, resolve its implementation, replay
    /// `config` onto it, run it, then tear the boundary down.
    pub fn execute(&self, policy: &dyn BoundaryPolicy, config: &ConfigNode) -> Result<ExecutionReport> {
        let outcome = Invocation::new(self, policy.implementation_name())
            .build_boundary(policy)
            .and_then(Invocation::resolve)
            .and_then(|invocation| invocation.configure(config))
            .and_then(Invocation::run);

        match outcome {
            Ok(completed) => completed.finish(),
            Err(aborted) => Err(aborted.finish()),
        }
    }
}
