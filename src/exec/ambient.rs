//! Ambient boundary context.
//!
//! A thread-local stack of the boundaries currently executing on this thread.
//! [`install`] pushes a frame and returns a guard; the guard restores the
//! previous state when it is restored explicitly or dropped, including during
//! unwinding. Nested invocations therefore stack instead of clobbering.

use crate::boundary::scope::LoaderScope;
use crate::config::types::InvocationId;
use std::cell::RefCell;
use std::sync::Arc;

#[derive(Clone)]
struct Frame {
    scope: Arc<LoaderScope>,
    invocation: InvocationId,
}

thread_local! {
    static AMBIENT: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Boundary of the innermost invocation running on this thread
pub fn current() -> Option<Arc<LoaderScope>> {
    AMBIENT.with(|stack| stack.borrow().last().map(|f| Arc::clone(&f.scope)))
}

pub fn current_invocation() -> Option<InvocationId> {
    AMBIENT.with(|stack| stack.borrow().last().map(|f| f.invocation))
}

/// Number of invocations currently running on this thread
pub fn depth() -> usize {
    AMBIENT.with(|stack| stack.borrow().len())
}

/// Whether `scope` is the ambient boundary of any running invocation
pub fn is_active(scope: &LoaderScope) -> bool {
    AMBIENT.with(|stack| stack.borrow().iter().any(|f| f.scope.id() == scope.id()))
}

/// Make `scope` the ambient boundary until the guard goes away
#[must_use = "dropping the guard immediately restores the previous context"]
pub fn install(scope: Arc<LoaderScope>, invocation: InvocationId) -> AmbientGuard {
    let saved_depth = AMBIENT.with(|stack| {
        let mut stack = stack.borrow_mut();
        let saved = stack.len();
        stack.push(Frame { scope, invocation });
        saved
    });
    log::trace!("Ambient context installed for {} at depth {}", invocation, saved_depth + 1);
    AmbientGuard {
        saved_depth,
        invocation,
    }
}

pub struct AmbientGuard {
    saved_depth: usize,
    invocation: InvocationId,
}

impl AmbientGuard {
    /// Restore the context saved by [`install`]
    pub fn restore(self) {
        drop(self);
    }
}

impl Drop for AmbientGuard {
    fn drop(&mut self) {
        AMBIENT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.len() > self.saved_depth + 1 {
                log::warn!(
                    "{} frame(s) left above invocation {}; discarding",
                    stack.len() - self.saved_depth - 1,
                    self.invocation
                );
            }
            stack.truncate(self.saved_depth);
        });
        log::trace!("Ambient context restored for {}", self.invocation);
    }
}
