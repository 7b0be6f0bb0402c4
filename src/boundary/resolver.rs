use crate::boundary::registry::ImplementationDef;
use crate::boundary::scope::LoaderScope;
use crate::boundary::version::VersionNumber;
use crate::config::types::{Result, TaskError};
use crate::exec::implementation::Implementation;
/// Implementation resolution
/// Locates a name strictly inside a freshly built boundary, gates it against
/// the host version and instantiates it through its default constructor.
/// Failures are wrapped and never retried.
use log::{debug, info};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A resolved and instantiated implementation
pub struct ResolvedImplementation {
    pub def: Arc<ImplementationDef>,
    pub defined_in: Arc<LoaderScope>,
    pub instance: Box<dyn Implementation>,
}

pub struct ImplementationResolver<'a> {
    host_version: &'a VersionNumber,
    caller: &'a Arc<LoaderScope>,
}

impl<'a> ImplementationResolver<'a> {
    pub fn new(host_version: &'a VersionNumber, caller: &'a Arc<LoaderScope>) -> Self {
        Self {
            host_version,
            caller,
        }
    }

    /// Locate `name` inside `boundary` without instantiating it
    pub fn locate(
        &self,
        boundary: &Arc<LoaderScope>,
        name: &str,
    ) -> Result<(Arc<ImplementationDef>, Arc<LoaderScope>)> {
        let (def, defined_in) = boundary.lookup(name).ok_or_else(|| {
            TaskError::Resolution(format!(
                "{} not found in boundary {}",
                name,
                boundary.label()
            ))
        })?;

        // Found in the caller's own environment: the boundary does not isolate it.
        if self.caller.descends_from(&defined_in) {
            return Err(TaskError::Resolution(format!(
                "{} resolved from caller environment {} instead of boundary {}; mask it in the boundary policy",
                name,
                defined_in.label(),
                boundary.label()
            )));
        }

        debug!(
            "Located {} {} in scope {}",
            def.name(),
            def.version(),
            defined_in.label()
        );
        Ok((def, defined_in))
    }

    pub fn resolve(&self, boundary: &Arc<LoaderScope>, name: &str) -> Result<ResolvedImplementation> {
        let (def, defined_in) = self.locate(boundary, name)?;

        def.check_host(self.host_version)?;

        let constructed = panic::catch_unwind(AssertUnwindSafe(|| def.instantiate()))
            .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())));
        let instance = constructed.map_err(|reason| TaskError::Instantiation {
            implementation: format!("{} {}", def.name(), def.version()),
            reason,
        })?;

        info!(
            "Resolved {} {} from {} (host {})",
            def.name(),
            def.version(),
            defined_in.label(),
            self.host_version
        );

        Ok(ResolvedImplementation {
            def,
            defined_in,
            instance,
        })
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
