//! Bundled task implementations

pub mod echo;
pub mod properties;

use crate::boundary::registry::{Catalog, ImplementationDef};
use crate::boundary::version::VersionNumber;
use crate::config::types::Result;
use crate::exec::implementation::Implementation;
use echo::{EchoTask, Generation};
use properties::PropertyFileTask;

pub const ECHO: &str = "isotask.tasks.Echo";
pub const PROPERTY_FILE: &str = "isotask.tasks.PropertyFile";

/// Every bundled implementation, all versions
pub fn catalog() -> Result<Catalog> {
    let v = |s: &str| s.parse::<VersionNumber>();

    Catalog::new()
        .with(ImplementationDef::new(ECHO, v("1.0")?, || {
            Ok(Box::new(EchoTask::new(Generation::V1)) as Box<dyn Implementation>)
        }))?
        .with(
            ImplementationDef::new(ECHO, v("2.0")?, || {
                Ok(Box::new(EchoTask::new(Generation::V2)) as Box<dyn Implementation>)
            })
            .requires_host(v("2.0")?),
        )?
        .with(
            ImplementationDef::new(PROPERTY_FILE, v("1.0")?, || {
                Ok(Box::new(PropertyFileTask::new()) as Box<dyn Implementation>)
            })
            .requires_host(v("1.5")?),
        )
}
