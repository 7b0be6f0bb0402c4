//! Boundary construction policies.
//!
//! A host supplies a [`BoundaryPolicy`] per task: which implementation name to
//! load and how to assemble the scopes it is loaded from. Every scope a policy
//! creates goes through [`BoundaryContext::build`], which stamps it with the
//! invocation id and records it for teardown.

use crate::boundary::registry::Catalog;
use crate::boundary::scope::{LoaderScope, ReleaseFacility, ScopeBuilder};
use crate::boundary::staging::StagingDir;
use crate::boundary::version::VersionNumber;
use crate::config::settings::DriverSettings;
use crate::config::types::{InvocationId, Result};
use std::path::PathBuf;
use std::sync::Arc;

pub trait BoundaryPolicy {
    /// Fully-qualified name to resolve inside the new boundary
    fn implementation_name(&self) -> &str;

    /// Build the boundary. Must fail with `TaskError::Resolution` when the
    /// scopes cannot be assembled.
    fn create_boundary(&self, ctx: &mut BoundaryContext) -> Result<Arc<LoaderScope>>;
}

/// Construction-time view handed to a policy
pub struct BoundaryContext {
    invocation: InvocationId,
    caller: Arc<LoaderScope>,
    created: Vec<Arc<LoaderScope>>,
}

impl BoundaryContext {
    pub(crate) fn new(invocation: InvocationId, caller: Arc<LoaderScope>) -> Self {
        Self {
            invocation,
            caller,
            created: Vec::new(),
        }
    }

    pub fn invocation(&self) -> InvocationId {
        self.invocation
    }

    /// The environment the boundary must be parented at
    pub fn caller(&self) -> &Arc<LoaderScope> {
        &self.caller
    }

    /// Builder for a scope owned by this invocation
    pub fn scope(&self, label: impl Into<String>, parent: &Arc<LoaderScope>) -> ScopeBuilder {
        ScopeBuilder::new(label, parent).owned_by(self.invocation)
    }

    pub fn build(&mut self, builder: ScopeBuilder) -> Result<Arc<LoaderScope>> {
        let scope = builder.owned_by(self.invocation).build()?;
        self.created.push(Arc::clone(&scope));
        Ok(scope)
    }

    pub fn created(&self) -> &[Arc<LoaderScope>] {
        &self.created
    }

    pub(crate) fn into_created(self) -> Vec<Arc<LoaderScope>> {
        self.created
    }
}

/// Loads one catalog entry in a "parallel world": a masking scope hides the
/// configured prefixes from the caller, and an implementation scope below it
/// defines the selected version.
pub struct CatalogPolicy {
    catalog: Arc<Catalog>,
    name: String,
    version: Option<VersionNumber>,
    masked_prefixes: Vec<String>,
    staging_root: Option<PathBuf>,
}

impl CatalogPolicy {
    pub fn new(catalog: Arc<Catalog>, name: impl Into<String>) -> Self {
        Self {
            catalog,
            name: name.into(),
            version: None,
            masked_prefixes: Vec::new(),
            staging_root: None,
        }
    }

    pub fn from_settings(
        catalog: Arc<Catalog>,
        name: impl Into<String>,
        settings: &DriverSettings,
    ) -> Self {
        let mut policy = Self::new(catalog, name);
        policy.masked_prefixes = settings.masked_prefixes.clone();
        policy.staging_root = settings.staging_root.clone();
        policy
    }

    /// Pin an exact version instead of the newest one
    pub fn version(mut self, version: VersionNumber) -> Self {
        self.version = Some(version);
        self
    }

    pub fn mask(mut self, prefix: impl Into<String>) -> Self {
        self.masked_prefixes.push(prefix.into());
        self
    }

    pub fn staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }
}

impl BoundaryPolicy for CatalogPolicy {
    fn implementation_name(&self) -> &str {
        &self.name
    }

    fn create_boundary(&self, ctx: &mut BoundaryContext) -> Result<Arc<LoaderScope>> {
        let def = self.catalog.select(&self.name, self.version.as_ref())?;

        let caller = Arc::clone(ctx.caller());
        let mut builder = ctx.scope("mask", &caller);
        for prefix in &self.masked_prefixes {
            builder = builder.mask(prefix.clone());
        }
        let mask = ctx.build(builder)?;

        let label = format!("impl:{}@{}", def.name(), def.version());
        let builder = ctx
            .scope(label.clone(), &mask)
            .define_shared(def)
            .facility(ReleaseFacility::Explicit);
        let implementation = ctx.build(builder)?;

        if let Some(root) = &self.staging_root {
            let staging = StagingDir::create(root, &label)?;
            implementation.pin(Box::new(staging))?;
        }

        Ok(implementation)
    }
}
