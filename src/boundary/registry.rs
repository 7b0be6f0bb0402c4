use crate::boundary::version::VersionNumber;
use crate::config::types::{Result, TaskError};
use crate::exec::implementation::Implementation;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type Constructor =
    Arc<dyn Fn() -> std::result::Result<Box<dyn Implementation>, String> + Send + Sync>;

/// A loadable implementation: a name, its version, the host range it links
/// against, and a default constructor.
#[derive(Clone)]
pub struct ImplementationDef {
    name: String,
    version: VersionNumber,
    min_host: Option<VersionNumber>,
    max_host: Option<VersionNumber>,
    constructor: Constructor,
}

impl fmt::Debug for ImplementationDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplementationDef")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("min_host", &self.min_host)
            .field("max_host", &self.max_host)
            .finish_non_exhaustive()
    }
}

impl ImplementationDef {
    pub fn new<F>(name: impl Into<String>, version: VersionNumber, constructor: F) -> Self
    where
        F: Fn() -> std::result::Result<Box<dyn Implementation>, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            version,
            min_host: None,
            max_host: None,
            constructor: Arc::new(constructor),
        }
    }

    /// Oldest host version this implementation links against
    pub fn requires_host(mut self, min: VersionNumber) -> Self {
        self.min_host = Some(min);
        self
    }

    /// First host version this implementation no longer links against
    pub fn supported_below(mut self, max: VersionNumber) -> Self {
        self.max_host = Some(max);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &VersionNumber {
        &self.version
    }

    pub fn min_host(&self) -> Option<&VersionNumber> {
        self.min_host.as_ref()
    }

    pub fn max_host(&self) -> Option<&VersionNumber> {
        self.max_host.as_ref()
    }

    /// Human-readable host requirement, e.g. `>= 2.0, < 3.0`
    pub fn host_requirement(&self) -> String {
        match (&self.min_host, &self.max_host) {
            (Some(min), Some(max)) => format!(">= {}, < {}", min, max),
            (Some(min), None) => format!(">= {}", min),
            (None, Some(max)) => format!("< {}", max),
            (None, None) => "any".to_string(),
        }
    }

    /// Link-time check against the running host
    pub fn check_host(&self, host: &VersionNumber) -> Result<()> {
        let too_old = self.min_host.as_ref().is_some_and(|min| host < min);
        let too_new = self.max_host.as_ref().is_some_and(|max| host >= max);
        if !too_old && !too_new {
            return Ok(());
        }

        let hint = if too_old {
            format!(
                "Upgrade the host to {} or later, or select an older {} release.",
                self.min_host.as_ref().map(ToString::to_string).unwrap_or_default(),
                self.name
            )
        } else {
            format!(
                "This host is newer than {} {} supports; select a newer {} release.",
                self.name, self.version, self.name
            )
        };

        Err(TaskError::VersionMismatch {
            implementation: self.name.clone(),
            found: self.version.to_string(),
            required: self.host_requirement(),
            host: host.to_string(),
            hint,
        })
    }

    pub fn instantiate(&self) -> std::result::Result<Box<dyn Implementation>, String> {
        (self.constructor)()
    }
}

/// Versioned table of implementation definitions, keyed by name.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    entries: BTreeMap<String, Vec<Arc<ImplementationDef>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. A name/version pair may only be registered once.
    pub fn register(&mut self, def: ImplementationDef) -> Result<()> {
        let versions = self.entries.entry(def.name.clone()).or_default();
        if versions.iter().any(|d| d.version == def.version) {
            return Err(TaskError::Config(format!(
                "{} {} is already registered",
                def.name, def.version
            )));
        }
        versions.push(Arc::new(def));
        versions.sort_by(|a, b| a.version.cmp(&b.version));
        Ok(())
    }

    pub fn with(mut self, def: ImplementationDef) -> Result<Self> {
        self.register(def)?;
        Ok(self)
    }

    /// Exact version, or the newest one when `version` is `None`
    pub fn select(
        &self,
        name: &str,
        version: Option<&VersionNumber>,
    ) -> Result<Arc<ImplementationDef>> {
        let versions = self
            .entries
            .get(name)
            .ok_or_else(|| TaskError::Resolution(format!("{} is not in the catalog", name)))?;

        let found = match version {
            Some(v) => versions.iter().find(|d| &d.version == v),
            None => versions.last(),
        };

        found.cloned().ok_or_else(|| {
            TaskError::Resolution(format!(
                "{} {} is not in the catalog",
                name,
                version.map(ToString::to_string).unwrap_or_default()
            ))
        })
    }

    /// Oldest registered version of every name
    pub fn oldest(&self) -> Vec<Arc<ImplementationDef>> {
        self.entries
            .values()
            .filter_map(|versions| versions.first().cloned())
            .collect()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<ImplementationDef>> {
        self.entries.values().flatten()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
