use crate::boundary::registry::ImplementationDef;
use crate::config::types::{InvocationId, Result, TaskError};
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Something a scope keeps alive until it is released (staging areas, handles).
pub trait PinnedResource: Send {
    fn describe(&self) -> String;
    fn close(&mut self) -> std::io::Result<()>;
}

/// Failure of an optional legacy release facility
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyReleaseError {
    /// The host does not offer this facility. Never fatal.
    Unavailable(String),
    /// The facility exists and failed.
    Failed(String),
}

impl fmt::Display for LegacyReleaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegacyReleaseError::Unavailable(msg) => write!(f, "unavailable: {}", msg),
            LegacyReleaseError::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// Best-effort release path for scope types that predate explicit release.
pub trait LegacyRelease: Send + Sync {
    fn facility_name(&self) -> &str;
    fn release(&self, scope: &LoaderScope) -> std::result::Result<(), LegacyReleaseError>;
}

/// Release facility a scope declares at construction time.
#[derive(Clone, Default)]
pub enum ReleaseFacility {
    /// `LoaderScope::release` closes pinned resources; idempotent.
    Explicit,
    /// Host-specific release path that may be missing on this host.
    Legacy(Arc<dyn LegacyRelease>),
    /// Reclaimed by normal lifetime rules.
    #[default]
    None,
}

impl fmt::Debug for ReleaseFacility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseFacility::Explicit => f.write_str("Explicit"),
            ReleaseFacility::Legacy(hook) => write!(f, "Legacy({})", hook.facility_name()),
            ReleaseFacility::None => f.write_str("None"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    Released { closed: usize },
    AlreadyReleased,
}

/// A scoped loading environment.
///
/// Names are looked up parent-first, except names under one of this scope's
/// masked prefixes: those never reach the parent, so a child scope can define
/// its own version next to the one the caller already has.
pub struct LoaderScope {
    id: u64,
    label: String,
    parent: Option<Arc<LoaderScope>>,
    definitions: HashMap<String, Arc<ImplementationDef>>,
    masked: Vec<String>,
    facility: ReleaseFacility,
    pinned: Mutex<Vec<Box<dyn PinnedResource>>>,
    released: AtomicBool,
    owner: Option<InvocationId>,
}

impl fmt::Debug for LoaderScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderScope")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("parent", &self.parent.as_ref().map(|p| p.id))
            .field("masked", &self.masked)
            .field("facility", &self.facility)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl LoaderScope {
    /// Host environment scope: no parent, no owner, never released by teardown.
    pub fn root<I>(label: impl Into<String>, definitions: I) -> Result<Arc<LoaderScope>>
    where
        I: IntoIterator<Item = Arc<ImplementationDef>>,
    {
        let mut builder = ScopeBuilder::detached(label);
        for def in definitions {
            builder = builder.define_shared(def);
        }
        builder.build()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn parent(&self) -> Option<&Arc<LoaderScope>> {
        self.parent.as_ref()
    }

    pub fn owner(&self) -> Option<InvocationId> {
        self.owner
    }

    pub fn facility(&self) -> &ReleaseFacility {
        &self.facility
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn masks(&self, name: &str) -> bool {
        self.masked.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }

    pub fn defines(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn pinned_count(&self) -> usize {
        self.pinned.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Find `name` and the scope that defines it.
    pub fn lookup(self: &Arc<Self>, name: &str) -> Option<(Arc<ImplementationDef>, Arc<LoaderScope>)> {
        if !self.masks(name) {
            if let Some(found) = self.parent.as_ref().and_then(|p| p.lookup(name)) {
                return Some(found);
            }
        }
        self.definitions
            .get(name)
            .map(|def| (Arc::clone(def), Arc::clone(self)))
    }

    /// Whether `other` is this scope or one of its ancestors
    pub fn descends_from(&self, other: &LoaderScope) -> bool {
        if self.id == other.id {
            return true;
        }
        self.parent
            .as_ref()
            .is_some_and(|parent| parent.descends_from(other))
    }

    /// Keep `resource` alive until this scope is released. Only scopes with
    /// an explicit release facility can close what they pin.
    pub fn pin(&self, resource: Box<dyn PinnedResource>) -> Result<()> {
        if !matches!(self.facility, ReleaseFacility::Explicit) {
            return Err(TaskError::Resolution(format!(
                "cannot pin {} to scope {} without an explicit release facility ({:?})",
                resource.describe(),
                self.label,
                self.facility
            )));
        }
        if self.is_released() {
            return Err(TaskError::Resolution(format!(
                "cannot pin {} to released scope {}",
                resource.describe(),
                self.label
            )));
        }
        self.pinned
            .lock()
            .map_err(|_| TaskError::Resolution(format!("scope {} is poisoned", self.label)))?
            .push(resource);
        Ok(())
    }

    /// Explicit release: close every pinned resource.
    ///
    /// A second call is a no-op and reports `AlreadyReleased`.
    pub fn release(&self) -> Result<ReleaseStatus> {
        if self.released.swap(true, Ordering::SeqCst) {
            debug!("Scope {} already released", self.label);
            return Ok(ReleaseStatus::AlreadyReleased);
        }

        let resources: Vec<Box<dyn PinnedResource>> = match self.pinned.lock() {
            Ok(mut pinned) => pinned.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };

        let mut closed = 0;
        let mut failures = Vec::new();
        for mut resource in resources.into_iter().rev() {
            match resource.close() {
                Ok(()) => {
                    debug!("Closed {} in scope {}", resource.describe(), self.label);
                    closed += 1;
                }
                Err(e) => {
                    warn!(
                        "Failed to close {} in scope {}: {}",
                        resource.describe(),
                        self.label,
                        e
                    );
                    failures.push(format!("{}: {}", resource.describe(), e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(TaskError::Teardown(format!(
                "scope {} failed to close {} resource(s): {}",
                self.label,
                failures.len(),
                failures.join("; ")
            )));
        }

        Ok(ReleaseStatus::Released { closed })
    }
}

/// Assembles one [`LoaderScope`].
pub struct ScopeBuilder {
    label: String,
    parent: Option<Arc<LoaderScope>>,
    definitions: Vec<Arc<ImplementationDef>>,
    masked: Vec<String>,
    facility: ReleaseFacility,
    pinned: Vec<Box<dyn PinnedResource>>,
    owner: Option<InvocationId>,
}

impl ScopeBuilder {
    pub fn new(label: impl Into<String>, parent: &Arc<LoaderScope>) -> Self {
        let mut builder = Self::detached(label);
        builder.parent = Some(Arc::clone(parent));
        builder
    }

    fn detached(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            parent: None,
            definitions: Vec::new(),
            masked: Vec::new(),
            facility: ReleaseFacility::None,
            pinned: Vec::new(),
            owner: None,
        }
    }

    pub fn define(self, def: ImplementationDef) -> Self {
        self.define_shared(Arc::new(def))
    }

    pub fn define_shared(mut self, def: Arc<ImplementationDef>) -> Self {
        self.definitions.push(def);
        self
    }

    /// Hide names starting with `prefix` from the parent chain
    pub fn mask(mut self, prefix: impl Into<String>) -> Self {
        self.masked.push(prefix.into());
        self
    }

    pub fn facility(mut self, facility: ReleaseFacility) -> Self {
        self.facility = facility;
        self
    }

    pub fn pin(mut self, resource: Box<dyn PinnedResource>) -> Self {
        self.pinned.push(resource);
        self
    }

    pub fn owned_by(mut self, invocation: InvocationId) -> Self {
        self.owner = Some(invocation);
        self
    }

    pub fn build(self) -> Result<Arc<LoaderScope>> {
        let mut definitions = HashMap::with_capacity(self.definitions.len());
        for def in self.definitions {
            let name = def.name().to_string();
            if definitions.insert(name.clone(), def).is_some() {
                return Err(TaskError::Resolution(format!(
                    "{} is defined twice in scope {}",
                    name, self.label
                )));
            }
        }

        if !self.pinned.is_empty() && !matches!(self.facility, ReleaseFacility::Explicit) {
            return Err(TaskError::Resolution(format!(
                "scope {} pins {} resource(s) without an explicit release facility ({:?})",
                self.label,
                self.pinned.len(),
                self.facility
            )));
        }

        let scope = LoaderScope {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
            label: self.label,
            parent: self.parent,
            definitions,
            masked: self.masked,
            facility: self.facility,
            pinned: Mutex::new(self.pinned),
            released: AtomicBool::new(false),
            owner: self.owner,
        };
        debug!("Built scope {:?}", scope);
        Ok(Arc::new(scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::version::VersionNumber;
    use std::sync::atomic::AtomicUsize;

    fn def(name: &str, version: &str) -> ImplementationDef {
        ImplementationDef::new(name, version.parse::<VersionNumber>().unwrap(), || {
            Err("unused".to_string())
        })
    }

    struct Counter {
        closes: Arc<AtomicUsize>,
        fail: bool,
    }

    impl PinnedResource for Counter {
        fn describe(&self) -> String {
            "counter".to_string()
        }

        fn close(&mut self) -> std::io::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(std::io::Error::other("close refused"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_parent_first_lookup() {
        let root = LoaderScope::root("host", [Arc::new(def("x.Task", "1.0"))]).unwrap();
        let child = ScopeBuilder::new("child", &root)
            .define(def("x.Task", "2.0"))
            .build()
            .unwrap();

        let (found, scope) = child.lookup("x.Task").unwrap();
        assert_eq!(found.version().to_string(), "1.0");
        assert_eq!(scope.id(), root.id());
    }

    #[test]
    fn test_masking_lets_child_define_its_own_version() {
        let root = LoaderScope::root("host", [Arc::new(def("x.Task", "1.0"))]).unwrap();
        let mask = ScopeBuilder::new("mask", &root).mask("x.").build().unwrap();
        let child = ScopeBuilder::new("impl", &mask)
            .define(def("x.Task", "2.0"))
            .build()
            .unwrap();

        let (found, scope) = child.lookup("x.Task").unwrap();
        assert_eq!(found.version().to_string(), "2.0");
        assert_eq!(scope.id(), child.id());
        assert!(mask.lookup("x.Task").is_none());
        assert!(child.descends_from(&root));
        assert!(!root.descends_from(&child));
    }

    #[test]
    fn test_duplicate_definition_rejected() {
        let root = LoaderScope::root("host", []).unwrap();
        let result = ScopeBuilder::new("dup", &root)
            .define(def("x.Task", "1.0"))
            .define(def("x.Task", "2.0"))
            .build();
        assert!(result.unwrap_err().is_resolution());
    }

    #[test]
    fn test_release_is_idempotent() {
        let closes = Arc::new(AtomicUsize::new(0));
        let root = LoaderScope::root("host", []).unwrap();
        let scope = ScopeBuilder::new("s", &root)
            .facility(ReleaseFacility::Explicit)
            .pin(Box::new(Counter {
                closes: Arc::clone(&closes),
                fail: false,
            }))
            .build()
            .unwrap();

        assert_eq!(scope.release().unwrap(), ReleaseStatus::Released { closed: 1 });
        assert_eq!(scope.release().unwrap(), ReleaseStatus::AlreadyReleased);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(scope.is_released());
        assert!(scope
            .pin(Box::new(Counter {
                closes: Arc::clone(&closes),
                fail: false,
            }))
            .is_err());
    }

    #[test]
    fn test_release_failure_is_teardown_error() {
        let closes = Arc::new(AtomicUsize::new(0));
        let root = LoaderScope::root("host", []).unwrap();
        let scope = ScopeBuilder::new("s", &root)
            .facility(ReleaseFacility::Explicit)
            .pin(Box::new(Counter {
                closes: Arc::clone(&closes),
                fail: true,
            }))
            .build()
            .unwrap();

        assert!(scope.release().unwrap_err().is_teardown());
        // the failed resource is gone; nothing is closed twice
        assert_eq!(scope.release().unwrap(), ReleaseStatus::AlreadyReleased);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pinning_requires_explicit_release() {
        let closes = Arc::new(AtomicUsize::new(0));
        let root = LoaderScope::root("host", []).unwrap();
        let built = ScopeBuilder::new("plain", &root)
            .pin(Box::new(Counter {
                closes: Arc::clone(&closes),
                fail: false,
            }))
            .build();
        assert!(built.unwrap_err().is_resolution());

        let plain = ScopeBuilder::new("plain", &root).build().unwrap();
        assert!(plain
            .pin(Box::new(Counter {
                closes: Arc::clone(&closes),
                fail: false,
            }))
            .is_err());
        assert_eq!(plain.pinned_count(), 0);
    }
}
