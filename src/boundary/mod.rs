//! Isolation boundaries
//!
//! Scoped loading environments, the versioned implementation catalog, and
//! resolution of one named implementation inside a freshly built boundary.

pub mod policy;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod staging;
pub mod version;

pub use policy::{BoundaryContext, BoundaryPolicy, CatalogPolicy};
pub use registry::{Catalog, ImplementationDef};
pub use resolver::{ImplementationResolver, ResolvedImplementation};
pub use scope::{LegacyRelease, LegacyReleaseError, LoaderScope, PinnedResource, ReleaseFacility};
pub use version::VersionNumber;
