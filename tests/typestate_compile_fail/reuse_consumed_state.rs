/// This test should FAIL to compile
/// Attempting to reuse a state after it has been consumed

use isotask::boundary::policy::CatalogPolicy;
use isotask::boundary::registry::Catalog;
use isotask::boundary::scope::LoaderScope;
use isotask::exec::driver::Invocation;
use isotask::ExecutionDriver;
use std::sync::Arc;

fn main() {
    let root = LoaderScope::root("host", []).unwrap();
    let driver = ExecutionDriver::with_host_version(root, "2.1".parse().unwrap());
    let policy = CatalogPolicy::new(Arc::new(Catalog::new()), "t.Task");

    let invocation = Invocation::new(&driver, "t.Task");

    // First transition consumes the invocation
    let _built = invocation.build_boundary(&policy);

    // This should fail: invocation was moved and can no longer be used
    let _ = invocation.build_boundary(&policy);
}
