/// This test should FAIL to compile
/// Running an implementation that was never configured

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

    let Ok(built) = Invocation::new(&driver, "t.Task").build_boundary(&policy) else {
        return;
    };
    let Ok(resolved) = built.resolve() else {
        return;
    };

    // This should fail: ImplementationResolved has no run method
    // Only Configured has this method
    let _ = resolved.run();
}
