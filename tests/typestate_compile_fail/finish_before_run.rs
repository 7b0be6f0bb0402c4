/// This test should FAIL to compile
/// Finishing a configured invocation without running it

use isotask::boundary::policy::CatalogPolicy;
use isotask::boundary::registry::Catalog;
use isotask::boundary::scope::LoaderScope;
use isotask::capture::ConfigNode;
use isotask::exec::driver::Invocation;
use isotask::ExecutionDriver;
use std::sync::Arc;

fn main() {
    let root = LoaderScope::root("host", []).unwrap();
    let driver = ExecutionDriver::with_host_version(root, "2.1".parse().unwrap());
    let policy = CatalogPolicy::new(Arc::new(Catalog::new()), "t.Task");
    let config = ConfigNode::new("t.Task");

    let Ok(built) = Invocation::new(&driver, "t.Task").build_boundary(&policy) else {
        return;
    };
    let Ok(resolved) = built.resolve() else {
        return;
    };
    let Ok(configured) = resolved.configure(&config) else {
        return;
    };

    // This should fail: Configured has no finish method
    // Only Completed has this method
    let _ = configured.finish();
}
