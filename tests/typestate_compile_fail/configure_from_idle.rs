/// This test should FAIL to compile
/// Replaying configuration before any boundary exists

use isotask::boundary::scope::LoaderScope;
use isotask::capture::ConfigNode;
use isotask::exec::driver::Invocation;
use isotask::ExecutionDriver;

fn main() {
    let root = LoaderScope::root("host", []).unwrap();
    let driver = ExecutionDriver::with_host_version(root, "2.1".parse().unwrap());
    let config = ConfigNode::new("t.Task");

    let invocation = Invocation::new(&driver, "t.Task");

    // This should fail: Idle has no configure method
    let _ = invocation.configure(&config);
}
