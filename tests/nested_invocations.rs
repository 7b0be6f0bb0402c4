//! Implementations that run isolated tasks themselves
//!
//! Each level must see its own boundary as the ambient context, and the
//! caller's context must be back in place after the nested call returns or
//! fails, at every depth.

use isotask::boundary::policy::CatalogPolicy;
use isotask::boundary::registry::{Catalog, ImplementationDef};
use isotask::boundary::scope::LoaderScope;
use isotask::capture::ConfigNode;
use isotask::exec::ambient;
use isotask::exec::{ExecutionFailure, HostContext, Implementation};
use isotask::replay::{ReplayRejection, ReplayTarget};
use isotask::ExecutionDriver;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::tempdir;

const NESTER: &str = "t.Nester";

#[derive(Default)]
struct Nester {
    remaining: usize,
    fail_at_bottom: bool,
    staging: Option<PathBuf>,
}

impl ReplayTarget for Nester {
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), ReplayRejection> {
        match name {
            "remaining" => {
                self.remaining = value.parse().map_err(|_| ReplayRejection::InvalidValue {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: "not a number".to_string(),
                })?
            }
            "fail" => self.fail_at_bottom = value == "true",
            "staging" => self.staging = Some(PathBuf::from(value)),
            _ => return Err(ReplayRejection::UnknownAttribute(name.to_string())),
        }
        Ok(())
    }

    fn create_child(&mut self, name: &str) -> Result<Box<dyn ReplayTarget>, ReplayRejection> {
        Err(ReplayRejection::UnknownElement(name.to_string()))
    }

    fn accept_child(&mut self, name: &str, _child: Box<dyn ReplayTarget>) -> Result<(), ReplayRejection> {
        Err(ReplayRejection::UnknownElement(name.to_string()))
    }
}

impl Implementation for Nester {
    fn run(&mut self, host: &HostContext<'_>) -> Result<(), ExecutionFailure> {
        let own = ambient::current().ok_or_else(|| ExecutionFailure::new("no ambient boundary"))?;
        if ambient::depth() != host.depth() {
            return Err(ExecutionFailure::new("ambient depth out of step"));
        }
        host.emit(format!("depth {}", host.depth()));

        if self.remaining == 0 {
            if self.fail_at_bottom {
                return Err(ExecutionFailure::new("bottom failed"));
            }
            return Ok(());
        }

        let mut config = ConfigNode::new(NESTER);
        config.set_attribute("remaining", (self.remaining - 1).to_string());
        config.set_attribute("fail", self.fail_at_bottom.to_string());
        let mut policy = CatalogPolicy::new(catalog(), NESTER).mask("t.");
        if let Some(staging) = &self.staging {
            config.set_attribute("staging", staging.display().to_string());
            policy = policy.staging_root(staging);
        }

        let nested = host.execute_nested(&policy, &config);

        let restored = ambient::current().is_some_and(|scope| scope.id() == own.id());
        if !restored {
            return Err(ExecutionFailure::new("ambient context not restored"));
        }

        let report = nested.map_err(|e| ExecutionFailure::new(e.to_string()))?;
        if report.parent != Some(host.invocation()) {
            return Err(ExecutionFailure::new("nested report has the wrong parent"));
        }
        for message in report.messages {
            host.emit(message);
        }
        Ok(())
    }
}

fn catalog() -> Arc<Catalog> {
    Arc::new(
        Catalog::new()
            .with(ImplementationDef::new(NESTER, "2.0".parse().unwrap(), || {
                Ok(Box::new(Nester::default()) as Box<dyn Implementation>)
            }))
            .unwrap(),
    )
}

fn run(depth: usize, fail: bool, staging: Option<&std::path::Path>) -> isotask::Result<isotask::ExecutionReport> {
    let root = LoaderScope::root("host", []).unwrap();
    let driver = ExecutionDriver::with_host_version(root, "2.1".parse().unwrap());

    let mut config = ConfigNode::new(NESTER);
    config.set_attribute("remaining", depth.to_string());
    config.set_attribute("fail", fail.to_string());
    let mut policy = CatalogPolicy::new(catalog(), NESTER).mask("t.");
    if let Some(staging) = staging {
        config.set_attribute("staging", staging.display().to_string());
        policy = policy.staging_root(staging);
    }
    driver.execute(&policy, &config)
}

#[test]
fn test_nested_levels_stack_ambient_context() {
    for depth in [0, 1, 4] {
        let report = run(depth, false, None).unwrap();
        let expected: Vec<String> = (1..=depth + 1).map(|d| format!("depth {}", d)).collect();
        assert_eq!(report.messages, expected);
        assert!(ambient::current().is_none());
    }
}

#[test]
fn test_failure_at_bottom_unwinds_every_level() {
    let staging = tempdir().unwrap();
    let err = run(3, true, Some(staging.path())).unwrap_err();

    assert!(err.is_execution());
    assert!(err.to_string().contains("bottom failed"));
    assert_eq!(ambient::depth(), 0);
    // Every level's staging area went with its boundary.
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[test]
fn test_each_level_releases_its_own_boundary() {
    let staging = tempdir().unwrap();
    let report = run(2, false, Some(staging.path())).unwrap();

    assert_eq!(report.depth, 1);
    assert!(report.teardown.error().is_none());
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}
