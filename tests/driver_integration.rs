//! End-to-end invocations of the bundled tasks
//!
//! Document -> capture -> boundary -> resolve -> replay -> run -> teardown.

use isotask::boundary::policy::CatalogPolicy;
use isotask::boundary::scope::LoaderScope;
use isotask::capture::document::parse_document;
use isotask::capture::ConfigCapture;
use isotask::config::settings::DriverSettings;
use isotask::config::types::DriverState;
use isotask::exec::ambient;
use isotask::replay::{replay, ReplayRejection, ReplayTarget};
use isotask::tasks::{self, ECHO, PROPERTY_FILE};
use isotask::ExecutionDriver;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

fn driver_with(settings: &DriverSettings) -> (ExecutionDriver, Arc<isotask::boundary::Catalog>) {
    let catalog = Arc::new(tasks::catalog().unwrap());
    let root = LoaderScope::root("host", catalog.oldest()).unwrap();
    (ExecutionDriver::new(root, settings).unwrap(), catalog)
}

const ECHO_V2: &str = r#"{
    "name": "isotask.tasks.Echo",
    "attributes": {"message": "first", "level": "debug"},
    "children": [
        {"name": "line", "attributes": {"text": "second"}},
        {"name": "line", "attributes": {"text": "third"}}
    ]
}"#;

#[test]
fn test_isolated_version_runs_next_to_host_version() {
    let settings = DriverSettings::default();
    let (driver, catalog) = driver_with(&settings);
    let config = parse_document(ECHO_V2).unwrap();

    // The host scope already defines Echo 1.0, which cannot take `line` children.
    let (host_def, _) = driver.root().lookup(ECHO).unwrap();
    assert_eq!(host_def.version().to_string(), "1.0");

    let policy = CatalogPolicy::from_settings(catalog, ECHO, &settings);
    let report = driver.execute(&policy, &config).unwrap();

    assert_eq!(report.version, "2.0");
    assert_eq!(report.state, DriverState::Completed);
    assert_eq!(report.messages, vec!["first", "second", "third"]);
    assert_eq!(report.replay.attributes, 4);
    assert_eq!(report.replay.elements, 2);
    assert!(report.defined_in.starts_with("impl:"));
    assert!(ambient::current().is_none());
}

#[test]
fn test_host_version_selected_without_isolation_rejects_new_config() {
    let settings = DriverSettings::default();
    let (driver, catalog) = driver_with(&settings);
    let config = parse_document(ECHO_V2).unwrap();

    let policy = CatalogPolicy::from_settings(catalog, ECHO, &settings).version("1.0".parse().unwrap());
    let err = driver.execute(&policy, &config).unwrap_err();
    assert!(err.is_replay());
    assert_eq!(i32::from(&err), 6);
}

#[test]
fn test_version_gate_is_not_an_instantiation_error() {
    let settings = DriverSettings {
        host_version: "1.8".to_string(),
        ..DriverSettings::default()
    };
    let (driver, catalog) = driver_with(&settings);
    let config = parse_document(ECHO_V2).unwrap();

    let err = driver
        .execute(&CatalogPolicy::from_settings(catalog, ECHO, &settings), &config)
        .unwrap_err();
    assert!(err.is_version_mismatch());
    assert!(!err.is_instantiation());
    assert!(err.to_string().contains("Upgrade the host"));
    assert_eq!(i32::from(&err), 3);
}

#[test]
fn test_unmasked_policy_is_a_resolution_error() {
    let settings = DriverSettings {
        masked_prefixes: vec!["unrelated.".to_string()],
        ..DriverSettings::default()
    };
    let (driver, catalog) = driver_with(&settings);
    let config = parse_document(ECHO_V2).unwrap();

    let err = driver
        .execute(&CatalogPolicy::from_settings(catalog, ECHO, &settings), &config)
        .unwrap_err();
    assert!(err.is_resolution());
}

#[test]
fn test_property_file_written_and_staging_removed() {
    let out = tempdir().unwrap();
    let staging = tempdir().unwrap();
    let target = out.path().join("build.properties");

    let settings = DriverSettings {
        staging_root: Some(staging.path().to_path_buf()),
        ..DriverSettings::default()
    };
    let (driver, catalog) = driver_with(&settings);

    let mut capture = ConfigCapture::with_root_name(PROPERTY_FILE);
    capture.set_attribute("file", target.display().to_string());
    capture.set_attribute("comment", "release");
    capture.create_child("entry");
    capture.set_attribute("key", "version");
    capture.set_attribute("value", "2.0");
    capture.end_child().unwrap();
    let config = capture.finish();

    let report = driver
        .execute(&CatalogPolicy::from_settings(catalog, PROPERTY_FILE, &settings), &config)
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        "# release\nversion=2.0\n"
    );
    assert_eq!(report.messages.len(), 1);
    assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
}

#[test]
fn test_property_file_append_keeps_earlier_entries() {
    let out = tempdir().unwrap();
    let target = out.path().join("build.properties");
    let settings = DriverSettings::default();
    let (driver, catalog) = driver_with(&settings);
    let policy = CatalogPolicy::from_settings(catalog, PROPERTY_FILE, &settings);

    for (key, append) in [("first", "false"), ("second", "on")] {
        let mut capture = ConfigCapture::with_root_name(PROPERTY_FILE);
        capture.set_attribute("file", target.display().to_string());
        capture.set_attribute("append", append);
        capture.create_child("entry");
        capture.set_attribute("key", key);
        capture.set_attribute("value", "1");
        capture.end_child().unwrap();
        driver.execute(&policy, &capture.finish()).unwrap();
    }

    assert_eq!(
        std::fs::read_to_string(&target).unwrap(),
        "first=1\nsecond=1\n"
    );
}

#[test]
fn test_execution_error_reports_exit_code() {
    let settings = DriverSettings::default();
    let (driver, catalog) = driver_with(&settings);
    let config = parse_document(r#"{"name": "isotask.tasks.PropertyFile"}"#).unwrap();

    let err = driver
        .execute(&CatalogPolicy::from_settings(catalog, PROPERTY_FILE, &settings), &config)
        .unwrap_err();
    assert!(err.is_execution());
    assert!(err.to_string().contains("file attribute is required"));
    assert_eq!(i32::from(&err), 1);
}

/// Records every call it receives
struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
    prefix: String,
    reject: Option<&'static str>,
}

impl Recorder {
    fn new(log: &Arc<Mutex<Vec<String>>>, prefix: &str, reject: Option<&'static str>) -> Self {
        Self {
            log: Arc::clone(log),
            prefix: prefix.to_string(),
            reject,
        }
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(format!("{}{}", self.prefix, entry));
    }
}

impl ReplayTarget for Recorder {
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), ReplayRejection> {
        if self.reject == Some(name) {
            return Err(ReplayRejection::UnknownAttribute(name.to_string()));
        }
        self.record(format!("set {}={}", name, value));
        Ok(())
    }

    fn create_child(&mut self, name: &str) -> Result<Box<dyn ReplayTarget>, ReplayRejection> {
        self.record(format!("create {}", name));
        Ok(Box::new(Recorder::new(&self.log, &format!("{}{}.", self.prefix, name), self.reject)))
    }

    fn accept_child(&mut self, name: &str, _child: Box<dyn ReplayTarget>) -> Result<(), ReplayRejection> {
        self.record(format!("accept {}", name));
        Ok(())
    }
}

#[test]
fn test_order_preservation_through_capture_and_replay() {
    let mut capture = ConfigCapture::new();
    capture.set_attribute("mode", "fast");
    capture.create_child("filter");
    capture.set_attribute("type", "regex");
    capture.end_child().unwrap();
    capture.set_attribute("verbose", "true");
    let config = capture.finish();

    let log = Arc::new(Mutex::new(Vec::new()));
    replay(&mut Recorder::new(&log, "", None), &config).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "set mode=fast",
            "set verbose=true",
            "create filter",
            "filter.set type=regex",
            "accept filter",
        ]
    );
}

#[test]
fn test_unknown_name_stops_sibling_calls() {
    let config = parse_document(
        r#"{"name": "root",
            "attributes": {"a": "1", "bogus": "2", "c": "3"},
            "children": [{"name": "child"}]}"#,
    )
    .unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let err = replay(&mut Recorder::new(&log, "", Some("bogus")), &config).unwrap_err();

    assert!(err.is_replay());
    assert_eq!(*log.lock().unwrap(), vec!["set a=1"]);
}
