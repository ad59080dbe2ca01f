//! Behavioural tests for the daemon bootstrap sequence.

use std::cell::RefCell;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::bootstrap::{BootstrapError, ConfigLoader, Daemon, bootstrap_with};

use super::support::{FailingConfigLoader, HealthEvent, RecordingHealthReporter, TestConfigLoader};

type StepResult = Result<(), String>;

struct BootstrapWorld {
    loader: Box<dyn ConfigLoader>,
    cert_dir: Option<camino::Utf8PathBuf>,
    reporter: Arc<RecordingHealthReporter>,
    daemon: Option<Daemon>,
    error: Option<BootstrapError>,
}

impl BootstrapWorld {
    fn new() -> Self {
        Self {
            loader: Box::new(FailingConfigLoader),
            cert_dir: None,
            reporter: Arc::new(RecordingHealthReporter::default()),
            daemon: None,
            error: None,
        }
    }

    fn use_loader(&mut self, loader: TestConfigLoader) {
        self.cert_dir = Some(loader.cert_dir());
        self.loader = Box::new(loader);
    }

    fn cert_dir(&self) -> Result<&camino::Utf8Path, String> {
        self.cert_dir
            .as_deref()
            .ok_or_else(|| "no credential directory configured".to_owned())
    }
}

#[fixture]
fn world() -> RefCell<BootstrapWorld> {
    RefCell::new(BootstrapWorld::new())
}

#[given("a healthy configuration loader")]
fn given_healthy_loader(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().use_loader(TestConfigLoader::new());
}

#[given("a healthy configuration loader with TLS enabled")]
fn given_tls_loader(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().use_loader(TestConfigLoader::new().with_tls());
}

#[given("a failing configuration loader")]
fn given_failing_loader(world: &RefCell<BootstrapWorld>) {
    world.borrow_mut().loader = Box::new(FailingConfigLoader);
}

#[when("the daemon bootstrap runs")]
fn when_bootstrap_runs(world: &RefCell<BootstrapWorld>) {
    let mut world = world.borrow_mut();
    match bootstrap_with(world.loader.as_ref(), world.reporter.clone()) {
        Ok(daemon) => world.daemon = Some(daemon),
        Err(error) => world.error = Some(error),
    }
}

#[then("bootstrap succeeds")]
fn then_bootstrap_succeeds(world: &RefCell<BootstrapWorld>) -> StepResult {
    let world = world.borrow();
    match (&world.daemon, &world.error) {
        (Some(_), None) => Ok(()),
        (_, Some(error)) => Err(format!("bootstrap error: {error}")),
        (None, None) => Err("bootstrap did not run".to_owned()),
    }
}

#[then("bootstrap fails")]
fn then_bootstrap_fails(world: &RefCell<BootstrapWorld>) -> StepResult {
    match &world.borrow().error {
        Some(BootstrapError::Configuration { .. }) => Ok(()),
        other => Err(format!("expected a configuration error, got {other:?}")),
    }
}

#[then("the reporter recorded bootstrap start")]
fn then_reporter_start(world: &RefCell<BootstrapWorld>) {
    assert!(
        world
            .borrow()
            .reporter
            .events()
            .contains(&HealthEvent::BootstrapStarting),
        "bootstrap start event missing"
    );
}

#[then("the reporter recorded bootstrap success")]
fn then_reporter_success(world: &RefCell<BootstrapWorld>) {
    assert!(
        world
            .borrow()
            .reporter
            .events()
            .contains(&HealthEvent::BootstrapSucceeded),
        "bootstrap success event missing"
    );
}

#[then("the reporter recorded bootstrap failure")]
fn then_reporter_failure(world: &RefCell<BootstrapWorld>) {
    let events = world.borrow().reporter.events();
    let failed = events
        .iter()
        .any(|event| matches!(event, HealthEvent::BootstrapFailed(_)));
    assert!(failed, "bootstrap failure event missing: {events:?}");
}

#[then("the credential directory exists")]
fn then_cert_dir_exists(world: &RefCell<BootstrapWorld>) -> StepResult {
    let world = world.borrow();
    let dir = world.cert_dir()?;
    if dir.is_dir() {
        Ok(())
    } else {
        Err(format!("credential directory '{dir}' missing"))
    }
}

#[then("the credential directory does not exist")]
fn then_cert_dir_absent(world: &RefCell<BootstrapWorld>) -> StepResult {
    let world = world.borrow();
    let dir = world.cert_dir()?;
    if dir.exists() {
        Err(format!("credential directory '{dir}' created unexpectedly"))
    } else {
        Ok(())
    }
}

#[scenario(path = "tests/features/daemon_bootstrap.feature")]
fn daemon_bootstrap(world: RefCell<BootstrapWorld>) -> Result<(), String> {
    let _ = world;
    Ok(())
}
