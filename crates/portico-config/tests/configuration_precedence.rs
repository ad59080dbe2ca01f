use std::ffi::OsString;
use std::fs;

use ortho_config::OrthoConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use portico_config::{
    Config, DEFAULT_API_ROOT, DEFAULT_HTTP_PORT, DEFAULT_HTTPS_PORT, DEFAULT_MESH_MAX_PAYLOAD,
    Environment, default_log_filter, default_log_format,
};

struct Harness {
    temp_dir: TempDir,
    cli_args: std::cell::RefCell<Vec<OsString>>,
    env_overrides: std::cell::RefCell<Vec<(String, Option<OsString>)>>,
    loaded: std::cell::RefCell<Option<Config>>,
    error: std::cell::RefCell<Option<String>>,
}

impl Harness {
    fn new() -> Self {
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        Self {
            temp_dir,
            cli_args: std::cell::RefCell::new(vec![OsString::from("porticod")]),
            env_overrides: std::cell::RefCell::new(Vec::new()),
            loaded: std::cell::RefCell::new(None),
            error: std::cell::RefCell::new(None),
        }
    }

    fn write_config(&self, https_port: u16) {
        let path = self.temp_dir.path().join("portico.toml");
        let toml = format!("https_port = {https_port}\ndomain = \"example.test\"\n");

        if let Err(error) = fs::write(&path, toml) {
            panic!("failed to write configuration: {error}");
        }

        let mut args = self.cli_args.borrow_mut();
        args.push(OsString::from("--config-path"));
        args.push(path.into_os_string());
    }

    fn set_env(&self, key: &str, value: &str) {
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` on edition 2024; `Drop` restores
        // every override.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_string(), previous));
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        if self.loaded.borrow().is_some() || self.error.borrow().is_some() {
            return;
        }

        let args = self.cli_args.borrow().clone();
        match Config::load_from_iter(args) {
            Ok(config) => {
                *self.loaded.borrow_mut() = Some(config);
            }
            Err(error) => {
                *self.error.borrow_mut() = Some(error.to_string());
            }
        }
    }

    fn config(&self) -> Config {
        self.load();

        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }

        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut overrides = self.env_overrides.borrow_mut();
        while let Some((key, value)) = overrides.pop() {
            if let Some(os_value) = value {
                unsafe { std::env::set_var(&key, os_value) };
            } else {
                unsafe { std::env::remove_var(&key) };
            }
        }
    }
}

fn parse_port(raw: &str) -> u16 {
    match raw.parse::<u16>() {
        Ok(port) => port,
        Err(error) => panic!("invalid port '{raw}': {error}"),
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the HTTPS port to \"{port}\"")]
fn given_configuration_file(harness: &Harness, port: String) {
    harness.write_config(parse_port(&port));
}

#[given("the environment overrides the HTTPS port to \"{port}\"")]
fn given_environment_override(harness: &Harness, port: String) {
    harness.set_env("PORTICO_HTTPS_PORT", &port);
}

#[given("the environment overrides the deployment environment to \"{name}\"")]
fn given_environment_name(harness: &Harness, name: String) {
    harness.set_env("PORTICO_ENVIRONMENT", &name);
}

#[when("the CLI sets the HTTPS port to \"{port}\"")]
fn when_cli_override(harness: &Harness, port: String) {
    harness.push_cli_arg("--https-port");
    harness.push_cli_arg(OsString::from(&port));
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("loading the configuration resolves the HTTPS port to \"{port}\"")]
fn then_resolved_port(harness: &Harness, port: String) {
    let config = harness.config();
    assert_eq!(config.https_port(), parse_port(&port));
    assert_eq!(config.domain(), "example.test");
}

#[then("loading the configuration applies the built-in defaults")]
fn then_defaults_applied(harness: &Harness) {
    let config = harness.config();

    assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
    assert_eq!(config.https_port(), DEFAULT_HTTPS_PORT);
    assert_eq!(config.api_root(), DEFAULT_API_ROOT);
    assert_eq!(config.mesh_max_payload(), DEFAULT_MESH_MAX_PAYLOAD);
    assert_eq!(config.environment(), Environment::Development);
    assert!(!config.tls_enabled(), "TLS should be off outside production");
    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), default_log_format());
}

#[then("loading the configuration enables TLS")]
fn then_tls_enabled(harness: &Harness) {
    let config = harness.config();
    assert!(config.environment().is_production());
    assert!(config.tls_enabled());
}

#[scenario(path = "tests/features/configuration_precedence.feature")]
fn configuration_precedence(#[from(harness)] harness: Harness) {
    let _ = harness;
}
