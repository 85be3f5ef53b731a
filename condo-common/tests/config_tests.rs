//! Tests for configuration resolution
//!
//! Priority: CLI overrides > environment > TOML file > compiled defaults.
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that read or set CONDO_* variables are marked with #[serial].

use condo_common::config::{
    load_toml_config, AdminCredentials, CompiledDefaults, ConfigOverrides, Settings, TomlConfig,
    ENV_ADMIN_PASSWORD, ENV_ADMIN_USERNAME, ENV_BIND, ENV_DATABASE, ENV_PORT, ENV_ROOT_FOLDER,
};
use condo_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

fn clear_env() {
    for name in [
        ENV_ROOT_FOLDER,
        ENV_DATABASE,
        ENV_BIND,
        ENV_PORT,
        ENV_ADMIN_USERNAME,
        ENV_ADMIN_PASSWORD,
    ] {
        env::remove_var(name);
    }
}

/// Log output captured from a scoped subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a subscriber installed and return what it logged
fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    (result, text)
}

fn defaults() -> CompiledDefaults {
    CompiledDefaults {
        root_folder: PathBuf::from("/default/root"),
        bind_address: IpAddr::from([127, 0, 0, 1]),
        port: 5780,
        log_level: "info".to_string(),
        session_ttl_hours: 12,
    }
}

fn parse_toml(text: &str) -> TomlConfig {
    toml::from_str(text).unwrap()
}

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();
    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert_eq!(defaults.port, 5780);
    assert_eq!(defaults.log_level, "info");
    assert_eq!(defaults.session_ttl_hours, 12);
}

#[test]
#[serial]
fn test_defaults_when_nothing_configured() {
    clear_env();

    let settings =
        Settings::resolve_with(&ConfigOverrides::default(), TomlConfig::default(), defaults())
            .unwrap();

    assert_eq!(settings.root_folder, PathBuf::from("/default/root"));
    assert_eq!(settings.database_path, PathBuf::from("/default/root/condo.db"));
    assert_eq!(settings.socket_addr().to_string(), "127.0.0.1:5780");
    assert!(settings.auth.enabled);
    assert!(!settings.cors_permissive);
    assert!(settings.auth.bootstrap_admin.is_none());
}

#[test]
#[serial]
fn test_toml_values_apply() {
    clear_env();

    let toml_config = parse_toml(
        r#"
        root_folder = "/srv/condo"
        database_path = "data/ledger.db"
        bind_address = "0.0.0.0"
        port = 8080
        cors_permissive = true

        [logging]
        level = "debug"

        [auth]
        session_ttl_hours = 48
        admin_username = "admin"
        admin_password = "from-toml-pass"
        "#,
    );

    let settings =
        Settings::resolve_with(&ConfigOverrides::default(), toml_config, defaults()).unwrap();

    assert_eq!(settings.database_path, PathBuf::from("/srv/condo/data/ledger.db"));
    assert_eq!(settings.socket_addr().to_string(), "0.0.0.0:8080");
    assert_eq!(settings.log_level, "debug");
    assert!(settings.cors_permissive);
    assert_eq!(settings.auth.session_ttl_hours, 48);
    assert_eq!(
        settings.auth.bootstrap_admin,
        Some(AdminCredentials {
            username: "admin".to_string(),
            password: "from-toml-pass".to_string(),
        })
    );
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    env::set_var(ENV_ROOT_FOLDER, "/env/root");
    env::set_var(ENV_PORT, "6000");

    let toml_config = parse_toml(
        r#"
        root_folder = "/toml/root"
        port = 7000
        "#,
    );
    let settings =
        Settings::resolve_with(&ConfigOverrides::default(), toml_config, defaults()).unwrap();

    assert_eq!(settings.root_folder, PathBuf::from("/env/root"));
    assert_eq!(settings.port, 6000);

    clear_env();
}

#[test]
#[serial]
fn test_cli_overrides_env() {
    clear_env();
    env::set_var(ENV_ROOT_FOLDER, "/env/root");
    env::set_var(ENV_PORT, "6000");

    let overrides = ConfigOverrides {
        root_folder: Some(PathBuf::from("/cli/root")),
        port: Some(9000),
        disable_auth: true,
        ..Default::default()
    };
    let settings = Settings::resolve_with(&overrides, TomlConfig::default(), defaults()).unwrap();

    assert_eq!(settings.root_folder, PathBuf::from("/cli/root"));
    assert_eq!(settings.port, 9000);
    assert!(!settings.auth.enabled);

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_port_is_config_error() {
    clear_env();
    env::set_var(ENV_PORT, "not-a-port");

    let result =
        Settings::resolve_with(&ConfigOverrides::default(), TomlConfig::default(), defaults());
    assert!(matches!(result, Err(Error::Config(_))));

    clear_env();
}

#[test]
#[serial]
fn test_half_configured_admin_is_ignored() {
    clear_env();
    env::set_var(ENV_ADMIN_USERNAME, "admin");

    let settings =
        Settings::resolve_with(&ConfigOverrides::default(), TomlConfig::default(), defaults())
            .unwrap();
    assert!(settings.auth.bootstrap_admin.is_none());

    clear_env();
}

#[test]
#[serial]
fn test_zero_session_ttl_rejected() {
    clear_env();
    let toml_config = parse_toml("[auth]\nsession_ttl_hours = 0\n");

    let result = Settings::resolve_with(&ConfigOverrides::default(), toml_config, defaults());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_unknown_toml_keys_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "root_folder = \"/srv\"\nnot_a_setting = 1").unwrap();

    assert!(matches!(load_toml_config(file.path()), Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_missing_config_file_uses_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();

    let overrides = ConfigOverrides {
        config_file: Some(dir.path().join("does-not-exist.toml")),
        root_folder: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let settings = Settings::resolve(&overrides).unwrap();

    assert_eq!(settings.database_path, dir.path().join("condo.db"));
    assert_eq!(settings.port, 5780);
}

#[test]
#[serial]
fn test_resolution_warnings_reach_an_installed_subscriber() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.toml");
    env::set_var(ENV_ADMIN_USERNAME, "admin");

    let overrides = ConfigOverrides {
        config_file: Some(missing.clone()),
        root_folder: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let (settings, logs) = with_captured_logs(|| Settings::resolve(&overrides));
    let settings = settings.unwrap();

    assert!(settings.auth.bootstrap_admin.is_none());
    assert!(
        logs.contains(&format!("Config file {} not found, using defaults", missing.display())),
        "logs: {}",
        logs
    );
    assert!(logs.contains("Bootstrap admin needs both a username and a password"));
    assert!(logs.contains("WARN"));

    clear_env();
}

#[test]
#[serial]
fn test_loaded_config_file_is_logged() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = 6001\n").unwrap();

    let overrides = ConfigOverrides {
        config_file: Some(path.clone()),
        root_folder: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let (settings, logs) = with_captured_logs(|| Settings::resolve(&overrides));

    assert_eq!(settings.unwrap().port, 6001);
    assert!(logs.contains(&format!("Loaded configuration from {}", path.display())));
}
