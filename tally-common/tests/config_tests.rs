//! Unit tests for bootstrap configuration and root folder resolution
//!
//! Tests that manipulate STOCKTALLY_ROOT are marked with #[serial] so they
//! do not race each other.

use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use tally_common::config::{
    CompiledDefaults, ConfigSource, RootFolderInitializer, RootFolderResolver, TomlConfig, DATABASE_FILE,
    ROOT_ENV_VAR,
};
use tally_common::Error;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.to_string_lossy().contains("stocktally"));
}

#[test]
fn test_empty_toml_uses_defaults() {
    let config = TomlConfig::from_toml_str("").unwrap();

    assert_eq!(config.port, 5780);
    assert!(config.root_folder.is_none());
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.timing.rearm_delay_ms, 500);
    assert_eq!(config.timing.result_display_ms, 3000);
    assert_eq!(config.timing.lookup_timeout_ms, 10_000);
    assert_eq!(config.timing.vibration_ms, 200);
}

#[test]
fn test_partial_toml_overrides() {
    let config = TomlConfig::from_toml_str(
        r#"
        port = 6000
        root_folder = "/srv/tally"

        [logging]
        level = "debug"

        [timing]
        result_display_ms = 5000
        "#,
    )
    .unwrap();

    assert_eq!(config.port, 6000);
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/tally")));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.timing.result_display_ms, 5000);
    assert_eq!(config.timing.rearm_delay_ms, 500);
    assert_eq!(config.timing.result_display().as_millis(), 5000);
}

#[test]
fn test_invalid_toml_is_config_error() {
    let result = TomlConfig::from_toml_str("port = \"not a number\"");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = 5999").unwrap();

    let (config, _) = TomlConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.port, 5999);
}

#[test]
fn test_explicit_file_is_reported_as_source() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = 5998").unwrap();

    let (config, source) = TomlConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.port, 5998);
    assert_eq!(source, ConfigSource::Explicit(file.path().to_path_buf()));
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_platform_file_or_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let saved = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let without_file = TomlConfig::load(None);

    let user_file = dir.path().join("stocktally").join("config.toml");
    std::fs::create_dir_all(user_file.parent().unwrap()).unwrap();
    std::fs::write(&user_file, "port = 6100\n").unwrap();
    let with_file = TomlConfig::load(None);

    match saved {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }

    let (config, source) = without_file.unwrap();
    assert_eq!(config.port, 5780);
    if !Path::new("/etc/stocktally/config.toml").exists() {
        assert_eq!(source, ConfigSource::Defaults);
    }

    let (config, source) = with_file.unwrap();
    assert_eq!(config.port, 6100);
    assert_eq!(source, ConfigSource::Platform(user_file));
}

#[test]
fn test_explicit_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let result = TomlConfig::load(Some(&missing));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_ENV_VAR);

    let root_folder = RootFolderResolver::new().resolve();
    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var_beats_toml() {
    env::set_var(ROOT_ENV_VAR, "/tmp/stocktally-env");

    let root_folder = RootFolderResolver::new()
        .with_toml_value(Some(PathBuf::from("/tmp/stocktally-toml")))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/stocktally-env"));

    env::remove_var(ROOT_ENV_VAR);
}

#[test]
#[serial]
fn test_resolver_cli_arg_has_priority() {
    env::set_var(ROOT_ENV_VAR, "/tmp/stocktally-env");

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/stocktally-cli")))
        .with_toml_value(Some(PathBuf::from("/tmp/stocktally-toml")))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/stocktally-cli"));

    env::remove_var(ROOT_ENV_VAR);
}

#[test]
#[serial]
fn test_resolver_toml_value_used_without_env() {
    env::remove_var(ROOT_ENV_VAR);

    let root_folder = RootFolderResolver::new()
        .with_toml_value(Some(PathBuf::from("/tmp/stocktally-toml")))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/stocktally-toml"));
}

#[test]
fn test_initializer_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("root");

    let initializer = RootFolderInitializer::new(root.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.database_path(), root.join(DATABASE_FILE));
}
