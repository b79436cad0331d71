//! Configuration loading from files and the environment

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use instrumentor_common::{
    CommonError, HealthCheckRegistry, InMemoryHealthCheckRegistry, InMemoryMetricRegistry,
    MetricRegistry,
};
use instrumentor_core::config::{
    ENV_DEFAULT_ERROR_THRESHOLD, ENV_EXCEPTION_POLICY, ENV_EXTENDED, ENV_HEALTH_CHECKS,
};
use instrumentor_core::{ExceptionPolicy, Instrumentor, InstrumentorConfig};
use parking_lot::Mutex;
use tempfile::NamedTempFile;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in
        [ENV_EXCEPTION_POLICY, ENV_EXTENDED, ENV_HEALTH_CHECKS, ENV_DEFAULT_ERROR_THRESHOLD]
    {
        std::env::remove_var(key);
    }
}

fn config_file(suffix: &str, contents: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Validates loading a TOML file.
///
/// # Test Steps
/// 1. Write a partial TOML config to a temp file
/// 2. Load it by path
/// 3. Verify set fields are read and the rest keep their defaults
#[test]
fn test_load_toml_file() -> Result<()> {
    let file = config_file(
        ".toml",
        r#"
        exception_policy = "mark_expected_only"
        extended = true
        "#,
    )?;

    let config = InstrumentorConfig::load_from_file(file.path())?;

    assert_eq!(config.exception_policy, ExceptionPolicy::MarkExpectedOnly);
    assert!(config.extended);
    assert!(config.health_checks);
    assert_eq!(config.default_error_threshold, None);
    Ok(())
}

#[test]
fn test_load_json_file() -> Result<()> {
    let file = config_file(".json", r#"{"health_checks": false, "default_error_threshold": 0.1}"#)?;

    let config = InstrumentorConfig::load_from_file(file.path())?;

    assert!(!config.health_checks);
    assert_eq!(config.default_error_threshold, Some(0.1));
    Ok(())
}

#[test]
fn test_missing_and_unsupported_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let err = InstrumentorConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, CommonError::Config { .. }));

    let file = config_file(".yaml", "extended: true")?;
    let err = InstrumentorConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, CommonError::Config { .. }));
    assert!(err.to_string().contains("yaml"));
    Ok(())
}

/// Validates the precedence of file and environment settings.
///
/// # Test Steps
/// 1. Write a config file that sets every field
/// 2. Override two fields through the environment
/// 3. Verify the environment wins for those fields only
#[test]
fn test_env_overrides_file() -> Result<()> {
    let _guard = ENV_LOCK.lock();
    clear_env();

    let file = config_file(
        ".toml",
        r#"
        exception_policy = "mark_all"
        extended = false
        health_checks = true
        default_error_threshold = 0.5
        "#,
    )?;
    std::env::set_var(ENV_EXTENDED, "true");
    std::env::set_var(ENV_DEFAULT_ERROR_THRESHOLD, "0.2");

    let loaded = InstrumentorConfig::load(Some(file.path()));
    clear_env();
    let config = loaded?;

    assert_eq!(config.exception_policy, ExceptionPolicy::MarkAll);
    assert!(config.extended);
    assert!(config.health_checks);
    assert_eq!(config.default_error_threshold, Some(0.2));
    Ok(())
}

#[test]
fn test_load_rejects_invalid_threshold() -> Result<()> {
    let _guard = ENV_LOCK.lock();
    clear_env();

    let file = config_file(".json", r#"{"default_error_threshold": -1.0}"#)?;
    let err = InstrumentorConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, CommonError::Validation { .. }));
    Ok(())
}

/// Validates that a loaded config drives the instrumentor.
///
/// # Test Steps
/// 1. Load a config with a default threshold and extended metrics
/// 2. Build an instrumentor from it with a health-check registry
/// 3. Wrap a unit without a threshold and verify the default applied
#[test]
fn test_instrumentor_from_loaded_config() -> Result<()> {
    let file = config_file(
        ".toml",
        r#"
        extended = true
        default_error_threshold = 0.3
        "#,
    )?;
    let config = InstrumentorConfig::load_from_file(file.path())?;

    let metrics = Arc::new(InMemoryMetricRegistry::new());
    let health = Arc::new(InMemoryHealthCheckRegistry::new());
    let instrumentor = Instrumentor::from_config(&config, metrics.clone(), Some(health.clone()))?;

    let wrapped = instrumentor.wrap(|| Ok::<_, String>(7), "orders.place", None)?;
    assert_eq!(wrapped.call(), Ok(7));

    assert!(instrumentor.is_extended());
    assert!(health.contains("orders.place"));
    assert!(metrics.contains("orders.place.total"));
    assert!(metrics.contains("orders.place.success"));
    Ok(())
}

#[test]
fn test_health_checks_disabled_by_config() -> Result<()> {
    let config = InstrumentorConfig::from_toml_str(
        r#"
        health_checks = false
        default_error_threshold = 0.3
        "#,
    )?;

    let health = Arc::new(InMemoryHealthCheckRegistry::new());
    let instrumentor = Instrumentor::from_config(
        &config,
        Arc::new(InMemoryMetricRegistry::new()),
        Some(health.clone()),
    )?;
    instrumentor.wrap(|| (), "orders.cancel", Some(0.1))?;

    assert!(instrumentor.health_check_registry().is_none());
    assert!(health.is_empty());
    Ok(())
}
