use std::fs;

use rdb_engine::EngineConfig;
use tempfile::TempDir;
use tracing::info;

#[test]
fn test_save_and_load_round_trip() {
    rdb_common::logging::ensure_test_logging(None);
    info!("Running test");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rdb.toml");

    let config = EngineConfig::default()
        .with_entry_method("run")
        .with_capture_limits(2, 8)
        .with_initial_breakpoint("App.java:12");
    config.save(&path).unwrap();

    let loaded = EngineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_load_partial_file() {
    rdb_common::logging::ensure_test_logging(None);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rdb.toml");
    fs::write(&path, "stop_on_entry = false\nstep_exclusions = [\"org.*\"]\n").unwrap();

    let config = EngineConfig::load(&path).unwrap();
    assert!(!config.stop_on_entry);
    assert_eq!(config.step_exclusions, vec!["org.*".to_string()]);
    assert_eq!(config.entry_method, "main");
    assert_eq!(config.progress_interval, 100);
}

#[test]
fn test_load_errors() {
    rdb_common::logging::ensure_test_logging(None);
    let dir = TempDir::new().unwrap();
    assert!(EngineConfig::load(&dir.path().join("missing.toml")).is_err());

    let path = dir.path().join("broken.toml");
    fs::write(&path, "max_variable_depth = \"deep\"").unwrap();
    let err = EngineConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}
