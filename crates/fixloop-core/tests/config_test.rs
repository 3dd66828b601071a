use std::sync::Mutex;

use fixloop_core::config::*;
use fixloop_core::errors::ConfigError;

/// Serializes tests that touch process environment variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn clear_fixloop_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("FIXLOOP_") {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn empty_toml_yields_documented_defaults() {
    let config = FixloopConfig::from_toml("").unwrap();

    assert_eq!(config.scoring.effective_promotion_threshold(), 0.75);
    assert_eq!(config.scoring.effective_formatter_batch_ratio(), 0.80);
    assert_eq!(config.clustering.effective_dedup_threshold(), 0.85);
    assert_eq!(config.clustering.effective_near_threshold_band(), 0.05);
    assert_eq!(config.lifecycle.effective_min_frequency(), 5);
    assert_eq!(config.lifecycle.effective_sustained_runs_required(), 2);
    assert_eq!(config.codemod.effective_replay_timeout_ms(), 2_000);
    assert_eq!(config.runtime.effective_workers(), 4);
    assert!(config
        .correlation
        .effective_config_file_names()
        .contains(&".eslintrc.json".to_string()));
}

#[test]
fn partial_toml_overrides_only_named_fields() {
    let toml = r#"
[clustering]
dedup_threshold = 0.9

[lifecycle]
min_frequency = 8
"#;
    let config = FixloopConfig::from_toml(toml).unwrap();
    assert_eq!(config.clustering.effective_dedup_threshold(), 0.9);
    assert_eq!(config.clustering.effective_join_threshold(), 0.70);
    assert_eq!(config.lifecycle.effective_min_frequency(), 8);
}

#[test]
fn out_of_range_threshold_fails_validation() {
    let config = FixloopConfig::from_toml("[scoring]\npromotion_threshold = 1.5\n").unwrap();
    let err = FixloopConfig::validate(&config).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::ValidationFailed { ref field, .. } if field == "scoring.promotion_threshold"
    ));
}

#[test]
fn provisional_above_validated_fails_validation() {
    let toml = "[lifecycle]\nprovisional_threshold = 0.9\nvalidated_threshold = 0.8\n";
    let config = FixloopConfig::from_toml(toml).unwrap();
    assert!(FixloopConfig::validate(&config).is_err());
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = FixloopConfig::from_toml("[scoring\n").unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn env_overrides_the_project_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_fixloop_env_vars();

    let project = tempfile::tempdir().unwrap();
    std::fs::write(
        project.path().join("fixloop.toml"),
        "[runtime]\nworkers = 2\n\n[clustering]\ndedup_threshold = 0.8\njoin_threshold = 0.6\n",
    )
    .unwrap();
    std::env::set_var("FIXLOOP_CLUSTERING_DEDUP_THRESHOLD", "0.82");
    std::env::set_var("FIXLOOP_RUNTIME_WORKERS", "not-a-number");

    let config = FixloopConfig::load(project.path()).unwrap();
    assert_eq!(config.runtime.effective_workers(), 2);
    assert_eq!(config.clustering.effective_dedup_threshold(), 0.82);
    assert_eq!(config.clustering.effective_join_threshold(), 0.6);

    clear_fixloop_env_vars();
}

#[test]
fn missing_project_file_means_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_fixloop_env_vars();

    let project = tempfile::tempdir().unwrap();
    let config = FixloopConfig::load(project.path()).unwrap();
    assert_eq!(config.runtime.effective_workers(), 4);
    assert_eq!(config.codemod.effective_replay_timeout_ms(), 2_000);
}

#[test]
fn invalid_project_file_fails_to_load() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_fixloop_env_vars();

    let project = tempfile::tempdir().unwrap();
    std::fs::write(project.path().join("fixloop.toml"), "[runtime]\nworkers = 0\n").unwrap();
    let err = FixloopConfig::load(project.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationFailed { ref field, .. } if field == "runtime.workers"));
}
