//! ---
//! rsbb_section: "01-core-functionality"
//! rsbb_subsection: "tests"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Configuration loading behaviour."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::Duration;

use rsbb_common::config::AppConfig;
use rsbb_common::LogFormat;

// Single test so the RSBB_CONFIG override cannot race with other cases.
#[test]
fn load_or_default_resolves_sources_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::env::remove_var(AppConfig::ENV_CONFIG_PATH);

    let missing = dir.path().join("missing.toml");
    let loaded = AppConfig::load_or_default(&[missing.clone()]).expect("defaults");
    assert!(loaded.source.is_none());
    assert_eq!(loaded.config.robot.name, "dummy_roah_robot");

    let file = dir.path().join("robot.toml");
    std::fs::write(
        &file,
        r#"
[robot]
name = "bench_bot"

[timing]
phase_delay_ms = 50

[logging]
format = "pretty"
"#,
    )
    .expect("write config");

    let loaded = AppConfig::load_or_default(&[missing.clone(), file.clone()]).expect("file");
    assert_eq!(loaded.source.as_deref(), Some(file.as_path()));
    assert_eq!(loaded.config.robot.name, "bench_bot");
    assert_eq!(loaded.config.timing.phase_delay, Duration::from_millis(50));
    assert_eq!(loaded.config.logging.format, LogFormat::Pretty);

    let override_file = dir.path().join("override.toml");
    std::fs::write(&override_file, "[robot]\nname = \"override_bot\"\n").expect("write override");
    std::env::set_var(AppConfig::ENV_CONFIG_PATH, &override_file);
    let loaded = AppConfig::load_or_default(&[file.clone()]).expect("override");
    std::env::remove_var(AppConfig::ENV_CONFIG_PATH);
    assert_eq!(loaded.source, Some(override_file));
    assert_eq!(loaded.config.robot.name, "override_bot");
}

#[test]
fn invalid_file_reports_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file: PathBuf = dir.path().join("broken.toml");
    std::fs::write(&file, "[topics]\nqueue_depth = 0\n").expect("write config");
    let err = AppConfig::from_path(&file).expect_err("validation fails");
    assert!(format!("{:#}", err).contains("broken.toml"));
}
