//! CLI wiring tests - config loading and failure reporting, no network

use patchwise_common::{StatusCode, UpdateError};
use patchwisectl::commands::{build_orchestrator, load_config};
use patchwisectl::failure_label;
use std::fs;
use std::path::PathBuf;

fn write_config(dir: &std::path::Path, body: &str) -> PathBuf {
    let path = dir.join("patchwise.toml");
    fs::write(&path, body).unwrap();
    path
}

const CONFIG: &str = r#"
current_version = "1.0"
endpoint = "https://api.example.com/2.0/repositories/{workspace}/{repo_slug}/downloads"
workspace = "acme"
repo_slug = "widget"
access_token = "from-file"
dir_mode = 488
"#;

#[test]
fn test_load_config_with_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), CONFIG);

    let config = load_config(&path, Some("1.4")).unwrap();
    assert_eq!(config.current_version, "1.4");
    assert_eq!(config.workspace, "acme");
    assert_eq!(config.dir_mode, 0o750);
    assert_eq!(config.access_token.as_deref(), Some("from-file"));
}

#[test]
fn test_blank_override_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), CONFIG);

    assert!(load_config(&path, Some("  ")).is_err());
}

#[test]
fn test_missing_config_mentions_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = load_config(&path, None).unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
    assert_eq!(failure_label(&err), "Failed");
}

#[test]
fn test_build_orchestrator_with_file_cache() {
    let dir = tempfile::tempdir().unwrap();
    let body = format!("{}\ncache_dir = {:?}\n", CONFIG, dir.path().join("cache"));
    let path = write_config(dir.path(), &body);

    let config = load_config(&path, None).unwrap();
    let orchestrator = build_orchestrator(config).unwrap();
    assert_eq!(orchestrator.latest_version().as_str(), "0.0.0");
}

#[test]
fn test_failure_label_uses_status_code() {
    let err = anyhow::Error::from(UpdateError::TempDir {
        path: PathBuf::from("/tmp/staging"),
        reason: "not writable".to_string(),
    });
    assert_eq!(failure_label(&err), StatusCode::TempDirError.as_str());

    let err = anyhow::Error::from(UpdateError::Hook(anyhow::anyhow!("boom")));
    assert_eq!(failure_label(&err), "Failed");
}
