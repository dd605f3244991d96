//! Shared integration test helpers for tabshell.
//!
//! Include this module at the top of each test file that needs it:
//!
//! ```ignore
//! mod common;
//! use common::{app_from_yaml, test_config};
//! ```

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use tabshell::app::App;
use tabshell::scenario::Scenario;
use tabshell_config::Config;
use tempfile::TempDir;

/// Default config without the unload deadline, so only the scenario's own
/// replies move a close forward.
pub fn test_config() -> Config {
    Config {
        unload_timeout_ms: None,
        ..Config::default()
    }
}

/// Build an [`App`] from inline scenario YAML.
pub fn app_from_yaml(yaml: &str) -> App {
    app_with_config(test_config(), yaml)
}

pub fn app_with_config(config: Config, yaml: &str) -> App {
    let scenario = Scenario::from_yaml(yaml).expect("scenario parses");
    App::new(config, scenario).expect("app builds")
}

/// Write `yaml` to a scenario file inside a fresh temp dir.
///
/// The `TempDir` must be kept alive for as long as the file is used.
pub fn write_scenario(yaml: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().join("scenario.yaml");
    fs::write(&path, yaml).expect("Failed to write scenario");
    (temp_dir, path)
}
