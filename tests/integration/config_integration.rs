//! Integration tests for layered configuration loading

use slidegen::config::{global_config_path, ConfigLoader};
use std::fs;
use tempfile::TempDir;

use crate::integration::with_xdg_env;

#[test]
fn test_global_config_path_follows_xdg_config_home() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let path = global_config_path().unwrap();
        assert_eq!(
            path,
            test_dir
                .path()
                .join("config")
                .join("slidegen")
                .join("config.toml")
        );
    });
}

#[test]
fn test_workspace_file_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let global_dir = test_dir.path().join("config").join("slidegen");
        fs::create_dir_all(&global_dir).unwrap();
        fs::write(
            global_dir.join("config.toml"),
            "[generation]\nmax_api_retries = 5\nmax_concurrent_jobs = 2\n",
        )
        .unwrap();

        let workspace = test_dir.path().join("ws");
        fs::create_dir_all(workspace.join("config")).unwrap();
        fs::write(
            workspace.join("config").join("config.toml"),
            "[generation]\nmax_concurrent_jobs = 6\n",
        )
        .unwrap();

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.generation.max_api_retries, 5);
        assert_eq!(config.generation.max_concurrent_jobs, 6);
        assert_eq!(config.generation.retry_delay_base, 2);
    });
}

#[test]
fn test_environment_overrides_files() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let workspace = test_dir.path().join("ws");
        fs::create_dir_all(workspace.join("config")).unwrap();
        fs::write(
            workspace.join("config").join("config.toml"),
            "[generation]\nmax_api_retries = 4\n",
        )
        .unwrap();

        std::env::set_var("SLIDEGEN__GENERATION__MAX_API_RETRIES", "7");
        let result = ConfigLoader::load(&workspace);
        std::env::remove_var("SLIDEGEN__GENERATION__MAX_API_RETRIES");

        assert_eq!(result.unwrap().generation.max_api_retries, 7);
    });
}

#[test]
fn test_defaults_without_any_file() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let workspace = test_dir.path().join("empty");
        fs::create_dir_all(&workspace).unwrap();

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.generation.max_api_retries, 10);
        assert!(config.ensure_valid().is_ok());
    });
}

#[test]
fn test_invalid_values_are_reported() {
    let test_dir = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let path = test_dir.path().join("bad.toml");
        fs::write(&path, "[generation]\nmax_api_retries = 0\n").unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert!(config.ensure_valid().is_err());
    });
}
