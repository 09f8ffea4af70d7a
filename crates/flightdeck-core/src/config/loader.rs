//! Configuration loading

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::defaults::config_file_names;
use super::types::Config;
use super::validation::validate_config;

/// Load configuration from a file
pub fn load_config(path: &Path) -> Result<Config> {
    let format = if path.extension().is_some_and(|e| e == "toml") {
        "TOML"
    } else {
        "YAML"
    };
    info!(path = %path.display(), format, "loading config");

    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

    let config: Config = if format == "TOML" {
        toml::from_str(&content).map_err(ConfigError::TomlError)?
    } else {
        serde_yaml::from_str(&content).map_err(ConfigError::YamlError)?
    };

    validate_config(&config)?;
    debug!(path = %path.display(), "config loaded and validated");
    Ok(config)
}

/// Find configuration file in directory or parent directories.
///
/// The first match wins. Parents are walked until the filesystem root.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    debug!(start_dir = %start_dir.display(), "searching for config file");
    let mut current = start_dir.to_path_buf();

    loop {
        for name in config_file_names() {
            let config_path = current.join(name);
            if config_path.exists() {
                info!(path = %config_path.display(), "found config file");
                return Some(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    debug!("no config file found");
    None
}

/// Load configuration, falling back to defaults when no file exists.
///
/// A file that exists but fails to parse or validate is still an error.
/// Environment overrides are applied last and the result re-validated.
pub fn load_effective_config(dir: &Path) -> Result<(Config, Option<PathBuf>)> {
    let (mut config, path) = match find_config(dir) {
        Some(path) => (load_config(&path)?, Some(path)),
        None => {
            debug!(dir = %dir.display(), "no config found, using defaults");
            (Config::default(), None)
        }
    };

    config.apply_env();
    validate_config(&config)?;
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_config_toml() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("flightdeck.toml");
        std::fs::write(&config_path, "full_handle = \"acme/app\"").unwrap();

        let found = find_config(temp.path());
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_prefers_toml_over_yaml() {
        let temp = TempDir::new().unwrap();
        let toml_path = temp.path().join("flightdeck.toml");
        let yaml_path = temp.path().join("flightdeck.yaml");
        std::fs::write(&toml_path, "full_handle = \"acme/app\"").unwrap();
        std::fs::write(&yaml_path, "full_handle: acme/other").unwrap();

        let found = find_config(temp.path()).unwrap();
        assert_eq!(found, toml_path);
    }

    #[test]
    fn test_find_config_in_parent() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join(".flightdeck.yaml");
        std::fs::write(&config_path, "full_handle: acme/app").unwrap();

        let nested = temp.path().join("ios").join("App");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config(&nested), Some(config_path));
    }

    #[test]
    fn test_load_yaml_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("flightdeck.yaml");
        std::fs::write(
            &path,
            "server_url: https://previews.internal\nfull_handle: acme/app\nupload:\n  max_retries: 4\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server_url, "https://previews.internal");
        assert_eq!(config.upload.max_retries, 4);
        assert_eq!(config.upload.chunk_size, super::super::DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_load_invalid_config_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("flightdeck.toml");
        std::fs::write(&path, "full_handle = \"missing-project\"").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let (config, path) = load_effective_config(temp.path()).unwrap();
        assert!(path.is_none());
        assert_eq!(config.upload.max_retries, 2);
    }
}
