//! Configuration validation

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::defaults::MIN_CHUNK_SIZE;
use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_server(config)?;
    validate_upload(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_server(config: &Config) -> Result<()> {
    let url = url::Url::parse(&config.server_url)
        .map_err(|e| ConfigError::invalid("server_url", e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid("server_url", "must use http or https").into());
    }

    if let Some(handle) = &config.full_handle {
        let valid = handle
            .split_once('/')
            .is_some_and(|(account, project)| {
                !account.is_empty() && !project.is_empty() && !project.contains('/')
            });
        if !valid {
            return Err(
                ConfigError::invalid("full_handle", "must look like account/project").into(),
            );
        }
    }

    Ok(())
}

fn validate_upload(config: &Config) -> Result<()> {
    if config.upload.chunk_size < MIN_CHUNK_SIZE {
        return Err(ConfigError::invalid(
            "upload.chunk_size",
            format!("must be at least {} bytes", MIN_CHUNK_SIZE),
        )
        .into());
    }

    if config.upload.timeout_secs == 0 || config.download.timeout_secs == 0 {
        return Err(ConfigError::invalid("timeout_secs", "must be greater than zero").into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_bad_handle() {
        let mut config = Config::default();
        config.full_handle = Some("just-an-account".to_string());
        assert!(validate_config(&config).is_err());

        config.full_handle = Some("a/b/c".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_small_chunks() {
        let mut config = Config::default();
        config.upload.chunk_size = 1024;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_non_http_server() {
        let mut config = Config::default();
        config.server_url = "ftp://example.com".to_string();
        assert!(validate_config(&config).is_err());
    }
}
