//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::*;

/// Main configuration for flightdeck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the preview server
    pub server_url: String,

    /// `account/project` handle previews are scoped to
    pub full_handle: Option<String>,

    /// Multipart upload settings
    pub upload: UploadConfig,

    /// Artifact download settings
    pub download: DownloadConfig,

    /// Explicit tool locations
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            full_handle: None,
            upload: UploadConfig::default(),
            download: DownloadConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Overlay `FLIGHTDECK_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_SERVER_URL).ok(),
            std::env::var(ENV_FULL_HANDLE).ok(),
        );
    }

    /// Overlay explicit values, ignoring blanks
    pub fn apply_overrides(&mut self, server_url: Option<String>, full_handle: Option<String>) {
        if let Some(url) = server_url.filter(|v| !v.trim().is_empty()) {
            self.server_url = url;
        }
        if let Some(handle) = full_handle.filter(|v| !v.trim().is_empty()) {
            self.full_handle = Some(handle);
        }
    }
}

/// Multipart upload configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Bytes per part
    pub chunk_size: u64,

    /// Retries of the whole upload after the first attempt
    pub max_retries: u32,

    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,

    /// Timeout for each part upload in seconds
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_UPLOAD_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
        }
    }
}

/// Artifact download configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Timeout for a whole download in seconds
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
        }
    }
}

/// Tool overrides; unset entries are resolved from the Android SDK or PATH
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub adb: Option<PathBuf>,
    pub aapt2: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.upload.chunk_size, 10 * 1024 * 1024);
        assert_eq!(config.upload.max_retries, 2);
        assert!(config.full_handle.is_none());
    }

    #[test]
    fn test_overrides_ignore_blank() {
        let mut config = Config::default();
        config.apply_overrides(Some("  ".to_string()), Some("acme/app".to_string()));
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.full_handle.as_deref(), Some("acme/app"));
    }
}
