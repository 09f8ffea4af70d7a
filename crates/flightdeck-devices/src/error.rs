//! Error types for running previews on devices

use std::path::PathBuf;

use flightdeck_core::PlatformTag;
use flightdeck_stores::StoreError;
use thiserror::Error;

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Device and run errors
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Preview has no build, or a build has no download URL
    #[error("No app build found in preview {preview}")]
    AppNotFound { preview: String },

    /// Download failed or produced nothing
    #[error("Downloading the app from {url} failed: {message}")]
    AppDownloadFailed { url: String, message: String },

    #[error("No .app bundle found in the downloaded archive at {}", .0.display())]
    AppBundleNotFoundInArchive(PathBuf),

    #[error("No .apk found in the downloaded archive at {}", .0.display())]
    ApkNotFoundInArchive(PathBuf),

    /// Android preview without a package name
    #[error("Preview {preview} has no bundle identifier to launch")]
    MissingPackageName { preview: String },

    /// Explicit device argument matched nothing
    #[error("No device named or identified by '{0}' found")]
    DeviceNotFound(String),

    #[error("No devices found. Boot a simulator or connect a device and try again")]
    NoDevicesFound,

    /// Selected device cannot run any build of the preview
    #[error("{device} cannot run this preview (it supports {})", format_platforms(.supported))]
    NoCompatibleAppBuild {
        device: String,
        supported: Vec<PlatformTag>,
    },

    #[error("Installing on {device} failed: {message}")]
    InstallFailed { device: String, message: String },

    #[error("Launching on {device} failed: {message}")]
    LaunchFailed { device: String, message: String },

    /// Required tool not installed
    #[error("Required tool '{tool}' not found. {install_hint}")]
    ToolNotFound { tool: String, install_hint: String },

    /// Command execution failed
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// Interactive selection failed or was aborted
    #[error("Device selection failed: {0}")]
    Prompt(String),

    /// Output of a tool could not be understood
    #[error("Failed to parse {context}: {message}")]
    Parse { context: String, message: String },

    /// Server or upload error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Error from the core crate
    #[error(transparent)]
    Core(#[from] flightdeck_core::FlightdeckError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_platforms(platforms: &[PlatformTag]) -> String {
    if platforms.is_empty() {
        return "no platforms".to_string();
    }
    platforms
        .iter()
        .map(|p| p.display_name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl DeviceError {
    /// Error for a subprocess that ran but failed
    pub fn command_failed(command: impl Into<String>, output: &flightdeck_core::CommandOutput) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code: output.exit_code,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
        }
    }

    /// Best single-line description of a failed command
    pub fn detail(&self) -> String {
        match self {
            Self::CommandFailed { stderr, stdout, .. } => {
                let text = if stderr.trim().is_empty() { stdout } else { stderr };
                text.trim().lines().last().unwrap_or("").to_string()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_message_lists_platforms() {
        let err = DeviceError::NoCompatibleAppBuild {
            device: "Pixel 8".into(),
            supported: vec![PlatformTag::Ios, PlatformTag::IosSimulator],
        };
        assert_eq!(
            err.to_string(),
            "Pixel 8 cannot run this preview (it supports iOS, iOS Simulator)"
        );
    }

    #[test]
    fn test_store_errors_pass_through() {
        let err: DeviceError = StoreError::InvalidPreviewUrl("https://x".into()).into();
        assert_eq!(err.to_string(), "Invalid preview URL: https://x");
    }

    #[test]
    fn test_detail_prefers_stderr() {
        let output = flightdeck_core::CommandOutput {
            success: false,
            exit_code: Some(1),
            stdout: "Performing Streamed Install".into(),
            stderr: "adb: failed to install\nFailure [INSTALL_FAILED_OLDER_SDK]\n".into(),
        };
        let err = DeviceError::command_failed("adb install", &output);
        assert_eq!(err.detail(), "Failure [INSTALL_FAILED_OLDER_SDK]");
    }
}
