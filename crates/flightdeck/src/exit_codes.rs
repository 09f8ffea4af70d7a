//! Exit codes for the CLI

use flightdeck_core::FlightdeckError;
use flightdeck_devices::DeviceError;
use flightdeck_stores::StoreError;

/// Success
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// Preview, device or binary could not be found
pub const NOT_FOUND: i32 = 3;

/// Server rejected the request or credentials
pub const SERVER_ERROR: i32 = 4;

/// Install or launch on the device failed
pub const DEVICE_ERROR: i32 = 5;

/// Required tool missing
pub const TOOL_MISSING: i32 = 6;

/// User cancelled
pub const CANCELLED: i32 = 130;

/// The run was interrupted with Ctrl-C
#[derive(Debug, thiserror::Error)]
#[error("Interrupted")]
pub struct Interrupted;

/// Exit code for a failed command
pub fn for_error(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<Interrupted>().is_some() {
        return CANCELLED;
    }
    if let Some(e) = err.downcast_ref::<DeviceError>() {
        return device_code(e);
    }
    if let Some(e) = err.downcast_ref::<StoreError>() {
        return store_code(e);
    }
    if let Some(FlightdeckError::Config(_)) = err.downcast_ref::<FlightdeckError>() {
        return CONFIG_ERROR;
    }
    ERROR
}

fn device_code(err: &DeviceError) -> i32 {
    match err {
        DeviceError::Store(e) => store_code(e),
        DeviceError::Core(FlightdeckError::Config(_)) => CONFIG_ERROR,
        DeviceError::AppNotFound { .. }
        | DeviceError::AppBundleNotFoundInArchive(_)
        | DeviceError::ApkNotFoundInArchive(_)
        | DeviceError::DeviceNotFound(_)
        | DeviceError::NoDevicesFound => NOT_FOUND,
        DeviceError::AppDownloadFailed { .. } => SERVER_ERROR,
        DeviceError::NoCompatibleAppBuild { .. }
        | DeviceError::MissingPackageName { .. }
        | DeviceError::InstallFailed { .. }
        | DeviceError::LaunchFailed { .. } => DEVICE_ERROR,
        DeviceError::ToolNotFound { .. } => TOOL_MISSING,
        DeviceError::Prompt(_) => CANCELLED,
        _ => ERROR,
    }
}

fn store_code(err: &StoreError) -> i32 {
    match err {
        StoreError::Core(FlightdeckError::Config(_))
        | StoreError::ConfigurationError(_)
        | StoreError::MissingFullHandle => CONFIG_ERROR,
        StoreError::PreviewNotFound(_) | StoreError::InvalidPreviewUrl(_) => NOT_FOUND,
        StoreError::AuthenticationFailed(_)
        | StoreError::ApiError { .. }
        | StoreError::RateLimited { .. }
        | StoreError::Http(_) => SERVER_ERROR,
        StoreError::ToolNotFound(_) => TOOL_MISSING,
        _ => ERROR,
    }
}
