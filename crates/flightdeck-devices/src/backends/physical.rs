//! Physical Apple devices through `xcrun devicectl`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flightdeck_core::{CommandRunner, CommandSpec, PlatformTag};
use serde::Deserialize;
use tracing::debug;

use super::run_checked;
use crate::device::{ConnectionState, Device};
use crate::error::{DeviceError, Result};

const INSTALL_HINT: &str = "Install Xcode 15 or newer, which ships devicectl";

#[derive(Debug, Deserialize)]
struct DevicectlOutput {
    result: DevicectlResult,
}

#[derive(Debug, Deserialize)]
struct DevicectlResult {
    #[serde(default)]
    devices: Vec<DevicectlDevice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevicectlDevice {
    identifier: String,
    device_properties: DeviceProperties,
    hardware_properties: HardwareProperties,
    #[serde(default)]
    connection_properties: ConnectionProperties,
}

#[derive(Debug, Deserialize)]
struct DeviceProperties {
    name: String,
}

#[derive(Debug, Deserialize)]
struct HardwareProperties {
    platform: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionProperties {
    tunnel_state: Option<String>,
}

/// Installs on and launches connected iPhones, iPads, TVs and headsets
pub struct PhysicalDeviceAdapter {
    runner: Arc<dyn CommandRunner>,
    xcrun: PathBuf,
}

impl PhysicalDeviceAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>, xcrun: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            xcrun: xcrun.into(),
        }
    }

    fn devicectl(&self) -> CommandSpec {
        CommandSpec::new(&self.xcrun).arg("devicectl")
    }

    /// Paired devices; devicectl only writes JSON to a file
    pub async fn list(&self) -> Result<Vec<Device>> {
        let output_file = tempfile::Builder::new()
            .prefix("devicectl-")
            .suffix(".json")
            .tempfile()?;

        let spec = self
            .devicectl()
            .args(["list", "devices", "--json-output"])
            .path_arg(output_file.path());
        run_checked(self.runner.as_ref(), &spec, INSTALL_HINT).await?;

        let json = tokio::fs::read_to_string(output_file.path()).await?;
        parse_devicectl_devices(&json)
    }

    pub async fn install(&self, device: &Device, app: &Path) -> Result<()> {
        let spec = self
            .devicectl()
            .args(["device", "install", "app", "--device", device.id()])
            .path_arg(app);
        run_checked(self.runner.as_ref(), &spec, INSTALL_HINT)
            .await
            .map_err(|e| DeviceError::InstallFailed {
                device: device.name().to_string(),
                message: e.detail(),
            })?;
        Ok(())
    }

    /// Launch by bundle id; devicectl does not forward launch arguments here
    pub async fn launch(&self, device: &Device, bundle_id: &str) -> Result<()> {
        let spec = self
            .devicectl()
            .args(["device", "process", "launch", "--device", device.id(), bundle_id]);
        run_checked(self.runner.as_ref(), &spec, INSTALL_HINT)
            .await
            .map_err(|e| DeviceError::LaunchFailed {
                device: device.name().to_string(),
                message: e.detail(),
            })?;
        Ok(())
    }
}

fn hardware_platform(platform: &str) -> Option<PlatformTag> {
    match platform {
        "iOS" | "iPadOS" => Some(PlatformTag::Ios),
        "tvOS" => Some(PlatformTag::Tvos),
        "watchOS" => Some(PlatformTag::Watchos),
        "xrOS" | "visionOS" => Some(PlatformTag::Visionos),
        _ => None,
    }
}

/// Parse the JSON written by `devicectl list devices --json-output`
pub fn parse_devicectl_devices(json: &str) -> Result<Vec<Device>> {
    let output: DevicectlOutput = serde_json::from_str(json).map_err(|e| DeviceError::Parse {
        context: "devicectl output".to_string(),
        message: e.to_string(),
    })?;

    Ok(output
        .result
        .devices
        .into_iter()
        .filter_map(|device| {
            let Some(platform) = hardware_platform(&device.hardware_properties.platform) else {
                debug!(platform = %device.hardware_properties.platform, "skipping unsupported device platform");
                return None;
            };
            let connection_state = match device.connection_properties.tunnel_state.as_deref() {
                Some("connected") => ConnectionState::Connected,
                _ => ConnectionState::Disconnected,
            };
            Some(Device::PhysicalDevice {
                id: device.identifier,
                name: device.device_properties.name,
                platform,
                connection_state,
            })
        })
        .collect())
}
