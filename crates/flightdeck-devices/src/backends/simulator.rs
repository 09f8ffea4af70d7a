//! Apple simulators through `xcrun simctl`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flightdeck_core::{CommandRunner, CommandSpec, PlatformTag};
use tracing::{debug, info, instrument};

use super::run_checked;
use crate::device::Device;
use crate::error::{DeviceError, Result};

const INSTALL_HINT: &str = "Install Xcode and run `xcode-select --install`";

/// Boots, installs on and launches simulators
pub struct SimulatorAdapter {
    runner: Arc<dyn CommandRunner>,
    xcrun: PathBuf,
}

impl SimulatorAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>, xcrun: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            xcrun: xcrun.into(),
        }
    }

    fn simctl(&self) -> CommandSpec {
        CommandSpec::new(&self.xcrun).arg("simctl")
    }

    /// Available simulators of every installed runtime
    pub async fn list(&self) -> Result<Vec<Device>> {
        let spec = self.simctl().args(["list", "devices", "--json"]);
        let output = run_checked(self.runner.as_ref(), &spec, INSTALL_HINT).await?;
        parse_simctl_devices(&output.stdout)
    }

    /// Boot the simulator unless it already is
    #[instrument(skip(self))]
    pub async fn boot(&self, udid: &str, booted: bool) -> Result<()> {
        if booted {
            debug!(udid, "simulator already booted");
            return Ok(());
        }

        info!(udid, "booting simulator");
        let spec = self.simctl().args(["boot", udid]);
        match run_checked(self.runner.as_ref(), &spec, INSTALL_HINT).await {
            Ok(_) => Ok(()),
            // Booted between listing and now
            Err(DeviceError::CommandFailed { stderr, .. }) if stderr.contains("current state: Booted") => {
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn install(&self, device: &Device, app: &Path) -> Result<()> {
        if let Device::Simulator { id, booted, .. } = device {
            self.boot(id, *booted).await?;
        }
        let spec = self
            .simctl()
            .args(["install", device.id()])
            .path_arg(app);
        run_checked(self.runner.as_ref(), &spec, INSTALL_HINT)
            .await
            .map_err(|e| DeviceError::InstallFailed {
                device: device.name().to_string(),
                message: e.detail(),
            })?;
        Ok(())
    }

    /// Launch by bundle id, forwarding `arguments` to the app
    pub async fn launch(&self, device: &Device, bundle_id: &str, arguments: &[String]) -> Result<()> {
        let spec = self
            .simctl()
            .args(["launch", device.id(), bundle_id])
            .args(arguments.iter().cloned());
        run_checked(self.runner.as_ref(), &spec, INSTALL_HINT)
            .await
            .map_err(|e| DeviceError::LaunchFailed {
                device: device.name().to_string(),
                message: e.detail(),
            })?;
        Ok(())
    }
}

/// Map a CoreSimulator runtime key such as
/// `com.apple.CoreSimulator.SimRuntime.iOS-17-2` to a platform
pub fn runtime_platform(runtime: &str) -> Option<PlatformTag> {
    let name = runtime.rsplit('.').next()?;
    let os = name.split('-').next()?;
    match os {
        "iOS" => Some(PlatformTag::IosSimulator),
        "tvOS" => Some(PlatformTag::TvosSimulator),
        "watchOS" => Some(PlatformTag::WatchosSimulator),
        "xrOS" | "visionOS" => Some(PlatformTag::VisionosSimulator),
        _ => None,
    }
}

/// Parse `simctl list devices --json`
pub fn parse_simctl_devices(output: &str) -> Result<Vec<Device>> {
    let json: serde_json::Value =
        serde_json::from_str(output).map_err(|e| DeviceError::Parse {
            context: "simctl output".to_string(),
            message: e.to_string(),
        })?;

    let mut devices = Vec::new();

    if let Some(device_map) = json.get("devices").and_then(|d| d.as_object()) {
        for (runtime, runtime_devices) in device_map {
            let Some(platform) = runtime_platform(runtime) else {
                continue;
            };
            let Some(device_list) = runtime_devices.as_array() else {
                continue;
            };

            for device in device_list {
                if let (Some(udid), Some(name), Some(state)) = (
                    device.get("udid").and_then(|v| v.as_str()),
                    device.get("name").and_then(|v| v.as_str()),
                    device.get("state").and_then(|v| v.as_str()),
                ) {
                    let is_available = device
                        .get("isAvailable")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(true);

                    if is_available {
                        devices.push(Device::Simulator {
                            id: udid.to_string(),
                            name: name.to_string(),
                            platform,
                            booted: state == "Booted",
                        });
                    }
                }
            }
        }
    }

    Ok(devices)
}
