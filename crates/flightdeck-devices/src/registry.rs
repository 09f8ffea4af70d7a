//! Device enumeration across backends

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flightdeck_core::config::ToolsConfig;
use flightdeck_core::{CommandRunner, PlatformTag};
use tracing::{debug, info, warn};

use crate::backends::{AndroidAdapter, PhysicalDeviceAdapter, SimulatorAdapter};
use crate::device::Device;
use crate::error::{DeviceError, Result};

/// Which backends are registered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Backends {
    pub simulators: bool,
    pub physical_devices: bool,
    pub android: bool,
}

impl Backends {
    /// Platforms reachable through the registered backends
    pub fn platform_tags(&self) -> Vec<PlatformTag> {
        let mut tags = Vec::new();
        if self.physical_devices {
            tags.extend([
                PlatformTag::Ios,
                PlatformTag::Tvos,
                PlatformTag::Watchos,
                PlatformTag::Visionos,
            ]);
        }
        if self.simulators {
            tags.extend([
                PlatformTag::IosSimulator,
                PlatformTag::TvosSimulator,
                PlatformTag::WatchosSimulator,
                PlatformTag::VisionosSimulator,
            ]);
        }
        if self.android {
            tags.push(PlatformTag::Android);
        }
        tags
    }

    pub fn any(&self) -> bool {
        self.simulators || self.physical_devices || self.android
    }
}

/// Registered device backends
pub struct DeviceRegistry {
    runner: Arc<dyn CommandRunner>,
    simulators: Option<SimulatorAdapter>,
    physical_devices: Option<PhysicalDeviceAdapter>,
    android: Option<AndroidAdapter>,
}

impl DeviceRegistry {
    /// Registry with no backends
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            simulators: None,
            physical_devices: None,
            android: None,
        }
    }

    pub fn with_simulators(mut self, xcrun: impl Into<PathBuf>) -> Self {
        self.simulators = Some(SimulatorAdapter::new(self.runner.clone(), xcrun));
        self
    }

    pub fn with_physical_devices(mut self, xcrun: impl Into<PathBuf>) -> Self {
        self.physical_devices = Some(PhysicalDeviceAdapter::new(self.runner.clone(), xcrun));
        self
    }

    pub fn with_android(mut self, adb: impl Into<PathBuf>) -> Self {
        self.android = Some(AndroidAdapter::new(self.runner.clone(), adb));
        self
    }

    /// Register every backend whose tool is available on this host
    pub fn detect(runner: Arc<dyn CommandRunner>, tools: &ToolsConfig) -> Self {
        let mut registry = Self::new(runner);

        if cfg!(target_os = "macos") {
            match which::which("xcrun") {
                Ok(xcrun) => {
                    registry = registry
                        .with_simulators(xcrun.clone())
                        .with_physical_devices(xcrun);
                }
                Err(_) => debug!("xcrun not found, Apple backends disabled"),
            }
        }

        match flightdeck_stores::tools::resolve_adb(tools.adb.as_deref()) {
            Some(adb) => registry = registry.with_android(adb),
            None => debug!("adb not found, Android backend disabled"),
        }

        info!(backends = ?registry.backends(), "detected device backends");
        registry
    }

    pub fn backends(&self) -> Backends {
        Backends {
            simulators: self.simulators.is_some(),
            physical_devices: self.physical_devices.is_some(),
            android: self.android.is_some(),
        }
    }

    /// Devices of every backend, physical first.
    ///
    /// Backends are queried concurrently; one failing yields no devices for
    /// that backend and leaves the others alone.
    pub async fn list_devices(&self) -> Vec<Device> {
        let (physical, simulators, android) = tokio::join!(
            list_isolated("physical devices", self.physical_devices.as_ref().map(|a| a.list())),
            list_isolated("simulators", self.simulators.as_ref().map(|a| a.list())),
            list_isolated("android", self.android.as_ref().map(|a| a.list())),
        );

        let mut devices = physical;
        devices.extend(simulators);
        devices.extend(android);
        debug!(count = devices.len(), "listed devices");
        devices
    }

    pub async fn install(&self, device: &Device, binary: &Path) -> Result<()> {
        match device {
            Device::Simulator { .. } => self.simulator_adapter()?.install(device, binary).await,
            Device::PhysicalDevice { .. } => self.physical_adapter()?.install(device, binary).await,
            Device::AndroidDevice { .. } => self.android_adapter()?.install(device, binary).await,
        }
    }

    /// Launch `app_id` (bundle id or package name) on `device`
    pub async fn launch(&self, device: &Device, app_id: &str, arguments: &[String]) -> Result<()> {
        match device {
            Device::Simulator { .. } => {
                self.simulator_adapter()?
                    .launch(device, app_id, arguments)
                    .await
            }
            Device::PhysicalDevice { .. } => {
                if !arguments.is_empty() {
                    warn!("launch arguments are not forwarded to physical devices");
                }
                self.physical_adapter()?.launch(device, app_id).await
            }
            Device::AndroidDevice { .. } => self.android_adapter()?.launch(device, app_id).await,
        }
    }

    fn simulator_adapter(&self) -> Result<&SimulatorAdapter> {
        self.simulators.as_ref().ok_or_else(|| missing_backend("xcrun"))
    }

    fn physical_adapter(&self) -> Result<&PhysicalDeviceAdapter> {
        self.physical_devices
            .as_ref()
            .ok_or_else(|| missing_backend("xcrun"))
    }

    fn android_adapter(&self) -> Result<&AndroidAdapter> {
        self.android.as_ref().ok_or_else(|| missing_backend("adb"))
    }
}

fn missing_backend(tool: &str) -> DeviceError {
    DeviceError::ToolNotFound {
        tool: tool.to_string(),
        install_hint: "The backend for this device is not available on this host".to_string(),
    }
}

async fn list_isolated<F>(source: &str, listing: Option<F>) -> Vec<Device>
where
    F: std::future::Future<Output = Result<Vec<Device>>>,
{
    let Some(listing) = listing else {
        return Vec::new();
    };
    match listing.await {
        Ok(devices) => devices,
        Err(e) => {
            warn!(source, error = %e, "listing devices failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::testing::RecordingRunner;
    use crate::device::AndroidDeviceKind;
    use flightdeck_core::CommandOutput;

    const SIMCTL: &str = r#"{"devices": {"com.apple.CoreSimulator.SimRuntime.iOS-17-2": [
        {"udid": "SIM-1", "name": "iPhone 15 Pro", "state": "Booted", "isAvailable": true}
    ]}}"#;

    #[test]
    fn test_backend_platform_tags() {
        let android_only = Backends {
            android: true,
            ..Default::default()
        };
        assert_eq!(android_only.platform_tags(), vec![PlatformTag::Android]);
        assert!(!Backends::default().any());

        let apple = Backends {
            simulators: true,
            physical_devices: true,
            android: false,
        };
        assert!(apple.platform_tags().contains(&PlatformTag::VisionosSimulator));
        assert!(!apple.platform_tags().contains(&PlatformTag::Android));
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let runner = RecordingRunner::new(|spec| match spec.args.first().map(String::as_str) {
            Some("simctl") => Ok(CommandOutput::ok(SIMCTL)),
            Some("devicectl") => Ok(CommandOutput::failed(1, "devicectl exploded")),
            _ => Ok(CommandOutput::ok(
                "List of devices attached\nemulator-5554 device model:Pixel_8\n",
            )),
        });
        let registry = DeviceRegistry::new(runner)
            .with_simulators("xcrun")
            .with_physical_devices("xcrun")
            .with_android("adb");

        let devices = registry.list_devices().await;
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name(), "iPhone 15 Pro");
        assert_eq!(
            devices[1],
            Device::AndroidDevice {
                id: "emulator-5554".into(),
                name: "Pixel 8".into(),
                kind: AndroidDeviceKind::Emulator,
            }
        );
    }

    #[tokio::test]
    async fn test_missing_tool_yields_empty_list() {
        let runner = RecordingRunner::new(|_| {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no adb"))
        });
        let registry = DeviceRegistry::new(runner).with_android("/nowhere/adb");
        assert!(registry.list_devices().await.is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_backend_cannot_install() {
        let runner = RecordingRunner::new(|_| Ok(CommandOutput::ok("")));
        let registry = DeviceRegistry::new(runner.clone());
        let device = Device::AndroidDevice {
            id: "emulator-5554".into(),
            name: "Pixel 8".into(),
            kind: AndroidDeviceKind::Emulator,
        };

        let err = registry
            .install(&device, Path::new("/tmp/app.apk"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::ToolNotFound { .. }));
        assert!(runner.commands().is_empty());
    }
}
