//! Android emulators and devices through `adb`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flightdeck_core::{CommandRunner, CommandSpec};
use tracing::{debug, instrument};

use super::run_checked;
use crate::device::{AndroidDeviceKind, Device};
use crate::error::{DeviceError, Result};

const INSTALL_HINT: &str = "Install the Android SDK platform-tools and set ANDROID_HOME";

/// Installs on and launches Android targets
pub struct AndroidAdapter {
    runner: Arc<dyn CommandRunner>,
    adb: PathBuf,
}

impl AndroidAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>, adb: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            adb: adb.into(),
        }
    }

    fn adb(&self, serial: &str) -> CommandSpec {
        CommandSpec::new(&self.adb).args(["-s", serial])
    }

    /// Devices in the `device` state
    pub async fn list(&self) -> Result<Vec<Device>> {
        let spec = CommandSpec::new(&self.adb).args(["devices", "-l"]);
        let output = run_checked(self.runner.as_ref(), &spec, INSTALL_HINT).await?;
        Ok(parse_adb_devices(&output.stdout))
    }

    /// Install with replace semantics
    pub async fn install(&self, device: &Device, apk: &Path) -> Result<()> {
        let spec = self.adb(device.id()).args(["install", "-r"]).path_arg(apk);
        let install_failed = |message: String| DeviceError::InstallFailed {
            device: device.name().to_string(),
            message,
        };

        let output = run_checked(self.runner.as_ref(), &spec, INSTALL_HINT)
            .await
            .map_err(|e| install_failed(e.detail()))?;

        if let Some(failure) = output.stdout.lines().find(|l| l.starts_with("Failure")) {
            return Err(install_failed(failure.trim().to_string()));
        }
        Ok(())
    }

    /// Resolve the launcher activity of `package` and start it
    #[instrument(skip(self, device), fields(serial = %device.id()))]
    pub async fn launch(&self, device: &Device, package: &str) -> Result<()> {
        let launch_failed = |message: String| DeviceError::LaunchFailed {
            device: device.name().to_string(),
            message,
        };

        let resolve = self.adb(device.id()).args([
            "shell",
            "cmd",
            "package",
            "resolve-activity",
            "--brief",
            "-a",
            "android.intent.action.MAIN",
            "-c",
            "android.intent.category.LAUNCHER",
            package,
        ]);
        let output = run_checked(self.runner.as_ref(), &resolve, INSTALL_HINT)
            .await
            .map_err(|e| launch_failed(e.detail()))?;

        let component = launcher_component(&output.stdout).ok_or_else(|| {
            launch_failed(format!("no launcher activity found for {}", package))
        })?;
        debug!(component = %component, "resolved launcher activity");

        let start = self.adb(device.id()).args(["shell", "am", "start", "-n", component.as_str()]);
        let output = run_checked(self.runner.as_ref(), &start, INSTALL_HINT)
            .await
            .map_err(|e| launch_failed(e.detail()))?;

        // am reports some failures on a zero exit status
        if let Some(error) = output
            .stdout
            .lines()
            .chain(output.stderr.lines())
            .find(|l| l.trim_start().starts_with("Error"))
        {
            return Err(launch_failed(error.trim().to_string()));
        }
        Ok(())
    }
}

/// Parse `adb devices -l`; only rows in the `device` state count
pub fn parse_adb_devices(output: &str) -> Vec<Device> {
    output
        .lines()
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let serial = columns.next()?;
            let state = columns.next()?;
            if state != "device" {
                return None;
            }

            let model = columns
                .find_map(|c| c.strip_prefix("model:"))
                .map(|m| m.replace('_', " "));

            let kind = if serial.starts_with("emulator-") {
                AndroidDeviceKind::Emulator
            } else {
                AndroidDeviceKind::Device
            };

            Some(Device::AndroidDevice {
                id: serial.to_string(),
                name: model.unwrap_or_else(|| serial.to_string()),
                kind,
            })
        })
        .collect()
}

/// The last non-empty line naming a component (`package/activity`)
pub fn launcher_component(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.contains('/'))
        .last()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::testing::RecordingRunner;
    use flightdeck_core::CommandOutput;

    const ADB_DEVICES: &str = "\
* daemon started successfully
List of devices attached
emulator-5554          device product:sdk_gphone64_arm64 model:sdk_gphone64_arm64 device:emu64a transport_id:1
R58M123ABC             device usb:1-1 product:p3sxeea model:SM_G998B device:p3s transport_id:3
0A1B2C3D               unauthorized usb:1-2 transport_id:2
emulator-5556          offline transport_id:4

";

    fn emulator() -> Device {
        Device::AndroidDevice {
            id: "emulator-5554".into(),
            name: "sdk gphone64 arm64".into(),
            kind: AndroidDeviceKind::Emulator,
        }
    }

    #[test]
    fn test_parse_adb_devices() {
        let devices = parse_adb_devices(ADB_DEVICES);
        assert_eq!(
            devices,
            vec![
                emulator(),
                Device::AndroidDevice {
                    id: "R58M123ABC".into(),
                    name: "SM G998B".into(),
                    kind: AndroidDeviceKind::Device,
                },
            ]
        );
    }

    #[test]
    fn test_launcher_component() {
        let output = "priority=0 preferredOrder=0 match=0x108000 specificIndex=-1 isDefault=true\n\
                      dev.example.app/.MainActivity\n\n";
        assert_eq!(
            launcher_component(output).as_deref(),
            Some("dev.example.app/.MainActivity")
        );
        assert_eq!(launcher_component("No activity found\n"), None);
        assert_eq!(launcher_component(""), None);
    }

    #[tokio::test]
    async fn test_launch_resolves_activity_first() {
        let runner = RecordingRunner::new(|spec| {
            if spec.args.contains(&"resolve-activity".to_string()) {
                Ok(CommandOutput::ok(
                    "priority=0 preferredOrder=0\ndev.example.app/.MainActivity\n",
                ))
            } else {
                Ok(CommandOutput::ok("Starting: Intent { cmp=dev.example.app/.MainActivity }"))
            }
        });
        let adapter = AndroidAdapter::new(runner.clone(), "adb");

        adapter.launch(&emulator(), "dev.example.app").await.unwrap();

        let commands = runner.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].ends_with(
            "resolve-activity --brief -a android.intent.action.MAIN -c android.intent.category.LAUNCHER dev.example.app"
        ));
        assert_eq!(
            commands[1],
            "adb -s emulator-5554 shell am start -n dev.example.app/.MainActivity"
        );
    }

    #[tokio::test]
    async fn test_unresolvable_activity_is_launch_failure() {
        let runner = RecordingRunner::new(|_| Ok(CommandOutput::ok("No activity found\n")));
        let adapter = AndroidAdapter::new(runner.clone(), "adb");

        let err = adapter.launch(&emulator(), "dev.example.app").await.unwrap_err();
        assert!(matches!(err, DeviceError::LaunchFailed { .. }));
        assert_eq!(runner.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_install_replaces_and_detects_failure() {
        let runner = RecordingRunner::new(|_| {
            Ok(CommandOutput::ok(
                "Performing Streamed Install\nFailure [INSTALL_FAILED_INSUFFICIENT_STORAGE]\n",
            ))
        });
        let adapter = AndroidAdapter::new(runner.clone(), "adb");

        let err = adapter
            .install(&emulator(), Path::new("/tmp/app.apk"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, DeviceError::InstallFailed { ref message, .. } if message.contains("INSUFFICIENT_STORAGE"))
        );
        assert_eq!(
            runner.commands(),
            vec!["adb -s emulator-5554 install -r /tmp/app.apk"]
        );
    }
}
