//! Device control backends
//!
//! Each backend wraps one tool: `simctl` for simulators, `devicectl` for
//! physical Apple devices and `adb` for Android.

pub mod android;
pub mod physical;
pub mod simulator;

pub use android::AndroidAdapter;
pub use physical::PhysicalDeviceAdapter;
pub use simulator::SimulatorAdapter;

use flightdeck_core::{CommandOutput, CommandRunner, CommandSpec};

use crate::error::{DeviceError, Result};

/// Run a command, failing on spawn errors and non-zero exits
pub(crate) async fn run_checked(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    install_hint: &str,
) -> Result<CommandOutput> {
    let output = runner.run(spec).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DeviceError::ToolNotFound {
                tool: spec.program_name(),
                install_hint: install_hint.to_string(),
            }
        } else {
            DeviceError::Io(e)
        }
    })?;

    if !output.success {
        return Err(DeviceError::command_failed(spec.display(), &output));
    }
    Ok(output)
}
