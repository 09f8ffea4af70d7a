//! Interactive device selection

use async_trait::async_trait;
use console::Term;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use flightdeck_devices::{Device, DeviceError, DevicePrompter};
use indicatif::ProgressBar;

/// Picks a device with a terminal menu.
///
/// The menu runs on the blocking pool so the run can still be interrupted
/// while it is open. Rendering of `spinner` is paused meanwhile.
pub struct TerminalPrompter {
    spinner: ProgressBar,
}

impl TerminalPrompter {
    pub fn new(spinner: ProgressBar) -> Self {
        Self { spinner }
    }
}

#[async_trait]
impl DevicePrompter for TerminalPrompter {
    async fn choose(&self, devices: &[Device], default: Option<usize>) -> flightdeck_devices::Result<usize> {
        if !Term::stderr().is_term() {
            return Err(DeviceError::Prompt(
                "several devices are available; pass --device to pick one".to_string(),
            ));
        }

        let labels: Vec<String> = devices.iter().map(Device::label).collect();
        let spinner = self.spinner.clone();
        let selection = tokio::task::spawn_blocking(move || {
            spinner.suspend(|| select_index(&labels, default.unwrap_or(0)))
        })
        .await
        .map_err(|e| DeviceError::Prompt(e.to_string()))?;

        selection?.ok_or_else(|| DeviceError::Prompt("selection cancelled".to_string()))
    }
}

/// Blocking menu; `None` when the user backs out
fn select_index(labels: &[String], default: usize) -> flightdeck_devices::Result<Option<usize>> {
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a device")
        .items(labels)
        .default(default)
        .interact_opt();

    match selection {
        Ok(index) => Ok(index),
        // ctrl-c in raw mode arrives as an interrupted read
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(DeviceError::Prompt(e.to_string())),
    }
}
