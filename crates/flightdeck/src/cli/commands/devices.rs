//! Device listing command

use std::sync::Arc;

use clap::Args;
use console::style;
use flightdeck_core::SystemCommandRunner;
use flightdeck_devices::{Device, DeviceKind, DeviceRegistry};
use serde::Serialize;
use tracing::info;

use crate::cli::{output, Cli, OutputFormat};

/// List simulators and devices
#[derive(Debug, Args)]
pub struct DevicesCommand {
    /// Only show devices a preview can run on right away
    #[arg(long)]
    pub ready: bool,
}

#[derive(Debug, Serialize)]
struct DeviceEntry<'a> {
    kind: DeviceKind,
    id: &'a str,
    name: &'a str,
    ready: bool,
    platforms: Vec<&'static str>,
}

impl<'a> From<&'a Device> for DeviceEntry<'a> {
    fn from(device: &'a Device) -> Self {
        Self {
            kind: device.kind(),
            id: device.id(),
            name: device.name(),
            ready: device.is_ready(),
            platforms: device.platform_tags().iter().map(|p| p.as_str()).collect(),
        }
    }
}

impl DevicesCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(ready = self.ready, "listing devices");
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let config = cli.load_config(None, None)?;
        let registry = DeviceRegistry::detect(Arc::new(SystemCommandRunner), &config.tools);

        if !registry.backends().any() && cli.format == OutputFormat::Text {
            output::warning("No device tooling found. Install Xcode or the Android SDK platform-tools");
        }

        let devices: Vec<Device> = registry
            .list_devices()
            .await
            .into_iter()
            .filter(|d| !self.ready || d.is_ready())
            .collect();

        match cli.format {
            OutputFormat::Json => {
                let entries: Vec<DeviceEntry> = devices.iter().map(DeviceEntry::from).collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            }
            OutputFormat::Text => print_devices(&devices),
        }

        Ok(())
    }
}

fn print_devices(devices: &[Device]) {
    if devices.is_empty() {
        output::info("No devices found");
        return;
    }

    println!("{}", output::header("Devices"));
    for device in devices {
        let marker = if device.is_ready() {
            style("●").green()
        } else {
            style("○").dim()
        };
        println!(
            "  {} {}  {}",
            marker,
            output::name_style().apply_to(device.label()),
            style(device.id()).dim()
        );
    }
}
