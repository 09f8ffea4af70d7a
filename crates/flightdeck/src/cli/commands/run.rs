//! Run command

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgGroup, Args};
use flightdeck_core::{FileSettingsStore, SystemCommandRunner};
use flightdeck_devices::{
    DeviceRegistry, HttpArtifactDownloader, RunOrchestrator, RunOutcome, RunRequest,
};
use flightdeck_stores::{PreviewReference, PreviewResolver, ServerClientProvider};
use tracing::{info, warn};
use url::Url;

use crate::cli::output::{self, SpinnerReporter, TerminalPrompter};
use crate::cli::{Cli, OutputFormat};
use crate::exit_codes::Interrupted;

/// Download a preview and run it on a simulator or device
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("preview").required(true).args(["reference", "id"])))]
pub struct RunCommand {
    /// Preview link, or a display name with an optional @specifier (e.g. App@latest)
    pub reference: Option<String>,

    /// Preview id within the project
    #[arg(long)]
    pub id: Option<String>,

    /// Device name or id; prompts when several are available
    #[arg(short, long)]
    pub device: Option<String>,

    /// Project handle (account/project)
    #[arg(long, env = "FLIGHTDECK_FULL_HANDLE")]
    pub handle: Option<String>,

    /// Server URL
    #[arg(long, env = "FLIGHTDECK_SERVER_URL")]
    pub server_url: Option<String>,

    /// Arguments passed to the app on launch
    #[arg(last = true)]
    pub launch_arguments: Vec<String>,
}

impl RunCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(reference = ?self.reference, id = ?self.id, device = ?self.device, "executing run command");
        let runtime = tokio::runtime::Runtime::new()?;
        let result = runtime.block_on(self.execute_async(cli));
        // An interrupted device menu still holds a blocking thread
        runtime.shutdown_background();
        result
    }

    fn preview_reference(&self) -> anyhow::Result<PreviewReference> {
        match (&self.id, &self.reference) {
            (Some(id), _) => Ok(PreviewReference::Id(id.clone())),
            (None, Some(reference)) => Ok(PreviewReference::parse(reference)),
            (None, None) => anyhow::bail!("pass a preview link, name or --id"),
        }
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        let config = cli.load_config(self.server_url.clone(), self.handle.clone())?;
        let request = RunRequest {
            reference: self.preview_reference()?,
            device: self.device.clone(),
            launch_arguments: self.launch_arguments.clone(),
        };

        let registry = DeviceRegistry::detect(Arc::new(SystemCommandRunner), &config.tools);
        if !registry.backends().any() {
            anyhow::bail!("No device tooling found. Install Xcode or the Android SDK platform-tools");
        }

        let server_url = Url::parse(&config.server_url)
            .with_context(|| format!("invalid server URL {}", config.server_url))?;
        let resolver = PreviewResolver::new(
            Arc::new(ServerClientProvider::from_config(&config)),
            server_url,
            config.full_handle.clone(),
        );
        let downloader = HttpArtifactDownloader::new(Duration::from_secs(
            config.download.timeout_secs,
        ))?;
        let settings = FileSettingsStore::default_location()?;

        let reporter = SpinnerReporter::new(cli.interactive_output());
        let prompter = TerminalPrompter::new(reporter.bar().clone());
        let orchestrator = RunOrchestrator::new(
            resolver,
            registry,
            Arc::new(downloader),
            Arc::new(prompter),
            Arc::new(settings),
        )
        .with_reporter(Arc::new(reporter.clone()));

        // Dropping the run future kills any child process it spawned
        let result = tokio::select! {
            result = orchestrator.run(&request) => result.map_err(anyhow::Error::from),
            _ = tokio::signal::ctrl_c() => {
                warn!("run interrupted");
                let _ = console::Term::stderr().show_cursor();
                Err(anyhow::Error::new(Interrupted))
            }
        };
        reporter.finish();

        let outcome = result?;
        self.report(cli, &outcome)
    }

    fn report(&self, cli: &Cli, outcome: &RunOutcome) -> anyhow::Result<()> {
        match cli.format {
            OutputFormat::Json => {
                let summary = serde_json::json!({
                    "preview_id": outcome.preview.id,
                    "preview_url": outcome.preview.url,
                    "device": {
                        "kind": outcome.device.kind(),
                        "id": outcome.device.id(),
                        "name": outcome.device.name(),
                    },
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            OutputFormat::Text if !cli.quiet => {
                let name = outcome
                    .preview
                    .display_name
                    .as_deref()
                    .unwrap_or(&outcome.preview.id);
                output::success(&format!(
                    "Launched {} on {}",
                    output::name_style().apply_to(name),
                    output::name_style().apply_to(outcome.device.name())
                ));
                if cli.verbose {
                    println!("{}", output::key_value("Preview", &outcome.preview.url));
                    println!("{}", output::key_value("Device", &outcome.device.label()));
                }
            }
            OutputFormat::Text => {}
        }
        Ok(())
    }
}
