//! CLI definition and command handling

pub mod commands;
pub mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use flightdeck_core::config::{load_effective_config, validate_config};
use flightdeck_core::Config;
use tracing::debug;

use commands::{CompletionsCommand, DevicesCommand, RunCommand, ShareCommand};

/// Flightdeck - share app previews and run them on devices
#[derive(Debug, Parser)]
#[command(name = "flightdeck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload builds as a shareable preview
    Share(ShareCommand),

    /// Download a preview and run it on a simulator or device
    Run(RunCommand),

    /// List simulators and devices previews can run on
    Devices(DevicesCommand),

    /// Generate shell completions
    Completions(CompletionsCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)
                .with_context(|| format!("cannot change to {}", dir.display()))?;
        }

        match self.command {
            Commands::Share(ref cmd) => cmd.execute(&self),
            Commands::Run(ref cmd) => cmd.execute(&self),
            Commands::Devices(ref cmd) => cmd.execute(&self),
            Commands::Completions(ref cmd) => cmd.execute(&self),
        }
    }

    /// Whether human-readable progress and messages should be printed
    pub fn interactive_output(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }

    /// Effective configuration with command-line overrides applied
    pub fn load_config(
        &self,
        server_url: Option<String>,
        full_handle: Option<String>,
    ) -> anyhow::Result<Config> {
        let cwd = std::env::current_dir()?;
        let (mut config, path) = load_effective_config(&cwd)?;
        if let Some(path) = &path {
            debug!(path = %path.display(), "loaded configuration");
        }

        config.apply_overrides(server_url, full_handle);
        validate_config(&config)?;
        Ok(config)
    }
}
