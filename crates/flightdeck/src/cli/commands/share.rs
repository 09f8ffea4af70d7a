//! Share command

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use flightdeck_core::{PlatformTag, Preview, SystemCommandRunner};
use flightdeck_stores::tools::resolve_aapt2;
use flightdeck_stores::{
    ArtifactInspector, ArtifactMultipartUploader, HttpPartUploader,
    PreviewUploadPipeline, ServerClient, ShareOptions, StoreError, UploadSettings,
};
use tracing::{debug, info};

use crate::cli::{output, Cli, OutputFormat};

/// Upload one or more builds as a preview
#[derive(Debug, Args)]
pub struct ShareCommand {
    /// Builds to share (.ipa, .apk or .app)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Display name shown for the preview
    #[arg(long)]
    pub display_name: Option<String>,

    /// Marketing version, e.g. 1.2.0
    #[arg(long = "version")]
    pub app_version: Option<String>,

    /// Build number
    #[arg(long)]
    pub build_version: Option<String>,

    /// Bundle identifier or Android package name
    #[arg(long)]
    pub bundle_identifier: Option<String>,

    /// Platforms the builds support, comma separated (e.g. ios,ios_simulator)
    #[arg(long, value_delimiter = ',', value_parser = parse_platform)]
    pub platforms: Vec<PlatformTag>,

    /// Release track, e.g. beta
    #[arg(long)]
    pub track: Option<String>,

    /// Project handle (account/project)
    #[arg(long, env = "FLIGHTDECK_FULL_HANDLE")]
    pub handle: Option<String>,

    /// Server URL
    #[arg(long, env = "FLIGHTDECK_SERVER_URL")]
    pub server_url: Option<String>,

    /// Print the preview as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_platform(value: &str) -> Result<PlatformTag, String> {
    PlatformTag::parse(value).ok_or_else(|| {
        let valid: Vec<&str> = PlatformTag::ALL.iter().map(|p| p.as_str()).collect();
        format!("unknown platform '{}', expected one of {}", value, valid.join(", "))
    })
}

impl ShareCommand {
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(paths = ?self.paths, track = ?self.track, "executing share command");
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(self.execute_async(cli))
    }

    fn json_output(&self, cli: &Cli) -> bool {
        self.json || cli.format == OutputFormat::Json
    }

    async fn execute_async(&self, cli: &Cli) -> anyhow::Result<()> {
        for path in &self.paths {
            if !path.exists() {
                anyhow::bail!("{} does not exist", path.display());
            }
        }

        let config = cli.load_config(self.server_url.clone(), self.handle.clone())?;
        let full_handle = config
            .full_handle
            .clone()
            .ok_or(StoreError::MissingFullHandle)?;
        debug!(server = %config.server_url, handle = %full_handle, "sharing to project");

        let client = Arc::new(ServerClient::from_config(&config)?);
        let parts = Arc::new(HttpPartUploader::new(Duration::from_secs(
            config.upload.timeout_secs,
        ))?);
        let uploader = ArtifactMultipartUploader::new(
            client.clone(),
            parts.clone(),
            UploadSettings::from(&config.upload),
        );

        let aapt2 = if self.paths.iter().any(|p| p.extension().is_some_and(|e| e == "apk")) {
            Some(resolve_aapt2(config.tools.aapt2.as_deref())?)
        } else {
            None
        };
        let inspector = ArtifactInspector::new(Arc::new(SystemCommandRunner), aapt2);
        let pipeline = PreviewUploadPipeline::new(client, parts, uploader, inspector);

        let options = ShareOptions {
            full_handle,
            display_name: self.display_name.clone(),
            version: self.app_version.clone(),
            build_version: self.build_version.clone(),
            bundle_identifier: self.bundle_identifier.clone(),
            supported_platforms: (!self.platforms.is_empty())
                .then(|| self.platforms.iter().copied().collect::<BTreeSet<_>>()),
            git: None,
            track: self.track.clone(),
        };

        let show_progress = !cli.quiet && !self.json_output(cli);
        let bar = output::share_progress_bar(show_progress);
        let progress = |fraction: f64| output::set_fraction(&bar, fraction);

        let result = pipeline.share(&self.paths, &options, &progress).await;
        bar.finish_and_clear();
        let preview = result.context("sharing failed")?;

        if self.json_output(cli) {
            println!("{}", serde_json::to_string_pretty(&preview)?);
        } else if !cli.quiet {
            print_preview(&preview);
        }

        Ok(())
    }
}

fn print_preview(preview: &Preview) {
    let name = preview.display_name.as_deref().unwrap_or("Preview");
    output::success(&format!(
        "{} shared",
        output::name_style().apply_to(name)
    ));
    println!("{}", output::key_value("URL", &output::url_style().apply_to(&preview.url).to_string()));
    if let Some(version) = &preview.version {
        println!("{}", output::key_value("Version", version));
    }
    if let Some(build) = &preview.build_version {
        println!("{}", output::key_value("Build", build));
    }
    let platforms: Vec<&str> = preview
        .supported_platforms
        .iter()
        .map(|p| p.display_name())
        .collect();
    if !platforms.is_empty() {
        println!("{}", output::key_value("Platforms", &platforms.join(", ")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Commands;
    use clap::Parser;

    #[test]
    fn test_share_arguments() {
        let cli = Cli::try_parse_from([
            "flightdeck",
            "share",
            "App.ipa",
            "app.apk",
            "--version",
            "1.0.0",
            "--platforms",
            "ios,android",
            "--track",
            "beta",
            "--json",
        ])
        .unwrap();

        let Commands::Share(cmd) = cli.command else {
            panic!("expected share");
        };
        assert_eq!(cmd.paths.len(), 2);
        assert_eq!(cmd.app_version.as_deref(), Some("1.0.0"));
        assert_eq!(cmd.platforms, vec![PlatformTag::Ios, PlatformTag::Android]);
        assert_eq!(cmd.track.as_deref(), Some("beta"));
        assert!(cmd.json);
    }

    #[test]
    fn test_unknown_platform_is_rejected() {
        let err = Cli::try_parse_from(["flightdeck", "share", "App.ipa", "--platforms", "symbian"])
            .unwrap_err();
        assert!(err.to_string().contains("unknown platform 'symbian'"));
    }
}
