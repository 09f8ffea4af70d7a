//! Running a preview on a device
//!
//! A run moves through fixed phases, resolving the preview, picking a
//! device, fetching the matching build and installing it. Any failure ends
//! the run; nothing is retried and nothing but the last prompted device
//! outlives it.

use std::path::Path;
use std::sync::Arc;

use flightdeck_core::{AppBuild, Preview, SettingsStore};
use flightdeck_stores::apple::AppBundle;
use flightdeck_stores::{PreviewReference, PreviewResolver};
use tracing::{debug, info, instrument};

use crate::artifacts::{locate_binary, ArtifactDownloader, BinaryKind, DownloadedArtifact};
use crate::device::Device;
use crate::error::{DeviceError, Result};
use crate::registry::DeviceRegistry;
use crate::selection::{select_device, DevicePrompter};

/// Phases of a run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    ResolvingPreview,
    EnumeratingDevices,
    SelectingDevice,
    CheckingCompatibility,
    DownloadingArtifact,
    Unarchiving,
    LocatingBinary,
    Installing,
    Launching,
    Done,
}

impl RunPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ResolvingPreview => "Resolving preview",
            Self::EnumeratingDevices => "Listing devices",
            Self::SelectingDevice => "Selecting device",
            Self::CheckingCompatibility => "Checking compatibility",
            Self::DownloadingArtifact => "Downloading preview",
            Self::Unarchiving => "Extracting preview",
            Self::LocatingBinary => "Locating app",
            Self::Installing => "Installing preview",
            Self::Launching => "Launching preview",
            Self::Done => "Done",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives phase transitions
pub trait ProgressReporter: Send + Sync {
    fn phase(&self, phase: RunPhase);
}

/// Reporter that drops every update
#[derive(Debug, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn phase(&self, _phase: RunPhase) {}
}

/// What to run and where
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub reference: PreviewReference,
    /// Name or id of the device; prompts when absent
    pub device: Option<String>,
    /// Forwarded to the app where the backend supports it
    pub launch_arguments: Vec<String>,
}

/// A finished run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub preview: Preview,
    pub device: Device,
}

/// Drives a run from reference to launched app
pub struct RunOrchestrator {
    resolver: PreviewResolver,
    registry: DeviceRegistry,
    downloader: Arc<dyn ArtifactDownloader>,
    prompter: Arc<dyn DevicePrompter>,
    settings: Arc<dyn SettingsStore>,
    reporter: Arc<dyn ProgressReporter>,
}

impl RunOrchestrator {
    pub fn new(
        resolver: PreviewResolver,
        registry: DeviceRegistry,
        downloader: Arc<dyn ArtifactDownloader>,
        prompter: Arc<dyn DevicePrompter>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            resolver,
            registry,
            downloader,
            prompter,
            settings,
            reporter: Arc::new(SilentReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[instrument(skip(self, request), fields(reference = ?request.reference))]
    pub async fn run(&self, request: &RunRequest) -> Result<RunOutcome> {
        self.reporter.phase(RunPhase::ResolvingPreview);
        let platforms = self.registry.backends().platform_tags();
        let preview = self.resolver.resolve(&request.reference, &platforms).await?;
        if preview.builds.is_empty() {
            return Err(DeviceError::AppNotFound {
                preview: preview.id.clone(),
            });
        }
        info!(preview_id = %preview.id, "resolved preview");

        self.reporter.phase(RunPhase::EnumeratingDevices);
        let devices = self.registry.list_devices().await;

        self.reporter.phase(RunPhase::SelectingDevice);
        let device = select_device(
            &devices,
            request.device.as_deref(),
            self.prompter.as_ref(),
            self.settings.as_ref(),
        )
        .await?;
        info!(device = %device, "selected device");

        self.reporter.phase(RunPhase::CheckingCompatibility);
        let build = compatible_build(&preview, &device)?;
        let package_name = match device {
            Device::AndroidDevice { .. } => Some(preview.bundle_identifier.clone().ok_or_else(|| {
                DeviceError::MissingPackageName {
                    preview: preview.id.clone(),
                }
            })?),
            _ => None,
        };

        self.reporter.phase(RunPhase::DownloadingArtifact);
        let artifact = DownloadedArtifact::for_build(&build)?;
        self.downloader
            .download(&build.url, artifact.archive_path())
            .await?;

        self.reporter.phase(RunPhase::Unarchiving);
        let unarchived = artifact.unarchive()?;

        self.reporter.phase(RunPhase::LocatingBinary);
        let kind = match device {
            Device::AndroidDevice { .. } => BinaryKind::Apk,
            _ => BinaryKind::AppleApp,
        };
        let binary = locate_binary(&unarchived, kind)?;
        debug!(binary = %binary.display(), "located binary");

        let app_id = match package_name {
            Some(package) => package,
            None => apple_bundle_id(&binary, &preview, &device)?,
        };

        self.reporter.phase(RunPhase::Installing);
        self.registry.install(&device, &binary).await?;
        artifact.cleanup();

        self.reporter.phase(RunPhase::Launching);
        self.registry
            .launch(&device, &app_id, &request.launch_arguments)
            .await?;

        self.reporter.phase(RunPhase::Done);
        Ok(RunOutcome { preview, device })
    }
}

/// First build the device can run
fn compatible_build(preview: &Preview, device: &Device) -> Result<AppBuild> {
    let build = preview
        .build_for(&device.platform_tags())
        .ok_or_else(|| DeviceError::NoCompatibleAppBuild {
            device: device.name().to_string(),
            supported: preview.supported_platforms.iter().copied().collect(),
        })?;

    if build.url.trim().is_empty() {
        return Err(DeviceError::AppNotFound {
            preview: preview.id.clone(),
        });
    }
    Ok(build.clone())
}

/// Bundle id from the installed bundle, else the one the preview records
fn apple_bundle_id(app: &Path, preview: &Preview, device: &Device) -> Result<String> {
    let from_bundle = match AppBundle::open(app) {
        Ok(bundle) => bundle.info().bundle_identifier.clone(),
        Err(e) => {
            debug!(error = %e, "could not read bundle info");
            None
        }
    };

    from_bundle
        .or_else(|| preview.bundle_identifier.clone())
        .ok_or_else(|| DeviceError::LaunchFailed {
            device: device.name().to_string(),
            message: format!("{} has no bundle identifier", app.display()),
        })
}
