//! Share pipeline: inspect artifacts, upload each one, attach the icon

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flightdeck_core::{ArtifactType, CommandRunner, PlatformTag, Preview};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::android::ApkMetadataService;
use crate::apple::{payload_app, AppBundle};
use crate::archive::{extract_zip, zip_directory};
use crate::binary_id::apk_binary_id;
use crate::error::{Result, StoreError};
use crate::git::GitProvenance;
use crate::multipart::{ArtifactMultipartUploader, ProgressFn};
use crate::tools::resolve_aapt2;
use crate::traits::{PartUploader, PreviewsService};
use crate::types::StartUploadRequest;

/// Metadata the caller supplies for a share; set fields win over what the
/// artifact itself declares
#[derive(Debug, Clone, Default)]
pub struct ShareOptions {
    pub full_handle: String,
    pub display_name: Option<String>,
    pub version: Option<String>,
    pub build_version: Option<String>,
    pub bundle_identifier: Option<String>,
    pub supported_platforms: Option<BTreeSet<PlatformTag>>,
    /// Git fields; discovered from the first artifact's repository when `None`
    pub git: Option<GitProvenance>,
    pub track: Option<String>,
}

/// Metadata read out of an artifact
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub display_name: Option<String>,
    pub version: Option<String>,
    pub build_version: Option<String>,
    pub bundle_identifier: Option<String>,
    pub supported_platforms: BTreeSet<PlatformTag>,
}

/// An artifact ready for upload
#[derive(Debug)]
pub struct PreparedArtifact {
    /// File that is uploaded (the zipped bundle for `.app` directories)
    pub upload_path: PathBuf,
    pub artifact_type: ArtifactType,
    pub metadata: ArtifactMetadata,
    pub binary_id: String,
    pub icon: Option<Vec<u8>>,
    _workdir: Option<TempDir>,
}

/// Turns paths on disk into `PreparedArtifact`s
pub struct ArtifactInspector {
    runner: Arc<dyn CommandRunner>,
    aapt2: Option<PathBuf>,
}

impl ArtifactInspector {
    /// `aapt2` is an explicit tool path; otherwise it is resolved on first APK
    pub fn new(runner: Arc<dyn CommandRunner>, aapt2: Option<PathBuf>) -> Self {
        Self { runner, aapt2 }
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn prepare(&self, path: &Path) -> Result<PreparedArtifact> {
        if !path.exists() {
            return Err(StoreError::InvalidArtifact(format!(
                "{} does not exist",
                path.display()
            )));
        }

        match ArtifactType::from_path(path) {
            Some(ArtifactType::Apk) => self.prepare_apk(path).await,
            Some(ArtifactType::AppBundle) if path.is_dir() => self.prepare_app_bundle(path),
            Some(ArtifactType::Ipa) => self.prepare_ipa(path),
            _ => Err(StoreError::InvalidArtifact(format!(
                "{} is not an .apk, .ipa or .app bundle",
                path.display()
            ))),
        }
    }

    async fn prepare_apk(&self, path: &Path) -> Result<PreparedArtifact> {
        let aapt2 = resolve_aapt2(self.aapt2.as_deref())?;
        let service = ApkMetadataService::new(self.runner.clone(), aapt2);
        let apk = service.metadata(path).await?;

        let icon = service.icon(path, &apk).unwrap_or_else(|e| {
            warn!(error = %e, "could not read APK icon");
            None
        });

        Ok(PreparedArtifact {
            upload_path: path.to_path_buf(),
            artifact_type: ArtifactType::Apk,
            binary_id: apk_binary_id(path)?,
            icon,
            metadata: ArtifactMetadata {
                display_name: Some(apk.display_name),
                version: Some(apk.version_name),
                build_version: Some(apk.version_code),
                bundle_identifier: Some(apk.package_name),
                supported_platforms: [PlatformTag::Android].into_iter().collect(),
            },
            _workdir: None,
        })
    }

    fn prepare_app_bundle(&self, path: &Path) -> Result<PreparedArtifact> {
        let bundle = AppBundle::open(path)?;
        let binary_id = bundle.binary_id()?;

        let workdir = TempDir::new()?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "App".to_string());
        let archive = workdir.path().join(format!("{}.zip", stem));
        zip_directory(path, &archive)?;

        Ok(PreparedArtifact {
            upload_path: archive,
            artifact_type: ArtifactType::AppBundle,
            binary_id,
            icon: bundle_icon(&bundle),
            metadata: bundle_metadata(&bundle, BTreeSet::new()),
            _workdir: Some(workdir),
        })
    }

    fn prepare_ipa(&self, path: &Path) -> Result<PreparedArtifact> {
        let workdir = TempDir::new()?;
        extract_zip(path, workdir.path())?;
        let app = payload_app(workdir.path()).ok_or_else(|| {
            StoreError::InvalidArtifact(format!("{} has no Payload/*.app", path.display()))
        })?;
        let bundle = AppBundle::open(&app)?;

        Ok(PreparedArtifact {
            upload_path: path.to_path_buf(),
            artifact_type: ArtifactType::Ipa,
            binary_id: bundle.binary_id()?,
            icon: bundle_icon(&bundle),
            metadata: bundle_metadata(&bundle, [PlatformTag::Ios].into_iter().collect()),
            _workdir: Some(workdir),
        })
    }
}

fn bundle_metadata(bundle: &AppBundle, fallback_platforms: BTreeSet<PlatformTag>) -> ArtifactMetadata {
    let info = bundle.info();
    ArtifactMetadata {
        display_name: info.display_name.clone(),
        version: info.version.clone(),
        build_version: info.build_version.clone(),
        bundle_identifier: info.bundle_identifier.clone(),
        supported_platforms: if info.supported_platforms.is_empty() {
            fallback_platforms
        } else {
            info.supported_platforms.clone()
        },
    }
}

fn bundle_icon(bundle: &AppBundle) -> Option<Vec<u8>> {
    bundle.icon().unwrap_or_else(|e| {
        warn!(error = %e, "could not read bundle icon");
        None
    })
}

/// Build the Start request for one artifact
pub fn start_request(
    artifact: &PreparedArtifact,
    options: &ShareOptions,
    git: &GitProvenance,
) -> Result<StartUploadRequest> {
    let metadata = &artifact.metadata;

    let display_name = options
        .display_name
        .clone()
        .or_else(|| metadata.display_name.clone())
        .or_else(|| {
            artifact
                .upload_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .ok_or_else(|| StoreError::InvalidArtifact("display name unknown".to_string()))?;

    let build_version = options
        .build_version
        .clone()
        .or_else(|| metadata.build_version.clone())
        .ok_or_else(|| {
            StoreError::InvalidArtifact(format!(
                "build version of {} unknown; pass --build-version",
                display_name
            ))
        })?;

    let supported_platforms = options
        .supported_platforms
        .clone()
        .unwrap_or_else(|| metadata.supported_platforms.clone());
    if supported_platforms.is_empty() {
        return Err(StoreError::InvalidArtifact(format!(
            "supported platforms of {} unknown; pass --platforms",
            display_name
        )));
    }

    Ok(StartUploadRequest {
        artifact_type: artifact.artifact_type,
        display_name,
        version: options.version.clone().or_else(|| metadata.version.clone()),
        build_version,
        bundle_identifier: options
            .bundle_identifier
            .clone()
            .or_else(|| metadata.bundle_identifier.clone()),
        supported_platforms,
        git_branch: git.branch.clone(),
        git_commit_sha: git.commit_sha.clone(),
        git_ref: git.git_ref.clone(),
        binary_id: artifact.binary_id.clone(),
        full_handle: options.full_handle.clone(),
        track: options.track.clone(),
    })
}

/// Uploads one or more artifacts as a single preview
pub struct PreviewUploadPipeline {
    service: Arc<dyn PreviewsService>,
    parts: Arc<dyn PartUploader>,
    uploader: ArtifactMultipartUploader,
    inspector: ArtifactInspector,
}

impl PreviewUploadPipeline {
    pub fn new(
        service: Arc<dyn PreviewsService>,
        parts: Arc<dyn PartUploader>,
        uploader: ArtifactMultipartUploader,
        inspector: ArtifactInspector,
    ) -> Self {
        Self {
            service,
            parts,
            uploader,
            inspector,
        }
    }

    /// Upload `paths` in order and return the resulting preview.
    ///
    /// Progress covers the whole batch: artifact `i` of `n` reports within
    /// `[i/n, (i+1)/n]`.
    #[instrument(skip(self, options, progress), fields(count = paths.len()))]
    pub async fn share(
        &self,
        paths: &[PathBuf],
        options: &ShareOptions,
        progress: ProgressFn<'_>,
    ) -> Result<Preview> {
        let first = paths
            .first()
            .ok_or_else(|| StoreError::InvalidArtifact("no artifacts to share".to_string()))?;

        let git = match &options.git {
            Some(git) => git.clone(),
            None => GitProvenance::discover(first.parent().unwrap_or(Path::new("."))),
        };

        let count = paths.len() as f64;
        let mut icon = None;
        let mut preview = None;

        for (index, path) in paths.iter().enumerate() {
            let artifact = self.inspector.prepare(path).await?;
            let start = start_request(&artifact, options, &git)?;
            info!(
                artifact = %path.display(),
                binary_id = %artifact.binary_id,
                artifact_type = %artifact.artifact_type,
                "uploading artifact"
            );

            let offset = index as f64;
            let scaled = |fraction: f64| progress((offset + fraction) / count);
            let uploaded = self
                .uploader
                .upload(&artifact.upload_path, &start, &scaled)
                .await?;

            if icon.is_none() {
                icon = artifact.icon;
            }
            preview = Some(uploaded);
        }

        let preview = preview
            .ok_or_else(|| StoreError::Other("no preview returned".to_string()))?;

        match icon {
            Some(bytes) => self.upload_icon(&options.full_handle, &preview.id, bytes).await,
            None => debug!("no icon to upload"),
        }

        Ok(preview)
    }

    /// Icon upload never fails the share
    async fn upload_icon(&self, full_handle: &str, preview_id: &str, icon: Vec<u8>) {
        let result = async {
            let url = self
                .service
                .generate_icon_upload_url(full_handle, preview_id)
                .await?;
            self.parts.put(&url, icon, "image/png").await?;
            Ok::<_, StoreError>(())
        }
        .await;

        match result {
            Ok(()) => debug!(preview_id, "icon uploaded"),
            Err(e) => warn!(preview_id, error = %e, "icon upload failed"),
        }
    }
}
