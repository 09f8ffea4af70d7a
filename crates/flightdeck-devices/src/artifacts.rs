//! Downloading, unpacking and locating preview binaries

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use flightdeck_core::{AppBuild, ArtifactType};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use crate::error::{DeviceError, Result};

/// File name used when a build URL has no usable last segment
const FALLBACK_ARCHIVE_NAME: &str = "preview.zip";

/// Fetches a build to a local file
#[async_trait]
pub trait ArtifactDownloader: Send + Sync {
    /// Download `url` to `destination`, returning the byte count
    async fn download(&self, url: &str, destination: &Path) -> Result<u64>;
}

/// Streams builds over HTTP
pub struct HttpArtifactDownloader {
    client: reqwest::Client,
}

impl HttpArtifactDownloader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("flightdeck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeviceError::AppDownloadFailed {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactDownloader for HttpArtifactDownloader {
    #[instrument(skip(self), fields(destination = %destination.display()))]
    async fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        let failed = |message: String| DeviceError::AppDownloadFailed {
            url: url.to_string(),
            message,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("server responded with {}", status)));
        }

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(|e| failed(e.to_string()))? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            return Err(failed("the download was empty".to_string()));
        }

        debug!(bytes = written, "download finished");
        Ok(written)
    }
}

/// Temporary directory holding one run's download and its extracted contents.
///
/// Everything is removed when this is dropped or `cleanup` is called.
pub struct DownloadedArtifact {
    workdir: TempDir,
    archive_path: PathBuf,
    artifact_type: ArtifactType,
}

impl DownloadedArtifact {
    /// Reserve a workspace for `build`
    pub fn for_build(build: &AppBuild) -> Result<Self> {
        let workdir = tempfile::Builder::new().prefix("flightdeck-run-").tempdir()?;
        let archive_path = workdir.path().join(archive_file_name(&build.url));
        Ok(Self {
            workdir,
            archive_path,
            artifact_type: build.artifact_type,
        })
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn unarchived_dir(&self) -> PathBuf {
        self.workdir.path().join("unarchived")
    }

    /// Unpack the downloaded archive, returning the directory holding its contents
    pub fn unarchive(&self) -> Result<PathBuf> {
        let destination = self.unarchived_dir();
        unarchive(&self.archive_path, &destination, self.artifact_type)?;
        Ok(destination)
    }

    /// Remove the workspace, logging instead of failing
    pub fn cleanup(self) {
        let path = self.workdir.path().to_path_buf();
        if let Err(e) = self.workdir.close() {
            warn!(path = %path.display(), error = %e, "failed to clean up downloaded preview");
        }
    }
}

/// Last path segment of `url`, used to keep the extension of the build
pub fn archive_file_name(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_ARCHIVE_NAME.to_string())
}

/// Unpack `archive` into `destination`.
///
/// An APK build is itself a zip, so it is copied as is unless the download
/// is an archive wrapping one or more `.apk` files.
pub fn unarchive(archive: &Path, destination: &Path, artifact_type: ArtifactType) -> Result<()> {
    std::fs::create_dir_all(destination)?;

    if artifact_type == ArtifactType::Apk && !wraps_apk(archive) {
        let stem = archive
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string());
        let target = destination.join(format!("{}.apk", stem));
        std::fs::copy(archive, &target)?;
        debug!(apk = %target.display(), "copied apk");
        return Ok(());
    }

    flightdeck_stores::archive::extract_zip(archive, destination)?;
    Ok(())
}

fn wraps_apk(archive: &Path) -> bool {
    match flightdeck_stores::archive::zip_entry_names(archive) {
        Ok(names) => names
            .iter()
            .any(|name| name.to_ascii_lowercase().ends_with(".apk")),
        Err(e) => {
            debug!(archive = %archive.display(), error = %e, "download is not a zip");
            false
        }
    }
}

/// What the destination needs installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    /// An `.app` bundle for simulators and Apple devices
    AppleApp,
    Apk,
}

/// Find the installable binary below `dir`
pub fn locate_binary(dir: &Path, kind: BinaryKind) -> Result<PathBuf> {
    let root = glob::Pattern::escape(&dir.to_string_lossy());

    match kind {
        BinaryKind::AppleApp => ["*.app", "Payload/*.app"]
            .iter()
            .find_map(|pattern| first_match(&format!("{}/{}", root, pattern), |p| p.is_dir()))
            .ok_or_else(|| DeviceError::AppBundleNotFoundInArchive(dir.to_path_buf())),
        BinaryKind::Apk => first_match(&format!("{}/**/*.apk", root), |p| p.is_file())
            .ok_or_else(|| DeviceError::ApkNotFoundInArchive(dir.to_path_buf())),
    }
}

fn first_match(pattern: &str, accept: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = glob::glob(pattern)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|path| accept(path))
        .collect();
    matches.sort();
    matches.into_iter().next()
}
