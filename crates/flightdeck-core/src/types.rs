//! Preview model shared by the upload and run workflows

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Platform a build can execute on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformTag {
    Ios,
    IosSimulator,
    Tvos,
    TvosSimulator,
    Watchos,
    WatchosSimulator,
    Visionos,
    VisionosSimulator,
    Macos,
    Android,
}

impl PlatformTag {
    /// All known tags, in wire order
    pub const ALL: [PlatformTag; 10] = [
        Self::Ios,
        Self::IosSimulator,
        Self::Tvos,
        Self::TvosSimulator,
        Self::Watchos,
        Self::WatchosSimulator,
        Self::Visionos,
        Self::VisionosSimulator,
        Self::Macos,
        Self::Android,
    ];

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::IosSimulator => "ios_simulator",
            Self::Tvos => "tvos",
            Self::TvosSimulator => "tvos_simulator",
            Self::Watchos => "watchos",
            Self::WatchosSimulator => "watchos_simulator",
            Self::Visionos => "visionos",
            Self::VisionosSimulator => "visionos_simulator",
            Self::Macos => "macos",
            Self::Android => "android",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|tag| tag.as_str() == normalized)
    }

    /// Map an Xcode `CFBundleSupportedPlatforms` entry to a tag
    pub fn from_apple_sdk(sdk: &str) -> Option<Self> {
        match sdk {
            "iPhoneOS" => Some(Self::Ios),
            "iPhoneSimulator" => Some(Self::IosSimulator),
            "AppleTVOS" => Some(Self::Tvos),
            "AppleTVSimulator" => Some(Self::TvosSimulator),
            "WatchOS" => Some(Self::Watchos),
            "WatchSimulator" => Some(Self::WatchosSimulator),
            "XROS" => Some(Self::Visionos),
            "XRSimulator" => Some(Self::VisionosSimulator),
            "MacOSX" => Some(Self::Macos),
            _ => None,
        }
    }

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ios => "iOS",
            Self::IosSimulator => "iOS Simulator",
            Self::Tvos => "tvOS",
            Self::TvosSimulator => "tvOS Simulator",
            Self::Watchos => "watchOS",
            Self::WatchosSimulator => "watchOS Simulator",
            Self::Visionos => "visionOS",
            Self::VisionosSimulator => "visionOS Simulator",
            Self::Macos => "macOS",
            Self::Android => "Android",
        }
    }
}

impl std::fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Kind of uploaded artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    /// Zipped `.app` bundle (simulator or macOS)
    AppBundle,
    /// iOS App Store package
    Ipa,
    /// Android package
    Apk,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppBundle => "app_bundle",
            Self::Ipa => "ipa",
            Self::Apk => "apk",
        }
    }

    /// Infer the artifact type from a path on disk
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "app" => Some(Self::AppBundle),
            "ipa" => Some(Self::Ipa),
            "apk" => Some(Self::Apk),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One platform-specific binary belonging to a preview
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppBuild {
    /// Download URL
    pub url: String,

    /// Artifact type
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,

    /// Platforms this build runs on
    #[serde(default)]
    pub supported_platforms: BTreeSet<PlatformTag>,
}

impl AppBuild {
    /// Whether any of the given platforms can run this build
    pub fn supports_any(&self, platforms: &[PlatformTag]) -> bool {
        platforms.iter().any(|p| self.supported_platforms.contains(p))
    }
}

/// Server-hosted pointer to one or more uploaded builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub id: String,

    /// Shareable URL of the preview page
    pub url: String,

    pub display_name: Option<String>,

    pub version: Option<String>,

    pub build_version: Option<String>,

    pub bundle_identifier: Option<String>,

    #[serde(default)]
    pub supported_platforms: BTreeSet<PlatformTag>,

    /// Builds in server order
    #[serde(default)]
    pub builds: Vec<AppBuild>,

    pub git_branch: Option<String>,

    pub git_commit_sha: Option<String>,

    pub git_ref: Option<String>,

    #[serde(default)]
    pub created_from_ci: bool,

    pub inserted_at: DateTime<Utc>,

    pub icon_url: Option<String>,
}

impl Preview {
    /// First build that can run on any of the given platforms
    pub fn build_for(&self, platforms: &[PlatformTag]) -> Option<&AppBuild> {
        self.builds.iter().find(|b| b.supports_any(platforms))
    }

    /// Check the build/platform containment invariant
    pub fn has_consistent_platforms(&self) -> bool {
        self.builds
            .iter()
            .all(|b| b.supported_platforms.is_subset(&self.supported_platforms))
    }
}
