//! App bundle introspection for sharing Apple builds

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use flightdeck_core::PlatformTag;
use serde::Deserialize;
use tracing::debug;

use crate::binary_id::apple_binary_id;
use crate::error::{Result, StoreError};

#[derive(Debug, Default, Deserialize)]
struct InfoPlist {
    #[serde(rename = "CFBundleDisplayName")]
    display_name: Option<String>,
    #[serde(rename = "CFBundleName")]
    name: Option<String>,
    #[serde(rename = "CFBundleShortVersionString")]
    short_version: Option<String>,
    #[serde(rename = "CFBundleVersion")]
    bundle_version: Option<String>,
    #[serde(rename = "CFBundleIdentifier")]
    identifier: Option<String>,
    #[serde(rename = "CFBundleExecutable")]
    executable: Option<String>,
    #[serde(rename = "CFBundleSupportedPlatforms", default)]
    supported_platforms: Vec<String>,
}

/// Metadata of an `.app` bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppBundleInfo {
    pub display_name: Option<String>,
    pub version: Option<String>,
    pub build_version: Option<String>,
    pub bundle_identifier: Option<String>,
    pub executable: Option<String>,
    pub supported_platforms: BTreeSet<PlatformTag>,
}

/// An `.app` directory on disk
#[derive(Debug, Clone)]
pub struct AppBundle {
    path: PathBuf,
    info: AppBundleInfo,
}

impl AppBundle {
    /// Read `Info.plist` of an iOS-style (flat) or macOS-style (`Contents/`) bundle
    pub fn open(path: &Path) -> Result<Self> {
        let macos_layout = path.join("Contents").join("Info.plist").is_file();
        let plist_path = if macos_layout {
            path.join("Contents").join("Info.plist")
        } else {
            path.join("Info.plist")
        };

        if !plist_path.is_file() {
            return Err(StoreError::InvalidArtifact(format!(
                "{} has no Info.plist",
                path.display()
            )));
        }

        let plist: InfoPlist = plist::from_file(&plist_path)?;

        let mut supported_platforms: BTreeSet<PlatformTag> = plist
            .supported_platforms
            .iter()
            .filter_map(|sdk| PlatformTag::from_apple_sdk(sdk))
            .collect();
        if supported_platforms.is_empty() && macos_layout {
            supported_platforms.insert(PlatformTag::Macos);
        }

        let info = AppBundleInfo {
            display_name: plist.display_name.or(plist.name),
            version: plist.short_version,
            build_version: plist.bundle_version,
            bundle_identifier: plist.identifier,
            executable: plist.executable,
            supported_platforms,
        };
        debug!(bundle = %path.display(), ?info, "read bundle info");

        Ok(Self {
            path: path.to_path_buf(),
            info,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &AppBundleInfo {
        &self.info
    }

    fn is_macos_layout(&self) -> bool {
        self.path.join("Contents").is_dir()
    }

    /// Path of the main executable named by `CFBundleExecutable`
    pub fn executable_path(&self) -> Result<PathBuf> {
        let name = self.info.executable.as_deref().ok_or_else(|| {
            StoreError::InvalidArtifact(format!(
                "{} has no CFBundleExecutable",
                self.path.display()
            ))
        })?;

        Ok(if self.is_macos_layout() {
            self.path.join("Contents").join("MacOS").join(name)
        } else {
            self.path.join(name)
        })
    }

    /// UUID of the main executable
    pub fn binary_id(&self) -> Result<String> {
        let executable = self.executable_path()?;
        if !executable.is_file() {
            return Err(StoreError::BinaryIdNotFound(executable));
        }
        apple_binary_id(&executable)
    }

    /// Largest `AppIcon*.png` shipped in the bundle
    pub fn icon(&self) -> Result<Option<Vec<u8>>> {
        let resources = if self.is_macos_layout() {
            self.path.join("Contents").join("Resources")
        } else {
            self.path.clone()
        };

        let Ok(entries) = std::fs::read_dir(&resources) else {
            return Ok(None);
        };

        let largest = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.starts_with("AppIcon") && name.ends_with(".png")
            })
            .filter_map(|entry| Some((entry.metadata().ok()?.len(), entry.path())))
            .max_by_key(|(size, _)| *size);

        match largest {
            Some((_, path)) => Ok(Some(std::fs::read(path)?)),
            None => Ok(None),
        }
    }
}

/// The single `.app` below `Payload/` of an extracted `.ipa`
pub fn payload_app(extracted_ipa: &Path) -> Option<PathBuf> {
    std::fs::read_dir(extracted_ipa.join("Payload"))
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| path.is_dir() && path.extension().is_some_and(|e| e == "app"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::binary_id::tests::{thin_macho, UUID_BYTES};
    use tempfile::TempDir;

    pub(crate) fn write_ios_bundle(dir: &Path, platforms: &[&str]) -> PathBuf {
        let bundle = dir.join("App.app");
        std::fs::create_dir_all(&bundle).unwrap();

        let mut info = plist::Dictionary::new();
        info.insert("CFBundleName".into(), "Example".into());
        info.insert("CFBundleDisplayName".into(), "Example App".into());
        info.insert("CFBundleShortVersionString".into(), "1.0.0".into());
        info.insert("CFBundleVersion".into(), "42".into());
        info.insert("CFBundleIdentifier".into(), "dev.example.app".into());
        info.insert("CFBundleExecutable".into(), "App".into());
        info.insert(
            "CFBundleSupportedPlatforms".into(),
            plist::Value::Array(platforms.iter().map(|p| (*p).into()).collect()),
        );
        plist::Value::Dictionary(info)
            .to_file_xml(bundle.join("Info.plist"))
            .unwrap();

        std::fs::write(bundle.join("App"), thin_macho(&UUID_BYTES)).unwrap();
        std::fs::write(bundle.join("AppIcon60x60@2x.png"), vec![1u8; 10]).unwrap();
        std::fs::write(bundle.join("AppIcon60x60@3x.png"), vec![2u8; 30]).unwrap();
        bundle
    }

    #[test]
    fn test_reads_ios_bundle() {
        let temp = TempDir::new().unwrap();
        let bundle = AppBundle::open(&write_ios_bundle(temp.path(), &["iPhoneSimulator"])).unwrap();

        let info = bundle.info();
        assert_eq!(info.display_name.as_deref(), Some("Example App"));
        assert_eq!(info.version.as_deref(), Some("1.0.0"));
        assert_eq!(info.build_version.as_deref(), Some("42"));
        assert_eq!(info.bundle_identifier.as_deref(), Some("dev.example.app"));
        assert_eq!(
            info.supported_platforms,
            [PlatformTag::IosSimulator].into_iter().collect()
        );
        assert_eq!(
            bundle.binary_id().unwrap(),
            "12345678-9ABC-DEF0-0123-456789ABCDEF"
        );
    }

    #[test]
    fn test_largest_icon_selected() {
        let temp = TempDir::new().unwrap();
        let bundle = AppBundle::open(&write_ios_bundle(temp.path(), &["iPhoneOS"])).unwrap();
        assert_eq!(bundle.icon().unwrap(), Some(vec![2u8; 30]));
    }

    #[test]
    fn test_macos_layout() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("Mac.app");
        let contents = bundle.join("Contents");
        std::fs::create_dir_all(contents.join("MacOS")).unwrap();

        let mut info = plist::Dictionary::new();
        info.insert("CFBundleName".into(), "Mac".into());
        info.insert("CFBundleExecutable".into(), "Mac".into());
        plist::Value::Dictionary(info)
            .to_file_xml(contents.join("Info.plist"))
            .unwrap();

        let bundle = AppBundle::open(&bundle).unwrap();
        assert_eq!(
            bundle.info().supported_platforms,
            [PlatformTag::Macos].into_iter().collect()
        );
        assert_eq!(
            bundle.executable_path().unwrap(),
            contents.join("MacOS").join("Mac")
        );
        assert!(matches!(
            bundle.binary_id(),
            Err(StoreError::BinaryIdNotFound(_))
        ));
    }

    #[test]
    fn test_missing_info_plist() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("Broken.app");
        std::fs::create_dir_all(&bundle).unwrap();
        assert!(matches!(
            AppBundle::open(&bundle),
            Err(StoreError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn test_payload_app() {
        let temp = TempDir::new().unwrap();
        let payload = temp.path().join("Payload");
        write_ios_bundle(&payload, &["iPhoneOS"]);
        assert_eq!(payload_app(temp.path()), Some(payload.join("App.app")));
        assert_eq!(payload_app(&payload), None);
    }
}
