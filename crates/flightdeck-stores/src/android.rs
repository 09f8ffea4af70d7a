//! APK metadata from `aapt2 dump badging`

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use flightdeck_core::{CommandRunner, CommandSpec};
use regex::Regex;
use tracing::{debug, instrument};

use crate::archive::read_zip_entry;
use crate::error::{Result, StoreError};

/// `key='value'` pairs on a badging line
static ATTRIBUTE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(?P<key>[A-Za-z][\w-]*)='(?P<value>[^']*)'").expect("Invalid regex")
});

/// Icon densities from most to least preferred
pub const ICON_DENSITY_ORDER: [&str; 6] = ["xxxhdpi", "xxhdpi", "xhdpi", "hdpi", "mdpi", "ldpi"];

/// Package metadata read from an APK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApkMetadata {
    pub package_name: String,
    pub version_name: String,
    pub version_code: String,
    pub display_name: String,
    /// Icon path inside the APK, e.g. `res/mipmap-xxxhdpi-v4/ic_launcher.png`
    pub icon_path: Option<String>,
}

/// Reads APK metadata by running `aapt2`
pub struct ApkMetadataService {
    runner: Arc<dyn CommandRunner>,
    aapt2: PathBuf,
}

impl ApkMetadataService {
    pub fn new(runner: Arc<dyn CommandRunner>, aapt2: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            aapt2: aapt2.into(),
        }
    }

    #[instrument(skip(self), fields(apk = %apk.display()))]
    pub async fn metadata(&self, apk: &Path) -> Result<ApkMetadata> {
        let spec = CommandSpec::new(&self.aapt2)
            .args(["dump", "badging"])
            .path_arg(apk);

        let output = self.runner.run(&spec).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::ToolNotFound(self.aapt2.display().to_string())
            } else {
                StoreError::Io(e)
            }
        })?;

        if !output.success {
            return Err(StoreError::CommandFailed {
                command: spec.display(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        let metadata = parse_badging(&output.stdout)?;
        debug!(package = %metadata.package_name, icon = ?metadata.icon_path, "parsed badging");
        Ok(metadata)
    }

    /// Icon bytes for `metadata`, `None` when the APK has no usable bitmap icon
    pub fn icon(&self, apk: &Path, metadata: &ApkMetadata) -> Result<Option<Vec<u8>>> {
        match &metadata.icon_path {
            Some(path) if is_bitmap(path) => read_zip_entry(apk, path),
            Some(path) => {
                debug!(icon = %path, "icon is not a bitmap, skipping");
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

/// Parse `aapt2 dump badging` output.
///
/// Package name and both versions are required. The label falls back to
/// the package name and the icon is optional.
pub fn parse_badging(output: &str) -> Result<ApkMetadata> {
    let mut package_name = None;
    let mut version_name = None;
    let mut version_code = None;
    let mut label = None;
    let mut icons: Vec<(String, String)> = Vec::new();

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("package:") {
            package_name = quoted_attribute(rest, "name");
            version_code = quoted_attribute(rest, "versionCode");
            version_name = quoted_attribute(rest, "versionName");
        } else if let Some(rest) = line.strip_prefix("application-label:") {
            label = unquote(rest);
        } else if let Some(rest) = line.strip_prefix("application-icon-") {
            if let Some((density, value)) = rest.split_once(':') {
                if let Some(path) = unquote(value) {
                    icons.push((density_name(density).to_string(), path));
                }
            }
        }
    }

    let package_name = non_empty(package_name)
        .ok_or_else(|| StoreError::ApkMetadata("package name not found".to_string()))?;
    let version_name = non_empty(version_name)
        .ok_or_else(|| StoreError::ApkMetadata("versionName not found".to_string()))?;
    let version_code = non_empty(version_code)
        .ok_or_else(|| StoreError::ApkMetadata("versionCode not found".to_string()))?;

    Ok(ApkMetadata {
        display_name: non_empty(label).unwrap_or_else(|| package_name.clone()),
        package_name,
        version_name,
        version_code,
        icon_path: select_icon(&icons),
    })
}

/// Pick the icon of the most preferred density, else the first listed
pub fn select_icon(candidates: &[(String, String)]) -> Option<String> {
    ICON_DENSITY_ORDER
        .iter()
        .find_map(|density| {
            candidates
                .iter()
                .find(|(d, _)| d.as_str() == *density)
                .map(|(_, path)| path.clone())
        })
        .or_else(|| candidates.first().map(|(_, path)| path.clone()))
}

/// aapt2 prints densities as dpi numbers; map them to bucket names
fn density_name(density: &str) -> &str {
    match density {
        "120" => "ldpi",
        "160" => "mdpi",
        "240" => "hdpi",
        "320" => "xhdpi",
        "480" => "xxhdpi",
        "640" => "xxxhdpi",
        other => other,
    }
}

/// Value of `key='value'` within a badging line
fn quoted_attribute(line: &str, key: &str) -> Option<String> {
    ATTRIBUTE_REGEX
        .captures_iter(line)
        .find(|caps| &caps["key"] == key)
        .map(|caps| caps["value"].to_string())
}

fn unquote(value: &str) -> Option<String> {
    let trimmed = value.trim();
    trimmed
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .map(str::to_string)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_bitmap(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".png") || lower.ends_with(".webp")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flightdeck_core::{CallbackRunner, CommandOutput};

    pub(crate) const EXAMPLE_BADGING: &str = "\
package: name='dev.example.app' versionCode='42' versionName='1.0.0' platformBuildVersionName='14' platformBuildVersionCode='34' compileSdkVersion='34'
sdkVersion:'24'
targetSdkVersion:'34'
application-label:'Example App'
application-label-de:'Beispiel App'
application-icon-160:'res/mipmap-mdpi-v4/ic_launcher.png'
application-icon-240:'res/mipmap-hdpi-v4/ic_launcher.png'
application-icon-640:'res/mipmap-xxxhdpi-v4/ic_launcher.png'
application: label='Example App' icon='res/mipmap-mdpi-v4/ic_launcher.png'
launchable-activity: name='dev.example.app.MainActivity'  label='' icon=''
";

    #[test]
    fn test_parse_badging() {
        let metadata = parse_badging(EXAMPLE_BADGING).unwrap();
        assert_eq!(metadata.package_name, "dev.example.app");
        assert_eq!(metadata.version_code, "42");
        assert_eq!(metadata.version_name, "1.0.0");
        assert_eq!(metadata.display_name, "Example App");
        assert_eq!(
            metadata.icon_path.as_deref(),
            Some("res/mipmap-xxxhdpi-v4/ic_launcher.png")
        );
    }

    #[test]
    fn test_density_preference() {
        let candidates = vec![
            ("hdpi".to_string(), "res/hdpi.png".to_string()),
            ("xxhdpi".to_string(), "res/xxhdpi.png".to_string()),
            ("mdpi".to_string(), "res/mdpi.png".to_string()),
        ];
        assert_eq!(select_icon(&candidates).as_deref(), Some("res/xxhdpi.png"));

        let unknown = vec![
            ("65534".to_string(), "res/anydpi.xml".to_string()),
            ("tvdpi".to_string(), "res/tv.png".to_string()),
        ];
        assert_eq!(select_icon(&unknown).as_deref(), Some("res/anydpi.xml"));
        assert_eq!(select_icon(&[]), None);
    }

    #[test]
    fn test_missing_version_is_fatal() {
        let output = "package: name='dev.example.app' versionCode='42'\n";
        assert!(matches!(parse_badging(output), Err(StoreError::ApkMetadata(_))));
        assert!(matches!(parse_badging(""), Err(StoreError::ApkMetadata(_))));
    }

    #[test]
    fn test_missing_icon_and_label_are_not_fatal() {
        let output = "package: name='dev.example.app' versionCode='7' versionName='2.0'\n";
        let metadata = parse_badging(output).unwrap();
        assert_eq!(metadata.display_name, "dev.example.app");
        assert!(metadata.icon_path.is_none());
    }

    #[test]
    fn test_attribute_does_not_match_suffix() {
        let line = " platformBuildVersionName='14' versionName='3.1'";
        assert_eq!(quoted_attribute(line, "versionName").as_deref(), Some("3.1"));
        assert_eq!(quoted_attribute(line, "Name"), None);
    }

    #[test]
    fn test_attribute_values_keep_spaces_and_empties() {
        let line = " name='dev.example.app' label='My App' icon=''";
        assert_eq!(quoted_attribute(line, "label").as_deref(), Some("My App"));
        assert_eq!(quoted_attribute(line, "icon").as_deref(), Some(""));
        assert_eq!(quoted_attribute(line, "versionCode"), None);
    }

    #[tokio::test]
    async fn test_service_runs_aapt2() {
        let runner = Arc::new(CallbackRunner::new(|spec: &CommandSpec| {
            assert_eq!(spec.args[..2], ["dump".to_string(), "badging".to_string()]);
            Ok(CommandOutput::ok(EXAMPLE_BADGING))
        }));
        let service = ApkMetadataService::new(runner, "/sdk/build-tools/34.0.0/aapt2");
        let metadata = service.metadata(Path::new("/tmp/app.apk")).await.unwrap();
        assert_eq!(metadata.package_name, "dev.example.app");
    }

    #[tokio::test]
    async fn test_service_reports_aapt2_failure() {
        let runner = Arc::new(CallbackRunner::new(|_: &CommandSpec| {
            Ok(CommandOutput::failed(1, "ERROR: not a valid apk"))
        }));
        let service = ApkMetadataService::new(runner, "aapt2");
        let err = service.metadata(Path::new("/tmp/app.apk")).await.unwrap_err();
        assert!(matches!(err, StoreError::CommandFailed { .. }));
    }
}
