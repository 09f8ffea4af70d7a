//! Locating Android SDK tools

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, StoreError};

/// Environment variables naming the Android SDK, in lookup order
pub const ANDROID_SDK_ENV_VARS: [&str; 2] = ["ANDROID_HOME", "ANDROID_SDK_ROOT"];

/// First Android SDK root named by the environment
pub fn android_sdk_root() -> Option<PathBuf> {
    ANDROID_SDK_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var_os(var))
        .map(PathBuf::from)
        .find(|path| path.is_dir())
}

/// Resolve `adb`: explicit override, then the SDK's `platform-tools`, then `PATH`
pub fn resolve_adb(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        return path.is_file().then(|| path.to_path_buf());
    }

    let from_sdk = android_sdk_root()
        .map(|sdk| sdk.join("platform-tools").join(exe_name("adb")))
        .filter(|path| path.is_file());

    let resolved = from_sdk.or_else(|| which::which("adb").ok());
    debug!(adb = ?resolved, "resolved adb");
    resolved
}

/// Resolve `aapt2`: explicit override, then the newest SDK `build-tools`, then `PATH`
pub fn resolve_aapt2(override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(StoreError::ToolNotFound(format!(
            "aapt2 at {} (tools.aapt2)",
            path.display()
        )));
    }

    android_sdk_root()
        .and_then(|sdk| aapt2_in_sdk(&sdk))
        .or_else(|| which::which("aapt2").ok())
        .ok_or_else(|| {
            StoreError::ToolNotFound(
                "aapt2 (install Android build-tools or set ANDROID_HOME)".to_string(),
            )
        })
}

/// `aapt2` inside the newest `build-tools/<version>` of an SDK
pub fn aapt2_in_sdk(sdk_root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(sdk_root.join("build-tools")).ok()?;

    let mut candidates: Vec<(semver::Version, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let aapt2 = entry.path().join(exe_name("aapt2"));
            aapt2.is_file().then(|| (version_key(&name), aapt2))
        })
        .collect();

    candidates.sort();
    candidates.pop().map(|(_, path)| path)
}

/// Ordering key for a `build-tools` directory name.
///
/// Names like `34.0.0` or `35.0.0-rc1` are semver; legacy names such as
/// `android-4.4W` or `30.0` use their leading numbers.
fn version_key(name: &str) -> semver::Version {
    semver::Version::parse(name).unwrap_or_else(|_| {
        let mut numbers = name.split(['.', '-']).filter_map(|part| {
            part.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .ok()
        });
        semver::Version::new(
            numbers.next().unwrap_or(0),
            numbers.next().unwrap_or(0),
            numbers.next().unwrap_or(0),
        )
    })
}

fn exe_name(tool: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", tool)
    } else {
        tool.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn test_newest_build_tools_wins() {
        let temp = TempDir::new().unwrap();
        let build_tools = temp.path().join("build-tools");
        touch(&build_tools.join("9.0.0").join(exe_name("aapt2")));
        touch(&build_tools.join("34.0.0").join(exe_name("aapt2")));
        touch(&build_tools.join("30.0.3").join(exe_name("aapt2")));
        std::fs::create_dir_all(build_tools.join("35.0.0")).unwrap();

        let found = aapt2_in_sdk(temp.path()).unwrap();
        assert!(found.starts_with(build_tools.join("34.0.0")));
    }

    #[test]
    fn test_no_build_tools() {
        let temp = TempDir::new().unwrap();
        assert!(aapt2_in_sdk(temp.path()).is_none());
    }

    #[test]
    fn test_override_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("aapt2");
        assert!(matches!(
            resolve_aapt2(Some(&missing)),
            Err(StoreError::ToolNotFound(_))
        ));
        assert!(resolve_adb(Some(&missing)).is_none());

        touch(&missing);
        assert_eq!(resolve_aapt2(Some(&missing)).unwrap(), missing);
    }

    #[test]
    fn test_version_key_ordering() {
        assert!(version_key("34.0.0") > version_key("9.0.0"));
        assert!(version_key("35.0.0-rc1") > version_key("34.0.0"));
        assert!(version_key("35.0.0-rc1") < version_key("35.0.0"));
        assert!(version_key("android-4.4W") < version_key("19.1.0"));
        assert_eq!(version_key("30.0"), semver::Version::new(30, 0, 0));
    }

    #[test]
    fn test_release_beats_its_release_candidate() {
        let temp = TempDir::new().unwrap();
        let build_tools = temp.path().join("build-tools");
        touch(&build_tools.join("35.0.0-rc1").join(exe_name("aapt2")));
        touch(&build_tools.join("35.0.0").join(exe_name("aapt2")));
        touch(&build_tools.join("android-4.4W").join(exe_name("aapt2")));

        let found = aapt2_in_sdk(temp.path()).unwrap();
        assert!(found.starts_with(build_tools.join("35.0.0")));
        assert!(!found.starts_with(build_tools.join("35.0.0-rc1")));
    }
}
