//! Zip packing and unpacking of build artifacts

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, StoreError};

/// Zip a directory so the archive root holds the directory itself,
/// e.g. `App.app/Info.plist`.
///
/// Unix permissions and symlinks are kept; simulators refuse bundles whose
/// executable lost its mode bits.
pub fn zip_directory(dir: &Path, destination: &Path) -> Result<()> {
    let root_name = dir
        .file_name()
        .ok_or_else(|| StoreError::InvalidArtifact(format!("{} has no name", dir.display())))?;
    let parent = dir.parent().unwrap_or(dir);

    let mut writer = ZipWriter::new(File::create(destination)?);
    let base_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| StoreError::Io(e.into()))?;
        let path = entry.path();
        let relative = path.strip_prefix(parent).unwrap_or(path);
        let name = zip_entry_name(relative);
        let options = base_options.unix_permissions(unix_mode(&entry)?);

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            let target = std::fs::read_link(path)?;
            writer.add_symlink(name, target.to_string_lossy(), options)?;
        } else if file_type.is_dir() {
            writer.add_directory(name, options)?;
        } else {
            writer.start_file(name, options)?;
            let mut source = File::open(path)?;
            std::io::copy(&mut source, &mut writer)?;
        }
    }

    let mut file = writer.finish()?;
    file.flush()?;
    debug!(
        source = %dir.display(),
        archive = %destination.display(),
        root = %root_name.to_string_lossy(),
        "directory zipped"
    );
    Ok(())
}

/// Extract every entry of `archive` below `destination`
pub fn extract_zip(archive: &Path, destination: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    zip.extract(destination)?;
    debug!(archive = %archive.display(), destination = %destination.display(), entries = zip.len(), "archive extracted");
    Ok(())
}

/// Names of every entry in a zip archive
pub fn zip_entry_names(archive: &Path) -> Result<Vec<String>> {
    let zip = ZipArchive::new(File::open(archive)?)?;
    Ok(zip.file_names().map(str::to_string).collect())
}

/// Read a single entry out of a zip archive, `None` when absent
pub fn read_zip_entry(archive: &Path, entry_name: &str) -> Result<Option<Vec<u8>>> {
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    let mut entry = match zip.by_name(entry_name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

fn zip_entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn unix_mode(entry: &walkdir::DirEntry) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = entry.path().symlink_metadata()?;
    Ok(metadata.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn unix_mode(entry: &walkdir::DirEntry) -> Result<u32> {
    Ok(if entry.file_type().is_dir() { 0o755 } else { 0o644 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_zip_directory_keeps_root_name() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("App.app");
        std::fs::create_dir_all(bundle.join("Frameworks")).unwrap();
        std::fs::write(bundle.join("Info.plist"), "plist").unwrap();
        std::fs::write(bundle.join("App"), "binary").unwrap();

        let archive = temp.path().join("App.zip");
        zip_directory(&bundle, &archive).unwrap();

        let names = zip_entry_names(&archive).unwrap();
        assert!(names.iter().any(|n| n == "App.app/Info.plist"));
        assert!(names.iter().any(|n| n == "App.app/App"));
        assert_eq!(
            read_zip_entry(&archive, "App.app/App").unwrap().as_deref(),
            Some(b"binary".as_slice())
        );
        assert!(read_zip_entry(&archive, "App.app/missing").unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_zip_round_trip_preserves_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("App.app");
        std::fs::create_dir_all(&bundle).unwrap();
        let exe = bundle.join("App");
        std::fs::write(&exe, "binary").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let archive = temp.path().join("App.zip");
        zip_directory(&bundle, &archive).unwrap();

        let out = temp.path().join("out");
        extract_zip(&archive, &out).unwrap();
        let mode = std::fs::metadata(out.join("App.app").join("App"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
