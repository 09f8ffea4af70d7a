//! Stable identity of an uploaded binary
//!
//! APKs are identified by the SHA-256 of their bytes. Compiled Apple
//! binaries carry a UUID in their `LC_UUID` load command, which is what
//! crash reports and dSYMs reference.

use std::fs::File;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Result, StoreError};

const MH_MAGIC: u32 = 0xfeed_face;
const MH_MAGIC_64: u32 = 0xfeed_facf;
const FAT_MAGIC: u32 = 0xcafe_babe;
const FAT_MAGIC_64: u32 = 0xcafe_babf;
const LC_UUID: u32 = 0x1b;

/// Hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Binary id of an APK
pub fn apk_binary_id(path: &Path) -> Result<String> {
    sha256_file(path)
}

/// Binary id of a Mach-O executable; a missing UUID is fatal
pub fn apple_binary_id(executable: &Path) -> Result<String> {
    let bytes = std::fs::read(executable)?;
    macho_uuid(&bytes).ok_or_else(|| StoreError::BinaryIdNotFound(executable.to_path_buf()))
}

/// `LC_UUID` of a Mach-O image, formatted `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX`.
///
/// Universal binaries report the UUID of their first slice.
pub fn macho_uuid(bytes: &[u8]) -> Option<String> {
    match read_u32_be(bytes, 0)? {
        FAT_MAGIC => {
            let offset = read_u32_be(bytes, 16)? as usize;
            thin_uuid(bytes.get(offset..)?)
        }
        FAT_MAGIC_64 => {
            let offset = read_u64_be(bytes, 16)? as usize;
            thin_uuid(bytes.get(offset..)?)
        }
        _ => thin_uuid(bytes),
    }
}

fn thin_uuid(image: &[u8]) -> Option<String> {
    let header_size = match read_u32_le(image, 0)? {
        MH_MAGIC_64 => 32,
        MH_MAGIC => 28,
        _ => return None,
    };
    let ncmds = read_u32_le(image, 16)?;

    let mut offset = header_size;
    for _ in 0..ncmds {
        let cmd = read_u32_le(image, offset)?;
        let cmdsize = read_u32_le(image, offset + 4)? as usize;
        if cmd == LC_UUID {
            let uuid = image.get(offset + 8..offset + 24)?;
            return Some(format_uuid(uuid));
        }
        if cmdsize == 0 {
            return None;
        }
        offset += cmdsize;
    }
    None
}

fn format_uuid(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(offset..offset + 4)?.try_into().ok()?))
}

fn read_u32_be(bytes: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.get(offset..offset + 4)?.try_into().ok()?))
}

fn read_u64_be(bytes: &[u8], offset: usize) -> Option<u64> {
    Some(u64::from_be_bytes(bytes.get(offset..offset + 8)?.try_into().ok()?))
}
