//! Tarball extraction functionality
//!
//! Extraction validates every entry so nothing lands outside the
//! destination directory.

use flate2::read::GzDecoder;
use sprout_core::error::SproutError;
use sprout_core::utils::{is_safe_path, safe_join};
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Entry, EntryType};

use crate::CacheResult;

fn archive_io(e: std::io::Error) -> SproutError {
    SproutError::io("Failed to read archive".to_string(), e)
}

/// Extract a gzipped tarball to a destination directory
pub fn extract_tarball<R: Read>(reader: R, dest_dir: &Path) -> CacheResult<()> {
    let mut archive = Archive::new(GzDecoder::new(reader));

    fs::create_dir_all(dest_dir)
        .map_err(|e| SproutError::io(format!("Failed to create {}", dest_dir.display()), e))?;

    for entry in archive.entries().map_err(archive_io)? {
        let mut entry = entry.map_err(archive_io)?;

        let entry_path = entry.path().map_err(archive_io)?.into_owned();
        let safe_path = safe_join(dest_dir, &entry_path)?;

        match entry.header().entry_type() {
            EntryType::Regular | EntryType::Continuous => {
                extract_regular_file(&mut entry, &safe_path)?;
                if let Ok(mode) = entry.header().mode() {
                    apply_mode(&safe_path, mode);
                }
            },
            EntryType::Directory => {
                fs::create_dir_all(&safe_path).map_err(archive_io)?;
            },
            EntryType::Symlink => {
                extract_symlink(&entry, &entry_path, &safe_path)?;
            },
            // Hard links, devices, fifos and pax metadata are skipped
            _ => {},
        }
    }

    Ok(())
}

/// Extract a regular file from tar entry
fn extract_regular_file<R: Read>(entry: &mut Entry<R>, dest_path: &Path) -> CacheResult<()> {
    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).map_err(archive_io)?;
    }

    let mut file = fs::File::create(dest_path)
        .map_err(|e| SproutError::io(format!("Failed to create {}", dest_path.display()), e))?;
    std::io::copy(entry, &mut file).map_err(archive_io)?;

    Ok(())
}

/// Create a symlink whose target stays inside the destination
fn extract_symlink<R: Read>(entry: &Entry<R>, entry_path: &Path, dest_path: &Path) -> CacheResult<()> {
    let Some(target) = entry.link_name().map_err(archive_io)? else {
        return Ok(());
    };

    // Resolve the target relative to the link's own directory inside the archive
    let relative: PathBuf = entry_path
        .parent()
        .map(|dir| dir.join(&target))
        .unwrap_or_else(|| target.to_path_buf());
    if target.components().any(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
        || !is_safe_path(&relative)
    {
        return Err(SproutError::parse(
            "archive symlink",
            &entry_path.display().to_string(),
            format!("target {} escapes the destination directory", target.display()),
        ));
    }

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).map_err(archive_io)?;
    }

    create_symlink(&target, dest_path)
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    // Keep the owner able to read and write what was unpacked
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode | 0o600));
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) {}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> CacheResult<()> {
    std::os::unix::fs::symlink(target, link).map_err(archive_io)
}

// Symlinks need extra privileges elsewhere; build inputs never rely on them
#[cfg(not(unix))]
fn create_symlink(_target: &Path, _link: &Path) -> CacheResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tarball::test_support::tarball;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tar::{Builder, Header};
    use tempfile::tempdir;

    /// Tarball with a single entry whose name bypasses `Header::set_path`
    fn raw_entry(name: &[u8], kind: EntryType, link: Option<&[u8]>) -> Vec<u8> {
        let mut data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut data, Compression::default());
            let mut builder = Builder::new(encoder);
            let mut header = Header::new_old();
            header.as_old_mut().name[..name.len()].copy_from_slice(name);
            if let Some(link) = link {
                header.as_old_mut().linkname[..link.len()].copy_from_slice(link);
            }
            header.set_entry_type(kind);
            header.set_size(if kind == EntryType::Regular { 4 } else { 0 });
            header.set_mode(0o644);
            header.set_cksum();
            let body: &[u8] = if kind == EntryType::Regular { b"evil" } else { b"" };
            builder.append(&header, body).unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }
        data
    }

    #[test]
    fn test_extract_simple_tarball() {
        let temp_dir = tempdir().unwrap();
        let extract_dir = temp_dir.path().join("extract");

        let data = tarball(&[("pkg/test.txt", "hello world")]);
        extract_tarball(std::io::Cursor::new(data), &extract_dir).unwrap();

        let content = fs::read_to_string(extract_dir.join("pkg/test.txt")).unwrap();
        assert_eq!(content, "hello world");
    }

    #[test]
    fn test_directory_traversal_rejected() {
        let temp_dir = tempdir().unwrap();
        let extract_dir = temp_dir.path().join("extract");

        let data = raw_entry(b"../evil.txt", EntryType::Regular, None);
        let result = extract_tarball(std::io::Cursor::new(data), &extract_dir);

        assert!(result.is_err());
        assert!(!temp_dir.path().join("evil.txt").exists());
    }

    #[test]
    fn test_absolute_path_rejected() {
        let temp_dir = tempdir().unwrap();
        let data = raw_entry(b"/tmp/sprout-evil.txt", EntryType::Regular, None);
        assert!(extract_tarball(std::io::Cursor::new(data), temp_dir.path()).is_err());
    }

    #[test]
    fn test_escaping_symlink_rejected() {
        let temp_dir = tempdir().unwrap();
        let data = raw_entry(b"pkg/link", EntryType::Symlink, Some(b"../../outside"));
        assert!(extract_tarball(std::io::Cursor::new(data), temp_dir.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_inner_symlink_allowed() {
        let temp_dir = tempdir().unwrap();
        let data = raw_entry(b"pkg/link", EntryType::Symlink, Some(b"target.rs"));
        extract_tarball(std::io::Cursor::new(data), temp_dir.path()).unwrap();
        assert!(temp_dir.path().join("pkg/link").symlink_metadata().is_ok());
    }
}
