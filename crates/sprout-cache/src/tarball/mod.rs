//! Archive unpacking
//!
//! Package archives are gzip'd tarballs whose entries sit under a single
//! `<name>-<version>/` directory.

use sprout_core::error::SproutError;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::CacheResult;

pub mod extract;

// Re-export main functions
pub use extract::extract_tarball;

/// Unpack an archive into `parent/<dir_name>`.
///
/// Extraction happens in a staging directory that is renamed into place
/// at the end, so a present `<dir_name>` is always complete.
pub fn unpack_archive(data: &[u8], parent: &Path, dir_name: &str) -> CacheResult<PathBuf> {
    let dest = parent.join(dir_name);
    let staging = parent.join(format!(".{}.partial", dir_name));
    let io_err = |what: &str, path: &Path, e| SproutError::io(format!("{} {}", what, path.display()), e);

    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| io_err("Failed to clear", &staging, e))?;
    }

    extract_tarball(Cursor::new(data), &staging)?;

    // Archives normally wrap everything in `<dir_name>/`
    let nested = staging.join(dir_name);
    let source = if nested.is_dir() { nested } else { staging.clone() };
    fs::rename(&source, &dest).map_err(|e| io_err("Failed to move archive into", &dest, e))?;

    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| io_err("Failed to clean up", &staging, e))?;
    }

    Ok(dest)
}

#[cfg(test)]
pub(crate) mod test_support {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tar::{Builder, Header};

    /// Build a gzip'd tarball from `(path, contents)` pairs
    pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let mut data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut data, Compression::default());
            let mut builder = Builder::new(encoder);
            for (path, contents) in files {
                let mut header = Header::new_gnu();
                header.set_path(path).unwrap();
                header.set_size(contents.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append(&header, contents.as_bytes()).unwrap();
            }
            builder.into_inner().unwrap().finish().unwrap();
        }
        data
    }
}
