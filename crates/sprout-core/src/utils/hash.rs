//! SHA-256 hashing for archive integrity checks.

use crate::error::{SproutError, SproutResult};
use sha2::{Digest, Sha256};

/// Compute the lowercase SHA-256 hex digest of data
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Verify data against an expected SHA-256 hex digest
pub fn verify_checksum(package: &str, data: &[u8], expected: &str) -> SproutResult<()> {
    let actual = sha256_hex(data);
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(SproutError::ChecksumMismatch {
            package: package.to_string(),
            expected: expected.to_string(),
            actual,
        })
    }
}
