//! Content digests.

use mlist_core::error::{ListError, Result};
use sha2::{Digest, Sha256};

/// The only digest algorithm registries are required to support.
pub const SHA256: &str = "sha256";

/// Compute the `sha256:<hex>` digest of `data`.
pub fn sha256_digest(data: &[u8]) -> String {
    format!("{}:{}", SHA256, hex::encode(Sha256::digest(data)))
}

/// Check that `data` hashes to `expected`.
///
/// `stage` and `subject` end up in the error so a mismatch can be traced to
/// the push or fetch that produced it.
pub fn verify_digest(stage: &str, subject: &str, expected: &str, data: &[u8]) -> Result<()> {
    let algorithm = expected.split_once(':').map(|(a, _)| a).unwrap_or("");
    if algorithm != SHA256 {
        return Err(ListError::Other(format!(
            "Unsupported digest algorithm '{}' for {} ({})",
            algorithm, subject, expected
        )));
    }

    let actual = sha256_digest(data);
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(ListError::DigestMismatch {
            stage: stage.to_string(),
            subject: subject.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
