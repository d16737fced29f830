// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content fingerprinting — SHA-256 digests used as archive addresses.

use sha2::{Digest, Sha256};

use crate::error::{PaperwerkError, Result};
use crate::types::Fingerprint;

/// Compute the SHA-256 fingerprint of `data` as lowercase hex.
///
/// Identical bytes always yield the same fingerprint, so two pages with the
/// same content share one archive blob.
pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Fingerprint::new(hex::encode(hasher.finalize()))
}

/// Check that `data` still hashes to `expected`.
pub fn verify_fingerprint(data: &[u8], expected: &Fingerprint) -> Result<()> {
    let actual = fingerprint_bytes(data);
    if actual == *expected {
        Ok(())
    } else {
        Err(PaperwerkError::IntegrityMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn fingerprint_of_empty_input() {
        assert_eq!(fingerprint_bytes(b"").as_str(), EMPTY_SHA256);
    }

    #[test]
    fn fingerprint_known_value() {
        let expected = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert_eq!(fingerprint_bytes(b"hello").as_str(), expected);
    }

    #[test]
    fn verify_detects_changed_content() {
        let original = fingerprint_bytes(b"page one");
        assert!(verify_fingerprint(b"page one", &original).is_ok());

        match verify_fingerprint(b"page two", &original) {
            Err(PaperwerkError::IntegrityMismatch { expected, actual }) => {
                assert_eq!(expected, original.to_string());
                assert_eq!(actual, fingerprint_bytes(b"page two").to_string());
            }
            other => panic!("expected integrity mismatch, got {other:?}"),
        }
    }
}
