// Content fingerprints for the provenance check.
//
// The metadata block is dropped first, then every line is trimmed and blank
// lines removed, so re-indenting or renaming a copied script does not change
// its fingerprint. Anything beyond that (renamed identifiers, reordered code)
// is a different fingerprint.
//
// Bodies shorter than MIN_BODY_LEN get no fingerprint at all: header-only
// scripts and one-liners are too common to say who wrote them first.

use crate::core::metadata::strip_metadata;
use crate::core::submission::SubmittedCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Minimum normalized body length, in bytes, that gets a fingerprint.
pub const MIN_BODY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// `None` when the normalized body is shorter than [`MIN_BODY_LEN`].
    pub fn of(code: &SubmittedCode) -> Option<Self> {
        let body = strip_metadata(&code.text, code.language);

        let mut normalized = String::with_capacity(body.len());
        for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
            normalized.push_str(line);
            normalized.push('\n');
        }

        if normalized.len() < MIN_BODY_LEN {
            return None;
        }

        Some(Fingerprint(hex::encode(Sha256::digest(normalized.as_bytes()))))
    }

    pub fn from_hex(hex: &str) -> Self {
        Fingerprint(hex.trim().to_ascii_lowercase())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
