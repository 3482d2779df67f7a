//! Version arithmetic and identifier generation.
//!
//! Versions are dotted numeric strings. Anything that does not parse as one
//! is not an error here: [`increment_version`] falls back to
//! [`FALLBACK_VERSION`] so that a protocol with a hand-edited or suffixed
//! version (`1.0.2_branch`) can still be revised.

use std::fmt::Write;

use sha2::{Digest, Sha256};

use accord_types::Timestamp;

pub const FALLBACK_VERSION: &str = "1.0.1";

/// Number of hex characters kept from the id digest.
pub const ID_LENGTH: usize = 12;

fn parse_components(version: &str) -> Option<Vec<u64>> {
    if version.is_empty() {
        return None;
    }
    version
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            part.parse::<u64>().ok()
        })
        .collect()
}

/// Next version after `current`.
///
/// `"1.0.3"` becomes `"1.0.4"`, `"1.0"` becomes `"1.0.1"`. Components past
/// the third are carried over unchanged.
#[must_use]
pub fn increment_version(current: &str) -> String {
    let Some(mut parts) = parse_components(current) else {
        return FALLBACK_VERSION.to_string();
    };

    if parts.len() < 3 {
        parts.push(1);
    } else {
        match parts[2].checked_add(1) {
            Some(next) => parts[2] = next,
            None => return FALLBACK_VERSION.to_string(),
        }
    }

    parts
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Third numeric component of a well-formed version, if there is one.
#[must_use]
pub fn patch_component(version: &str) -> Option<u64> {
    parse_components(version).and_then(|parts| parts.get(2).copied())
}

/// Short content hash over `seed_parts` followed by the RFC 3339 timestamp.
///
/// Not collision-proof. The store rejects a duplicate id instead of
/// overwriting, so a collision surfaces as an error on insert.
#[must_use]
pub fn generate_id(seed_parts: &[&str], timestamp: Timestamp) -> String {
    let mut hasher = Sha256::new();
    for part in seed_parts {
        hasher.update(part.as_bytes());
    }
    hasher.update(timestamp.to_rfc3339().as_bytes());
    let digest = hasher.finalize();

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex.truncate(ID_LENGTH);
    hex
}
