//! Voter identity hashing
//!
//! Raw device identifiers never reach the database; voters are keyed by the
//! lowercase hex SHA-256 of the identifier.

use sha2::{Digest, Sha256};

/// Hash a raw device identifier into the opaque voter key
pub fn hash_device_id(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.trim().as_bytes()))
}
