use sha2::{Digest, Sha256};

/// Hex SHA-256 over the concatenation of `parts`.
pub fn sha256_hex(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Identifier of one capture event: digest of `"{timestamp}/{url}"`.
/// Two captures of the same bytes at different times get different ids.
pub fn capture_digest(timestamp: &str, url: &str) -> String {
    sha256_hex(&[timestamp.as_bytes(), b"/", url.as_bytes()])
}
