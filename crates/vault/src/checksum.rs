//! Content fingerprinting shared by the processing ledger and every engine
//! that decides "is this file new?" — grounded on the SHA-256 content-hash
//! pattern used by the sibling indexing code in this workspace.

use sha2::{Digest, Sha256};

/// SHA-256 of `content`, lowercase hex-encoded.
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_hashes_to_known_digest() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn different_content_hashes_differently() {
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
    }

    #[test]
    fn same_content_hashes_identically() {
        assert_eq!(sha256_hex(b"same"), sha256_hex(b"same"));
    }
}
