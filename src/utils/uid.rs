//! Content-based article identity.
//!
//! A UID is the lowercase hex SHA-256 digest of the exact bytes a document
//! arrived as. It never looks at the parsed structure, so two runs over the
//! same bytes agree regardless of which extractor handled them.

use sha2::{Digest, Sha256};

/// Version tag of the UID scheme. Bump when the digest algorithm changes.
pub const UID_SCHEME: &str = "sha256-v1";

/// Length of a UID in hex characters
pub const UID_LEN: usize = 64;

/// Compute the UID of a raw document.
///
/// Defined for every input, including the empty slice.
pub fn compute_uid(raw: &[u8]) -> String {
    format!("{:x}", Sha256::digest(raw))
}

/// Check that a string looks like a UID produced by [`compute_uid`]
pub fn is_valid_uid(uid: &str) -> bool {
    uid.len() == UID_LEN && uid.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_stable() {
        assert_eq!(
            compute_uid(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            compute_uid(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_deterministic() {
        let doc = b"<article><front/></article>";
        assert_eq!(compute_uid(doc), compute_uid(doc));
    }

    #[test]
    fn test_single_bit_flip_changes_uid() {
        let original = b"<title>Example</title>".to_vec();
        let mut flipped = original.clone();
        flipped[3] ^= 0x01;
        assert_ne!(compute_uid(&original), compute_uid(&flipped));
    }

    #[test]
    fn test_uid_shape() {
        let uid = compute_uid(b"anything");
        assert_eq!(uid.len(), UID_LEN);
        assert!(is_valid_uid(&uid));
        assert!(!is_valid_uid("not-a-uid"));
        assert!(!is_valid_uid(&uid.to_uppercase()));
    }
}
