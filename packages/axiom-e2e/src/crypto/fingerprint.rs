//! Security fingerprints for out-of-band identity verification.
//!
//! `SHA-256(local_public || contact_public)`, truncated, grouped into blocks
//! of four uppercase hex characters:
//!
//! ```text
//! 3F1C 2E9A 7B6D 5C4E 0A91 D2B7 66E0 41FC
//! ```
//!
//! The concatenation order is `local + contact`, so the two parties see
//! different strings for the same conversation.

use sha2::{Digest, Sha256};

/// Full SHA-256 digest length in hex characters
const DIGEST_HEX_LEN: usize = 64;

/// Hex characters per display block
const BLOCK_LEN: usize = 4;

/// Fingerprint of a conversation between two public keys
///
/// `hex_len` is rounded down to whole 4-character blocks and clamped to
/// between one block and the full digest.
pub fn generate_fingerprint(local_public: &str, contact_public: &str, hex_len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(local_public.as_bytes());
    hasher.update(contact_public.as_bytes());
    let digest = hex::encode(hasher.finalize());

    let len = (hex_len.min(DIGEST_HEX_LEN) / BLOCK_LEN).max(1) * BLOCK_LEN;
    let prefix = &digest[..len];
    prefix
        .as_bytes()
        .chunks(BLOCK_LEN)
        .map(|block| String::from_utf8_lossy(block).to_uppercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hex SHA-256 of a single public key, sent alongside it during key exchange
pub fn key_fingerprint(public_key: &str) -> String {
    hex::encode(Sha256::digest(public_key.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_format() {
        let fp = generate_fingerprint("alice-key", "bob-key", 32);
        let blocks: Vec<&str> = fp.split(' ').collect();

        assert_eq!(blocks.len(), 8);
        for block in blocks {
            assert_eq!(block.len(), 4);
            assert!(block.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_fingerprint_deterministic() {
        assert_eq!(
            generate_fingerprint("alice-key", "bob-key", 32),
            generate_fingerprint("alice-key", "bob-key", 32)
        );
    }

    #[test]
    fn test_fingerprint_changes_with_either_key() {
        let base = generate_fingerprint("alice-key", "bob-key", 32);
        assert_ne!(base, generate_fingerprint("alice-key2", "bob-key", 32));
        assert_ne!(base, generate_fingerprint("alice-key", "bob-key2", 32));
    }

    #[test]
    fn test_fingerprint_is_order_dependent() {
        assert_ne!(
            generate_fingerprint("alice-key", "bob-key", 32),
            generate_fingerprint("bob-key", "alice-key", 32)
        );
    }

    #[test]
    fn test_fingerprint_known_value() {
        // sha256("ab") = fb8e20fc2e4c3f248c60c39bd652f3c1347298bb977b8b4d5903b85055620603
        assert_eq!(generate_fingerprint("a", "b", 16), "FB8E 20FC 2E4C 3F24");
    }

    #[test]
    fn test_fingerprint_length_clamped() {
        let fp = generate_fingerprint("a", "b", 1000);
        assert_eq!(fp.replace(' ', "").len(), 64);
    }

    #[test]
    fn test_fingerprint_length_rounds_to_whole_blocks() {
        assert_eq!(generate_fingerprint("a", "b", 18), "FB8E 20FC 2E4C 3F24");
        assert_eq!(generate_fingerprint("a", "b", 0), "FB8E");
        assert_eq!(generate_fingerprint("a", "b", 3), "FB8E");
    }

    #[test]
    fn test_key_fingerprint() {
        let fp = key_fingerprint("alice-key");
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, key_fingerprint("alice-key"));
    }
}
