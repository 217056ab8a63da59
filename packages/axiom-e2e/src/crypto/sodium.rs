//! # Sodium Channel
//!
//! Public-key authenticated encryption compatible with libsodium's
//! `crypto_box_easy`: X25519 key agreement, XSalsa20 stream, Poly1305 tag.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SENDER (Alice)                        RECIPIENT (Bob)                  │
//! │  ─────────────────                     ──────────────────               │
//! │                                                                         │
//! │  nonce = random 24 bytes                                               │
//! │  cipher = box(m, nonce,                 m = box_open(cipher, nonce,     │
//! │               bob_public,                             alice_public,     │
//! │               alice_secret)                           bob_secret)       │
//! │                                                                         │
//! │  Output: (cipher, nonce)               Tamper / wrong key → error      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The channel does not distinguish message and file payloads; both are
//! sealed as byte strings.

use crypto_box::aead::{Aead, Nonce as BoxNonce};
use crypto_box::{PublicKey as BoxPublicKey, SalsaBox, SecretKey as BoxSecretKey};
use rand::rngs::OsRng;
use rand::RngCore;

use super::keys::{BoxKeyPair, BOX_KEY_SIZE};
use crate::error::{Error, Result};

/// Size of the XSalsa20 nonce in bytes
pub const BOX_NONCE_SIZE: usize = 24;

/// Size of the Poly1305 tag prepended by `crypto_box`
pub const BOX_MAC_SIZE: usize = 16;

/// Output of a successful seal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBox {
    /// Ciphertext including the authentication tag
    pub cipher: Vec<u8>,
    /// Nonce used for this box
    pub nonce: [u8; BOX_NONCE_SIZE],
}

fn salsa_box(their_public: &[u8; BOX_KEY_SIZE], ours: &BoxKeyPair) -> SalsaBox {
    let their_public = BoxPublicKey::from(*their_public);
    let our_secret = BoxSecretKey::from(*ours.secret_bytes());
    SalsaBox::new(&their_public, &our_secret)
}

/// Seal `plaintext` for the holder of `their_public`
pub fn seal(plaintext: &[u8], their_public: &[u8; BOX_KEY_SIZE], ours: &BoxKeyPair) -> Result<SealedBox> {
    let mut nonce = [0u8; BOX_NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let cipher = salsa_box(their_public, ours)
        .encrypt(BoxNonce::<SalsaBox>::from_slice(&nonce), plaintext)
        .map_err(|_| Error::EncryptionFailed("crypto_box seal failed".into()))?;

    Ok(SealedBox { cipher, nonce })
}

/// Open a box sent by the holder of `their_public`
///
/// Fails closed: any tamper, wrong key or malformed nonce yields
/// `DecryptionFailed` and no plaintext.
pub fn open(
    cipher: &[u8],
    nonce: &[u8],
    their_public: &[u8; BOX_KEY_SIZE],
    ours: &BoxKeyPair,
) -> Result<Vec<u8>> {
    if nonce.len() != BOX_NONCE_SIZE {
        return Err(Error::DecryptionFailed(format!(
            "Nonce must be {} bytes, got {}",
            BOX_NONCE_SIZE,
            nonce.len()
        )));
    }
    if cipher.len() < BOX_MAC_SIZE {
        return Err(Error::DecryptionFailed("Ciphertext shorter than tag".into()));
    }

    salsa_box(their_public, ours)
        .decrypt(BoxNonce::<SalsaBox>::from_slice(nonce), cipher)
        .map_err(|_| Error::DecryptionFailed("crypto_box authentication failed".into()))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_between_two_parties() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();

        let sealed = seal(b"hello", &bob.public_bytes(), &alice).unwrap();
        let opened = open(&sealed.cipher, &sealed.nonce, &alice.public_bytes(), &bob).unwrap();

        assert_eq!(opened, b"hello");
    }

    #[test]
    fn test_seal_to_self() {
        let me = BoxKeyPair::generate();

        let sealed = seal(b"Bonjour Axiom", &me.public_bytes(), &me).unwrap();
        let opened = open(&sealed.cipher, &sealed.nonce, &me.public_bytes(), &me).unwrap();

        assert_eq!(opened, b"Bonjour Axiom");
    }

    #[test]
    fn test_ciphertext_carries_tag() {
        let me = BoxKeyPair::generate();
        let sealed = seal(b"abc", &me.public_bytes(), &me).unwrap();
        assert_eq!(sealed.cipher.len(), 3 + BOX_MAC_SIZE);
    }

    #[test]
    fn test_every_flipped_byte_is_rejected() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let sealed = seal(b"tamper me", &bob.public_bytes(), &alice).unwrap();

        for i in 0..sealed.cipher.len() {
            let mut cipher = sealed.cipher.clone();
            cipher[i] ^= 0x01;
            let result = open(&cipher, &sealed.nonce, &alice.public_bytes(), &bob);
            assert!(result.is_err(), "flipped byte {} was accepted", i);
        }
    }

    #[test]
    fn test_wrong_sender_key_fails() {
        let alice = BoxKeyPair::generate();
        let bob = BoxKeyPair::generate();
        let mallory = BoxKeyPair::generate();

        let sealed = seal(b"hello", &bob.public_bytes(), &alice).unwrap();
        let result = open(&sealed.cipher, &sealed.nonce, &mallory.public_bytes(), &bob);

        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_bad_nonce_length_fails() {
        let me = BoxKeyPair::generate();
        let sealed = seal(b"x", &me.public_bytes(), &me).unwrap();

        let result = open(&sealed.cipher, &sealed.nonce[..12], &me.public_bytes(), &me);
        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let me = BoxKeyPair::generate();
        let a = seal(b"same", &me.public_bytes(), &me).unwrap();
        let b = seal(b"same", &me.public_bytes(), &me).unwrap();

        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.cipher, b.cipher);
    }
}
