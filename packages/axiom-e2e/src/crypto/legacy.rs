//! # Legacy Channel
//!
//! The "1.0" envelope scheme, kept only so messages from peers that have not
//! upgraded can still be read and answered.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      LEGACY SEAL                                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  session_key = random 32 bytes        iv = random 16 bytes             │
//! │                                                                         │
//! │  payload     = AES-256-CBC/PKCS7(session_key, iv, plaintext)           │
//! │  wrap_key    = PBKDF2(contact legacy public key)                       │
//! │  session_ct  = AES-256-CBC/PKCS7(wrap_key, iv, session_key)            │
//! │                                                                         │
//! │  Output: (payload, session_ct, iv)                                     │
//! │                                                                         │
//! │  Open derives wrap_key from the LOCAL legacy public key instead.       │
//! │  Both sides only agree when the two public strings are identical.      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! CBC carries no authentication tag. A wrong key is usually caught by the
//! padding check or the session-key length check, but not always; callers
//! must still treat non-UTF-8 output as a failure.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use super::kdf::derive_wrapping_key;
use crate::error::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Size of the per-message session key in bytes
pub const SESSION_KEY_SIZE: usize = 32;

/// Size of the CBC initialization vector in bytes
pub const IV_SIZE: usize = 16;

/// Output of a legacy seal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySealed {
    /// Payload encrypted under the session key
    pub ciphertext: Vec<u8>,
    /// Session key encrypted under the derived wrapping key
    pub wrapped_session_key: Vec<u8>,
    /// IV shared by both encryptions
    pub iv: [u8; IV_SIZE],
}

fn cbc_encrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256CbcEnc::new_from_slices(key, iv)
        .map_err(|e| Error::EncryptionFailed(format!("Invalid AES-CBC parameters: {}", e)))?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(data))
}

fn cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| Error::DecryptionFailed(format!("Invalid AES-CBC parameters: {}", e)))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(data)
        .map_err(|_| Error::DecryptionFailed("AES-CBC padding check failed".into()))
}

/// Seal `plaintext` for the contact whose legacy public key is `their_public`
pub fn seal(plaintext: &[u8], their_public: &str) -> Result<LegacySealed> {
    let mut session_key = Zeroizing::new([0u8; SESSION_KEY_SIZE]);
    OsRng.fill_bytes(&mut session_key[..]);
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = cbc_encrypt(&session_key[..], &iv, plaintext)?;

    let wrapping_key = derive_wrapping_key(their_public)?;
    let wrapped_session_key = cbc_encrypt(&wrapping_key[..], &iv, &session_key[..])?;

    Ok(LegacySealed {
        ciphertext,
        wrapped_session_key,
        iv,
    })
}

/// Open a legacy envelope using the local legacy public key
pub fn open(
    ciphertext: &[u8],
    wrapped_session_key: &[u8],
    iv: &[u8],
    local_public: &str,
) -> Result<Vec<u8>> {
    if iv.len() != IV_SIZE {
        return Err(Error::DecryptionFailed(format!(
            "IV must be {} bytes, got {}",
            IV_SIZE,
            iv.len()
        )));
    }

    let wrapping_key = derive_wrapping_key(local_public)?;
    let session_key = Zeroizing::new(cbc_decrypt(&wrapping_key[..], iv, wrapped_session_key)?);
    if session_key.len() != SESSION_KEY_SIZE {
        return Err(Error::DecryptionFailed("Unwrapped session key is invalid".into()));
    }

    cbc_decrypt(&session_key, iv, ciphertext)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SELF_KEY: &str = "3f1c2e9a7b6d5c4e3f1c2e9a7b6d5c4e3f1c2e9a7b6d5c4e3f1c2e9a7b6d5c4e";

    #[test]
    fn test_self_seal_open() {
        let sealed = seal(b"Bonjour Axiom", SELF_KEY).unwrap();
        let opened = open(&sealed.ciphertext, &sealed.wrapped_session_key, &sealed.iv, SELF_KEY)
            .unwrap();

        assert_eq!(opened, b"Bonjour Axiom");
    }

    #[test]
    fn test_wrapped_session_key_is_padded_block() {
        let sealed = seal(b"x", SELF_KEY).unwrap();
        // 32-byte key + full PKCS7 padding block
        assert_eq!(sealed.wrapped_session_key.len(), 48);
        assert_eq!(sealed.ciphertext.len(), 16);
    }

    #[test]
    fn test_wrong_local_key_never_returns_plaintext() {
        let sealed = seal(b"for someone else", SELF_KEY).unwrap();
        let result = open(
            &sealed.ciphertext,
            &sealed.wrapped_session_key,
            &sealed.iv,
            "a-different-public-key",
        );

        if let Ok(bytes) = result {
            assert_ne!(bytes, b"for someone else");
        }
    }

    #[test]
    fn test_bad_iv_length() {
        let sealed = seal(b"x", SELF_KEY).unwrap();
        let result = open(&sealed.ciphertext, &sealed.wrapped_session_key, &[0u8; 8], SELF_KEY);
        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_truncated_ciphertext_fails() {
        let sealed = seal(b"some longer message body", SELF_KEY).unwrap();
        let result = open(
            &sealed.ciphertext[..sealed.ciphertext.len() - 1],
            &sealed.wrapped_session_key,
            &sealed.iv,
            SELF_KEY,
        );
        assert!(result.is_err());
    }
}
