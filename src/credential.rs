//! Password shadowing: prove knowledge of a password without storing it.
//!
//! The scheme is deterministic so that verification is a recompute-and-compare
//! with no decryption step: `digest = H(salt)` is split into an AES-256-GCM
//! key and nonce, the password is encrypted under that pair, and the result
//! is base64-encoded into the stored `shadow`. The salt is regenerated
//! whenever the password changes, so each derived (key, nonce) pair encrypts
//! exactly one message.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64ct::{Base64, Encoding};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha384, Sha512};

use crate::error::AuthError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Digest used to derive the cipher key and nonce from the salt. The output
/// must cover 32 key bytes plus 12 nonce bytes, which rules out SHA-256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlg {
    #[default]
    Sha384,
    Sha512,
}

/// Generate a fresh salt of `raw_len` random bytes, hex-encoded.
pub fn generate_salt(raw_len: usize) -> String {
    let mut bytes = vec![0u8; raw_len];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn derive_key_material(salt: &str, digest: DigestAlg) -> Result<(Vec<u8>, Vec<u8>), AuthError> {
    let output = match digest {
        DigestAlg::Sha384 => Sha384::digest(salt.as_bytes()).to_vec(),
        DigestAlg::Sha512 => Sha512::digest(salt.as_bytes()).to_vec(),
    };
    if output.len() < KEY_LEN + NONCE_LEN {
        return Err(AuthError::DigestionFailure);
    }
    let key = output[..KEY_LEN].to_vec();
    let nonce = output[KEY_LEN..KEY_LEN + NONCE_LEN].to_vec();
    Ok((key, nonce))
}

/// Compute the stored shadow for a password under the given salt.
///
/// # Errors
///
/// Returns `DigestionFailure` if key material cannot be derived and
/// `EncryptionFailure` if the cipher rejects the derived key or the
/// encryption itself fails.
pub fn compute_shadow(password: &str, salt: &str, digest: DigestAlg) -> Result<String, AuthError> {
    let (key, nonce) = derive_key_material(salt, digest)?;
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| AuthError::EncryptionFailure)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), password.as_bytes())
        .map_err(|_| AuthError::EncryptionFailure)?;
    Ok(Base64::encode_string(&ciphertext))
}

/// Recompute the shadow from the presented password and compare it to the
/// stored value. Nothing is decrypted here.
///
/// # Errors
///
/// Propagates crypto failures from [`compute_shadow`]; a clean mismatch is
/// `Ok(false)`, not an error.
pub fn verify_password(
    password: &str,
    salt: &str,
    shadow: &str,
    digest: DigestAlg,
) -> Result<bool, AuthError> {
    let recomputed = compute_shadow(password, salt, digest)?;
    Ok(recomputed == shadow)
}
