use aead::{Aead, KeyInit, Nonce, Payload};
use aes_gcm::Aes256Gcm;
use getrandom::fill;
use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::types::{IV_LEN, KEY_LEN, PBKDF2_ITERATIONS, SALT_LEN, TAG_LEN, WRAPPED_KEY_LEN};

/// A random 256-bit data-encryption key.
///
/// Zeroized on drop; never implements `Debug`/`Display` to avoid accidental
/// logging of key material.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; KEY_LEN]);

impl DataKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl From<[u8; KEY_LEN]> for DataKey {
    fn from(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }
}

/// A 256-bit key derived from a user passphrase via `PBKDF2`-HMAC-SHA256.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WrappingKey([u8; KEY_LEN]);

impl WrappingKey {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Generates a fresh random 256-bit data-encryption key.
///
/// # Errors
/// Returns [`CryptoError::Random`] if the system RNG is unavailable.
pub fn generate_data_key() -> Result<DataKey, CryptoError> {
    let mut bytes = [0u8; KEY_LEN];
    fill(&mut bytes).map_err(|_| CryptoError::Random {
        message: "system RNG unavailable for data key generation".into(),
        context: None,
    })?;
    Ok(DataKey(bytes))
}

/// Generates a fresh random salt for `PBKDF2` key derivation.
///
/// # Errors
/// Returns [`CryptoError::Random`] if the system RNG is unavailable.
pub fn generate_salt() -> Result<[u8; SALT_LEN], CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    fill(&mut salt).map_err(|_| CryptoError::Random {
        message: "system RNG unavailable for salt generation".into(),
        context: None,
    })?;
    Ok(salt)
}

/// Derives a 256-bit wrapping key from a passphrase and salt using
/// `PBKDF2`-HMAC-SHA256 with [`PBKDF2_ITERATIONS`] iterations.
#[must_use]
pub fn derive_wrapping_key(passphrase: &str, salt: &[u8; SALT_LEN]) -> WrappingKey {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::<Hmac<Sha256>>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key)
        .expect("PBKDF2 output length is a valid HMAC-SHA256 block multiple");
    WrappingKey(key)
}

/// Encrypts `plaintext` under `key` with AES-256-GCM and a random 96-bit IV.
///
/// No associated data is used. The wire format is `iv(12) || ciphertext || tag(16)`.
///
/// # Errors
/// Returns [`CryptoError::Encryption`] if the underlying AEAD operation fails
/// or [`CryptoError::Random`] if IV generation fails.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(key.into());

    let mut iv_bytes = [0u8; IV_LEN];
    fill(&mut iv_bytes)
        .map_err(|_| CryptoError::Random { message: "system RNG unavailable for IV".into(), context: None })?;
    let nonce = Nonce::<Aes256Gcm>::from_slice(&iv_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad: &[] })
        .map_err(|_| CryptoError::Encryption {
            message: "AEAD encryption failed".into(),
            context: None,
        })?;

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts a blob produced by [`encrypt`].
///
/// # Errors
/// Returns [`CryptoError::InvalidEnvelope`] if `blob` is shorter than
/// `iv(12) + tag(16)`, or [`CryptoError::Decryption`] if the key is wrong or
/// the data has been tampered with.
pub fn decrypt(key: &[u8; KEY_LEN], blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < IV_LEN + TAG_LEN {
        return Err(CryptoError::InvalidEnvelope {
            message: format!("blob too short ({} bytes, need at least {})", blob.len(), IV_LEN + TAG_LEN).into(),
            context: None,
        });
    }

    let (iv_bytes, ciphertext) = blob.split_at(IV_LEN);
    let cipher = Aes256Gcm::new(key.into());
    let nonce = Nonce::<Aes256Gcm>::from_slice(iv_bytes);

    cipher.decrypt(nonce, Payload { msg: ciphertext, aad: &[] }).map_err(|_| CryptoError::Decryption {
        message: "AEAD authentication failed".into(),
        context: None,
    })
}

/// Wraps a 32-byte data key under a wrapping key, producing the fixed
/// 60-byte envelope `iv(12) || ciphertext(32) || tag(16)`.
///
/// # Errors
/// Returns [`CryptoError::Encryption`] or [`CryptoError::Random`] on failure.
pub fn wrap_key(wrapping_key: &WrappingKey, data_key: &DataKey) -> Result<Vec<u8>, CryptoError> {
    let wrapped = encrypt(&wrapping_key.0, &data_key.0)?;
    debug_assert_eq!(wrapped.len(), WRAPPED_KEY_LEN);
    Ok(wrapped)
}

/// Unwraps a 60-byte envelope produced by [`wrap_key`] back into a [`DataKey`].
///
/// # Errors
/// Returns [`CryptoError::InvalidEnvelope`] if `wrapped` is not exactly
/// [`WRAPPED_KEY_LEN`] bytes, or [`CryptoError::Decryption`] if the wrapping
/// key is wrong.
pub fn unwrap_key(wrapping_key: &WrappingKey, wrapped: &[u8]) -> Result<DataKey, CryptoError> {
    if wrapped.len() != WRAPPED_KEY_LEN {
        return Err(CryptoError::InvalidEnvelope {
            message: format!("expected {WRAPPED_KEY_LEN} bytes, got {}", wrapped.len()).into(),
            context: None,
        });
    }

    let plaintext = decrypt(&wrapping_key.0, wrapped)?;
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(&plaintext);
    let mut plaintext = plaintext;
    plaintext.zeroize();
    Ok(DataKey(key))
}

/// Hashes a recovery code with SHA-256, returning a lowercase hex digest.
///
/// The hash (not the code itself) is what gets persisted server-side so a
/// compromised server cannot recover the original recovery code.
#[must_use]
pub fn hash_recovery_code(code: &str) -> String {
    use sha2::Digest;
    let digest = Sha256::digest(code.trim().as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = generate_data_key().unwrap();
        let plaintext = b"hello bookmark";
        let blob = encrypt(key.as_bytes(), plaintext).unwrap();
        let recovered = decrypt(key.as_bytes(), &blob).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn encrypt_produces_unique_ivs() {
        let key = generate_data_key().unwrap();
        let a = encrypt(key.as_bytes(), b"data").unwrap();
        let b = encrypt(key.as_bytes(), b"data").unwrap();
        assert_ne!(a[..IV_LEN], b[..IV_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn decrypt_fails_with_wrong_key() {
        let key_a = generate_data_key().unwrap();
        let key_b = generate_data_key().unwrap();
        let blob = encrypt(key_a.as_bytes(), b"data").unwrap();
        assert!(decrypt(key_b.as_bytes(), &blob).is_err());
    }

    #[test]
    fn wrap_unwrap_key_roundtrip() {
        let salt = generate_salt().unwrap();
        let wrapping_key = derive_wrapping_key("correct horse battery staple", &salt);
        let data_key = generate_data_key().unwrap();

        let wrapped = wrap_key(&wrapping_key, &data_key).unwrap();
        assert_eq!(wrapped.len(), WRAPPED_KEY_LEN);

        let unwrapped = unwrap_key(&wrapping_key, &wrapped).unwrap();
        assert_eq!(unwrapped.as_bytes(), data_key.as_bytes());
    }

    #[test]
    fn unwrap_key_fails_with_wrong_passphrase() {
        let salt = generate_salt().unwrap();
        let wrapping_key = derive_wrapping_key("correct horse battery staple", &salt);
        let wrong_key = derive_wrapping_key("wrong passphrase", &salt);
        let data_key = generate_data_key().unwrap();

        let wrapped = wrap_key(&wrapping_key, &data_key).unwrap();
        assert!(unwrap_key(&wrong_key, &wrapped).is_err());
    }

    #[test]
    fn unwrap_key_rejects_wrong_length() {
        let salt = generate_salt().unwrap();
        let wrapping_key = derive_wrapping_key("pw", &salt);
        assert!(unwrap_key(&wrapping_key, &[0u8; 10]).is_err());
    }

    #[test]
    fn derive_wrapping_key_is_deterministic() {
        let salt = generate_salt().unwrap();
        let a = derive_wrapping_key("same passphrase", &salt);
        let b = derive_wrapping_key("same passphrase", &salt);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn hash_recovery_code_is_deterministic_and_hex() {
        let hash = hash_recovery_code("ABCD-1234-EFGH-5678");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_recovery_code("ABCD-1234-EFGH-5678"));
    }
}
