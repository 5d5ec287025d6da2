//! AES-256-GCM envelope encryption and `PBKDF2`-HMAC-SHA256 key derivation for
//! the vault subsystem.
//!
//! ## Key hierarchy
//!
//! Each vault has one random 256-bit **data key** ([`DataKey`]) that actually
//! encrypts record payloads. The data key itself is never sent anywhere in
//! the clear: it is *wrapped* (encrypted) under one or more **wrapping keys**
//! derived from something the user holds — a passphrase, or a one-time
//! recovery code — via [`derive_wrapping_key`].
//!
//! ## Wire format
//!
//! Both general-purpose payload encryption ([`encrypt`]/[`decrypt`]) and data
//! key wrapping ([`wrap_key`]/[`unwrap_key`]) use the same AES-256-GCM layout:
//!
//! ```text
//! iv(12) || ciphertext(N) || tag(16)
//! ```
//!
//! No associated data is used. For a wrapped data key, `N` is always 32,
//! giving a fixed 60-byte envelope ([`WRAPPED_KEY_LEN`]).

mod engine;
mod error;
mod types;

pub use engine::{
    DataKey, WrappingKey, decrypt, derive_wrapping_key, encrypt, generate_data_key,
    generate_salt, hash_recovery_code, unwrap_key, wrap_key,
};
pub use error::{CryptoError, CryptoErrorExt};
pub use types::{PBKDF2_ITERATIONS, SALT_LEN, WRAPPED_KEY_LEN};

/// Base64 (standard alphabet, with padding) transport encoding helpers used
/// to carry binary envelopes over JSON.
pub mod b64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    #[must_use]
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        STANDARD.encode(bytes)
    }

    /// # Errors
    /// Returns an error if `s` is not valid standard-alphabet base64.
    pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(s)
    }
}
