/// AEAD key length for AES-256-GCM.
pub(crate) const KEY_LEN: usize = 32;

/// AEAD nonce (IV) length (96-bit).
pub(crate) const IV_LEN: usize = 12;

/// AEAD authentication tag length (128-bit).
pub(crate) const TAG_LEN: usize = 16;

/// `PBKDF2`-HMAC-SHA256 iteration count for passphrase-derived wrapping keys.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length used for `PBKDF2` key derivation.
pub const SALT_LEN: usize = 16;

/// Total length of a wrapped 32-byte data key: `iv(12) || ciphertext(32) || tag(16)`.
pub const WRAPPED_KEY_LEN: usize = IV_LEN + KEY_LEN + TAG_LEN;
