//! # Crypto Errors
//!
//! This module defines the [`CryptoError`] enum used throughout the crate for
//! reporting key derivation, encryption, and envelope-parsing failures.

use std::borrow::Cow;

/// A specialized [`CryptoError`] enum for vault cryptography failures.
#[anchor_derive::anchor_error]
pub enum CryptoError {
    /// Failure during the AEAD encryption process.
    #[error("Encryption error{}: {message}", format_context(.context))]
    Encryption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Failure during the AEAD decryption process.
    ///
    /// Usually indicates a wrong passphrase, a wrong recovery code, or tampered data.
    #[error("Decryption error{}: {message}", format_context(.context))]
    Decryption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The envelope or wrapped key bytes are malformed or the wrong length.
    #[error("Invalid envelope{}: {message}", format_context(.context))]
    InvalidEnvelope { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Random number generation failed.
    #[error("Random generation failed{}: {message}", format_context(.context))]
    Random { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal crypto error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
