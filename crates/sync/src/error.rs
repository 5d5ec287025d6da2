//! # Sync Errors
//!
//! [`SyncError`] is the single error type returned across the public
//! boundary of this crate. The sync core never panics on caller input and
//! never throws across its boundary: callers receive a typed result.

use std::borrow::Cow;

/// A specialized [`SyncError`] enum for record-store, outbox, engine, vault
/// and migration failures.
#[anchor_derive::anchor_error]
pub enum SyncError {
    /// A payload failed its structural validation (title length, URL scheme,
    /// tag count, ...). Never enqueued to the outbox.
    #[error("Validation failed{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The server reported per-record version conflicts for a push batch.
    #[error("Push conflict on {count} record(s){}", format_context(.context))]
    Conflict { count: usize, context: Option<Cow<'static, str>> },

    /// Network or 5xx failure talking to the transport; caller should retry.
    #[error("Transport failure{}: {message}", format_context(.context))]
    Transport { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The caller's identity could not be resolved (401 from the server).
    #[error("Unauthorized{}: {message}", format_context(.context))]
    Unauthorized { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Dataset checksum mismatch that a pull did not resolve.
    #[error("Checksum integrity mismatch{}: {message}", format_context(.context))]
    Integrity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The vault is not unlocked (no data key held in session memory) but an
    /// operation required it.
    #[error("Vault is locked{}", format_context(.context))]
    VaultLocked { context: Option<Cow<'static, str>> },

    /// Passphrase or recovery code did not unwrap the data key.
    #[error("Incorrect passphrase or recovery code{}", format_context(.context))]
    IncorrectSecret { context: Option<Cow<'static, str>> },

    /// A recovery wrapper was already consumed.
    #[error("Recovery code already used{}", format_context(.context))]
    RecoveryCodeUsed { context: Option<Cow<'static, str>> },

    /// A two-phase operation (vault enable/disable) aborted and rolled back.
    #[error("Operation aborted and rolled back{}: {message}", format_context(.context))]
    Aborted { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Rollback itself failed; the backup checkpoint must be preserved and
    /// surfaced to the caller as critical.
    #[error("Rollback failed, backup {backup_id} preserved{}: {message}", format_context(.context))]
    RollbackFailed { backup_id: String, message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The underlying blob store reported a failure (full disk, quota, IO).
    #[error("Storage failure{}: {source}", format_context(.context))]
    Storage { source: anchor_storage::StorageError, context: Option<Cow<'static, str>> },

    /// A cryptographic operation (encrypt/decrypt/wrap/unwrap) failed.
    #[error("Crypto failure{}: {source}", format_context(.context))]
    Crypto { source: anchor_crypto::CryptoError, context: Option<Cow<'static, str>> },

    /// Canonical JSON serialization failed.
    #[error("Serialization failure{}: {source}", format_context(.context))]
    Serialize { source: serde_json::Error, context: Option<Cow<'static, str>> },

    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal sync error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

pub type SyncResult<T> = Result<T, SyncError>;
