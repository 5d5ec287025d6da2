//! Vault subsystem: envelope generation, passphrase/recovery unlock, and the
//! enable (plaintext→e2e) / disable (e2e→plaintext) two-phase commits.
//!
//! The disable flow's backup checkpoint holds the invariant "server or
//! backup always holds the canonical dataset" through every step; phases
//! are never collapsed, and rollback is driven entirely from the backup
//! blob rather than from in-memory state that a crash could lose.

use std::borrow::Cow;

use anchor_crypto::{DataKey, b64, derive_wrapping_key, generate_data_key, generate_salt, hash_recovery_code, unwrap_key, wrap_key};
use anchor_storage::NamespacedStorage;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::SyncConfig;
use crate::engine;
use crate::error::SyncError;
use crate::model::{KdfParams, RecordKind, RecordMeta, RecoveryWrapper, SyncMode, SyncSettings, VaultEnvelope};
use crate::outbox::OutboxEntry;
use crate::store::RecordStore;
use crate::transport::{CleanupRequest, DisableAction, SyncTransport, VaultEnableRequest};

const BACKUP_PREFIX: &str = "backups/";

/// A local snapshot taken before the irreversible phase of vault disable,
/// keyed by an opaque id and used only for rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BackupCheckpoint {
    id: String,
    envelope: VaultEnvelope,
    encrypted_records: Vec<BackupRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BackupRecord {
    id: String,
    kind: RecordKind,
    ciphertext_b64: String,
    meta: RecordMeta,
}

/// Holds the unwrapped data key in volatile session memory only; it is
/// never persisted and is dropped (zeroized) when the session ends.
pub struct UnlockedVault {
    pub data_key: DataKey,
}

/// Generates a fresh envelope wrapping a new data key under a
/// passphrase-derived wrapping key, without touching any storage.
///
/// # Errors
/// Returns [`SyncError::Crypto`] if key generation fails.
pub fn generate_envelope(passphrase: &str) -> Result<(VaultEnvelope, DataKey), SyncError> {
    let data_key = generate_data_key().map_err(|source| SyncError::Crypto { source, context: None })?;
    let salt = generate_salt().map_err(|source| SyncError::Crypto { source, context: None })?;
    let wrapping_key = derive_wrapping_key(passphrase, &salt);
    let wrapped = wrap_key(&wrapping_key, &data_key).map_err(|source| SyncError::Crypto { source, context: None })?;

    let envelope = VaultEnvelope {
        wrapped_data_key: wrapped,
        salt: salt.to_vec(),
        kdf_params: KdfParams::default(),
        version: 1,
        recovery_wrappers: Vec::new(),
    };
    Ok((envelope, data_key))
}

/// Generates `count` fresh one-time recovery codes and their wrappers for
/// `data_key`, returning the plaintext codes to show the user exactly once
/// (only `code_hash` is persisted in the wrapper).
///
/// # Errors
/// Returns [`SyncError::Crypto`] if key derivation fails.
pub fn generate_recovery_wrappers(
    data_key: &DataKey,
    count: usize,
) -> Result<(Vec<RecoveryWrapper>, Vec<String>), SyncError> {
    let mut wrappers = Vec::with_capacity(count);
    let mut codes = Vec::with_capacity(count);
    for _ in 0..count {
        let code = format_recovery_code(&nanoid::nanoid!(20, &RECOVERY_ALPHABET));
        let salt = generate_salt().map_err(|source| SyncError::Crypto { source, context: None })?;
        let wrapping_key = derive_wrapping_key(&code, &salt);
        let wrapped =
            wrap_key(&wrapping_key, data_key).map_err(|source| SyncError::Crypto { source, context: None })?;
        wrappers.push(RecoveryWrapper {
            id: nanoid::nanoid!(),
            wrapped_data_key: wrapped,
            salt: salt.to_vec(),
            code_hash: hash_recovery_code(&code),
            used_at: None,
        });
        codes.push(code);
    }
    Ok((wrappers, codes))
}

const RECOVERY_ALPHABET: [char; 32] = [
    '2', '3', '4', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'M', 'N', 'P', 'Q', 'R', 'T',
    'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c',
];

fn format_recovery_code(raw: &str) -> String {
    raw.as_bytes().chunks(5).map(|c| String::from_utf8_lossy(c).into_owned()).collect::<Vec<_>>().join("-")
}

/// Unlocks the vault by deriving the wrapping key from `passphrase` and the
/// envelope's salt, then unwrapping the data key. Held only in
/// [`UnlockedVault`]; never persisted.
///
/// # Errors
/// Returns [`SyncError::IncorrectSecret`] if the passphrase does not unwrap
/// the envelope.
pub fn unlock_with_passphrase(envelope: &VaultEnvelope, passphrase: &str) -> Result<UnlockedVault, SyncError> {
    let salt: [u8; anchor_crypto::SALT_LEN] =
        envelope.salt.clone().try_into().map_err(|_| SyncError::IncorrectSecret { context: None })?;
    let wrapping_key = derive_wrapping_key(passphrase, &salt);
    let data_key =
        unwrap_key(&wrapping_key, &envelope.wrapped_data_key).map_err(|_| SyncError::IncorrectSecret { context: None })?;
    Ok(UnlockedVault { data_key })
}

/// Recovery-code unlock (§4.7.3): unwraps the data key via the matching
/// unused wrapper, then re-wraps it under a freshly chosen passphrase and
/// returns both the unlocked vault and the updated envelope to upload.
///
/// # Errors
/// Returns [`SyncError::IncorrectSecret`] if no wrapper matches the code's
/// hash, or [`SyncError::RecoveryCodeUsed`] if the matching wrapper was
/// already consumed.
pub fn unlock_with_recovery_code(
    envelope: &VaultEnvelope,
    code: &str,
    new_passphrase: &str,
) -> Result<(UnlockedVault, VaultEnvelope), SyncError> {
    let code_hash = hash_recovery_code(code);
    let index = envelope
        .recovery_wrappers
        .iter()
        .position(|w| w.code_hash == code_hash)
        .ok_or(SyncError::IncorrectSecret { context: None })?;

    if envelope.recovery_wrappers[index].used_at.is_some() {
        return Err(SyncError::RecoveryCodeUsed { context: None });
    }

    let wrapper = &envelope.recovery_wrappers[index];
    let salt: [u8; anchor_crypto::SALT_LEN] =
        wrapper.salt.clone().try_into().map_err(|_| SyncError::IncorrectSecret { context: None })?;
    let wrapping_key = derive_wrapping_key(code, &salt);
    let data_key = unwrap_key(&wrapping_key, &wrapper.wrapped_data_key)
        .map_err(|_| SyncError::IncorrectSecret { context: None })?;

    let new_salt = generate_salt().map_err(|source| SyncError::Crypto { source, context: None })?;
    let new_wrapping_key = derive_wrapping_key(new_passphrase, &new_salt);
    let new_wrapped =
        wrap_key(&new_wrapping_key, &data_key).map_err(|source| SyncError::Crypto { source, context: None })?;

    let mut updated = envelope.clone();
    updated.wrapped_data_key = new_wrapped;
    updated.salt = new_salt.to_vec();
    updated.recovery_wrappers[index].used_at = Some(chrono::Utc::now());

    Ok((UnlockedVault { data_key }, updated))
}

/// Runs the enable flow (§4.7.1): encrypts every local record under a fresh
/// data key, uploads the envelope, pushes the ciphertext records, then
/// flips sync mode to `e2e`. Restores the previous sync mode and leaves
/// plaintext storage intact on any failure.
///
/// # Errors
/// Returns a [`SyncError`] describing the failing step; phase 1 failures
/// leave local state untouched, phase 2 failures restore the prior mode.
#[instrument(skip(store, transport, passphrase, config), fields(user_id = store.user_id()))]
pub async fn enable<T: SyncTransport>(
    store: &RecordStore,
    transport: &T,
    passphrase: &str,
    recovery_code_count: usize,
    config: &SyncConfig,
) -> Result<(VaultEnvelope, Vec<String>), SyncError> {
    let previous_settings = store.settings();

    // Phase 1 (local, reversible): clear stale state, generate and wrap a
    // fresh data key, encrypt every record, sanity-check one round-trip.
    store.clear_outbox().await?;
    let (mut envelope, data_key) = generate_envelope(passphrase)?;
    let (wrappers, recovery_codes) = if recovery_code_count > 0 {
        generate_recovery_wrappers(&data_key, recovery_code_count)?
    } else {
        (Vec::new(), Vec::new())
    };
    envelope.recovery_wrappers = wrappers;

    // Records are re-encrypted at push time by the sync engine (§4.5); this
    // pass only verifies the data key can round-trip every payload before
    // anything is uploaded.
    let mut plaintext_records: Vec<(RecordKind, String, serde_json::Value)> = Vec::new();
    for kind in RecordKind::all() {
        for record in store.list(kind) {
            let plaintext = serde_json::to_vec(&record.data).map_err(|source| SyncError::Serialize {
                source,
                context: Some(Cow::Borrowed("encrypting record for vault enable")),
            })?;
            let ciphertext = anchor_crypto::encrypt(data_key.as_bytes(), &plaintext)
                .map_err(|source| SyncError::Crypto { source, context: None })?;
            anchor_crypto::decrypt(data_key.as_bytes(), &ciphertext)
                .map_err(|source| SyncError::Crypto { source, context: Some(Cow::Borrowed("enable sanity check")) })?;
            plaintext_records.push((kind, record.id, record.data));
        }
    }

    // Phase 2 (server-coordinated): upload envelope, push every record
    // (encrypted at push time under `data_key`), flip sync mode.
    let result = run_enable_phase_two(store, transport, &envelope, &data_key, &plaintext_records, config).await;
    match result {
        Ok(()) => {
            info!(user_id = store.user_id(), records = plaintext_records.len(), "vault enabled");
            Ok((envelope, recovery_codes))
        },
        Err(err) => {
            warn!(user_id = store.user_id(), error = %err, "vault enable failed, restoring prior settings");
            store.set_settings(previous_settings).await?;
            Err(err)
        },
    }
}

async fn run_enable_phase_two<T: SyncTransport>(
    store: &RecordStore,
    transport: &T,
    envelope: &VaultEnvelope,
    data_key: &DataKey,
    plaintext_records: &[(RecordKind, String, serde_json::Value)],
    config: &SyncConfig,
) -> Result<(), SyncError> {
    transport
        .enable_vault(VaultEnableRequest { envelope: envelope.clone() })
        .await
        .map_err(|err| transport_error(err, "uploading vault envelope"))?;

    store.clear_outbox().await?;
    for (kind, id, data) in plaintext_records {
        store
            .enqueue_direct(OutboxEntry {
                op_id: nanoid::nanoid!(),
                record_id: id.clone(),
                record_type: *kind,
                base_version: 0,
                payload: data.clone(),
                deleted: false,
                created_at: chrono::Utc::now(),
                retries: 0,
            })
            .await?;
    }

    drain_push_loop(store, transport, SyncMode::E2e, config, Some(data_key)).await?;

    store
        .set_settings(SyncSettings { sync_enabled: true, sync_mode: SyncMode::E2e, last_sync_at: Some(chrono::Utc::now()) })
        .await?;
    store.set_envelope(Some(envelope.clone())).await?;
    Ok(())
}

/// Drives the push loop to completion, capped at
/// `config.push_loop_max_iterations` with linear back-off (`i * 1s`).
///
/// # Errors
/// Returns [`SyncError::Aborted`] if the outbox is not fully drained within
/// the iteration cap.
pub async fn drain_push_loop<T: SyncTransport>(
    store: &RecordStore,
    transport: &T,
    mode: SyncMode,
    config: &SyncConfig,
    data_key: Option<&DataKey>,
) -> Result<(), SyncError> {
    for iteration in 0..config.push_loop_max_iterations {
        if store.pending_count() == 0 {
            return Ok(());
        }
        let outcome =
            engine::push(store, transport, mode, config.push_batch_size, config.push_batch_max, data_key).await?;
        if outcome.synced == 0 && !outcome.conflicts.is_empty() {
            // Conflicting entries will not drain by retrying as-is; surface
            // immediately rather than spinning through the remaining cap.
            return Err(SyncError::Conflict { count: outcome.conflicts.len(), context: None });
        }
        if store.pending_count() > 0 {
            tokio::time::sleep(tokio::time::Duration::from_secs(u64::from(iteration) + 1)).await;
        }
    }
    if store.pending_count() > 0 {
        return Err(SyncError::Aborted {
            message: Cow::Borrowed("push loop exhausted without draining the outbox"),
            context: None,
        });
    }
    Ok(())
}

/// Runs the disable flow (§4.7.2): the canonical two-phase-with-backup
/// variant. Aborts and rolls back from the backup checkpoint if
/// verification fails; any rollback failure preserves the backup id.
///
/// # Errors
/// Returns [`SyncError::Aborted`] on a clean rollback, or
/// [`SyncError::RollbackFailed`] if rollback itself could not complete (the
/// backup id is preserved for manual recovery).
#[instrument(skip(storage, store, transport, envelope, data_key, config), fields(user_id = store.user_id()))]
pub async fn disable<T: SyncTransport>(
    storage: &NamespacedStorage,
    store: &RecordStore,
    transport: &T,
    envelope: &VaultEnvelope,
    data_key: &DataKey,
    config: &SyncConfig,
) -> Result<(), SyncError> {
    // Phase 1, step 1: passphrase/key already verified by the caller
    // holding `data_key` (obtained via unlock_with_passphrase/recovery).

    // Step 2: snapshot encrypted records and the envelope.
    let backup = snapshot_for_backup(store, envelope, data_key).await?;
    write_backup(storage, &backup).await?;

    // Steps 3-4: decrypt every record, clear the outbox, enqueue plaintext.
    let mut decrypted = Vec::with_capacity(backup.encrypted_records.len());
    for record in &backup.encrypted_records {
        let ciphertext = b64::decode(&record.ciphertext_b64)
            .map_err(|_| SyncError::Crypto { source: invalid_envelope(), context: None })?;
        let plaintext = anchor_crypto::decrypt(data_key.as_bytes(), &ciphertext)
            .map_err(|source| SyncError::Crypto { source, context: None })?;
        let data: serde_json::Value = serde_json::from_slice(&plaintext).map_err(|source| SyncError::Serialize {
            source,
            context: Some(Cow::Borrowed("decrypting record during vault disable")),
        })?;
        decrypted.push((record.kind, record.id.clone(), data));
    }

    store.clear_outbox().await?;
    for (kind, id, data) in &decrypted {
        store
            .enqueue_direct(OutboxEntry {
                op_id: nanoid::nanoid!(),
                record_id: id.clone(),
                record_type: *kind,
                base_version: 0,
                payload: data.clone(),
                deleted: false,
                created_at: chrono::Utc::now(),
                retries: 0,
            })
            .await?;
    }

    // Step 5: drive the push loop; abort+rollback if it cannot drain.
    if let Err(push_err) = drain_push_loop(store, transport, SyncMode::Plaintext, config, None).await {
        warn!(user_id = store.user_id(), error = %push_err, "disable push loop failed, rolling back");
        return rollback(storage, store, transport, &backup, data_key, push_err).await;
    }

    // Step 6: verify server record count, retrying transient failures.
    let expected = decrypted.len();
    match verify_with_retries(transport, expected, config).await {
        Ok(true) => {},
        Ok(false) | Err(_) => {
            warn!(user_id = store.user_id(), expected, "disable verification mismatch, rolling back");
            let err = SyncError::Aborted {
                message: Cow::Borrowed("server record count did not match after disable push"),
                context: None,
            };
            return rollback(storage, store, transport, &backup, data_key, err).await;
        },
    }

    // Phase 2 (irreversible): server cleans up, client flips mode and
    // clears the backup.
    transport.disable_vault_action(DisableAction::DeleteEncrypted).await.map_err(|e| transport_error(e, "deleting encrypted rows"))?;
    transport.disable_vault_action(DisableAction::DeleteVault).await.map_err(|e| transport_error(e, "deleting vault envelope"))?;

    store
        .set_settings(SyncSettings {
            sync_enabled: true,
            sync_mode: SyncMode::Plaintext,
            last_sync_at: Some(chrono::Utc::now()),
        })
        .await?;
    store.set_envelope(None).await?;
    delete_backup(storage, &backup.id).await?;
    info!(user_id = store.user_id(), "vault disabled");
    Ok(())
}

async fn verify_with_retries<T: SyncTransport>(
    transport: &T,
    expected_count: usize,
    config: &SyncConfig,
) -> Result<bool, SyncError> {
    for attempt in 0..config.verify_max_attempts {
        let deadline = tokio::time::Duration::from_secs(config.verify_attempt_timeout_secs);
        let attempt_result =
            tokio::time::timeout(deadline, transport.verify_plaintext(expected_count)).await;
        match attempt_result {
            Ok(Ok(response)) => return Ok(response.verified && response.server_count == expected_count),
            Ok(Err(TransportError::Transient(_))) | Err(_) => {
                if attempt + 1 == config.verify_max_attempts {
                    return Ok(false);
                }
            },
            Ok(Err(_)) => return Ok(false),
        }
    }
    Ok(false)
}

async fn rollback<T: SyncTransport>(
    storage: &NamespacedStorage,
    store: &RecordStore,
    transport: &T,
    backup: &BackupCheckpoint,
    data_key: &DataKey,
    cause: SyncError,
) -> Result<(), SyncError> {
    let restore = restore_from_backup(store, backup, data_key).await;
    let record_ids: Vec<String> = backup.encrypted_records.iter().map(|r| r.id.clone()).collect();
    let record_types: Vec<RecordKind> = backup.encrypted_records.iter().map(|r| r.kind).collect();
    let cleanup = transport.disable_cleanup(CleanupRequest { record_ids, record_types }).await;

    match (restore, cleanup) {
        (Ok(()), _) => {
            info!(user_id = store.user_id(), backup_id = %backup.id, error = %cause, "disable rolled back");
            delete_backup(storage, &backup.id).await?;
            Err(cause)
        },
        (Err(restore_err), _) => {
            warn!(
                user_id = store.user_id(),
                backup_id = %backup.id,
                error = %restore_err,
                "disable rollback failed, backup preserved"
            );
            Err(SyncError::RollbackFailed {
                backup_id: backup.id.clone(),
                message: Cow::Owned(format!("rollback restore failed: {restore_err}")),
                context: None,
            })
        },
    }
}

async fn restore_from_backup(
    store: &RecordStore,
    backup: &BackupCheckpoint,
    data_key: &DataKey,
) -> Result<(), SyncError> {
    for record in &backup.encrypted_records {
        let ciphertext = b64::decode(&record.ciphertext_b64)
            .map_err(|_| SyncError::Crypto { source: invalid_envelope(), context: None })?;
        let plaintext = anchor_crypto::decrypt(data_key.as_bytes(), &ciphertext)
            .map_err(|source| SyncError::Crypto { source, context: None })?;
        let data: serde_json::Value = serde_json::from_slice(&plaintext).map_err(|source| SyncError::Serialize {
            source,
            context: Some(Cow::Borrowed("restoring record from backup")),
        })?;
        store.upsert(record.kind, record.id.clone(), data).await?;
    }
    Ok(())
}

/// Lists backup checkpoints still present under the vault backup prefix,
/// surfaced to the UI when a reload interrupts a disable in progress.
///
/// # Errors
/// Returns [`SyncError::Storage`] if the backup directory cannot be read.
pub async fn list_backups(storage: &NamespacedStorage) -> Result<Vec<String>, SyncError> {
    // `anchor-storage` exposes per-file operations; an index file alongside
    // each backup keeps this listing O(1) rather than requiring a directory
    // walk through the sandboxed namespace.
    let index_path = format!("{BACKUP_PREFIX}index.json");
    match storage.read(&index_path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|source| SyncError::Serialize { source, context: Some(Cow::Borrowed("reading backup index")) }),
        Err(anchor_storage::StorageError::FileNotFound { .. }) => Ok(Vec::new()),
        Err(source) => Err(SyncError::Storage { source, context: Some(Cow::Borrowed("reading backup index")) }),
    }
}

async fn snapshot_for_backup(
    store: &RecordStore,
    envelope: &VaultEnvelope,
    data_key: &DataKey,
) -> Result<BackupCheckpoint, SyncError> {
    let mut encrypted_records = Vec::new();
    for kind in RecordKind::all() {
        for record in store.list(kind) {
            let plaintext = serde_json::to_vec(&record.data).map_err(|source| SyncError::Serialize {
                source,
                context: Some(Cow::Borrowed("encrypting record for backup checkpoint")),
            })?;
            let ciphertext = anchor_crypto::encrypt(data_key.as_bytes(), &plaintext)
                .map_err(|source| SyncError::Crypto { source, context: None })?;
            let ciphertext_b64 = b64::encode(ciphertext);
            encrypted_records.push(BackupRecord { id: record.id, kind, ciphertext_b64, meta: record.meta });
        }
    }
    Ok(BackupCheckpoint { id: nanoid::nanoid!(), envelope: envelope.clone(), encrypted_records })
}

async fn write_backup(storage: &NamespacedStorage, backup: &BackupCheckpoint) -> Result<(), SyncError> {
    let path = format!("{BACKUP_PREFIX}{}.json", backup.id);
    let bytes = serde_json::to_vec(backup)
        .map_err(|source| SyncError::Serialize { source, context: Some(Cow::Borrowed("writing backup checkpoint")) })?;
    storage
        .write(&path, &bytes)
        .await
        .map_err(|source| SyncError::Storage { source, context: Some(Cow::Borrowed("writing backup checkpoint")) })?;

    let mut index = list_backups(storage).await?;
    index.push(backup.id.clone());
    let index_bytes = serde_json::to_vec(&index)
        .map_err(|source| SyncError::Serialize { source, context: Some(Cow::Borrowed("writing backup index")) })?;
    storage
        .write(format!("{BACKUP_PREFIX}index.json"), &index_bytes)
        .await
        .map_err(|source| SyncError::Storage { source, context: Some(Cow::Borrowed("writing backup index")) })
}

async fn delete_backup(storage: &NamespacedStorage, backup_id: &str) -> Result<(), SyncError> {
    let path = format!("{BACKUP_PREFIX}{backup_id}.json");
    storage
        .delete(&path)
        .await
        .map_err(|source| SyncError::Storage { source, context: Some(Cow::Borrowed("deleting backup checkpoint")) })?;

    let mut index = list_backups(storage).await?;
    index.retain(|id| id != backup_id);
    let index_bytes = serde_json::to_vec(&index)
        .map_err(|source| SyncError::Serialize { source, context: Some(Cow::Borrowed("writing backup index")) })?;
    storage
        .write(format!("{BACKUP_PREFIX}index.json"), &index_bytes)
        .await
        .map_err(|source| SyncError::Storage { source, context: Some(Cow::Borrowed("writing backup index")) })
}

fn invalid_envelope() -> anchor_crypto::CryptoError {
    anchor_crypto::CryptoError::InvalidEnvelope {
        message: Cow::Borrowed("backup ciphertext is not valid base64"),
        context: None,
    }
}

fn transport_error(err: TransportError, during: &'static str) -> SyncError {
    match err {
        TransportError::Unauthorized => SyncError::Unauthorized { message: Cow::Borrowed(during), context: None },
        TransportError::Transient(message) => SyncError::Transport { message: Cow::Owned(message), context: None },
        TransportError::Rejected(message) => SyncError::Validation { message: Cow::Owned(message), context: None },
        TransportError::Conflict(conflicts) => SyncError::Conflict { count: conflicts.len(), context: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passphrase_round_trips_through_envelope() {
        let (envelope, data_key) = generate_envelope("correct horse battery staple").unwrap();
        let unlocked = unlock_with_passphrase(&envelope, "correct horse battery staple").unwrap();
        assert_eq!(unlocked.data_key.as_bytes(), data_key.as_bytes());
    }

    #[test]
    fn wrong_passphrase_is_rejected() {
        let (envelope, _data_key) = generate_envelope("correct horse battery staple").unwrap();
        let err = unlock_with_passphrase(&envelope, "wrong passphrase").unwrap_err();
        assert!(matches!(err, SyncError::IncorrectSecret { .. }));
    }

    #[test]
    fn recovery_code_unlocks_and_rotates_envelope() {
        let (mut envelope, data_key) = generate_envelope("correct horse battery staple").unwrap();
        let (wrappers, codes) = generate_recovery_wrappers(&data_key, 1).unwrap();
        envelope.recovery_wrappers = wrappers;

        let (unlocked, updated) = unlock_with_recovery_code(&envelope, &codes[0], "new passphrase").unwrap();
        assert_eq!(unlocked.data_key.as_bytes(), data_key.as_bytes());
        assert!(updated.recovery_wrappers[0].used_at.is_some());

        // The rotated envelope is readable with the new passphrase afterwards.
        let relocked = unlock_with_passphrase(&updated, "new passphrase").unwrap();
        assert_eq!(relocked.data_key.as_bytes(), data_key.as_bytes());
    }

    #[test]
    fn reusing_a_consumed_recovery_code_is_rejected() {
        let (mut envelope, data_key) = generate_envelope("correct horse battery staple").unwrap();
        let (wrappers, codes) = generate_recovery_wrappers(&data_key, 1).unwrap();
        envelope.recovery_wrappers = wrappers;
        let (_, updated) = unlock_with_recovery_code(&envelope, &codes[0], "new passphrase").unwrap();

        let err = unlock_with_recovery_code(&updated, &codes[0], "another passphrase").unwrap_err();
        assert!(matches!(err, SyncError::RecoveryCodeUsed { .. }));
    }
}
