//! Mode-aware push and pull, driving the outbox and record store through a
//! [`SyncTransport`]. Conflict resolution (§4.9) lives alongside push since
//! it operates directly on the conflict set a push batch returns.

use std::borrow::Cow;

use anchor_crypto::{DataKey, b64, decrypt, encrypt};
use tracing::{info, instrument, warn};

use crate::error::SyncError;
use crate::model::{RecordKind, RecordMeta, SyncMode};
use crate::outbox::OutboxEntry;
use crate::store::RecordStore;
use crate::transport::{
    PullPage, PullQuery, PushOperation, PushRequest, PushResponse, RecordConflict, SyncTransport,
    TransportError,
};

/// Result of one push cycle.
#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    pub synced: usize,
    pub conflicts: Vec<RecordConflict>,
}

/// Pushes up to `batch_size` outbox entries (capped at `batch_max`) in
/// `mode`. On success, acknowledges the pushed entries and updates each
/// record's local `sync_version`/`updated_at`. On a 409, non-conflicting
/// operations are still acknowledged; conflicting ones remain queued.
///
/// # Errors
/// Returns [`SyncError::Transport`] on a network/5xx failure (after
/// recording a retry against the batch) or [`SyncError::Unauthorized`] on a
/// 401.
#[instrument(skip(store, transport, data_key), fields(user_id = store.user_id(), mode = ?mode))]
pub async fn push<T: SyncTransport>(
    store: &RecordStore,
    transport: &T,
    mode: SyncMode,
    batch_size: usize,
    batch_max: usize,
    data_key: Option<&DataKey>,
) -> Result<PushOutcome, SyncError> {
    let limit = batch_size.min(batch_max);
    let entries = store.outbox_head(limit);
    if entries.is_empty() {
        return Ok(PushOutcome::default());
    }

    let operations = entries
        .iter()
        .map(|entry| build_operation(entry, mode, data_key))
        .collect::<Result<Vec<_>, SyncError>>()?;

    let response = match mode {
        SyncMode::E2e => transport.push_encrypted(PushRequest { operations }).await,
        _ => transport.push_plaintext(PushRequest { operations }).await,
    };

    match response {
        Ok(response) => apply_push_response(store, &entries, response).await,
        Err(TransportError::Unauthorized) => {
            warn!(user_id = store.user_id(), "push rejected as unauthorized");
            Err(SyncError::Unauthorized { message: Cow::Borrowed("push rejected"), context: None })
        },
        Err(TransportError::Rejected(message)) => {
            warn!(user_id = store.user_id(), reason = %message, "push rejected");
            Err(SyncError::Validation { message: Cow::Owned(message), context: None })
        },
        Err(TransportError::Conflict(conflicts)) => {
            // Same shape as a 200 with a non-empty conflicts array: the
            // non-conflicting operations in this batch are unknown to us
            // here, so the whole batch is retried next cycle.
            warn!(user_id = store.user_id(), count = conflicts.len(), "push reported conflicts");
            record_retries(store, &entries).await?;
            Ok(PushOutcome { synced: 0, conflicts })
        },
        Err(TransportError::Transient(message)) => {
            warn!(user_id = store.user_id(), error = %message, "push failed transiently, will retry");
            record_retries(store, &entries).await?;
            Err(SyncError::Transport { message: Cow::Owned(message), context: None })
        },
    }
}

fn build_operation(
    entry: &OutboxEntry,
    mode: SyncMode,
    data_key: Option<&DataKey>,
) -> Result<PushOperation, SyncError> {
    match mode {
        SyncMode::E2e => {
            let data_key = data_key.ok_or_else(|| SyncError::VaultLocked { context: None })?;
            let plaintext = serde_json::to_vec(&entry.payload).map_err(|source| SyncError::Serialize {
                source,
                context: Some(Cow::Borrowed("serializing outbox payload for encryption")),
            })?;
            let blob = encrypt(data_key.as_bytes(), &plaintext)
                .map_err(|source| SyncError::Crypto { source, context: None })?;
            Ok(PushOperation {
                record_id: entry.record_id.clone(),
                record_type: entry.record_type,
                data: None,
                ciphertext: Some(b64::encode(blob)),
                base_version: entry.base_version,
                deleted: entry.deleted,
            })
        },
        _ => Ok(PushOperation {
            record_id: entry.record_id.clone(),
            record_type: entry.record_type,
            data: Some(entry.payload.clone()),
            ciphertext: None,
            base_version: entry.base_version,
            deleted: entry.deleted,
        }),
    }
}

async fn apply_push_response(
    store: &RecordStore,
    entries: &[OutboxEntry],
    response: PushResponse,
) -> Result<PushOutcome, SyncError> {
    let conflicting: std::collections::HashSet<&str> =
        response.conflicts.iter().map(|c| c.record_id.as_str()).collect();

    let mut acknowledged_ops = Vec::new();
    for entry in entries {
        if conflicting.contains(entry.record_id.as_str()) {
            continue;
        }
        if let Some(result) = response.results.iter().find(|r| r.record_id == entry.record_id) {
            store
                .acknowledge(
                    entry.record_type,
                    &entry.record_id,
                    RecordMeta { sync_version: result.version, updated_at: result.updated_at },
                )
                .await?;
        }
        acknowledged_ops.push(entry.op_id.clone());
    }
    store.acknowledge_outbox(&acknowledged_ops).await?;

    if conflicting.is_empty() {
        if let Some(meta) = response.checksum_meta {
            store.store_checksum(meta).await?;
        }
    }

    Ok(PushOutcome { synced: acknowledged_ops.len(), conflicts: response.conflicts })
}

async fn record_retries(store: &RecordStore, entries: &[OutboxEntry]) -> Result<(), SyncError> {
    let keys: Vec<(String, RecordKind)> =
        entries.iter().map(|e| (e.record_id.clone(), e.record_type)).collect();
    store.record_outbox_retry(&keys).await
}

/// One of the three fixed per-record conflict resolution strategies the UI
/// may invoke after a 409 (§4.9). "Keep both" duplicates the local record
/// under a fresh id instead of overwriting either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategy {
    KeepLocal,
    KeepRemote,
    KeepBoth,
}

/// Applies `strategy` to every conflict in `conflicts`, re-enqueuing
/// whatever the strategy decides should be pushed again.
///
/// # Errors
/// Returns [`SyncError::Storage`] if re-enqueuing fails.
pub async fn resolve_conflicts(
    store: &RecordStore,
    conflicts: &[RecordConflict],
    strategy: ConflictStrategy,
) -> Result<(), SyncError> {
    for conflict in conflicts {
        let Some(local) = store.get(conflict.record_type, &conflict.record_id) else { continue };
        match strategy {
            ConflictStrategy::KeepRemote => {
                // The next pull will overwrite the local copy with the
                // server's; nothing to push for this record.
            },
            ConflictStrategy::KeepLocal => {
                store
                    .enqueue_direct(OutboxEntry {
                        op_id: nanoid::nanoid!(),
                        record_id: local.id.clone(),
                        record_type: conflict.record_type,
                        base_version: conflict.server_version,
                        payload: local.data.clone(),
                        deleted: false,
                        created_at: chrono::Utc::now(),
                        retries: 0,
                    })
                    .await?;
            },
            ConflictStrategy::KeepBoth => {
                let duplicate_id = nanoid::nanoid!();
                store.upsert(conflict.record_type, duplicate_id.clone(), local.data.clone()).await?;
                store
                    .enqueue_direct(OutboxEntry {
                        op_id: nanoid::nanoid!(),
                        record_id: duplicate_id,
                        record_type: conflict.record_type,
                        base_version: 0,
                        payload: local.data.clone(),
                        deleted: false,
                        created_at: chrono::Utc::now(),
                        retries: 0,
                    })
                    .await?;
            },
        }
    }
    Ok(())
}

/// Decrypts a pulled ciphertext payload under the current data key.
///
/// # Errors
/// Returns [`SyncError::Crypto`] if decryption fails (wrong or rotated key)
/// or [`SyncError::Serialize`] if the decrypted bytes are not valid JSON.
fn decrypt_payload(data_key: &DataKey, ciphertext_b64: &str) -> Result<serde_json::Value, SyncError> {
    let blob = b64::decode(ciphertext_b64).map_err(|_| SyncError::Crypto {
        source: anchor_crypto::CryptoError::InvalidEnvelope {
            message: Cow::Borrowed("pulled ciphertext is not valid base64"),
            context: None,
        },
        context: None,
    })?;
    let plaintext =
        decrypt(data_key.as_bytes(), &blob).map_err(|source| SyncError::Crypto { source, context: None })?;
    serde_json::from_slice(&plaintext)
        .map_err(|source| SyncError::Serialize { source, context: Some(Cow::Borrowed("decrypting pulled record")) })
}

/// Drains pull pages from cursor `None` until `hasMore=false` or the
/// `max_iterations` safety cap is hit, applying every page as it arrives.
///
/// # Errors
/// Returns [`SyncError::Transport`]/[`SyncError::Unauthorized`] from the
/// transport, or [`SyncError::Crypto`]/[`SyncError::Serialize`] while
/// applying an e2e page.
#[instrument(skip(store, transport, data_key), fields(user_id = store.user_id(), mode = ?mode))]
pub async fn pull<T: SyncTransport>(
    store: &RecordStore,
    transport: &T,
    mode: SyncMode,
    page_limit: u32,
    max_iterations: u32,
    data_key: Option<&DataKey>,
) -> Result<usize, SyncError> {
    let mut cursor = None;
    let mut applied = 0usize;

    for _ in 0..max_iterations {
        let query = PullQuery { cursor, limit: page_limit };
        let page: PullPage = match mode {
            SyncMode::E2e => transport.pull_encrypted(query).await,
            _ => transport.pull_plaintext(query).await,
        }
        .map_err(|err| {
            warn!(user_id = store.user_id(), error = ?err, "pull failed");
            transport_to_sync_error(err)
        })?;

        for record in &page.records {
            let meta = RecordMeta { sync_version: record.version, updated_at: record.updated_at };
            if record.deleted {
                store.apply_pulled(record.record_type, &record.record_id, None, meta, true).await?;
                continue;
            }
            let data = match (&record.data, &record.ciphertext) {
                (Some(data), _) => data.clone(),
                (None, Some(ciphertext)) => {
                    let Some(data_key) = data_key else {
                        // Encrypted record pulled with no key held: skip and
                        // let the next pull retry after unlock/rotation.
                        warn!(
                            user_id = store.user_id(),
                            record_id = %record.record_id,
                            "skipping encrypted record, vault is locked"
                        );
                        continue;
                    };
                    match decrypt_payload(data_key, ciphertext) {
                        Ok(data) => data,
                        Err(err) => {
                            warn!(
                                user_id = store.user_id(),
                                record_id = %record.record_id,
                                error = %err,
                                "dropping pulled record, decryption failed"
                            );
                            continue;
                        },
                    }
                },
                (None, None) => continue,
            };
            store.apply_pulled(record.record_type, &record.record_id, Some(data), meta, false).await?;
            applied += 1;
        }

        if !page.has_more {
            break;
        }
        cursor = page.next_cursor;
    }

    info!(user_id = store.user_id(), applied, "pull complete");
    Ok(applied)
}

fn transport_to_sync_error(err: TransportError) -> SyncError {
    match err {
        TransportError::Unauthorized => SyncError::Unauthorized { message: Cow::Borrowed("pull rejected"), context: None },
        TransportError::Rejected(message) => SyncError::Validation { message: Cow::Owned(message), context: None },
        TransportError::Conflict(_) => {
            SyncError::Internal { message: Cow::Borrowed("pull does not produce conflicts"), context: None }
        },
        TransportError::Transient(message) => SyncError::Transport { message: Cow::Owned(message), context: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(base_version: u64, deleted: bool) -> OutboxEntry {
        OutboxEntry {
            op_id: "op-1".into(),
            record_id: "rec-1".into(),
            record_type: RecordKind::Bookmark,
            base_version,
            payload: serde_json::json!({"title": "x"}),
            deleted,
            created_at: chrono::Utc::now(),
            retries: 0,
        }
    }

    #[test]
    fn plaintext_mode_carries_data_not_ciphertext() {
        let op = build_operation(&entry(3, false), SyncMode::Plaintext, None).unwrap();
        assert!(op.data.is_some());
        assert!(op.ciphertext.is_none());
        assert_eq!(op.base_version, 3);
        assert!(!op.deleted);
    }

    #[test]
    fn e2e_mode_without_data_key_is_rejected() {
        let err = build_operation(&entry(0, false), SyncMode::E2e, None).unwrap_err();
        assert!(matches!(err, SyncError::VaultLocked { .. }));
    }

    #[test]
    fn e2e_mode_encrypts_payload_and_round_trips() {
        let data_key = anchor_crypto::generate_data_key().unwrap();
        let op = build_operation(&entry(0, true), SyncMode::E2e, Some(&data_key)).unwrap();
        assert!(op.data.is_none());
        let ciphertext = b64::decode(op.ciphertext.as_deref().unwrap()).unwrap();
        let plaintext = decrypt(data_key.as_bytes(), &ciphertext).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&plaintext).unwrap();
        assert_eq!(value, serde_json::json!({"title": "x"}));
        assert!(op.deleted);
    }
}
