//! End-to-end scenarios over an in-process [`SyncTransport`], exercising
//! push/pull, vault enable/disable and first-sign-in migration without any
//! real network or database.

use std::collections::HashMap;
use std::sync::Arc;

use anchor_event_bus::EventBus;
use anchor_storage::Storage;
use anchor_sync::{
    CleanupRequest, DisableAction, PullPage, PullQuery, PulledRecord, PushRequest, PushResponse, PushResult,
    RecordConflict, RecordKind, RecordStore, SyncConfig, SyncMode, SyncSettings, SyncSettingsDto, SyncTransport,
    TransportError, VaultEnableRequest, VaultEnvelope, VaultStatus, VerifyPlaintextResponse,
};
use chrono::Utc;
use parking_lot::Mutex;

#[derive(Default)]
struct ServerState {
    plaintext: HashMap<(String, RecordKind), StoredRow>,
    encrypted: HashMap<(String, RecordKind), StoredRow>,
    settings: SyncSettingsDto,
    vault: Option<VaultEnvelope>,
    next_version: u64,
}

#[derive(Clone)]
struct StoredRow {
    data: Option<serde_json::Value>,
    ciphertext: Option<String>,
    version: u64,
    deleted: bool,
    updated_at: chrono::DateTime<Utc>,
}

/// A single-user in-memory stand-in for `anchor-sync-server`, sufficient to
/// drive the engine/vault/migration flows without a real HTTP client.
struct MockTransport {
    state: Mutex<ServerState>,
}

impl MockTransport {
    fn new() -> Self {
        Self {
            state: Mutex::new(ServerState {
                settings: SyncSettingsDto { sync_enabled: false, sync_mode: SyncMode::Off, last_sync_at: None },
                next_version: 1,
                ..Default::default()
            }),
        }
    }
}

impl SyncTransport for MockTransport {
    async fn push_plaintext(&self, request: PushRequest) -> Result<PushResponse, TransportError> {
        let mut state = self.state.lock();
        let mut results = Vec::new();
        for op in request.operations {
            let version = state.next_version;
            state.next_version += 1;
            let row = StoredRow {
                data: op.data.clone(),
                ciphertext: None,
                version,
                deleted: op.deleted,
                updated_at: Utc::now(),
            };
            results.push(PushResult { record_id: op.record_id.clone(), version, updated_at: row.updated_at });
            state.plaintext.insert((op.record_id, op.record_type), row);
        }
        Ok(PushResponse { success: true, synced: results.len(), results, checksum: None, checksum_meta: None, conflicts: Vec::new() })
    }

    async fn pull_plaintext(&self, _query: PullQuery) -> Result<PullPage, TransportError> {
        let state = self.state.lock();
        let records = state
            .plaintext
            .iter()
            .map(|((id, kind), row)| PulledRecord {
                record_id: id.clone(),
                record_type: *kind,
                data: row.data.clone(),
                ciphertext: None,
                version: row.version,
                deleted: row.deleted,
                updated_at: row.updated_at,
            })
            .collect();
        Ok(PullPage { records, next_cursor: None, has_more: false })
    }

    async fn plaintext_checksum(&self) -> Result<anchor_sync::ChecksumMeta, TransportError> {
        let state = self.state.lock();
        let inputs: Vec<anchor_sync::ChecksumInput> = state
            .plaintext
            .iter()
            .filter(|(_, row)| !row.deleted)
            .map(|((id, kind), row)| anchor_sync::ChecksumInput {
                record_id: id.clone(),
                record_type: *kind,
                data: row.data.clone().unwrap_or(serde_json::Value::Null),
                version: row.version,
                updated_at: row.updated_at,
            })
            .collect();
        anchor_sync::compute_checksum(&inputs).map_err(|e| TransportError::Rejected(e.to_string()))
    }

    async fn push_encrypted(&self, request: PushRequest) -> Result<PushResponse, TransportError> {
        let mut state = self.state.lock();
        let mut results = Vec::new();
        for op in request.operations {
            let version = state.next_version;
            state.next_version += 1;
            let row = StoredRow {
                data: None,
                ciphertext: op.ciphertext.clone(),
                version,
                deleted: op.deleted,
                updated_at: Utc::now(),
            };
            results.push(PushResult { record_id: op.record_id.clone(), version, updated_at: row.updated_at });
            state.encrypted.insert((op.record_id, op.record_type), row);
        }
        Ok(PushResponse { success: true, synced: results.len(), results, checksum: None, checksum_meta: None, conflicts: Vec::new() })
    }

    async fn pull_encrypted(&self, _query: PullQuery) -> Result<PullPage, TransportError> {
        let state = self.state.lock();
        let records = state
            .encrypted
            .iter()
            .map(|((id, kind), row)| PulledRecord {
                record_id: id.clone(),
                record_type: *kind,
                data: None,
                ciphertext: row.ciphertext.clone(),
                version: row.version,
                deleted: row.deleted,
                updated_at: row.updated_at,
            })
            .collect();
        Ok(PullPage { records, next_cursor: None, has_more: false })
    }

    async fn get_settings(&self) -> Result<SyncSettingsDto, TransportError> {
        Ok(self.state.lock().settings.clone())
    }

    async fn put_settings(&self, settings: SyncSettingsDto) -> Result<SyncSettingsDto, TransportError> {
        self.state.lock().settings = settings.clone();
        Ok(settings)
    }

    async fn get_vault(&self) -> Result<VaultStatus, TransportError> {
        let state = self.state.lock();
        Ok(VaultStatus { enabled: state.vault.is_some(), envelope: state.vault.clone() })
    }

    async fn put_vault_envelope(&self, envelope: VaultEnvelope) -> Result<(), TransportError> {
        self.state.lock().vault = Some(envelope);
        Ok(())
    }

    async fn enable_vault(&self, request: VaultEnableRequest) -> Result<(), TransportError> {
        self.state.lock().vault = Some(request.envelope);
        Ok(())
    }

    async fn disable_vault_action(&self, action: DisableAction) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        match action {
            DisableAction::DeleteEncrypted => state.encrypted.clear(),
            DisableAction::DeleteVault => state.vault = None,
            DisableAction::DeletePlaintext => state.plaintext.clear(),
            DisableAction::Verify => {},
        }
        Ok(())
    }

    async fn verify_plaintext(&self, expected_count: usize) -> Result<VerifyPlaintextResponse, TransportError> {
        let server_count = self.state.lock().plaintext.values().filter(|r| !r.deleted).count();
        Ok(VerifyPlaintextResponse { verified: server_count == expected_count, server_count, expected_count })
    }

    async fn disable_cleanup(&self, _request: CleanupRequest) -> Result<(), TransportError> {
        Ok(())
    }
}

async fn new_store(user_id: &str) -> (RecordStore, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let storage = Storage::builder().root(tmp.path()).create(true).connect().await.unwrap();
    let namespace = storage.namespace(user_id.to_owned()).unwrap();
    let store = RecordStore::load(namespace, Arc::new(EventBus::new()), user_id, SyncConfig::default()).await.unwrap();
    (store, tmp)
}

/// S1-shaped scenario: a plaintext bookmark created locally reaches the
/// server and comes back with a server-assigned version.
#[tokio::test]
async fn plaintext_push_acknowledges_server_version() {
    let (store, _tmp) = new_store("alice").await;
    store
        .set_settings(SyncSettings { sync_enabled: true, sync_mode: SyncMode::Plaintext, last_sync_at: None })
        .await
        .unwrap();
    store
        .upsert(RecordKind::Bookmark, "bm-1".into(), serde_json::json!({"title": "Rust Book", "url": "https://doc.rust-lang.org/book/"}))
        .await
        .unwrap();
    assert_eq!(store.pending_count(), 1);

    let transport = MockTransport::new();
    let outcome = anchor_sync::push(&store, &transport, SyncMode::Plaintext, 50, 100, None).await.unwrap();

    assert_eq!(outcome.synced, 1);
    assert_eq!(store.pending_count(), 0);
    let record = store.get(RecordKind::Bookmark, "bm-1").unwrap();
    assert_eq!(record.meta.sync_version, 1);
}

/// An edit to an already-synced record carries the prior version as
/// `baseVersion`, not zero.
#[tokio::test]
async fn edit_after_push_carries_prior_version_as_base() {
    let (store, _tmp) = new_store("bob").await;
    store
        .set_settings(SyncSettings { sync_enabled: true, sync_mode: SyncMode::Plaintext, last_sync_at: None })
        .await
        .unwrap();
    store.upsert(RecordKind::Space, "s-1".into(), serde_json::json!({"name": "Reading", "created_at": Utc::now()})).await.unwrap();

    let transport = MockTransport::new();
    anchor_sync::push(&store, &transport, SyncMode::Plaintext, 50, 100, None).await.unwrap();

    store.upsert(RecordKind::Space, "s-1".into(), serde_json::json!({"name": "Reading List", "created_at": Utc::now()})).await.unwrap();
    let pending = store.outbox_head(10);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].base_version, 1);
}

/// Vault enable pushes every record once, encrypted under the fresh data
/// key; pull never sees a plaintext copy once enabled.
#[tokio::test]
async fn vault_enable_encrypts_existing_records_exactly_once() {
    let (store, _tmp) = new_store("carol").await;
    store
        .set_settings(SyncSettings { sync_enabled: true, sync_mode: SyncMode::Plaintext, last_sync_at: None })
        .await
        .unwrap();
    store
        .upsert(RecordKind::Bookmark, "bm-1".into(), serde_json::json!({"title": "Secret", "url": "https://example.com/"}))
        .await
        .unwrap();

    let transport = MockTransport::new();
    anchor_sync::push(&store, &transport, SyncMode::Plaintext, 50, 100, None).await.unwrap();

    let config = SyncConfig::default();
    let (_envelope, codes) = anchor_sync::enable_vault(&store, &transport, "correct horse battery staple", 2, &config).await.unwrap();
    assert_eq!(codes.len(), 2);
    assert_eq!(store.settings().sync_mode, SyncMode::E2e);

    let state = transport.state.lock();
    assert_eq!(state.encrypted.len(), 1);
    let row = state.encrypted.values().next().unwrap();
    assert!(row.ciphertext.is_some());
    assert!(row.data.is_none());
}

/// Vault disable decrypts every record back to plaintext and restores
/// plaintext sync mode once verification passes.
#[tokio::test]
async fn vault_disable_round_trips_back_to_plaintext() {
    let tmp = tempfile::tempdir().unwrap();
    let storage = Storage::builder().root(tmp.path()).create(true).connect().await.unwrap();
    let namespace = storage.namespace("dave".to_owned()).unwrap();
    let store = RecordStore::load(namespace.clone(), Arc::new(EventBus::new()), "dave", SyncConfig::default()).await.unwrap();

    store
        .set_settings(SyncSettings { sync_enabled: true, sync_mode: SyncMode::Plaintext, last_sync_at: None })
        .await
        .unwrap();
    store
        .upsert(RecordKind::Bookmark, "bm-1".into(), serde_json::json!({"title": "Vaulted", "url": "https://example.com/a"}))
        .await
        .unwrap();

    let transport = MockTransport::new();
    anchor_sync::push(&store, &transport, SyncMode::Plaintext, 50, 100, None).await.unwrap();

    let config = SyncConfig::default();
    let (envelope, _codes) = anchor_sync::enable_vault(&store, &transport, "hunter2 passphrase", 0, &config).await.unwrap();
    let unlocked = anchor_sync::unlock_with_passphrase(&envelope, "hunter2 passphrase").unwrap();

    anchor_sync::disable_vault(&namespace, &store, &transport, &envelope, &unlocked.data_key, &config).await.unwrap();

    assert_eq!(store.settings().sync_mode, SyncMode::Plaintext);
    let state = transport.state.lock();
    assert!(state.encrypted.is_empty());
    assert!(state.vault.is_none());
    let row = state.plaintext.values().next().unwrap();
    assert_eq!(row.data.as_ref().unwrap()["title"], "Vaulted");
}

/// A 409 response leaves the conflicting op in the outbox while
/// acknowledging everything else in the batch.
#[tokio::test]
async fn conflict_response_keeps_only_conflicting_entries_pending() {
    struct ConflictingTransport;
    impl SyncTransport for ConflictingTransport {
        async fn push_plaintext(&self, request: PushRequest) -> Result<PushResponse, TransportError> {
            let conflicts: Vec<RecordConflict> = request
                .operations
                .iter()
                .filter(|op| op.record_id == "conflicted")
                .map(|op| RecordConflict { record_id: op.record_id.clone(), record_type: op.record_type, server_version: 9 })
                .collect();
            let results = request
                .operations
                .iter()
                .filter(|op| op.record_id != "conflicted")
                .map(|op| PushResult { record_id: op.record_id.clone(), version: 1, updated_at: Utc::now() })
                .collect::<Vec<_>>();
            Ok(PushResponse { success: true, synced: results.len(), results, checksum: None, checksum_meta: None, conflicts })
        }
        async fn pull_plaintext(&self, _q: PullQuery) -> Result<PullPage, TransportError> {
            Ok(PullPage { records: Vec::new(), next_cursor: None, has_more: false })
        }
        async fn plaintext_checksum(&self) -> Result<anchor_sync::ChecksumMeta, TransportError> {
            anchor_sync::compute_checksum(&[]).map_err(|e| TransportError::Rejected(e.to_string()))
        }
        async fn push_encrypted(&self, request: PushRequest) -> Result<PushResponse, TransportError> {
            self.push_plaintext(request).await
        }
        async fn pull_encrypted(&self, q: PullQuery) -> Result<PullPage, TransportError> {
            self.pull_plaintext(q).await
        }
        async fn get_settings(&self) -> Result<SyncSettingsDto, TransportError> {
            Ok(SyncSettingsDto { sync_enabled: true, sync_mode: SyncMode::Plaintext, last_sync_at: None })
        }
        async fn put_settings(&self, s: SyncSettingsDto) -> Result<SyncSettingsDto, TransportError> {
            Ok(s)
        }
        async fn get_vault(&self) -> Result<VaultStatus, TransportError> {
            Ok(VaultStatus { enabled: false, envelope: None })
        }
        async fn put_vault_envelope(&self, _e: VaultEnvelope) -> Result<(), TransportError> {
            Ok(())
        }
        async fn enable_vault(&self, _r: VaultEnableRequest) -> Result<(), TransportError> {
            Ok(())
        }
        async fn disable_vault_action(&self, _a: DisableAction) -> Result<(), TransportError> {
            Ok(())
        }
        async fn verify_plaintext(&self, expected_count: usize) -> Result<VerifyPlaintextResponse, TransportError> {
            Ok(VerifyPlaintextResponse { verified: true, server_count: expected_count, expected_count })
        }
        async fn disable_cleanup(&self, _r: CleanupRequest) -> Result<(), TransportError> {
            Ok(())
        }
    }

    let (store, _tmp) = new_store("erin").await;
    store
        .set_settings(SyncSettings { sync_enabled: true, sync_mode: SyncMode::Plaintext, last_sync_at: None })
        .await
        .unwrap();
    store.upsert(RecordKind::Bookmark, "conflicted".into(), serde_json::json!({"title": "a", "url": "https://example.com/"})).await.unwrap();
    store.upsert(RecordKind::Bookmark, "clean".into(), serde_json::json!({"title": "b", "url": "https://example.org/"})).await.unwrap();

    let transport = ConflictingTransport;
    let outcome = anchor_sync::push(&store, &transport, SyncMode::Plaintext, 50, 100, None).await.unwrap();

    assert_eq!(outcome.conflicts.len(), 1);
    let pending = store.outbox_head(10);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].record_id, "conflicted");
}
