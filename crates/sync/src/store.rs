//! Client record store: owns the authoritative local copy of a signed-in
//! user's records, the outbox, sync settings and checksum cache, all
//! persisted through [`NamespacedStorage`] with a process-wide read-through
//! cache invalidated via [`KeyChanged`] notifications.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anchor_event_bus::EventBus;
use anchor_storage::NamespacedStorage;
use chrono::Utc;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::checksum::{self, ChecksumInput, ChecksumMeta};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::events::KeyChanged;
use crate::model::{RecordKind, RecordMeta, SyncSettings, VaultEnvelope};
use crate::outbox::{Outbox, OutboxEntry};

const KEY_BOOKMARKS: &str = "bookmarks.json";
const KEY_SPACES: &str = "spaces.json";
const KEY_PINNED_VIEWS: &str = "pinnedViews.json";
const KEY_OUTBOX: &str = "outbox.json";
const KEY_CHECKSUM: &str = "checksum.json";
const KEY_SETTINGS: &str = "settings.json";
const KEY_ENVELOPE: &str = "envelope.json";

fn key_for(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Bookmark => KEY_BOOKMARKS,
        RecordKind::Space => KEY_SPACES,
        RecordKind::PinnedView => KEY_PINNED_VIEWS,
    }
}

/// One stored record: payload plus the client-tracked sync bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: String,
    pub data: serde_json::Value,
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RecordTable {
    version: u32,
    data: Vec<StoredRecord>,
}

type KindCache = FxHashMap<RecordKind, FxHashMap<String, StoredRecord>>;

/// Owns a signed-in user's local dataset, outbox and settings, persisted
/// under one [`NamespacedStorage`] namespace (conventionally the user id).
#[derive(Debug)]
pub struct RecordStore {
    storage: NamespacedStorage,
    events: Arc<EventBus>,
    user_id: String,
    config: SyncConfig,
    cache: RwLock<KindCache>,
    outbox: RwLock<Outbox>,
    settings: RwLock<SyncSettings>,
    checksum_meta: RwLock<Option<ChecksumMeta>>,
    checksum_generation: Arc<AtomicU64>,
    envelope: RwLock<Option<VaultEnvelope>>,
}

impl RecordStore {
    /// Loads (or initializes) the store for `user_id` from `storage`,
    /// reading every persisted key up front so the in-memory cache starts
    /// warm.
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] if a persisted key exists but is
    /// corrupt JSON.
    pub async fn load(
        storage: NamespacedStorage,
        events: Arc<EventBus>,
        user_id: impl Into<String>,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        let user_id = user_id.into();
        let mut cache: KindCache = FxHashMap::default();
        for kind in RecordKind::all() {
            let table = read_json_or_default::<RecordTable>(&storage, key_for(kind)).await?;
            let by_id: FxHashMap<String, StoredRecord> =
                table.data.into_iter().map(|r| (r.id.clone(), r)).collect();
            cache.insert(kind, by_id);
        }
        let outbox = read_json_or_default::<Outbox>(&storage, KEY_OUTBOX).await?;
        let settings = read_json_or_default::<SyncSettings>(&storage, KEY_SETTINGS).await?;
        let checksum_meta = read_json_opt::<ChecksumMeta>(&storage, KEY_CHECKSUM).await?;
        let envelope = read_json_opt::<VaultEnvelope>(&storage, KEY_ENVELOPE).await?;

        Ok(Self {
            storage,
            events,
            user_id,
            config,
            cache: RwLock::new(cache),
            outbox: RwLock::new(outbox),
            settings: RwLock::new(settings),
            checksum_meta: RwLock::new(checksum_meta),
            checksum_generation: Arc::new(AtomicU64::new(0)),
            envelope: RwLock::new(envelope),
        })
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns a defensive copy of every non-deleted record of `kind`.
    #[must_use]
    pub fn list(&self, kind: RecordKind) -> Vec<StoredRecord> {
        self.cache.read().get(&kind).map(|m| m.values().cloned().collect()).unwrap_or_default()
    }

    #[must_use]
    pub fn get(&self, kind: RecordKind, id: &str) -> Option<StoredRecord> {
        self.cache.read().get(&kind).and_then(|m| m.get(id)).cloned()
    }

    /// Inserts or replaces a record, persists the kind's table, enqueues an
    /// outbox entry when sync is enabled, and schedules a debounced checksum
    /// recalculation. The in-memory cache is left unchanged if persistence
    /// fails.
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] on a persistence failure.
    pub async fn upsert(&self, kind: RecordKind, id: String, data: serde_json::Value) -> Result<(), SyncError> {
        let previous_version = self.get(kind, &id).map(|r| r.meta.sync_version).unwrap_or(0);
        let record = StoredRecord {
            id: id.clone(),
            data: data.clone(),
            meta: RecordMeta { sync_version: previous_version, updated_at: Utc::now() },
        };
        self.persist_with(kind, |table| {
            table.insert(id.clone(), record.clone());
        })
        .await?;

        if self.settings.read().sync_enabled {
            self.enqueue(kind, id, Some(data), false, previous_version);
        }
        self.schedule_checksum_refresh();
        Ok(())
    }

    /// Hard-deletes a record from the local cache (sync deletes flow through
    /// the outbox as a `deleted:true` upsert instead of a local removal —
    /// see the outbox contract). This is used for records the UI removes
    /// without ever having been synced (`sync_version == 0`).
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] on a persistence failure.
    pub async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), SyncError> {
        let previous_version = self.get(kind, id).map(|r| r.meta.sync_version).unwrap_or(0);
        let removed_id = id.to_owned();
        self.persist_with(kind, |table| {
            table.remove(&removed_id);
        })
        .await?;

        if self.settings.read().sync_enabled {
            self.enqueue(kind, id.to_owned(), None, true, previous_version);
        }
        self.schedule_checksum_refresh();
        Ok(())
    }

    /// Applies a server-acknowledged version/timestamp to a record already
    /// present locally, called after a successful push.
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] on a persistence failure.
    pub async fn acknowledge(
        &self,
        kind: RecordKind,
        id: &str,
        meta: RecordMeta,
    ) -> Result<(), SyncError> {
        let id = id.to_owned();
        self.persist_with(kind, |table| {
            if let Some(record) = table.get_mut(&id) {
                record.meta = meta;
            }
        })
        .await
    }

    /// Overwrites the local record with a pulled server record, or removes
    /// it if the pulled record is a tombstone.
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] on a persistence failure.
    pub async fn apply_pulled(
        &self,
        kind: RecordKind,
        id: &str,
        data: Option<serde_json::Value>,
        meta: RecordMeta,
        deleted: bool,
    ) -> Result<(), SyncError> {
        let id_owned = id.to_owned();
        self.persist_with(kind, |table| {
            if deleted {
                table.remove(&id_owned);
            } else if let Some(data) = data {
                table.insert(id_owned.clone(), StoredRecord { id: id_owned.clone(), data, meta });
            }
        })
        .await?;
        self.schedule_checksum_refresh();
        Ok(())
    }

    /// Computes the checksum meta over the current cache immediately,
    /// bypassing the debounce. Used by the orchestrator's `checkAndSync` and
    /// by tests that need a synchronous result.
    ///
    /// # Errors
    /// Returns [`SyncError::Serialize`] if canonical serialization fails.
    pub fn checksum(&self) -> Result<ChecksumMeta, SyncError> {
        let cache = self.cache.read();
        let inputs: Vec<ChecksumInput> = cache
            .iter()
            .flat_map(|(kind, records)| {
                records.values().map(move |record| ChecksumInput {
                    record_id: record.id.clone(),
                    record_type: *kind,
                    data: record.data.clone(),
                    version: record.meta.sync_version,
                    updated_at: record.meta.updated_at,
                })
            })
            .collect();
        checksum::compute(&inputs)
    }

    #[must_use]
    pub fn cached_checksum(&self) -> Option<ChecksumMeta> {
        self.checksum_meta.read().clone()
    }

    /// Persists a freshly computed checksum meta as the authoritative
    /// locally-known value.
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] on a persistence failure.
    pub async fn store_checksum(&self, meta: ChecksumMeta) -> Result<(), SyncError> {
        write_json(&self.storage, KEY_CHECKSUM, &meta).await?;
        *self.checksum_meta.write() = Some(meta);
        Ok(())
    }

    #[must_use]
    pub fn settings(&self) -> SyncSettings {
        self.settings.read().clone()
    }

    /// # Errors
    /// Returns [`SyncError::Storage`] on a persistence failure.
    pub async fn set_settings(&self, settings: SyncSettings) -> Result<(), SyncError> {
        write_json(&self.storage, KEY_SETTINGS, &settings).await?;
        *self.settings.write() = settings;
        self.notify(KEY_SETTINGS);
        Ok(())
    }

    /// The locally cached vault envelope, if vault enable has completed for
    /// this session. Kept current with the server copy so unlock can
    /// proceed without a round trip.
    #[must_use]
    pub fn envelope(&self) -> Option<VaultEnvelope> {
        self.envelope.read().clone()
    }

    /// Persists (or, on `None`, clears) the locally cached vault envelope.
    /// Called after vault enable/disable and after a recovery-code unlock
    /// rotates the envelope.
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] on a persistence failure.
    pub async fn set_envelope(&self, envelope: Option<VaultEnvelope>) -> Result<(), SyncError> {
        match &envelope {
            Some(envelope) => write_json(&self.storage, KEY_ENVELOPE, envelope).await?,
            None => match self.storage.delete(KEY_ENVELOPE).await {
                Ok(()) | Err(anchor_storage::StorageError::FileNotFound { .. }) => {},
                Err(source) => {
                    return Err(SyncError::Storage {
                        source,
                        context: Some(Cow::Borrowed("deleting local vault envelope cache")),
                    });
                },
            },
        }
        *self.envelope.write() = envelope;
        self.notify(KEY_ENVELOPE);
        Ok(())
    }

    /// Drains up to `limit` entries from the outbox head without removing
    /// them (removal happens on push acknowledgement via
    /// [`RecordStore::acknowledge_outbox`]).
    #[must_use]
    pub fn outbox_head(&self, limit: usize) -> Vec<OutboxEntry> {
        self.outbox.read().head(limit)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.outbox.read().len()
    }

    /// # Errors
    /// Returns [`SyncError::Storage`] on a persistence failure.
    pub async fn acknowledge_outbox(&self, op_ids: &[String]) -> Result<(), SyncError> {
        {
            let mut outbox = self.outbox.write();
            outbox.remove_acknowledged(op_ids);
        }
        self.persist_outbox().await
    }

    /// # Errors
    /// Returns [`SyncError::Storage`] on a persistence failure.
    pub async fn record_outbox_retry(&self, keys: &[(String, RecordKind)]) -> Result<(), SyncError> {
        {
            let mut outbox = self.outbox.write();
            outbox.record_retry(keys);
        }
        self.persist_outbox().await
    }

    /// Re-enqueues an arbitrary entry directly, used by the migration engine
    /// to push a resolved dataset and by vault disable to re-enqueue
    /// decrypted plaintext records.
    ///
    /// # Errors
    /// Returns [`SyncError::Storage`] on a persistence failure.
    pub async fn enqueue_direct(&self, entry: OutboxEntry) -> Result<(), SyncError> {
        {
            self.outbox.write().enqueue(entry);
        }
        self.persist_outbox().await
    }

    /// # Errors
    /// Returns [`SyncError::Storage`] on a persistence failure.
    pub async fn clear_outbox(&self) -> Result<(), SyncError> {
        {
            self.outbox.write().clear();
        }
        self.persist_outbox().await
    }

    fn enqueue(&self, kind: RecordKind, id: String, data: Option<serde_json::Value>, deleted: bool, base_version: u64) {
        let entry = OutboxEntry {
            op_id: nanoid::nanoid!(),
            record_id: id,
            record_type: kind,
            base_version,
            payload: data.unwrap_or(serde_json::Value::Null),
            deleted,
            created_at: Utc::now(),
            retries: 0,
        };
        self.outbox.write().enqueue(entry);
    }

    async fn persist_outbox(&self) -> Result<(), SyncError> {
        let snapshot = self.outbox.read().clone();
        write_json(&self.storage, KEY_OUTBOX, &snapshot).await?;
        self.notify(KEY_OUTBOX);
        Ok(())
    }

    async fn persist_with(
        &self,
        kind: RecordKind,
        mutate: impl FnOnce(&mut FxHashMap<String, StoredRecord>),
    ) -> Result<(), SyncError> {
        let mut staged = self.cache.read().get(&kind).cloned().unwrap_or_default();
        mutate(&mut staged);
        let table = RecordTable { version: 1, data: staged.values().cloned().collect() };
        write_json(&self.storage, key_for(kind), &table).await?;
        self.cache.write().insert(kind, staged);
        self.notify(key_for(kind));
        Ok(())
    }

    fn notify(&self, key: &'static str) {
        let _ = self.events.publish(KeyChanged { user_id: self.user_id.clone(), key });
    }

    /// Schedules the debounced checksum recalculation described in the
    /// component design: bursts of writes within the debounce window
    /// collapse into a single recomputation.
    fn schedule_checksum_refresh(&self) {
        let generation = self.checksum_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let debounce = self.config.record_store_debounce_ms;
        let gen_counter = Arc::clone(&self.checksum_generation);
        let storage = self.storage.clone();
        let events = Arc::clone(&self.events);
        let user_id = self.user_id.clone();
        // The cache snapshot taken at fire time reflects whatever writes
        // landed during the debounce window; no need to recompute per-write.
        let cache_snapshot = Arc::new(self.cache.read().clone());

        tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(debounce)).await;
            if gen_counter.load(Ordering::SeqCst) != generation {
                return; // superseded by a later write
            }
            let inputs: Vec<ChecksumInput> = cache_snapshot
                .iter()
                .flat_map(|(kind, records)| {
                    records.values().map(move |record| ChecksumInput {
                        record_id: record.id.clone(),
                        record_type: *kind,
                        data: record.data.clone(),
                        version: record.meta.sync_version,
                        updated_at: record.meta.updated_at,
                    })
                })
                .collect();
            let Ok(meta) = checksum::compute(&inputs) else { return };
            if write_json(&storage, KEY_CHECKSUM, &meta).await.is_ok() {
                let _ = events.publish(KeyChanged { user_id, key: KEY_CHECKSUM });
            }
        });
    }
}

async fn read_json_or_default<T: Default + for<'de> Deserialize<'de>>(
    storage: &NamespacedStorage,
    key: &str,
) -> Result<T, SyncError> {
    Ok(read_json_opt(storage, key).await?.unwrap_or_default())
}

async fn read_json_opt<T: for<'de> Deserialize<'de>>(
    storage: &NamespacedStorage,
    key: &str,
) -> Result<Option<T>, SyncError> {
    match storage.read(key).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| SyncError::Serialize { source, context: Some(Cow::Owned(format!("reading {key}"))) }),
        Err(anchor_storage::StorageError::FileNotFound { .. }) => Ok(None),
        Err(source) => Err(SyncError::Storage { source, context: Some(Cow::Owned(format!("reading {key}"))) }),
    }
}

async fn write_json<T: Serialize>(
    storage: &NamespacedStorage,
    key: &str,
    value: &T,
) -> Result<(), SyncError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|source| SyncError::Serialize { source, context: Some(Cow::Owned(format!("writing {key}"))) })?;
    storage
        .write(key, &bytes)
        .await
        .map_err(|source| SyncError::Storage { source, context: Some(Cow::Owned(format!("writing {key}"))) })
}
