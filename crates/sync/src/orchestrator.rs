//! Schedules push and pull across a session's lifetime: debounces a push
//! trigger after local writes, gates pull on a checksum comparison, and
//! broadcasts completion to sibling sessions of the same user (§4.9).

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anchor_crypto::DataKey;
use anchor_event_bus::EventBus;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, instrument, warn};

use crate::config::SyncConfig;
use crate::engine;
use crate::error::SyncError;
use crate::events::SyncComplete;
use crate::model::SyncMode;
use crate::store::RecordStore;
use crate::transport::{SyncTransport, TransportError};

/// Observable sync state, mirroring what a UI layer would bind to.
#[derive(Debug, Clone)]
pub struct OrchestratorState {
    pub is_syncing: bool,
    pub pending_count: usize,
    pub last_sync: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Drives debounced push and checksum-gated pull for one signed-in session.
///
/// `isSyncing` exclusivity is enforced with a generation counter rather than
/// a mutex: a later [`Orchestrator::check_and_sync`] call bumps the
/// generation, and an in-flight call discards its result if it finishes
/// after a newer one started, matching the cancellable-suspension model
/// described for the client scheduler.
pub struct Orchestrator {
    store: Arc<RecordStore>,
    events: Arc<EventBus>,
    config: SyncConfig,
    is_syncing: AtomicBool,
    generation: Arc<AtomicU64>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    last_error: Arc<RwLock<Option<String>>>,
    /// The unwrapped data key for an e2e session, cached here so the
    /// debounced [`Orchestrator::schedule_push`] can encrypt without the
    /// caller threading it through every local mutation. `None` while the
    /// vault is locked or sync is not in e2e mode.
    data_key: Arc<RwLock<Option<DataKey>>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("is_syncing", &self.is_syncing.load(Ordering::SeqCst))
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("last_sync", &*self.last_sync.read())
            .field("last_error", &*self.last_error.read())
            .field("data_key", &self.data_key.read().is_some().then_some("<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Result of [`Orchestrator::check_and_sync`].
#[derive(Debug, Clone)]
pub struct SyncCycleResult {
    pub skipped: bool,
    pub pulled: usize,
}

impl Orchestrator {
    #[must_use]
    pub fn new(store: Arc<RecordStore>, events: Arc<EventBus>, config: SyncConfig) -> Self {
        Self {
            store,
            events,
            config,
            is_syncing: AtomicBool::new(false),
            generation: Arc::new(AtomicU64::new(0)),
            last_sync: RwLock::new(None),
            last_error: Arc::new(RwLock::new(None)),
            data_key: Arc::new(RwLock::new(None)),
        }
    }

    #[must_use]
    pub fn state(&self) -> OrchestratorState {
        OrchestratorState {
            is_syncing: self.is_syncing.load(Ordering::SeqCst),
            pending_count: self.store.pending_count(),
            last_sync: *self.last_sync.read(),
            error: self.last_error.read().clone(),
        }
    }

    /// Caches (or clears, on `None`) the unwrapped e2e data key so the
    /// debounced [`Orchestrator::schedule_push`] can keep encrypting pushes
    /// across local mutations without the caller re-supplying the key each
    /// time. Call this after vault enable/unlock, and with `None` on lock or
    /// sign-out.
    pub fn set_data_key(&self, data_key: Option<DataKey>) {
        *self.data_key.write() = data_key;
    }

    /// Spawns a debounced push after a local mutation, coalescing bursts
    /// within `config.orchestrator_debounce_secs`. A later call supersedes
    /// an in-flight one via the shared generation counter, matching the push
    /// side of the debounce described for `checkAndSync`.
    #[instrument(skip(self, transport), fields(user_id = self.store.user_id()))]
    pub fn schedule_push<T: SyncTransport + 'static>(&self, transport: Arc<T>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let gen_counter = Arc::clone(&self.generation);
        let store = Arc::clone(&self.store);
        let last_error = Arc::clone(&self.last_error);
        let data_key_cache = Arc::clone(&self.data_key);
        let debounce = self.config.orchestrator_debounce_secs;
        let config = self.config;

        tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_secs(debounce)).await;
            if gen_counter.load(Ordering::SeqCst) != generation {
                return; // superseded by a later mutation
            }
            let mode = store.settings().sync_mode;
            if mode == SyncMode::Off {
                return;
            }
            let data_key = data_key_cache.read().clone();
            if mode == SyncMode::E2e && data_key.is_none() {
                warn!(user_id = store.user_id(), "debounced push skipped, vault is locked");
                *last_error.write() = Some(SyncError::VaultLocked { context: None }.to_string());
                return;
            }
            match engine::push(
                store.as_ref(),
                transport.as_ref(),
                mode,
                config.push_batch_size,
                config.push_batch_max,
                data_key.as_ref(),
            )
            .await
            {
                Ok(outcome) => {
                    info!(
                        user_id = store.user_id(),
                        synced = outcome.synced,
                        conflicts = outcome.conflicts.len(),
                        "debounced push complete"
                    );
                    *last_error.write() = None;
                },
                Err(err) => {
                    warn!(user_id = store.user_id(), error = %err, "debounced push failed");
                    *last_error.write() = Some(err.to_string());
                },
            }
        });
    }

    /// Runs `checkAndSync` (§4.9): fetches the server checksum, compares it
    /// to the locally cached remote checksum, and only pulls if they
    /// differ. A concurrent call while `isSyncing` is already true returns
    /// immediately with `skipped:true`.
    ///
    /// # Errors
    /// Returns a [`SyncError`] from the transport or from applying pulled
    /// pages; `last_error` is updated to match before the error is returned.
    #[instrument(skip(self, transport, data_key), fields(user_id = self.store.user_id()))]
    pub async fn check_and_sync<T: SyncTransport>(
        &self,
        transport: &T,
        data_key: Option<&DataKey>,
    ) -> Result<SyncCycleResult, SyncError> {
        if self.is_syncing.swap(true, Ordering::SeqCst) {
            info!(user_id = self.store.user_id(), "check_and_sync skipped, already in progress");
            return Ok(SyncCycleResult { skipped: true, pulled: 0 });
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.run_cycle(transport, data_key, generation).await;
        self.is_syncing.store(false, Ordering::SeqCst);

        match &result {
            Ok(outcome) => {
                info!(
                    user_id = self.store.user_id(),
                    skipped = outcome.skipped,
                    pulled = outcome.pulled,
                    "check_and_sync complete"
                );
                *self.last_error.write() = None;
            },
            Err(err) => {
                warn!(user_id = self.store.user_id(), error = %err, "check_and_sync failed");
                *self.last_error.write() = Some(err.to_string());
            },
        }
        result
    }

    async fn run_cycle<T: SyncTransport>(
        &self,
        transport: &T,
        data_key: Option<&DataKey>,
        generation: u64,
    ) -> Result<SyncCycleResult, SyncError> {
        let mode = self.store.settings().sync_mode;
        if mode == SyncMode::Off {
            return Ok(SyncCycleResult { skipped: true, pulled: 0 });
        }

        let remote_checksum = match mode {
            SyncMode::E2e => None,
            _ => Some(transport.plaintext_checksum().await.map_err(transport_error)?),
        };

        if let Some(remote) = &remote_checksum {
            if self.store.cached_checksum().as_ref() == Some(remote) {
                return Ok(SyncCycleResult { skipped: true, pulled: 0 });
            }
        }

        if self.generation.load(Ordering::SeqCst) != generation {
            // A newer check_and_sync call has started; discard this one's
            // results rather than racing it to completion.
            return Ok(SyncCycleResult { skipped: true, pulled: 0 });
        }

        let pulled = engine::pull(
            &self.store,
            transport,
            mode,
            self.config.pull_page_limit,
            self.config.pull_loop_max_iterations,
            data_key,
        )
        .await?;

        if let Some(remote) = remote_checksum {
            self.store.store_checksum(remote).await?;
        }

        *self.last_sync.write() = Some(Utc::now());
        let _ = self.events.publish(SyncComplete { user_id: self.store.user_id().to_owned(), skipped: false });

        Ok(SyncCycleResult { skipped: false, pulled })
    }
}

fn transport_error(err: TransportError) -> SyncError {
    match err {
        TransportError::Unauthorized => SyncError::Unauthorized { message: Cow::Borrowed("checksum fetch rejected"), context: None },
        TransportError::Rejected(message) => SyncError::Validation { message: Cow::Owned(message), context: None },
        TransportError::Conflict(_) => {
            SyncError::Internal { message: Cow::Borrowed("checksum fetch does not produce conflicts"), context: None }
        },
        TransportError::Transient(message) => SyncError::Transport { message: Cow::Owned(message), context: None },
    }
}
