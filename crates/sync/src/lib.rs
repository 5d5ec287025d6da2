//! Multi-device bookmark sync core.
//!
//! Owns the client-side record store, outbox, checksum engine, vault
//! enable/disable lifecycle, first-sign-in migration and the scheduling
//! orchestrator that ties them together. The server-facing half lives in
//! `anchor-sync-server`; this crate only depends on the [`SyncTransport`]
//! abstraction so it can be driven by an in-process transport in tests or a
//! real HTTP client elsewhere.

mod checksum;
mod config;
mod engine;
mod error;
mod events;
mod migration;
mod model;
mod orchestrator;
mod outbox;
mod store;
mod transport;
mod vault;

pub use checksum::{ChecksumInput, ChecksumMeta, PerTypeCounts, compute as compute_checksum, empty_checksum};
pub use config::SyncConfig;
pub use engine::{ConflictStrategy, PushOutcome, pull, push, resolve_conflicts};
pub use error::{SyncError, SyncResult};
pub use events::{KeyChanged, SyncComplete};
pub use migration::{Dataset, MergeStrategy, MigrationOutcome, check_and_migrate, resolve_conflict};
pub use model::{
    Bookmark, BookmarkColor, KdfAlgorithm, KdfParams, PERSONAL_SPACE_ID, PinnedView, RecordKind, RecordMeta,
    RecoveryWrapper, SortKey, Space, SyncMode, SyncSettings, VaultEnvelope, normalize_url,
};
pub use orchestrator::{Orchestrator, OrchestratorState, SyncCycleResult};
pub use outbox::{Outbox, OutboxEntry};
pub use store::{RecordStore, StoredRecord};
pub use transport::{
    CleanupRequest, DisableAction, PullPage, PullQuery, PushOperation, PushRequest, PushResponse, PushResult,
    PulledRecord, RecordConflict, SyncSettingsDto, SyncTransport, TransportError, VaultEnableRequest,
    VaultStatus, VerifyPlaintextResponse,
};
pub use vault::{
    UnlockedVault, disable as disable_vault, drain_push_loop, enable as enable_vault, generate_envelope,
    generate_recovery_wrappers, list_backups, unlock_with_passphrase, unlock_with_recovery_code,
};
