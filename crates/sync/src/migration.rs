//! First-sign-in reconciliation between the local dataset and whatever the
//! server already holds. Runs at most once per user, guarded by a
//! `migrationChecked` flag written under the user's storage namespace, and
//! only while `sync_mode == Plaintext` and no vault envelope exists.

use std::borrow::Cow;

use anchor_storage::NamespacedStorage;
use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::model::{Bookmark, PinnedView, RecordKind, RecordMeta, Space, SyncMode};
use crate::outbox::OutboxEntry;
use crate::store::{RecordStore, StoredRecord};
use crate::transport::{PullQuery, SyncTransport, TransportError};

const KEY_MIGRATION_CHECKED: &str = "migrationChecked.json";

/// One side of a first-sign-in reconciliation: the three record kinds,
/// deserialized to their typed payloads.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub bookmarks: Vec<Bookmark>,
    pub spaces: Vec<Space>,
    pub pinned_views: Vec<PinnedView>,
}

impl Dataset {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty() && self.spaces.is_empty() && self.pinned_views.is_empty()
    }
}

/// One of the three fixed resolution strategies offered when both the local
/// and remote datasets are non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Merge,
    LocalWins,
    CloudWins,
}

#[derive(Debug, Clone)]
pub enum MigrationOutcome {
    /// Already checked for this user, or not applicable (not in plaintext
    /// mode, or a vault envelope already exists).
    NotNeeded,
    /// One side was empty; the decision table applied automatically.
    Applied,
    /// Both sides are non-empty: the caller must pick a [`MergeStrategy`] and
    /// call [`resolve_conflict`] with the returned datasets.
    ConflictPending { local: Dataset, remote: Dataset },
}

/// Runs the first-sign-in decision table (§4.8). A no-op if migration was
/// already checked for this user or sync is not in plaintext mode.
///
/// # Errors
/// Returns a [`SyncError`] from reading local records, pulling the remote
/// dataset, or persisting the migration-checked flag.
pub async fn check_and_migrate<T: SyncTransport>(
    storage: &NamespacedStorage,
    store: &RecordStore,
    transport: &T,
    config: &SyncConfig,
) -> Result<MigrationOutcome, SyncError> {
    if migration_checked(storage).await? {
        return Ok(MigrationOutcome::NotNeeded);
    }
    if store.settings().sync_mode != SyncMode::Plaintext {
        return Ok(MigrationOutcome::NotNeeded);
    }

    let local = local_dataset(store)?;
    let remote = fetch_remote_dataset(transport, config).await?;

    if local.is_empty() && remote.is_empty() {
        mark_checked(storage).await?;
        return Ok(MigrationOutcome::Applied);
    }
    if local.is_empty() {
        apply_synced_dataset(store, &remote).await?;
        mark_checked(storage).await?;
        return Ok(MigrationOutcome::Applied);
    }
    if remote.is_empty() {
        enqueue_dataset(store, &local).await?;
        mark_checked(storage).await?;
        return Ok(MigrationOutcome::Applied);
    }

    Ok(MigrationOutcome::ConflictPending { local, remote })
}

/// Applies the chosen [`MergeStrategy`] to a pending conflict, writes the
/// resolved dataset locally and re-enqueues every item for push with
/// `baseVersion=0` (§4.8).
///
/// # Errors
/// Returns a [`SyncError`] from persisting records, the outbox, or the
/// migration-checked flag.
pub async fn resolve_conflict(
    storage: &NamespacedStorage,
    store: &RecordStore,
    strategy: MergeStrategy,
    local: Dataset,
    remote: Dataset,
) -> Result<(), SyncError> {
    let resolved = match strategy {
        MergeStrategy::LocalWins => local,
        MergeStrategy::CloudWins => remote,
        MergeStrategy::Merge => merge_datasets(local, remote),
    };
    enqueue_dataset(store, &resolved).await?;
    mark_checked(storage).await?;
    Ok(())
}

fn merge_datasets(local: Dataset, remote: Dataset) -> Dataset {
    Dataset {
        bookmarks: merge_by_key(local.bookmarks, remote.bookmarks, Bookmark::normalized_url, |b| b.created_at),
        spaces: merge_by_key(local.spaces, remote.spaces, Space::dedupe_key, |s| s.created_at),
        pinned_views: merge_by_key(local.pinned_views, remote.pinned_views, PinnedView::dedupe_key, |p| p.created_at),
    }
}

/// Unions `local` and `remote`, keeping the newer (by `createdAt`) item on a
/// dedupe-key collision.
fn merge_by_key<T: Clone>(
    local: Vec<T>,
    remote: Vec<T>,
    key_fn: impl Fn(&T) -> String,
    created_at_fn: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<T> {
    let mut merged: FxHashMap<String, T> = FxHashMap::default();
    for item in local.into_iter().chain(remote) {
        let key = key_fn(&item);
        match merged.get(&key) {
            Some(existing) if created_at_fn(existing) >= created_at_fn(&item) => {},
            _ => {
                merged.insert(key, item);
            },
        }
    }
    merged.into_values().collect()
}

/// Writes every remote item into local storage via `apply_pulled` (no
/// outbox entry: these are already synced, and the server already holds
/// them at their reported version).
async fn apply_synced_dataset(store: &RecordStore, dataset: &Dataset) -> Result<(), SyncError> {
    for bookmark in &dataset.bookmarks {
        let meta = RecordMeta { sync_version: 0, updated_at: bookmark.created_at };
        let data = to_value(bookmark)?;
        store.apply_pulled(RecordKind::Bookmark, &bookmark.id, Some(data), meta, false).await?;
    }
    for space in &dataset.spaces {
        let meta = RecordMeta { sync_version: 0, updated_at: space.created_at };
        let data = to_value(space)?;
        store.apply_pulled(RecordKind::Space, &space.id, Some(data), meta, false).await?;
    }
    for view in &dataset.pinned_views {
        let meta = RecordMeta { sync_version: 0, updated_at: view.created_at };
        let data = to_value(view)?;
        store.apply_pulled(RecordKind::PinnedView, &view.id, Some(data), meta, false).await?;
    }
    Ok(())
}

/// Re-enqueues every item in `dataset` for push with `baseVersion=0`, per
/// the migration engine's contract (§4.8): unlike a live edit, a migrated
/// item's prior server version is not trusted.
async fn enqueue_dataset(store: &RecordStore, dataset: &Dataset) -> Result<(), SyncError> {
    for bookmark in &dataset.bookmarks {
        enqueue_item(store, RecordKind::Bookmark, bookmark.id.clone(), to_value(bookmark)?).await?;
    }
    for space in &dataset.spaces {
        enqueue_item(store, RecordKind::Space, space.id.clone(), to_value(space)?).await?;
    }
    for view in &dataset.pinned_views {
        enqueue_item(store, RecordKind::PinnedView, view.id.clone(), to_value(view)?).await?;
    }
    Ok(())
}

async fn enqueue_item(
    store: &RecordStore,
    kind: RecordKind,
    id: String,
    payload: serde_json::Value,
) -> Result<(), SyncError> {
    store
        .enqueue_direct(OutboxEntry {
            op_id: nanoid::nanoid!(),
            record_id: id,
            record_type: kind,
            base_version: 0,
            payload,
            deleted: false,
            created_at: Utc::now(),
            retries: 0,
        })
        .await
}

fn local_dataset(store: &RecordStore) -> Result<Dataset, SyncError> {
    Ok(Dataset {
        bookmarks: deserialize_records(store.list(RecordKind::Bookmark))?,
        spaces: deserialize_records(store.list(RecordKind::Space))?,
        pinned_views: deserialize_records(store.list(RecordKind::PinnedView))?,
    })
}

fn deserialize_records<T: DeserializeOwned>(records: Vec<StoredRecord>) -> Result<Vec<T>, SyncError> {
    records
        .into_iter()
        .map(|record| {
            serde_json::from_value(record.data).map_err(|source| SyncError::Serialize {
                source,
                context: Some(Cow::Borrowed("deserializing local record for migration")),
            })
        })
        .collect()
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, SyncError> {
    serde_json::to_value(value)
        .map_err(|source| SyncError::Serialize { source, context: Some(Cow::Borrowed("serializing migration record")) })
}

/// Drains the server's plaintext dataset via repeated `pull_plaintext`
/// pages, capped at `config.pull_loop_max_iterations`.
async fn fetch_remote_dataset<T: SyncTransport>(transport: &T, config: &SyncConfig) -> Result<Dataset, SyncError> {
    let mut dataset = Dataset::default();
    let mut cursor = None;

    for _ in 0..config.pull_loop_max_iterations {
        let query = PullQuery { cursor, limit: config.pull_page_limit };
        let page = transport.pull_plaintext(query).await.map_err(transport_error)?;

        for record in page.records {
            if record.deleted {
                continue;
            }
            let Some(data) = record.data else { continue };
            match record.record_type {
                RecordKind::Bookmark => dataset.bookmarks.push(from_value(data)?),
                RecordKind::Space => dataset.spaces.push(from_value(data)?),
                RecordKind::PinnedView => dataset.pinned_views.push(from_value(data)?),
            }
        }

        if !page.has_more {
            break;
        }
        cursor = page.next_cursor;
    }

    Ok(dataset)
}

fn from_value<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, SyncError> {
    serde_json::from_value(value).map_err(|source| SyncError::Serialize {
        source,
        context: Some(Cow::Borrowed("deserializing remote record for migration")),
    })
}

fn transport_error(err: TransportError) -> SyncError {
    match err {
        TransportError::Unauthorized => {
            SyncError::Unauthorized { message: Cow::Borrowed("migration pull rejected"), context: None }
        },
        TransportError::Rejected(message) => SyncError::Validation { message: Cow::Owned(message), context: None },
        TransportError::Conflict(_) => {
            SyncError::Internal { message: Cow::Borrowed("migration pull does not produce conflicts"), context: None }
        },
        TransportError::Transient(message) => SyncError::Transport { message: Cow::Owned(message), context: None },
    }
}

async fn migration_checked(storage: &NamespacedStorage) -> Result<bool, SyncError> {
    match storage.read(KEY_MIGRATION_CHECKED).await {
        Ok(bytes) => {
            let flag: MigrationFlag = serde_json::from_slice(&bytes).map_err(|source| SyncError::Serialize {
                source,
                context: Some(Cow::Borrowed("reading migration-checked flag")),
            })?;
            Ok(flag.checked)
        },
        Err(anchor_storage::StorageError::FileNotFound { .. }) => Ok(false),
        Err(source) => {
            Err(SyncError::Storage { source, context: Some(Cow::Borrowed("reading migration-checked flag")) })
        },
    }
}

async fn mark_checked(storage: &NamespacedStorage) -> Result<(), SyncError> {
    let bytes = serde_json::to_vec(&MigrationFlag { checked: true })
        .map_err(|source| SyncError::Serialize { source, context: Some(Cow::Borrowed("writing migration-checked flag")) })?;
    storage
        .write(KEY_MIGRATION_CHECKED, &bytes)
        .await
        .map_err(|source| SyncError::Storage { source, context: Some(Cow::Borrowed("writing migration-checked flag")) })
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct MigrationFlag {
    checked: bool,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn bookmark(id: &str, url: &str, created_at: i64) -> Bookmark {
        Bookmark {
            id: id.to_owned(),
            title: "a bookmark".to_owned(),
            url: url.to_owned(),
            tags: Vec::new(),
            description: None,
            color: None,
            space_id: None,
            created_at: ts(created_at),
        }
    }

    #[test]
    fn merge_deduplicates_bookmarks_by_normalized_url_keeping_newer() {
        let local = vec![bookmark("l-1", "https://Example.com/path/", 1)];
        let remote = vec![bookmark("r-1", "https://example.com/path", 5)];

        let merged = merge_by_key(local, remote, Bookmark::normalized_url, |b| b.created_at);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "r-1");
    }

    #[test]
    fn merge_keeps_distinct_urls_separate() {
        let local = vec![bookmark("l-1", "https://a.example.com/", 1)];
        let remote = vec![bookmark("r-1", "https://b.example.com/", 1)];

        let merged = merge_by_key(local, remote, Bookmark::normalized_url, |b| b.created_at);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_prefers_existing_entry_on_tie() {
        let local = vec![bookmark("l-1", "https://example.com/", 3)];
        let remote = vec![bookmark("r-1", "https://example.com/", 3)];

        let merged = merge_by_key(local, remote, Bookmark::normalized_url, |b| b.created_at);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "l-1");
    }
}
