//! Persistence for the `sync_record`, `sync_vault` and `sync_settings`
//! tables defined in `migrations/0000-sync-tables.surql`. Mirrors the query
//! style of `infra/database/src/migrations.rs`: raw SurrealQL over the
//! `Database`'s `Surreal<Any>` deref, bound parameters, typed rows via
//! `surrealdb_types::SurrealValue`.

use anchor_database::Database;
use anchor_sync::{ChecksumInput, RecordKind, SyncMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb_types::SurrealValue;
use tracing::{instrument, warn};

use crate::error::SyncServerError;

#[derive(Debug, Clone, SurrealValue)]
pub(crate) struct RecordRow {
    pub record_id: String,
    pub record_type: String,
    pub data: Option<serde_json::Value>,
    pub ciphertext: Option<Vec<u8>>,
    pub encrypted: bool,
    pub version: u64,
    pub deleted: bool,
    pub updated_at: DateTime<Utc>,
}

impl RecordRow {
    fn kind(&self) -> Result<RecordKind, SyncServerError> {
        parse_kind(&self.record_type)
    }
}

pub(crate) fn parse_kind(raw: &str) -> Result<RecordKind, SyncServerError> {
    match raw {
        "bookmark" => Ok(RecordKind::Bookmark),
        "space" => Ok(RecordKind::Space),
        "pinnedView" => Ok(RecordKind::PinnedView),
        other => {
            warn!(record_type = other, "rejecting unknown record_type");
            Err(SyncServerError::Internal { message: format!("unknown record_type '{other}'").into(), context: None })
        },
    }
}

/// One push operation already resolved to a plaintext or ciphertext payload.
pub(crate) struct IncomingOp {
    pub record_id: String,
    pub record_type: RecordKind,
    pub data: Option<serde_json::Value>,
    pub ciphertext: Option<Vec<u8>>,
    pub deleted: bool,
}

pub(crate) struct PushOutcome {
    pub record_id: String,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// Upserts one operation with last-write-wins-by-server-version semantics
/// the client-supplied `base_version` is recorded but never
/// gates acceptance. Per-record 409s are a deliberately dropped branch (see
/// `REDESIGN FLAGS` — conflict resolution happens at the dataset-checksum
/// level instead), so this always succeeds once the database round-trip
/// does.
#[instrument(skip(db, op), fields(record_id = %op.record_id))]
pub(crate) async fn apply_push(
    db: &Database,
    user_id: &str,
    op: IncomingOp,
) -> Result<PushOutcome, SyncServerError> {
    let existing: Option<RecordRow> = db
        .query(
            "SELECT record_id, record_type, data, ciphertext, encrypted, version, deleted, updated_at
             FROM sync_record WHERE user_id = $user AND record_id = $rid AND record_type = $rtype LIMIT 1",
        )
        .bind(("user", user_id.to_owned()))
        .bind(("rid", op.record_id.clone()))
        .bind(("rtype", op.record_type.as_str().to_owned()))
        .await?
        .take(0)?;

    let next_version = existing.as_ref().map_or(1, |row| row.version + 1);
    let now = Utc::now();
    let encrypted = op.ciphertext.is_some();

    db.query(
        "UPSERT sync_record CONTENT {
            user_id: $user, record_id: $rid, record_type: $rtype, data: $data,
            ciphertext: $ciphertext, encrypted: $encrypted, version: $version,
            deleted: $deleted, updated_at: $updated_at
         } WHERE user_id = $user AND record_id = $rid AND record_type = $rtype",
    )
    .bind(("user", user_id.to_owned()))
    .bind(("rid", op.record_id.clone()))
    .bind(("rtype", op.record_type.as_str().to_owned()))
    .bind(("data", op.data))
    .bind(("ciphertext", op.ciphertext))
    .bind(("encrypted", encrypted))
    .bind(("version", next_version))
    .bind(("deleted", op.deleted))
    .bind(("updated_at", now))
    .await?;

    Ok(PushOutcome { record_id: op.record_id, version: next_version, updated_at: now })
}

/// Fetches one page of non-deleted-aware records ordered by `updated_at`
/// ordered by cursor position, restricted to plaintext or
/// encrypted rows depending on `encrypted`.
#[instrument(skip(db))]
pub(crate) async fn pull_page(
    db: &Database,
    user_id: &str,
    cursor: Option<DateTime<Utc>>,
    limit: u32,
    encrypted: bool,
) -> Result<Vec<RecordRow>, SyncServerError> {
    let limit = limit.clamp(1, 1000);
    let rows: Vec<RecordRow> = match cursor {
        Some(cursor) => {
            db.query(
                "SELECT record_id, record_type, data, ciphertext, encrypted, version, deleted, updated_at
                 FROM sync_record
                 WHERE user_id = $user AND encrypted = $encrypted AND updated_at > $cursor
                 ORDER BY updated_at ASC, record_id ASC LIMIT $limit",
            )
            .bind(("user", user_id.to_owned()))
            .bind(("encrypted", encrypted))
            .bind(("cursor", cursor))
            .bind(("limit", limit))
            .await?
            .take(0)?
        },
        None => {
            db.query(
                "SELECT record_id, record_type, data, ciphertext, encrypted, version, deleted, updated_at
                 FROM sync_record
                 WHERE user_id = $user AND encrypted = $encrypted
                 ORDER BY updated_at ASC, record_id ASC LIMIT $limit",
            )
            .bind(("user", user_id.to_owned()))
            .bind(("encrypted", encrypted))
            .bind(("limit", limit))
            .await?
            .take(0)?
        },
    };
    Ok(rows)
}

/// Computes the checksum meta over every non-deleted
/// plaintext record for the user, reusing the client's own checksum engine
/// so the two sides are guaranteed to agree.
#[instrument(skip(db))]
pub(crate) async fn plaintext_checksum(
    db: &Database,
    user_id: &str,
) -> Result<anchor_sync::ChecksumMeta, SyncServerError> {
    let rows: Vec<RecordRow> = db
        .query(
            "SELECT record_id, record_type, data, ciphertext, encrypted, version, deleted, updated_at
             FROM sync_record WHERE user_id = $user AND encrypted = false AND deleted = false",
        )
        .bind(("user", user_id.to_owned()))
        .await?
        .take(0)?;

    let mut inputs = Vec::with_capacity(rows.len());
    for row in rows {
        let kind = row.kind()?;
        inputs.push(ChecksumInput {
            record_id: row.record_id,
            record_type: kind,
            data: row.data.unwrap_or(serde_json::Value::Null),
            version: row.version,
            updated_at: row.updated_at,
        });
    }

    anchor_sync::compute_checksum(&inputs).map_err(|err| {
        warn!(user_id, error = %err, "checksum computation failed");
        SyncServerError::Internal { message: err.to_string().into(), context: None }
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, SurrealValue)]
pub(crate) struct SettingsRow {
    pub sync_enabled: bool,
    pub sync_mode: String,
    pub last_sync_at: Option<DateTime<Utc>>,
}

#[instrument(skip(db))]
pub(crate) async fn get_settings(db: &Database, user_id: &str) -> Result<SettingsRow, SyncServerError> {
    let row: Option<SettingsRow> = db
        .query("SELECT sync_enabled, sync_mode, last_sync_at FROM sync_settings WHERE user_id = $user LIMIT 1")
        .bind(("user", user_id.to_owned()))
        .await?
        .take(0)?;
    Ok(row.unwrap_or(SettingsRow { sync_enabled: false, sync_mode: "off".to_owned(), last_sync_at: None }))
}

#[instrument(skip(db))]
pub(crate) async fn put_settings(
    db: &Database,
    user_id: &str,
    sync_enabled: bool,
    sync_mode: SyncMode,
) -> Result<SettingsRow, SyncServerError> {
    let mode = sync_mode_str(sync_mode);
    db.query(
        "UPSERT sync_settings CONTENT { user_id: $user, sync_enabled: $enabled, sync_mode: $mode }
         WHERE user_id = $user",
    )
    .bind(("user", user_id.to_owned()))
    .bind(("enabled", sync_enabled))
    .bind(("mode", mode))
    .await?;
    get_settings(db, user_id).await
}

fn sync_mode_str(mode: SyncMode) -> &'static str {
    match mode {
        SyncMode::Off => "off",
        SyncMode::Plaintext => "plaintext",
        SyncMode::E2e => "e2e",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, SurrealValue)]
pub(crate) struct VaultRow {
    pub wrapped_key: Vec<u8>,
    pub salt: Vec<u8>,
    pub kdf_params: serde_json::Value,
    pub recovery_wrappers: Option<serde_json::Value>,
}

#[instrument(skip(db))]
pub(crate) async fn get_vault(db: &Database, user_id: &str) -> Result<Option<VaultRow>, SyncServerError> {
    let row: Option<VaultRow> = db
        .query(
            "SELECT wrapped_key, salt, kdf_params, recovery_wrappers FROM sync_vault
             WHERE user_id = $user LIMIT 1",
        )
        .bind(("user", user_id.to_owned()))
        .await?
        .take(0)?;
    Ok(row)
}

#[instrument(skip(db, envelope))]
pub(crate) async fn put_vault(db: &Database, user_id: &str, envelope: &anchor_sync::VaultEnvelope) -> Result<(), SyncServerError> {
    db.query(
        "UPSERT sync_vault CONTENT {
            user_id: $user, wrapped_key: $wrapped, salt: $salt,
            kdf_params: $kdf, recovery_wrappers: $wrappers
         } WHERE user_id = $user",
    )
    .bind(("user", user_id.to_owned()))
    .bind(("wrapped", envelope.wrapped_data_key.clone()))
    .bind(("salt", envelope.salt.clone()))
    .bind(("kdf", serde_json::to_value(envelope.kdf_params).unwrap_or_default()))
    .bind(("wrappers", serde_json::to_value(&envelope.recovery_wrappers).unwrap_or_default()))
    .await?;
    Ok(())
}

#[instrument(skip(db))]
pub(crate) async fn delete_vault(db: &Database, user_id: &str) -> Result<(), SyncServerError> {
    db.query("DELETE FROM sync_vault WHERE user_id = $user").bind(("user", user_id.to_owned())).await?;
    Ok(())
}

#[instrument(skip(db))]
pub(crate) async fn delete_records(db: &Database, user_id: &str, encrypted: bool) -> Result<(), SyncServerError> {
    db.query("DELETE FROM sync_record WHERE user_id = $user AND encrypted = $encrypted")
        .bind(("user", user_id.to_owned()))
        .bind(("encrypted", encrypted))
        .await?;
    Ok(())
}

#[instrument(skip(db))]
pub(crate) async fn count_records(db: &Database, user_id: &str, encrypted: bool) -> Result<usize, SyncServerError> {
    let count: Option<usize> = db
        .query("SELECT VALUE count() FROM sync_record WHERE user_id = $user AND encrypted = $encrypted GROUP ALL")
        .bind(("user", user_id.to_owned()))
        .bind(("encrypted", encrypted))
        .await?
        .take(0)?;
    Ok(count.unwrap_or_default())
}

#[instrument(skip(db, record_ids, record_types), fields(count = record_ids.len()))]
pub(crate) async fn delete_records_by_ids(
    db: &Database,
    user_id: &str,
    record_ids: &[String],
    record_types: &[RecordKind],
) -> Result<(), SyncServerError> {
    let types: Vec<&'static str> = record_types.iter().map(|t| t.as_str()).collect();
    db.query(
        "DELETE FROM sync_record WHERE user_id = $user AND record_id IN $ids AND record_type IN $types",
    )
    .bind(("user", user_id.to_owned()))
    .bind(("ids", record_ids.to_owned()))
    .bind(("types", types))
    .await?;
    Ok(())
}
