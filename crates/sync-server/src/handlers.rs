//! HTTP handlers for the sync/vault endpoint table, annotated
//! the way `crates/shared/kernel/src/server/health.rs` annotates its single
//! endpoint. Every handler resolves the caller's identity from
//! [`AuthenticatedUser`]; none accept a user id from the request body.

use anchor_database::Database;
use anchor_derive::api_handler;
use anchor_domain::constants::SYNC_TAG;
use anchor_sync::{
    ChecksumMeta, CleanupRequest, DisableAction, PullPage, PullQuery, PulledRecord, PushRequest, PushResponse,
    PushResult, SyncSettingsDto, VaultEnableRequest, VaultEnvelope, VaultStatus, VerifyPlaintextResponse,
};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use tracing::{info, instrument, warn};

use crate::auth::AuthenticatedUser;
use crate::error::SyncServerError;
use crate::repository::{self, IncomingOp};

const NO_CACHE: [(header::HeaderName, &str); 2] =
    [(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"), (header::PRAGMA, "no-cache")];

#[api_handler(
    get,
    path = "/sync/plaintext/pull",
    params(
        ("cursor" = Option<chrono::DateTime<chrono::Utc>>, Query, description = "Resume after this updatedAt"),
        ("limit" = u32, Query, description = "Page size, clamped to 1..=1000"),
    ),
    responses((status = OK, description = "Paged pull of plaintext records", body = PullPage)),
    tag = SYNC_TAG,
)]
#[instrument(skip(db, query), fields(user_id = %user.user_id))]
pub(super) async fn pull_plaintext_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
    Query(query): Query<PullQuery>,
) -> Result<impl IntoResponse, SyncServerError> {
    let page = pull_page(&db, &user.user_id, query, false).await?;
    Ok((NO_CACHE, Json(page)))
}

#[api_handler(
    post,
    path = "/sync/plaintext/push",
    request_body = PushRequest,
    responses((status = OK, description = "Batch upsert plaintext records", body = PushResponse)),
    tag = SYNC_TAG,
)]
#[instrument(skip(db, request), fields(user_id = %user.user_id, operations = request.operations.len()))]
pub(super) async fn push_plaintext_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
    Json(request): Json<PushRequest>,
) -> Result<impl IntoResponse, SyncServerError> {
    let response = push_batch(&db, &user.user_id, request, false).await?;
    info!(user_id = %user.user_id, synced = response.synced, "plaintext push applied");
    Ok(Json(response))
}

#[api_handler(
    get,
    path = "/sync/plaintext/checksum",
    responses((status = OK, description = "Authoritative dataset checksum meta", body = ChecksumMeta)),
    tag = SYNC_TAG,
)]
#[instrument(skip(db), fields(user_id = %user.user_id))]
pub(super) async fn plaintext_checksum_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
) -> Result<impl IntoResponse, SyncServerError> {
    let meta = repository::plaintext_checksum(&db, &user.user_id).await?;
    Ok((NO_CACHE, Json(meta)))
}

#[api_handler(
    get,
    path = "/sync/encrypted/pull",
    params(
        ("cursor" = Option<chrono::DateTime<chrono::Utc>>, Query, description = "Resume after this updatedAt"),
        ("limit" = u32, Query, description = "Page size, clamped to 1..=1000"),
    ),
    responses((status = OK, description = "Paged pull of ciphertext records", body = PullPage)),
    tag = SYNC_TAG,
)]
#[instrument(skip(db, query), fields(user_id = %user.user_id))]
pub(super) async fn pull_encrypted_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
    Query(query): Query<PullQuery>,
) -> Result<impl IntoResponse, SyncServerError> {
    let page = pull_page(&db, &user.user_id, query, true).await?;
    Ok((NO_CACHE, Json(page)))
}

#[api_handler(
    post,
    path = "/sync/encrypted/push",
    request_body = PushRequest,
    responses((status = OK, description = "Batch upsert ciphertext records", body = PushResponse)),
    tag = SYNC_TAG,
)]
#[instrument(skip(db, request), fields(user_id = %user.user_id, operations = request.operations.len()))]
pub(super) async fn push_encrypted_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
    Json(request): Json<PushRequest>,
) -> Result<impl IntoResponse, SyncServerError> {
    let response = push_batch(&db, &user.user_id, request, true).await?;
    info!(user_id = %user.user_id, synced = response.synced, "encrypted push applied");
    Ok(Json(response))
}

#[api_handler(
    get,
    path = "/sync/settings",
    responses((status = OK, description = "Current sync settings", body = SyncSettingsDto)),
    tag = SYNC_TAG,
)]
#[instrument(skip(db), fields(user_id = %user.user_id))]
pub(super) async fn get_settings_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
) -> Result<impl IntoResponse, SyncServerError> {
    let row = repository::get_settings(&db, &user.user_id).await?;
    Ok(Json(settings_dto(row)))
}

#[api_handler(
    put,
    path = "/sync/settings",
    request_body = SyncSettingsDto,
    responses((status = OK, description = "Updated sync settings", body = SyncSettingsDto)),
    tag = SYNC_TAG,
)]
#[instrument(skip(db, settings), fields(user_id = %user.user_id, sync_mode = ?settings.sync_mode))]
pub(super) async fn put_settings_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
    Json(settings): Json<SyncSettingsDto>,
) -> Result<impl IntoResponse, SyncServerError> {
    let row = repository::put_settings(&db, &user.user_id, settings.sync_enabled, settings.sync_mode).await?;
    info!(user_id = %user.user_id, "sync settings updated");
    Ok(Json(settings_dto(row)))
}

#[api_handler(
    get,
    path = "/vault",
    responses((status = OK, description = "Envelope existence and metadata", body = VaultStatus)),
    tag = SYNC_TAG,
)]
#[instrument(skip(db), fields(user_id = %user.user_id))]
pub(super) async fn get_vault_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
) -> Result<impl IntoResponse, SyncServerError> {
    let row = repository::get_vault(&db, &user.user_id).await?;
    let status = match row {
        Some(row) => VaultStatus { enabled: true, envelope: Some(vault_row_to_envelope(row)?) },
        None => VaultStatus { enabled: false, envelope: None },
    };
    Ok(Json(status))
}

#[api_handler(
    put,
    path = "/vault/envelope",
    request_body = VaultEnvelope,
    responses((status = OK, description = "Envelope replaced after recovery")),
    tag = SYNC_TAG,
)]
#[instrument(skip(db, envelope), fields(user_id = %user.user_id))]
pub(super) async fn put_vault_envelope_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
    Json(envelope): Json<VaultEnvelope>,
) -> Result<impl IntoResponse, SyncServerError> {
    repository::put_vault(&db, &user.user_id, &envelope).await?;
    info!(user_id = %user.user_id, "vault envelope replaced");
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[api_handler(
    post,
    path = "/vault/enable",
    request_body = VaultEnableRequest,
    responses((status = OK, description = "Initial envelope stored")),
    tag = SYNC_TAG,
)]
#[instrument(skip(db, request), fields(user_id = %user.user_id))]
pub(super) async fn enable_vault_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
    Json(request): Json<VaultEnableRequest>,
) -> Result<impl IntoResponse, SyncServerError> {
    // Defensive cleanup: a second enable for the same user replaces the
    // envelope and any stale encrypted rows from a prior partial attempt.
    repository::delete_records(&db, &user.user_id, true).await?;
    repository::put_vault(&db, &user.user_id, &request.envelope).await?;
    info!(user_id = %user.user_id, "vault enabled server-side");
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[api_handler(
    post,
    path = "/vault/disable",
    responses((status = OK, description = "One step of the client-orchestrated disable flow")),
    tag = SYNC_TAG,
)]
#[instrument(skip(db), fields(user_id = %user.user_id, action = ?action.action))]
pub(super) async fn disable_vault_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
    Json(action): Json<DisableActionRequest>,
) -> Result<impl IntoResponse, SyncServerError> {
    match action.action {
        DisableAction::Verify => {},
        DisableAction::DeleteEncrypted => repository::delete_records(&db, &user.user_id, true).await?,
        DisableAction::DeleteVault => repository::delete_vault(&db, &user.user_id).await?,
        DisableAction::DeletePlaintext => repository::delete_records(&db, &user.user_id, false).await?,
    }
    info!(user_id = %user.user_id, action = ?action.action, "disable step applied");
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, serde::Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub(super) struct DisableActionRequest {
    pub action: DisableAction,
}

#[api_handler(
    get,
    path = "/vault/disable/verify-plaintext",
    params(("expectedCount" = usize, Query, description = "Count the client expects to find server-side")),
    responses((status = OK, description = "Verification gate during disable", body = VerifyPlaintextResponse)),
    tag = SYNC_TAG,
)]
#[instrument(skip(db), fields(user_id = %user.user_id, expected = params.expected_count))]
pub(super) async fn verify_plaintext_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
    Query(params): Query<VerifyQuery>,
) -> Result<impl IntoResponse, SyncServerError> {
    let server_count = repository::count_records(&db, &user.user_id, false).await?;
    let verified = server_count == params.expected_count;
    if !verified {
        warn!(
            user_id = %user.user_id,
            server_count,
            expected = params.expected_count,
            "disable verification mismatch"
        );
    }
    Ok(Json(VerifyPlaintextResponse { verified, server_count, expected_count: params.expected_count }))
}

#[derive(Debug, Clone, Copy, serde::Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub(super) struct VerifyQuery {
    pub expected_count: usize,
}

#[api_handler(
    post,
    path = "/vault/disable/cleanup",
    request_body = CleanupRequest,
    responses((status = OK, description = "Best-effort removal of partially uploaded rows")),
    tag = SYNC_TAG,
)]
#[instrument(skip(db, request), fields(user_id = %user.user_id, count = request.record_ids.len()))]
pub(super) async fn disable_cleanup_handler(
    user: AuthenticatedUser,
    State(db): State<Database>,
    Json(request): Json<CleanupRequest>,
) -> Result<impl IntoResponse, SyncServerError> {
    repository::delete_records_by_ids(&db, &user.user_id, &request.record_ids, &request.record_types).await?;
    info!(user_id = %user.user_id, count = request.record_ids.len(), "disable cleanup applied");
    Ok(Json(serde_json::json!({ "ok": true })))
}

// --- shared helpers ---

async fn pull_page(
    db: &Database,
    user_id: &str,
    query: PullQuery,
    encrypted: bool,
) -> Result<PullPage, SyncServerError> {
    let limit = query.limit.clamp(1, 999);
    let mut rows = repository::pull_page(db, user_id, query.cursor, limit + 1, encrypted).await?;
    let has_more = rows.len() > limit as usize;
    rows.truncate(limit as usize);

    let next_cursor = rows.last().map(|row| row.updated_at);
    let records = rows
        .into_iter()
        .map(|row| {
            Ok(PulledRecord {
                record_id: row.record_id,
                record_type: repository::parse_kind(&row.record_type)?,
                data: row.data,
                ciphertext: row.ciphertext.map(|bytes| anchor_crypto::b64::encode(&bytes)),
                version: row.version,
                deleted: row.deleted,
                updated_at: row.updated_at,
            })
        })
        .collect::<Result<Vec<_>, SyncServerError>>()?;

    Ok(PullPage { records, next_cursor, has_more })
}

async fn push_batch(
    db: &Database,
    user_id: &str,
    request: PushRequest,
    encrypted: bool,
) -> Result<PushResponse, SyncServerError> {
    let mut results = Vec::with_capacity(request.operations.len());
    for op in request.operations {
        let ciphertext = match &op.ciphertext {
            Some(encoded) => Some(
                anchor_crypto::b64::decode(encoded)
                    .map_err(|err| SyncServerError::BadRequest { message: err.to_string().into(), context: None })?,
            ),
            None => None,
        };
        let outcome = repository::apply_push(
            db,
            user_id,
            IncomingOp { record_id: op.record_id, record_type: op.record_type, data: op.data, ciphertext, deleted: op.deleted },
        )
        .await?;
        results.push(PushResult { record_id: outcome.record_id, version: outcome.version, updated_at: outcome.updated_at });
    }

    let synced = results.len();
    let (checksum, checksum_meta) = if encrypted {
        (None, None)
    } else {
        let meta = repository::plaintext_checksum(db, user_id).await?;
        (Some(meta.checksum.clone()), Some(meta))
    };

    Ok(PushResponse { success: true, results, synced, checksum, checksum_meta, conflicts: Vec::new() })
}

fn settings_dto(row: repository::SettingsRow) -> SyncSettingsDto {
    let sync_mode = match row.sync_mode.as_str() {
        "plaintext" => anchor_sync::SyncMode::Plaintext,
        "e2e" => anchor_sync::SyncMode::E2e,
        _ => anchor_sync::SyncMode::Off,
    };
    SyncSettingsDto { sync_enabled: row.sync_enabled, sync_mode, last_sync_at: row.last_sync_at }
}

fn vault_row_to_envelope(row: repository::VaultRow) -> Result<VaultEnvelope, SyncServerError> {
    let kdf_params = serde_json::from_value(row.kdf_params)
        .map_err(|err| SyncServerError::Internal { message: err.to_string().into(), context: None })?;
    let recovery_wrappers = row
        .recovery_wrappers
        .map(serde_json::from_value)
        .transpose()
        .map_err(|err| SyncServerError::Internal { message: err.to_string().into(), context: None })?
        .unwrap_or_default();

    Ok(VaultEnvelope { wrapped_data_key: row.wrapped_key, salt: row.salt, kdf_params, version: 1, recovery_wrappers })
}
