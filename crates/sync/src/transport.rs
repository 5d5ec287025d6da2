//! Wire DTOs and the [`SyncTransport`] abstraction that decouples the
//! engine from any particular HTTP client.
//!
//! The engine is generic over `T: SyncTransport` rather than dispatching
//! through a trait object: every call site knows its concrete transport at
//! compile time (an in-process transport in tests, a real HTTP client in
//! `apps/shell`), so there is no need to pay for indirection or hand-roll a
//! boxed-future shim to make the trait object-safe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::ChecksumMeta;
use crate::model::{RecordKind, SyncMode, VaultEnvelope};

/// One operation in a push batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PushOperation {
    pub record_id: String,
    pub record_type: RecordKind,
    /// Plaintext JSON payload (plaintext mode) or base64 ciphertext blob
    /// (e2e mode). Exactly one of `data`/`ciphertext` is populated per mode.
    #[cfg_attr(feature = "server", schema(value_type = Object))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ciphertext: Option<String>,
    pub base_version: u64,
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub operations: Vec<PushOperation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PushResult {
    pub record_id: String,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RecordConflict {
    pub record_id: String,
    pub record_type: RecordKind,
    pub server_version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<PushResult>,
    pub synced: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_meta: Option<ChecksumMeta>,
    #[serde(default)]
    pub conflicts: Vec<RecordConflict>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PulledRecord {
    pub record_id: String,
    pub record_type: RecordKind,
    #[cfg_attr(feature = "server", schema(value_type = Object))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ciphertext: Option<String>,
    pub version: u64,
    pub deleted: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PullPage {
    pub records: Vec<PulledRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<DateTime<Utc>>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PullQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<DateTime<Utc>>,
    pub limit: u32,
}

impl Default for PullQuery {
    fn default() -> Self {
        Self { cursor: None, limit: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SyncSettingsDto {
    pub sync_enabled: bool,
    pub sync_mode: SyncMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct VaultStatus {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<VaultEnvelope>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct VaultEnableRequest {
    #[serde(flatten)]
    pub envelope: VaultEnvelope,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum DisableAction {
    Verify,
    DeleteEncrypted,
    DeleteVault,
    DeletePlaintext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct VerifyPlaintextResponse {
    pub verified: bool,
    pub server_count: usize,
    pub expected_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    pub record_ids: Vec<String>,
    pub record_types: Vec<RecordKind>,
}

/// Transport-level error, distinguishing the cases the engine must react to
/// differently (auth vs conflict vs transient failure).
#[derive(Debug, Clone)]
pub enum TransportError {
    Unauthorized,
    Conflict(Vec<RecordConflict>),
    /// Network error or 5xx; caller should retry with back-off.
    Transient(String),
    /// 400 or other non-retriable client error.
    Rejected(String),
}

/// Decouples the sync engine from any specific HTTP client.
///
/// Implementors resolve the caller's identity out of band (an auth token
/// held by the transport itself); no method here accepts a user id.
pub trait SyncTransport: Send + Sync {
    fn push_plaintext(
        &self,
        request: PushRequest,
    ) -> impl Future<Output = Result<PushResponse, TransportError>> + Send;

    fn pull_plaintext(
        &self,
        query: PullQuery,
    ) -> impl Future<Output = Result<PullPage, TransportError>> + Send;

    fn plaintext_checksum(&self) -> impl Future<Output = Result<ChecksumMeta, TransportError>> + Send;

    fn push_encrypted(
        &self,
        request: PushRequest,
    ) -> impl Future<Output = Result<PushResponse, TransportError>> + Send;

    fn pull_encrypted(
        &self,
        query: PullQuery,
    ) -> impl Future<Output = Result<PullPage, TransportError>> + Send;

    fn get_settings(&self) -> impl Future<Output = Result<SyncSettingsDto, TransportError>> + Send;

    fn put_settings(
        &self,
        settings: SyncSettingsDto,
    ) -> impl Future<Output = Result<SyncSettingsDto, TransportError>> + Send;

    fn get_vault(&self) -> impl Future<Output = Result<VaultStatus, TransportError>> + Send;

    fn put_vault_envelope(
        &self,
        envelope: VaultEnvelope,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn enable_vault(
        &self,
        request: VaultEnableRequest,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn disable_vault_action(
        &self,
        action: DisableAction,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn verify_plaintext(
        &self,
        expected_count: usize,
    ) -> impl Future<Output = Result<VerifyPlaintextResponse, TransportError>> + Send;

    fn disable_cleanup(
        &self,
        request: CleanupRequest,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
