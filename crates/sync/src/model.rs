//! Record kinds, payload invariants, vault envelope and sync settings types.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// The distinguished, undeletable personal space every user starts with.
pub const PERSONAL_SPACE_ID: &str = "personal";

/// The three record kinds synchronized by this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    Bookmark,
    Space,
    PinnedView,
}

impl RecordKind {
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Bookmark, Self::Space, Self::PinnedView]
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bookmark => "bookmark",
            Self::Space => "space",
            Self::PinnedView => "pinnedView",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An optional display color for a bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Gray,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<BookmarkColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    /// Validates title length, URL scheme and tag constraints.
    ///
    /// # Errors
    /// Returns [`SyncError::Validation`] on the first violated invariant.
    pub fn validate(&self) -> Result<(), SyncError> {
        let len = self.title.chars().count();
        if !(3..=200).contains(&len) {
            return Err(validation("bookmark title must be 3-200 characters"));
        }
        if parse_http_url(&self.url).is_none() {
            return Err(validation("bookmark url must be a parseable http(s) URL"));
        }
        if self.tags.len() > 20 {
            return Err(validation("bookmark may have at most 20 tags"));
        }
        if self.tags.iter().any(String::is_empty) {
            return Err(validation("bookmark tags must be non-empty"));
        }
        if let Some(description) = &self.description {
            if description.chars().count() > 500 {
                return Err(validation("bookmark description must be at most 500 characters"));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn normalized_url(&self) -> String {
        normalize_url(&self.url)
    }
}

/// A minimal http(s) URL split into host, path and query, sufficient for
/// validation and normalized-key derivation without pulling in a full URL
/// parser for three fields.
struct ParsedHttpUrl<'a> {
    host: &'a str,
    path_and_query: &'a str,
}

fn parse_http_url(raw: &str) -> Option<ParsedHttpUrl<'_>> {
    let rest = raw.strip_prefix("https://").or_else(|| raw.strip_prefix("http://"))?;
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let (authority, path_and_query) = rest.split_at(authority_end);
    let host = authority.rsplit('@').next().unwrap_or(authority);
    let host = host.split(':').next().unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some(ParsedHttpUrl { host, path_and_query })
}

/// Normalizes a URL for merge deduplication:
/// `lower(hostname without leading "www.") + pathname without trailing "/" + search`.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    let Some(parsed) = parse_http_url(raw) else {
        return raw.to_lowercase();
    };
    let host = parsed.host.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_owned();

    let (mut path, query) = match parsed.path_and_query.split_once('?') {
        Some((path, query)) => (path.to_owned(), format!("?{query}")),
        None => (parsed.path_and_query.to_owned(), String::new()),
    };
    if path.is_empty() {
        path.push('/');
    }
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    format!("{host}{path}{query}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Space {
    /// # Errors
    /// Returns [`SyncError::Validation`] if the name is empty.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.name.trim().is_empty() {
            return Err(validation("space name must not be empty"));
        }
        Ok(())
    }

    #[must_use]
    pub fn dedupe_key(&self) -> String {
        self.name.trim().to_lowercase()
    }

    #[must_use]
    pub fn is_personal(&self) -> bool {
        self.id == PERSONAL_SPACE_ID
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Newest,
    Oldest,
    Title,
}

/// A saved search/filter scoped to a space (or the literal `all`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedView {
    pub id: String,
    pub name: String,
    pub space_id: String,
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_tag_filter")]
    pub tag_filter: String,
    pub sort: SortKey,
    pub created_at: DateTime<Utc>,
}

fn default_tag_filter() -> String {
    "all".to_owned()
}

impl PinnedView {
    /// # Errors
    /// Returns [`SyncError::Validation`] if the name is empty.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.name.trim().is_empty() {
            return Err(validation("pinned view name must not be empty"));
        }
        Ok(())
    }

    #[must_use]
    pub fn dedupe_key(&self) -> String {
        format!("{}:{}", self.space_id, self.name.trim().to_lowercase())
    }
}

fn validation(message: &'static str) -> SyncError {
    SyncError::Validation { message: Cow::Borrowed(message), context: None }
}

/// `PBKDF2` parameters recorded alongside a wrapped key so the wrapping key
/// can be re-derived later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    pub algorithm: KdfAlgorithm,
    pub iterations: u32,
    pub salt_length: usize,
    pub key_length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub enum KdfAlgorithm {
    #[serde(rename = "PBKDF2")]
    Pbkdf2,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            algorithm: KdfAlgorithm::Pbkdf2,
            iterations: anchor_crypto::PBKDF2_ITERATIONS,
            salt_length: anchor_crypto::SALT_LEN,
            key_length: 256,
        }
    }
}

/// One recovery-code-derived wrapping of the data key. At most one unused
/// wrapper may be consumed per recovery; a used wrapper is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RecoveryWrapper {
    pub id: String,
    #[cfg_attr(feature = "server", schema(value_type = String, format = "byte"))]
    #[serde(with = "base64_bytes")]
    pub wrapped_data_key: Vec<u8>,
    #[cfg_attr(feature = "server", schema(value_type = String, format = "byte"))]
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
    pub code_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
}

/// The per-user vault key envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct VaultEnvelope {
    #[cfg_attr(feature = "server", schema(value_type = String, format = "byte"))]
    #[serde(with = "base64_bytes")]
    pub wrapped_data_key: Vec<u8>,
    #[cfg_attr(feature = "server", schema(value_type = String, format = "byte"))]
    #[serde(with = "base64_bytes")]
    pub salt: Vec<u8>,
    pub kdf_params: KdfParams,
    pub version: u32,
    #[serde(default)]
    pub recovery_wrappers: Vec<RecoveryWrapper>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Off,
    Plaintext,
    E2e,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    pub sync_enabled: bool,
    pub sync_mode: SyncMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self { sync_enabled: false, sync_mode: SyncMode::Off, last_sync_at: None }
    }
}

/// Client-tracked metadata alongside a record's payload: the last
/// server-acknowledged version and update timestamp, used for outbox
/// coalescing and pull-apply bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    pub sync_version: u64,
    pub updated_at: DateTime<Utc>,
}

/// base64 (standard alphabet) serde adapter for binary envelope fields.
mod base64_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        anchor_crypto::b64::encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        anchor_crypto::b64::decode(&encoded).map_err(serde::de::Error::custom)
    }
}
