//! Deterministic dataset checksum over the canonical JSON encoding of the
//! local dataset. The client and server MUST produce identical hashes for
//! identical datasets, so this is the single sync-or-skip gate.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SyncError;
use crate::model::RecordKind;

/// The literal empty-dataset checksum subject, matching the server's.
const EMPTY_DATASET_JSON: &[u8] = b"[]";

/// One record as it enters the canonical checksum encoding, keyed by a
/// `BTreeMap` so every implementation (this one, the server, or a conformant
/// peer) serializes object keys sorted alphabetically at every depth — the
/// checksum is a cross-implementation contract, not just a client/server
/// agreement between these two call sites.
fn canonical_value(r: &ChecksumInput) -> BTreeMap<&'static str, serde_json::Value> {
    let mut map = BTreeMap::new();
    map.insert("data", r.data.clone());
    map.insert("deleted", serde_json::Value::Bool(false));
    map.insert("recordId", serde_json::Value::String(r.record_id.clone()));
    map.insert(
        "recordType",
        serde_json::Value::String(r.record_type.as_str().to_owned()),
    );
    map.insert(
        "updatedAt",
        serde_json::to_value(r.updated_at).unwrap_or(serde_json::Value::Null),
    );
    map.insert("version", serde_json::Value::Number(r.version.into()));
    map
}

/// `{checksum, count, lastUpdate, perTypeCounts}` exchanged between client
/// and server for sync-skip decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ChecksumMeta {
    pub checksum: String,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    pub per_type_counts: PerTypeCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct PerTypeCounts {
    pub bookmarks: usize,
    pub spaces: usize,
    #[serde(rename = "pinnedViews")]
    pub pinned_views: usize,
}

/// One non-deleted record as seen by the checksum engine, independent of its
/// concrete payload type.
#[derive(Debug, Clone)]
pub struct ChecksumInput {
    pub record_id: String,
    pub record_type: RecordKind,
    pub data: serde_json::Value,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// Computes the checksum meta for a dataset. `records` must already exclude
/// tombstones: deleted records never enter the checksum.
///
/// # Errors
/// Returns [`SyncError::Serialize`] if canonical serialization fails (only
/// possible if a payload contains non-finite floats or similar edge cases).
pub fn compute(records: &[ChecksumInput]) -> Result<ChecksumMeta, SyncError> {
    if records.is_empty() {
        let checksum = hash_bytes(EMPTY_DATASET_JSON);
        return Ok(ChecksumMeta {
            checksum,
            count: 0,
            last_update: None,
            per_type_counts: PerTypeCounts::default(),
        });
    }

    let mut ordered: Vec<&ChecksumInput> = records.iter().collect();
    ordered.sort_by(|a, b| a.record_id.cmp(&b.record_id));

    let mut counts = PerTypeCounts::default();
    let mut last_update = records[0].updated_at;
    let canonical: Vec<BTreeMap<&'static str, serde_json::Value>> = ordered
        .into_iter()
        .map(|r| {
            match r.record_type {
                RecordKind::Bookmark => counts.bookmarks += 1,
                RecordKind::Space => counts.spaces += 1,
                RecordKind::PinnedView => counts.pinned_views += 1,
            }
            last_update = last_update.max(r.updated_at);
            canonical_value(r)
        })
        .collect();

    let bytes = serde_json::to_vec(&canonical).map_err(|source| SyncError::Serialize {
        source,
        context: Some(Cow::Borrowed("computing dataset checksum")),
    })?;

    Ok(ChecksumMeta {
        checksum: hash_bytes(&bytes),
        count: canonical.len(),
        last_update: Some(last_update),
        per_type_counts: counts,
    })
}

fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// The empty-set checksum, equal to `SHA-256("[]")`, exposed for callers
/// that want to compare without building a full (empty) input slice.
#[must_use]
pub fn empty_checksum() -> String {
    hash_bytes(EMPTY_DATASET_JSON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn empty_dataset_hashes_literal_brackets() {
        let meta = compute(&[]).unwrap();
        assert_eq!(meta.checksum, hash_bytes(b"[]"));
        assert_eq!(meta.count, 0);
        assert!(meta.last_update.is_none());
    }

    #[test]
    fn checksum_is_order_independent_on_input_slice() {
        let a = ChecksumInput {
            record_id: "b-2".into(),
            record_type: RecordKind::Bookmark,
            data: serde_json::json!({"title": "b"}),
            version: 1,
            updated_at: ts(2),
        };
        let b = ChecksumInput {
            record_id: "b-1".into(),
            record_type: RecordKind::Bookmark,
            data: serde_json::json!({"title": "a"}),
            version: 1,
            updated_at: ts(1),
        };
        let forward = compute(&[a.clone(), b.clone()]).unwrap();
        let backward = compute(&[b.clone(), a.clone()]).unwrap();
        assert_eq!(forward.checksum, backward.checksum);
        assert_eq!(forward.last_update, Some(ts(2)));
    }

    #[test]
    fn checksum_changes_when_data_changes() {
        let base = ChecksumInput {
            record_id: "b-1".into(),
            record_type: RecordKind::Bookmark,
            data: serde_json::json!({"title": "a"}),
            version: 1,
            updated_at: ts(1),
        };
        let mut changed = base.clone();
        changed.data = serde_json::json!({"title": "b"});

        let a = compute(&[base]).unwrap();
        let b = compute(&[changed]).unwrap();
        assert_ne!(a.checksum, b.checksum);
    }
}
