//! Persisted, per-mode FIFO of pending mutations with coalescing by
//! `(record_id, record_type)`.

use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::model::RecordKind;

/// A pending mutation awaiting server acknowledgement. `payload` is plain
/// JSON `data` in plaintext mode or a base64 ciphertext blob in e2e mode;
/// the outbox itself is payload-format agnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub op_id: String,
    pub record_id: String,
    pub record_type: RecordKind,
    pub base_version: u64,
    pub payload: serde_json::Value,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retries: u32,
}

/// Coalescing key: entries for the same record supersede one another.
type CoalesceKey = (String, RecordKind);

/// An ordered map keyed by `(record_id, record_type)` so coalescing is O(1)
/// while still iterating in insertion order for batch push.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outbox {
    order: Vec<CoalesceKey>,
    #[serde(with = "entry_map")]
    entries: FxHashMap<CoalesceKey, OutboxEntry>,
}

impl Outbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `entry`, coalescing with any existing pending entry for the
    /// same `(record_id, record_type)`: the newer entry replaces the older
    /// one in place, preserving its original position in insertion order.
    pub fn enqueue(&mut self, entry: OutboxEntry) {
        let key = (entry.record_id.clone(), entry.record_type);
        if self.entries.insert(key.clone(), entry).is_none() {
            self.order.push(key);
        }
    }

    /// Returns up to `limit` entries from the head, in insertion order.
    #[must_use]
    pub fn head(&self, limit: usize) -> Vec<OutboxEntry> {
        self.order.iter().filter_map(|key| self.entries.get(key)).take(limit).cloned().collect()
    }

    /// Removes acknowledged entries by their `opId`.
    pub fn remove_acknowledged(&mut self, op_ids: &[String]) {
        let acknowledged: fxhash::FxHashSet<&str> = op_ids.iter().map(String::as_str).collect();
        self.order.retain(|key| {
            let Some(entry) = self.entries.get(key) else { return false };
            if acknowledged.contains(entry.op_id.as_str()) {
                self.entries.remove(key);
                false
            } else {
                true
            }
        });
    }

    /// Increments `retries` for the given `(record_id, record_type)` keys,
    /// called when the server rejects a batch with a non-fatal error.
    pub fn record_retry(&mut self, keys: &[(String, RecordKind)]) {
        for key in keys {
            if let Some(entry) = self.entries.get_mut(key) {
                entry.retries += 1;
            }
        }
    }

    /// Entries whose retry count has crossed `max_retries`, surfaced to the
    /// UI as "failed" while remaining in the outbox until drained or
    /// explicitly cleared.
    #[must_use]
    pub fn failed(&self, max_retries: u32) -> Vec<OutboxEntry> {
        self.order
            .iter()
            .filter_map(|key| self.entries.get(key))
            .filter(|entry| entry.retries > max_retries)
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Serializes the coalescing map as a JSON array of entries: `FxHashMap`
/// keys are a tuple and don't round-trip through `serde_json` object keys.
mod entry_map {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{CoalesceKey, FxHashMap, OutboxEntry};

    pub fn serialize<S: Serializer>(
        map: &FxHashMap<CoalesceKey, OutboxEntry>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let values: Vec<&OutboxEntry> = map.values().collect();
        values.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<FxHashMap<CoalesceKey, OutboxEntry>, D::Error> {
        let values = Vec::<OutboxEntry>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|e| ((e.record_id.clone(), e.record_type), e)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(record_id: &str, payload: &str) -> OutboxEntry {
        OutboxEntry {
            op_id: nanoid::nanoid!(),
            record_id: record_id.to_owned(),
            record_type: RecordKind::Bookmark,
            base_version: 0,
            payload: serde_json::json!({"title": payload}),
            deleted: false,
            created_at: Utc::now(),
            retries: 0,
        }
    }

    #[test]
    fn coalesces_same_record_keeping_newer_payload() {
        let mut outbox = Outbox::new();
        outbox.enqueue(entry("b-1", "first"));
        outbox.enqueue(entry("b-1", "second"));

        assert_eq!(outbox.len(), 1);
        let head = outbox.head(10);
        assert_eq!(head.len(), 1);
        assert_eq!(head[0].payload["title"], "second");
    }

    #[test]
    fn preserves_insertion_order_across_distinct_records() {
        let mut outbox = Outbox::new();
        outbox.enqueue(entry("b-1", "a"));
        outbox.enqueue(entry("b-2", "b"));
        outbox.enqueue(entry("b-1", "a-updated"));

        let head = outbox.head(10);
        assert_eq!(head.len(), 2);
        assert_eq!(head[0].record_id, "b-1");
        assert_eq!(head[1].record_id, "b-2");
    }

    #[test]
    fn remove_acknowledged_drains_only_matching_ops() {
        let mut outbox = Outbox::new();
        let first = entry("b-1", "a");
        let first_id = first.op_id.clone();
        outbox.enqueue(first);
        outbox.enqueue(entry("b-2", "b"));

        outbox.remove_acknowledged(std::slice::from_ref(&first_id));
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox.head(10)[0].record_id, "b-2");
    }

    #[test]
    fn retries_past_max_surface_as_failed() {
        let mut outbox = Outbox::new();
        outbox.enqueue(entry("b-1", "a"));
        for _ in 0..4 {
            outbox.record_retry(&[("b-1".to_owned(), RecordKind::Bookmark)]);
        }
        assert_eq!(outbox.failed(3).len(), 1);
        assert!(outbox.failed(5).is_empty());
    }
}
