//! Cross-session notification events published on the shared [`EventBus`].
//!
//! The browser-local "storage event" this core is modeled after is an
//! external collaborator (out of scope); here it is abstracted as a bus
//! publishing `{key_changed}` events, exactly as suggested by the source
//! material's re-architecture guidance. A file-watcher or POSIX signal would
//! plug into the same [`KeyChanged`] shape on other platforms.
//!
//! [`EventBus`]: anchor_event_bus::EventBus

/// One of this user's persisted storage keys changed, either locally or (in
/// a multi-session deployment) by a sibling session sharing the same
/// namespace. Subscribers invalidate any cached copy of `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChanged {
    pub user_id: String,
    pub key: &'static str,
}

/// A push/pull cycle finished. Broadcast so sibling sessions of the same
/// user refresh their view from the local store rather than re-fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncComplete {
    pub user_id: String,
    pub skipped: bool,
}
