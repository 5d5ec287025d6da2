//! Tunable limits and debounce intervals for the sync core, loaded as part
//! of the host application's configuration tree the way `anchor-kernel`
//! loads every other section (see `anchor_kernel::config::load_config`).

use serde::Deserialize;

/// Sync engine limits and debounce intervals. Every numeric default matches
/// the values named in the component design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Default push batch size read from the outbox head per cycle.
    pub push_batch_size: usize,
    /// Hard cap on a push batch, enforced regardless of `push_batch_size`.
    pub push_batch_max: usize,
    /// Default page size for a pull request.
    pub pull_page_limit: u32,
    /// Hard cap on a pull page size.
    pub pull_page_max: u32,
    /// Safety cap on push-loop iterations during vault disable.
    pub push_loop_max_iterations: u32,
    /// Safety cap on pull-loop iterations while draining pages.
    pub pull_loop_max_iterations: u32,
    /// Max attempts for the disable verification request.
    pub verify_max_attempts: u32,
    /// Wall-clock deadline per verification attempt.
    pub verify_attempt_timeout_secs: u64,
    /// Debounce interval for record-store checksum recalculation.
    pub record_store_debounce_ms: u64,
    /// Debounce interval for checksum refresh (mirrors the record store's).
    pub checksum_debounce_ms: u64,
    /// Debounce interval for the orchestrator's push trigger.
    pub orchestrator_debounce_secs: u64,
    /// Retry count past which an outbox entry is surfaced as "failed".
    pub outbox_max_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            push_batch_size: 50,
            push_batch_max: 100,
            pull_page_limit: 100,
            pull_page_max: 1000,
            push_loop_max_iterations: 20,
            pull_loop_max_iterations: 100,
            verify_max_attempts: 5,
            verify_attempt_timeout_secs: 30,
            record_store_debounce_ms: 500,
            checksum_debounce_ms: 500,
            orchestrator_debounce_secs: 2,
            outbox_max_retries: 5,
        }
    }
}
