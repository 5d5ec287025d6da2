//! Server replica of the bookmark sync core. Exposes the push/pull/checksum
//! and vault lifecycle endpoints over the same wire DTOs `anchor-sync` uses
//! client-side, backed by the `sync_record`/`sync_vault`/`sync_settings`
//! tables.

#[cfg(feature = "server")]
mod auth;
#[cfg(feature = "server")]
mod error;
#[cfg(feature = "server")]
mod handlers;
#[cfg(feature = "server")]
mod repository;
#[cfg(feature = "server")]
pub mod router;

#[cfg(feature = "server")]
pub use error::SyncServerError;

use anchor_kernel::domain::registry::InitializedSlice;

/// Sync-server feature state.
#[anchor_derive::anchor_slice]
pub struct SyncServer {}

/// Initialize the sync-server feature slice.
///
/// # Errors
/// Returns an error if slice construction fails (infallible today; kept
/// fallible so a future migration/repository precheck can report failure the
/// same way the other feature slices do).
#[cfg(feature = "server")]
pub fn init() -> Result<InitializedSlice, SyncServerError> {
    tracing::info!("Sync server slice initialized");

    let inner = SyncServerInner {};
    let slice = SyncServer::new(inner);

    Ok(InitializedSlice::new(slice))
}
