//! Facade crate for `Anchor` features and shared modules.
//! Re-exports domain/kernel primitives and aggregates feature initialization.
//! Keep this crate thin: it should compose other crates, not implement business logic.
//!
//! ## Usage
//! - Add `anchor` with the desired feature flags (`server`/`client`).
//! - Call `anchor::init` (server) to register feature slices; extend as new slices appear.

use anchor_database::Database;
pub use anchor_domain as domain;
use anchor_domain::config::ApiConfig;
use anchor_event_bus::EventBus;
pub use anchor_kernel as kernel;
#[cfg(feature = "server")]
pub use anchor_licensing as licensing;

#[cfg(feature = "server")]
pub mod server {
    pub mod router {
        pub use anchor_kernel::server::router::system_router;
        pub use anchor_sync_server::router::sync_router;
    }
}

/// Feature registry for runtime introspection.
pub mod features {
    pub use anchor_audit as audit;
    pub use anchor_identity as identity;
    pub use anchor_organization as organization;
    pub use anchor_sync_server as sync_server;

    /// Build-time enabled features (by Cargo feature).
    pub const ENABLED: &[&str] = &[
        #[cfg(feature = "server")]
        "server",
        #[cfg(feature = "client")]
        "client",
        #[cfg(feature = "server")]
        "identity",
        #[cfg(feature = "server")]
        "audit",
        #[cfg(feature = "server")]
        "organization",
        #[cfg(feature = "server")]
        "licensing",
        #[cfg(feature = "server")]
        "sync-server",
    ];

    #[must_use]
    pub fn is_enabled(name: &str) -> bool {
        ENABLED.contains(&name)
    }
}

/// Initialize all enabled features for server mode.
///
/// # Errors
/// Returns an error if any feature initialization fails.
#[cfg(feature = "server")]
pub fn init(
    config: &ApiConfig,
    database: &Database,
    events: &EventBus,
) -> Result<Vec<domain::registry::InitializedSlice>, Box<dyn std::error::Error>> {
    let mut slices = Vec::new();

    // Audit
    slices.push(features::audit::init()?);

    // Organization
    slices.push(features::organization::init()?);

    // Identity & Access Management (IAM)
    slices.push(features::identity::init()?);

    // Bookmark sync server replica
    slices.push(features::sync_server::init()?);

    // Licensing (optional)
    // #[cfg(feature = "anchor-licensing")]
    // {
    //     slices.push(anchor_licensing::init()?);
    // }

    Ok(slices)
}
