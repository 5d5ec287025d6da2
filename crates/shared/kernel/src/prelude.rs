//! Common re-exports for crates that consume the kernel's server plumbing.

#[cfg(feature = "server")]
pub use crate::server::state::{ApiState, ApiStateBuilder, ApiStateError, ApiStateInner};
