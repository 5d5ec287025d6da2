//! Auto-generated by `cargo xtask codegen migrations`.
//! Do not edit by hand.

use crate::migrations::{Migration, Permissions};

#[must_use]
pub(crate) fn builtin_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            "sys.database",
            "Database",
            Some("Database infrastructure layer providing SurrealDB integration"),
            "0000-bootstrap",
            include_str!("../../../../infra/database/migrations/0000-bootstrap.surql"),
            "d158fc7cd49baae1bb69144bc5091a7592302ca8ae384a2806836f9a0ec78506",
            true,
        ),
        Migration::new(
            "sync-server",
            "Sync Server",
            Some("Server replica of the synchronization core"),
            "0000-sync-tables",
            include_str!("../../../../crates/sync-server/migrations/0000-sync-tables.surql"),
            "7cf5dc88382a451cc80eff5de7925f172bae85562551245d7e9d104d7beabd79",
            false,
        ),
    ]
}

#[must_use]
pub(crate) fn builtin_registry() -> Vec<Permissions> {
    vec![
        Permissions::new("sys.database", vec!["engine"]),
        Permissions::new("sync-server", vec!["sync"]),
    ]
}
