use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::handlers;

pub fn sync_router<S>() -> OpenApiRouter<S>
where
    S: Send + Sync + Clone + 'static,
    anchor_database::Database: axum::extract::FromRef<S>,
    anchor_domain::config::ApiConfig: axum::extract::FromRef<S>,
{
    OpenApiRouter::<S>::new()
        .routes(routes!(handlers::pull_plaintext_handler))
        .routes(routes!(handlers::push_plaintext_handler))
        .routes(routes!(handlers::plaintext_checksum_handler))
        .routes(routes!(handlers::pull_encrypted_handler))
        .routes(routes!(handlers::push_encrypted_handler))
        .routes(routes!(handlers::get_settings_handler))
        .routes(routes!(handlers::put_settings_handler))
        .routes(routes!(handlers::get_vault_handler))
        .routes(routes!(handlers::put_vault_envelope_handler))
        .routes(routes!(handlers::enable_vault_handler))
        .routes(routes!(handlers::disable_vault_handler))
        .routes(routes!(handlers::verify_plaintext_handler))
        .routes(routes!(handlers::disable_cleanup_handler))
}
