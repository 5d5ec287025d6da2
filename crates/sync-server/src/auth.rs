//! Resolves the caller's user id from a bearer JWT, the way every sync
//! endpoint is required to: no endpoint accepts a user id from the client
//! body, and a missing or invalid token yields 401.
//!
//! There is no HTTP-layer bearer extractor to generalize from elsewhere in
//! the workspace: `infra/database/src/auth.rs` issues JWTs for SurrealDB's
//! own per-session scoped auth, a different mechanism. This extractor reuses
//! only the `JwtConfig` it already defines, decoded the conventional Axum
//! way.

use std::borrow::Cow;

use anchor_domain::config::ApiConfig;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::error::SyncServerError;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// The signed-in user id, resolved from the `Authorization: Bearer <jwt>`
/// header. Never constructed from request-body/query data.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    ApiConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = SyncServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| unauthorized("missing Authorization header"))?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| unauthorized("expected a Bearer token"))?;

        let config = ApiConfig::from_ref(state);
        let jwt = &config.security.identity.jwt;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[jwt.issuer.clone()]);
        validation.leeway = jwt.clock_skew_seconds;
        if let Some(audience) = &jwt.audience {
            validation.set_audience(&[audience.clone()]);
        } else {
            validation.validate_aud = false;
        }

        let data = decode::<Claims>(token, &DecodingKey::from_secret(jwt.secret.as_bytes()), &validation)
            .map_err(|err| unauthorized(err.to_string()))?;

        Ok(Self { user_id: data.claims.sub })
    }
}

fn unauthorized(message: impl Into<Cow<'static, str>>) -> SyncServerError {
    SyncServerError::Unauthorized { message: message.into(), context: None }
}
