use std::borrow::Cow;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// A specialized [`SyncServerError`] enum of this crate.
#[anchor_derive::anchor_error]
pub enum SyncServerError {
    /// Missing or invalid authentication token.
    #[error("Unauthorized{}: {message}", format_context(.context))]
    Unauthorized { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// Malformed request body or query.
    #[error("Bad request{}: {message}", format_context(.context))]
    BadRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// Per-record version conflict on push.
    #[error("Conflict{}: {message}", format_context(.context))]
    Conflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// Underlying database failure.
    #[error("Sync server database error{}: {message}", format_context(.context))]
    Database { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
    /// A wrapper for underlying `SurrealDB` query errors, raised by the raw
    /// `db.query(...)` calls in `repository.rs`.
    #[error("SurrealDB error{}: {source}", format_context(.context))]
    Surreal {
        #[source]
        source: surrealdb::Error,
        context: Option<Cow<'static, str>>,
    },
    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal sync server error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<anchor_database::DatabaseError> for SyncServerError {
    fn from(err: anchor_database::DatabaseError) -> Self {
        Self::Database { message: err.to_string().into(), context: None }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for SyncServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Database { .. } | Self::Surreal { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
