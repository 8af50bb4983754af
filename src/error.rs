use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::auth::claims::Role;

/// Password hashing could not complete (entropy source or worker failure).
#[derive(Debug, thiserror::Error)]
#[error("password hashing failed: {0}")]
pub struct HashingError(pub String);

/// Reasons a session token is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token malformed")]
    Malformed,
    #[error("token signature invalid")]
    SignatureInvalid,
}

/// Failures of the access guard and of per-operation role gates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingCredentials,
    #[error("invalid Authorization header")]
    MalformedCredentials,
    #[error("invalid token: {0}")]
    InvalidToken(TokenError),
    #[error("role {role} may not perform this operation")]
    Forbidden { role: Role },
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email already registered")]
    AlreadyExists,
    #[error(transparent)]
    Hashing(#[from] HashingError),
    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpdateError {
    #[error("no fields to update")]
    EmptyChangeSet,
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("field `{field}` expects {expected}")]
    InvalidValue { field: String, expected: &'static str },
    #[error("field `{0}` must not be blank")]
    BlankField(String),
}

/// Errors surfaced by the storage collaborator, passed through untouched.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record conflicts with an existing one")]
    Conflict,
    #[error("referenced record does not exist")]
    InvalidReference,
    #[error("stored row is invalid: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Error returned by every HTTP handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Update(#[from] UpdateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        let dangling = e
            .as_database_error()
            .is_some_and(|db| db.is_foreign_key_violation());
        if dangling {
            ApiError::Storage(StorageError::InvalidReference)
        } else {
            ApiError::Storage(StorageError::Database(e))
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(AuthError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Credential(CredentialError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            ApiError::Credential(CredentialError::AlreadyExists) => StatusCode::CONFLICT,
            ApiError::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Update(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Storage(StorageError::Conflict) => StatusCode::CONFLICT,
            ApiError::Storage(StorageError::InvalidReference) => StatusCode::BAD_REQUEST,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// Message safe to hand to the caller. Token failures other than expiry
    /// collapse into one message, and server faults never carry detail.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Auth(AuthError::InvalidToken(TokenError::Expired)) => "token expired".into(),
            ApiError::Auth(AuthError::InvalidToken(_)) => "invalid token".into(),
            ApiError::Auth(AuthError::Forbidden { .. }) => "access denied".into(),
            ApiError::Auth(e) => e.to_string(),
            ApiError::Credential(
                e @ (CredentialError::InvalidCredentials | CredentialError::AlreadyExists),
            ) => e.to_string(),
            ApiError::Storage(e @ (StorageError::Conflict | StorageError::InvalidReference)) => {
                e.to_string()
            }
            ApiError::Credential(_) | ApiError::Storage(_) => "internal server error".into(),
            ApiError::Update(e) => e.to_string(),
            ApiError::BadRequest(_) | ApiError::NotFound(_) => self.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = Json(ErrorBody {
            error: self.public_message(),
        });
        (status, body).into_response()
    }
}
