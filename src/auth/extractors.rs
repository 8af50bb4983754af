use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::{claims::Role, jwt::JwtKeys};
use crate::error::{ApiError, AuthError};

/// Authenticated caller, bound into the request once the token verifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

/// Role requirement attached to a protected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleGate {
    required: Role,
}

impl RoleGate {
    pub const fn only(required: Role) -> Self {
        Self { required }
    }

    pub fn permits(self, role: Role) -> bool {
        self.required == role
    }
}

impl AuthUser {
    /// Checked by handlers after extraction, so a bad token is always a 401
    /// before any role decision is made.
    pub fn require(&self, gate: RoleGate) -> Result<(), AuthError> {
        if gate.permits(self.role) {
            Ok(())
        } else {
            warn!(user_id = self.id, role = %self.role, ?gate, "role gate refused");
            Err(AuthError::Forbidden { role: self.role })
        }
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = match headers.get(AUTHORIZATION) {
        None => return Err(AuthError::MissingCredentials),
        Some(v) if v.is_empty() => return Err(AuthError::MissingCredentials),
        Some(v) => v.to_str().map_err(|_| AuthError::MalformedCredentials)?,
    };

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] => Ok(*token),
        _ => Err(AuthError::MalformedCredentials),
    }
}

/// Header check followed by token verification.
pub fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> Result<AuthUser, AuthError> {
    let token = bearer_token(headers)?;
    let claims = keys.verify(token).map_err(|e| {
        warn!(reason = %e, "token rejected");
        AuthError::InvalidToken(e)
    })?;
    Ok(AuthUser {
        id: claims.user_id,
        role: claims.role,
    })
}

/// Guards a router: rejects unauthenticated requests and stores the
/// [`AuthUser`] in the request extensions for handlers.
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(req.headers(), &keys)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(*user);
        }
        let keys = JwtKeys::from_ref(state);
        Ok(authenticate(&parts.headers, &keys)?)
    }
}
