use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::claims::{Claims, Role, TokenClaims},
    config::JwtConfig,
    error::TokenError,
    state::AppState,
};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// HMAC signing material plus the fixed claims every token must carry.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.keys.clone()
    }
}

impl JwtKeys {
    pub fn new(secret: &[u8], issuer: &str, audience: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            ttl,
        }
    }

    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self::new(
            cfg.secret.as_bytes(),
            &cfg.issuer,
            &cfg.audience,
            Duration::minutes(cfg.ttl_minutes),
        )
    }

    #[cfg(test)]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: i32, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(user_id, role, OffsetDateTime::now_utc())
    }

    pub fn issue_at(
        &self,
        user_id: i32,
        role: Role,
        now: OffsetDateTime,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let exp = now + self.ttl;
        let claims = TokenClaims {
            sub: user_id.to_string(),
            role,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding)?;
        debug!(user_id, %role, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    /// Checks signature, algorithm, issuer and audience, then expiry against
    /// `now`. A token is still valid at the exact second it expires.
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<Claims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation())
            .map_err(|e| token_error(e.kind()))?;
        let claims = data.claims;

        if now.unix_timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }
        let user_id = claims.sub.parse::<i32>().map_err(|_| TokenError::Malformed)?;

        debug!(user_id, role = %claims.role, "jwt verified");
        Ok(Claims {
            user_id,
            role: claims.role,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(ALGORITHM);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        // Expiry is judged against the caller's clock in verify_at.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation
    }
}

fn token_error(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::SignatureInvalid,
        _ => TokenError::Malformed,
    }
}
