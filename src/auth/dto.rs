use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::auth::{claims::Role, repo_types::User};
use crate::error::ApiError;

const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Request body for staff registration.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl RegisterRequest {
    /// Normalizes the email and rejects malformed input before any storage access.
    pub fn validated(mut self) -> Result<Self, ApiError> {
        self.email = normalize_email(&self.email);
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();

        if !is_valid_email(&self.email) {
            return Err(ApiError::BadRequest("Invalid email".into()));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(ApiError::BadRequest("Password too short".into()));
        }
        if self.first_name.is_empty() || self.last_name.is_empty() {
            return Err(ApiError::BadRequest("First and last name are required".into()));
        }
        Ok(self)
    }
}

/// Request body for login.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest").finish_non_exhaustive()
    }
}

impl LoginRequest {
    pub fn validated(mut self) -> Result<Self, ApiError> {
        self.email = normalize_email(&self.email);
        if !is_valid_email(&self.email) {
            return Err(ApiError::BadRequest("Invalid email".into()));
        }
        Ok(self)
    }
}

/// Response returned after login or register.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            role: u.role,
            first_name: u.first_name,
            last_name: u.last_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            role: Role::Receptionist,
            first_name: " Mary ".into(),
            last_name: "Seacole".into(),
        }
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn register_normalizes_input() {
        let req = register("  A@X.Com ", "long-enough").validated().unwrap();
        assert_eq!(req.email, "a@x.com");
        assert_eq!(req.first_name, "Mary");
    }

    #[test]
    fn register_rejects_short_password_and_bad_email() {
        assert!(register("a@x.com", "12345").validated().is_err());
        assert!(register("nope", "long-enough").validated().is_err());
    }

    #[test]
    fn register_body_requires_known_role() {
        let body = r#"{"email":"a@x.com","password":"secret1","role":"admin","first_name":"A","last_name":"B"}"#;
        assert!(serde_json::from_str::<RegisterRequest>(body).is_err());
    }

    #[test]
    fn debug_never_prints_password() {
        let req = register("a@x.com", "hunter2-hunter2");
        let printed = format!("{req:?}");
        assert!(!printed.contains("hunter2"));
        let login = LoginRequest {
            email: "a@x.com".into(),
            password: "hunter2-hunter2".into(),
        };
        assert!(!format!("{login:?}").contains("hunter2"));
    }

    #[test]
    fn public_user_has_no_hash() {
        let now = time::OffsetDateTime::now_utc();
        let user = User {
            id: 3,
            email: "a@x.com".into(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Doctor,
            first_name: "A".into(),
            last_name: "B".into(),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(json.contains("\"role\":\"doctor\""));
        assert!(!json.contains("argon2"));
    }
}
