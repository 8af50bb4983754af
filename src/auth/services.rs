use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password_blocking, verify_password_blocking, DUMMY_HASH},
        repo::UserStore,
        repo_types::{NewUser, User},
    },
    error::{CredentialError, StorageError},
    state::AppState,
};

/// Registration and login on top of a [`UserStore`] and the token keys.
#[derive(Clone)]
pub struct CredentialService {
    users: Arc<dyn UserStore>,
    keys: JwtKeys,
}

impl FromRef<AppState> for CredentialService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.keys.clone())
    }
}

impl CredentialService {
    pub fn new(users: Arc<dyn UserStore>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    /// Stores a new identity and returns a token for it. Expects the request
    /// to be validated already.
    #[instrument(skip_all, fields(role = %req.role))]
    pub async fn register(&self, req: RegisterRequest) -> Result<(String, User), CredentialError> {
        if self.users.find_by_email(&req.email).await?.is_some() {
            warn!("email already registered");
            return Err(CredentialError::AlreadyExists);
        }

        let password_hash = hash_password_blocking(req.password).await?;

        let new_user = NewUser {
            email: req.email,
            password_hash,
            role: req.role,
            first_name: req.first_name,
            last_name: req.last_name,
        };
        let user = match self.users.insert(new_user).await {
            Ok(u) => u,
            Err(StorageError::Conflict) => {
                warn!("concurrent registration for the same email");
                return Err(CredentialError::AlreadyExists);
            }
            Err(e) => return Err(e.into()),
        };

        let token = self
            .keys
            .issue(user.id, user.role)
            .map_err(CredentialError::Signing)?;

        info!(user_id = user.id, role = %user.role, "user registered");
        Ok((token, user))
    }

    /// Unknown email and wrong password fail identically.
    #[instrument(skip_all)]
    pub async fn login(&self, req: LoginRequest) -> Result<(String, User), CredentialError> {
        let user = self.users.find_by_email(&req.email).await?;

        let (user, stored_hash) = match user {
            Some(u) => {
                let hash = u.password_hash.clone();
                (Some(u), hash)
            }
            None => (None, DUMMY_HASH.clone()),
        };

        let password_ok = verify_password_blocking(req.password, stored_hash).await?;

        let user = match user {
            Some(u) if password_ok => u,
            _ => {
                warn!("login rejected");
                return Err(CredentialError::InvalidCredentials);
            }
        };

        let token = self
            .keys
            .issue(user.id, user.role)
            .map_err(CredentialError::Signing)?;

        info!(user_id = user.id, role = %user.role, "user logged in");
        Ok((token, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{claims::Role, repo::MemoryUserStore};
    use time::Duration;

    fn service() -> CredentialService {
        let keys = JwtKeys::new(b"service-secret", "iss", "aud", Duration::hours(24));
        CredentialService::new(Arc::new(MemoryUserStore::default()), keys)
    }

    fn register_req(email: &str, password: &str, role: Role) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            role,
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn register_issues_token_for_new_identity() {
        let svc = service();
        let (token, user) = svc
            .register(register_req("a@x.com", "pa55word", Role::Doctor))
            .await
            .unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.role, Role::Doctor);
        assert_ne!(user.password_hash, "pa55word");

        let claims = svc.keys.verify(&token).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.role, Role::Doctor);
    }

    #[tokio::test]
    async fn second_registration_with_same_email_fails() {
        let svc = service();
        svc.register(register_req("a@x.com", "pa55word", Role::Receptionist))
            .await
            .unwrap();
        let err = svc
            .register(register_req("a@x.com", "other-pass", Role::Doctor))
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::AlreadyExists));
    }

    #[tokio::test]
    async fn login_succeeds_with_right_password() {
        let svc = service();
        let (_, registered) = svc
            .register(register_req("a@x.com", "pa55word", Role::Receptionist))
            .await
            .unwrap();
        let (token, user) = svc.login(login_req("a@x.com", "pa55word")).await.unwrap();
        assert_eq!(user.id, registered.id);
        assert_eq!(svc.keys.verify(&token).unwrap().role, Role::Receptionist);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_fail_identically() {
        let svc = service();
        svc.register(register_req("a@x.com", "pa55word", Role::Doctor))
            .await
            .unwrap();

        let wrong_password = svc.login(login_req("a@x.com", "nope-nope")).await.unwrap_err();
        let unknown_email = svc.login(login_req("b@x.com", "pa55word")).await.unwrap_err();

        assert!(matches!(wrong_password, CredentialError::InvalidCredentials));
        assert!(matches!(unknown_email, CredentialError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn concurrent_registrations_yield_one_identity() {
        let svc = service();
        let (a, b) = tokio::join!(
            svc.register(register_req("race@x.com", "pa55word", Role::Doctor)),
            svc.register(register_req("race@x.com", "pa55word", Role::Doctor)),
        );
        let outcomes = [a.is_ok(), b.is_ok()];
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        let failure = a.err().or(b.err()).unwrap();
        assert!(matches!(failure, CredentialError::AlreadyExists));
    }
}
