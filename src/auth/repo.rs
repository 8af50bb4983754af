use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::repo_types::{NewUser, User, UserRow};
use crate::error::StorageError;

/// Lookup and insertion of staff identities.
///
/// `insert` must enforce email uniqueness itself and report a duplicate as
/// [`StorageError::Conflict`]; callers only pre-check as an optimization.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StorageError>;
    async fn insert(&self, user: NewUser) -> Result<User, StorageError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_user(row: UserRow) -> Result<User, StorageError> {
    User::try_from(row).map_err(|e| StorageError::Corrupt(e.to_string()))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, role, first_name, last_name, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, role, first_name, last_name, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn insert(&self, user: NewUser) -> Result<User, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, password_hash, role, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, role, first_name, last_name, created_at, updated_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => StorageError::Database(other),
        })?;
        into_user(row)
    }
}

/// In-process store keyed by insertion order; uniqueness is checked under the
/// write lock.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryUserStore {
    users: tokio::sync::RwLock<Vec<User>>,
}

#[cfg(test)]
#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StorageError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StorageError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(StorageError::Conflict);
        }
        let now = time::OffsetDateTime::now_utc();
        let stored = User {
            id: users.len() as i32 + 1,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: now,
            updated_at: now,
        };
        users.push(stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
            role: Role::Doctor,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        }
    }

    #[tokio::test]
    async fn memory_store_assigns_ids_and_finds_users() {
        let store = MemoryUserStore::default();
        let a = store.insert(new_user("a@x.com")).await.unwrap();
        let b = store.insert(new_user("b@x.com")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.find_by_email("b@x.com").await.unwrap().unwrap().id, b.id);
        assert_eq!(store.find_by_id(a.id).await.unwrap().unwrap().email, "a@x.com");
        assert!(store.find_by_email("c@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_rejects_duplicate_email() {
        let store = MemoryUserStore::default();
        store.insert(new_user("a@x.com")).await.unwrap();
        let err = store.insert(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[test]
    fn unknown_role_in_row_is_reported_as_corrupt() {
        let now = time::OffsetDateTime::now_utc();
        let row = UserRow {
            id: 1,
            email: "a@x.com".into(),
            password_hash: "h".into(),
            role: "janitor".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(into_user(row), Err(StorageError::Corrupt(_))));
    }
}
