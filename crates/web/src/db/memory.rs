//! In-process user store for local development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use yelpcamp_core::{UserId, Username};

use super::{NewUser, RepositoryError, StoredCredentials, UserStore};
use crate::models::User;

#[derive(Debug, Default)]
struct Inner {
    next_id: i32,
    users: HashMap<UserId, StoredCredentials>,
}

/// User store kept in memory; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

impl MemoryUserStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a user, returning whether it existed.
    pub async fn remove(&self, id: UserId) -> bool {
        self.inner.write().await.users.remove(&id).is_some()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<StoredCredentials>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|stored| &stored.user.username == username)
            .cloned())
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).map(|stored| stored.user.clone()))
    }

    async fn create(&self, new_user: NewUser<'_>) -> Result<User, RepositoryError> {
        let mut inner = self.inner.write().await;

        for stored in inner.users.values() {
            if &stored.user.username == new_user.username {
                return Err(RepositoryError::Conflict("username".to_owned()));
            }
            if &stored.user.email == new_user.email {
                return Err(RepositoryError::Conflict("email".to_owned()));
            }
        }

        inner.next_id += 1;
        let user = User {
            id: UserId::new(inner.next_id),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            created_at: Utc::now(),
        };
        inner.users.insert(
            user.id,
            StoredCredentials {
                user: user.clone(),
                password_hash: new_user.password_hash.to_owned(),
            },
        );
        Ok(user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use yelpcamp_core::Email;

    use super::*;

    fn new_user<'a>(username: &'a Username, email: &'a Email) -> NewUser<'a> {
        NewUser {
            username,
            email,
            password_hash: "hash",
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let store = MemoryUserStore::new();
        let username = Username::parse("ranger").unwrap();
        let email = Email::parse("ranger@park.gov").unwrap();

        let user = store.create(new_user(&username, &email)).await.unwrap();
        assert_eq!(store.get_by_id(user.id).await.unwrap(), Some(user.clone()));

        let stored = store.find_credentials(&username).await.unwrap().unwrap();
        assert_eq!(stored.user.id, user.id);
        assert_eq!(stored.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_duplicates_conflict() {
        let store = MemoryUserStore::new();
        let username = Username::parse("ranger").unwrap();
        let other = Username::parse("hiker").unwrap();
        let email = Email::parse("ranger@park.gov").unwrap();

        store.create(new_user(&username, &email)).await.unwrap();

        let err = store.create(new_user(&username, &email)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref f) if f == "username"));

        let err = store.create(new_user(&other, &email)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref f) if f == "email"));
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryUserStore::new();
        let username = Username::parse("ranger").unwrap();
        let email = Email::parse("ranger@park.gov").unwrap();
        let user = store.create(new_user(&username, &email)).await.unwrap();

        assert!(store.remove(user.id).await);
        assert_eq!(store.get_by_id(user.id).await.unwrap(), None);
        assert!(!store.remove(user.id).await);
    }
}
