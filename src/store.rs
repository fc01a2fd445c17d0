//! Storage seams
//!
//! The application keeps no authoritative state in memory. Every handler goes
//! through a [`ContentStore`] for relational data and an [`ObjectStore`] for
//! uploaded file bytes. Two backends implement both traits: the embedded redb
//! store in [`crate::database`] and the hosted HTTP API in [`crate::hosted`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;
use crate::model::{Folder, Link, NewFolder, NewUser, Session, User};

/// Bucket holding uploaded content, keyed by `{short_code}_{filename}`
pub const BUCKET: &str = "content";

/// Relational side of the Content Store: users, sessions, folders and links
///
/// Lookups return `Ok(None)` for absent rows; `Err` is reserved for backend
/// failures and uniqueness conflicts.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Inserts a user and assigns its id
    ///
    /// # Returns
    ///
    /// * `Ok(User)` - The stored user, id included
    /// * `Err(StoreError::Conflict)` - The email is already registered
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn user_by_id(&self, id: i64) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Overwrites email and password hash of an existing user
    ///
    /// Fails with `StoreError::Conflict` when the new email belongs to
    /// another account.
    async fn update_user(&self, user: &User) -> StoreResult<()>;

    async fn insert_session(&self, session: &Session) -> StoreResult<()>;
    async fn session(&self, id: &str) -> StoreResult<Option<Session>>;
    /// Marks the session revoked; absent sessions are ignored
    async fn revoke_session(&self, id: &str) -> StoreResult<()>;

    async fn create_folder(&self, folder: NewFolder) -> StoreResult<Folder>;
    async fn folder(&self, id: i64) -> StoreResult<Option<Folder>>;
    /// Folders owned by `user_id`
    async fn folders_for_user(&self, user_id: i64) -> StoreResult<Vec<Folder>>;
    /// Deletes the folder and unfiles every link that referenced it
    async fn delete_folder(&self, id: i64) -> StoreResult<()>;

    async fn link_exists(&self, short_code: &str) -> StoreResult<bool>;
    /// Fails with `StoreError::Conflict` when the short code is already used
    async fn insert_link(&self, link: &Link) -> StoreResult<()>;
    async fn link(&self, short_code: &str) -> StoreResult<Option<Link>>;
    /// Links owned by `user_id`, newest first
    async fn links_for_user(&self, user_id: i64) -> StoreResult<Vec<Link>>;
    /// Moves a link to `new_code`, replacing its content when `new_content` is
    /// given (file links whose object moved along with the code)
    ///
    /// Fails with `StoreError::Conflict` when `new_code` is in use and with
    /// `StoreError::Missing` when `short_code` is unknown.
    async fn rename_link(
        &self,
        short_code: &str,
        new_code: &str,
        new_content: Option<&str>,
    ) -> StoreResult<()>;
    async fn delete_link(&self, short_code: &str) -> StoreResult<()>;
}

/// Uploaded file bytes in the [`BUCKET`] bucket
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key`
    ///
    /// # Arguments
    ///
    /// * `key` - Object key, `{short_code}_{filename}`
    /// * `bytes` - Full file contents
    /// * `mime` - Content type reported to the backend
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The object is stored
    /// * `Err(StoreError::Conflict)` - An object with this key already exists
    async fn upload(&self, key: &str, bytes: Vec<u8>, mime: &str) -> StoreResult<()>;
    /// Fails with `StoreError::Missing` when no object has this key
    async fn download(&self, key: &str) -> StoreResult<Vec<u8>>;
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// URL under which the object is publicly reachable
    fn public_url(&self, key: &str) -> String;

    /// Recovers the object key from a URL produced by [`ObjectStore::public_url`]
    fn key_from_url(&self, url: &str) -> Option<String> {
        let marker = format!("/{BUCKET}/");
        url.rsplit_once(marker.as_str())
            .map(|(_, key)| key.to_string())
            .filter(|key| !key.is_empty())
    }
}

/// Returns the session only while it is still valid at `now`
pub async fn active_session(
    store: &dyn ContentStore,
    token: &str,
    now: DateTime<Utc>,
) -> StoreResult<Option<Session>> {
    Ok(store.session(token).await?.filter(|s| s.is_active(now)))
}
