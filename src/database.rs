//! Embedded Content Store on redb
//!
//! This module handles the setup of the embedded redb database and implements
//! both storage traits on top of it. Records are stored as JSON strings, the
//! same way for every table, so the schema matches the hosted backend's rows.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{
    AccessGuard, Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::de::DeserializeOwned;

use crate::error::{StoreError, StoreResult};
use crate::model::{Folder, Link, NewFolder, NewUser, Session, User};
use crate::store::{ContentStore, ObjectStore, BUCKET};

/// Main table for accounts
///
/// Key: user id assigned from [`TABLE_SEQUENCES`]
/// Value: JSON-serialized User as string
///
/// Example:
/// - Key: 1
/// - Value: '{"id":1,"email":"a@example.com","password_hash":"$argon2id$...",...}'
pub const TABLE_USERS: TableDefinition<i64, &str> = TableDefinition::new("users_v1");

/// Unique index enforcing one account per email
///
/// Key: email, Value: user id
pub const TABLE_USER_EMAILS: TableDefinition<&str, i64> = TableDefinition::new("user_emails_v1");

/// Key: session token, Value: JSON-serialized Session
pub const TABLE_SESSIONS: TableDefinition<&str, &str> = TableDefinition::new("sessions_v1");

/// Key: folder id, Value: JSON-serialized Folder
pub const TABLE_FOLDERS: TableDefinition<i64, &str> = TableDefinition::new("folders_v1");

/// Shortened content
///
/// Key: short code
/// Value: JSON-serialized Link as string
///
/// Example:
/// - Key: "abc123"
/// - Value: '{"short_code":"abc123","content_type":"url","content":"http://example.com",...}'
///
/// Image and document links hold the public URL of their object in
/// [`TABLE_OBJECTS`] rather than the bytes.
pub const TABLE_LINKS: TableDefinition<&str, &str> = TableDefinition::new("links_v1");

/// Uploaded file bytes of the `content` bucket
///
/// Key: `{short_code}_{filename}`, Value: raw bytes
pub const TABLE_OBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("objects_v1");

/// Last id handed out per table
pub const TABLE_SEQUENCES: TableDefinition<&str, i64> = TableDefinition::new("sequences_v1");

/// Initializes the embedded database and creates required tables
///
/// Creates or opens the database file, then opens every table inside one
/// write transaction so they exist before the first request.
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "data.db")
///
/// # Returns
///
/// * `Ok(Database)` - Successfully initialized database instance
/// * `Err(redb::Error)` - Database initialization error
///
/// # Example
///
/// ```no_run
/// # use content_shortener::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: impl AsRef<Path>) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_USERS)?;
        write_txn.open_table(TABLE_USER_EMAILS)?;
        write_txn.open_table(TABLE_SESSIONS)?;
        write_txn.open_table(TABLE_FOLDERS)?;
        write_txn.open_table(TABLE_LINKS)?;
        write_txn.open_table(TABLE_OBJECTS)?;
        write_txn.open_table(TABLE_SEQUENCES)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Content Store and object store backed by a single redb file
#[derive(Clone)]
pub struct EmbeddedStore {
    db: Arc<Database>,
}

impl EmbeddedStore {
    pub fn new(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Opens (or creates) the database at `db_path` through [`init_db`]
    ///
    /// # Returns
    ///
    /// * `Ok(EmbeddedStore)` - Store serving both the tables and the `content` bucket
    /// * `Err(StoreError::Database)` - The file could not be opened or initialized
    pub fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(init_db(db_path)?))
    }
}

fn decode<T: DeserializeOwned>(value: Option<AccessGuard<'_, &'static str>>) -> StoreResult<Option<T>> {
    value
        .map(|guard| serde_json::from_str(guard.value()))
        .transpose()
        .map_err(StoreError::from)
}

fn next_id(txn: &WriteTransaction, sequence: &str) -> StoreResult<i64> {
    let mut table = txn.open_table(TABLE_SEQUENCES)?;
    let next = table.get(sequence)?.map(|guard| guard.value()).unwrap_or(0) + 1;
    table.insert(sequence, next)?;
    Ok(next)
}

#[async_trait]
impl ContentStore for EmbeddedStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut emails = write_txn.open_table(TABLE_USER_EMAILS)?;
            if emails.get(new_user.email.as_str())?.is_some() {
                return Err(StoreError::Conflict(format!("email {}", new_user.email)));
            }

            let id = next_id(&write_txn, "users")?;
            let user = User {
                id,
                email: new_user.email,
                password_hash: new_user.password_hash,
                created_at: new_user.created_at,
            };

            let mut users = write_txn.open_table(TABLE_USERS)?;
            users.insert(id, serde_json::to_string(&user)?.as_str())?;
            emails.insert(user.email.as_str(), id)?;
            user
        };
        write_txn.commit()?;

        Ok(user)
    }

    async fn user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_USERS)?;
        let value = table.get(id)?;
        decode(value)
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let id = {
            let read_txn = self.db.begin_read()?;
            let emails = read_txn.open_table(TABLE_USER_EMAILS)?;
            let id = emails.get(email)?.map(|guard| guard.value());
            id
        };
        match id {
            Some(id) => self.user_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut users = write_txn.open_table(TABLE_USERS)?;
            let previous: User = match users.get(user.id)? {
                Some(value) => serde_json::from_str(value.value())?,
                None => return Err(StoreError::Missing(format!("user {}", user.id))),
            };

            if previous.email != user.email {
                let mut emails = write_txn.open_table(TABLE_USER_EMAILS)?;
                if emails.get(user.email.as_str())?.is_some() {
                    return Err(StoreError::Conflict(format!("email {}", user.email)));
                }
                emails.remove(previous.email.as_str())?;
                emails.insert(user.email.as_str(), user.id)?;
            }

            users.insert(user.id, serde_json::to_string(user)?.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_SESSIONS)?;
            table.insert(session.id.as_str(), serde_json::to_string(session)?.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn session(&self, id: &str) -> StoreResult<Option<Session>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_SESSIONS)?;
        let value = table.get(id)?;
        decode(value)
    }

    async fn revoke_session(&self, id: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_SESSIONS)?;
            let existing = table.get(id)?.map(|guard| guard.value().to_string());
            if let Some(json) = existing {
                let mut session: Session = serde_json::from_str(&json)?;
                if !session.revoked {
                    session.revoked = true;
                    table.insert(id, serde_json::to_string(&session)?.as_str())?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn create_folder(&self, new_folder: NewFolder) -> StoreResult<Folder> {
        let write_txn = self.db.begin_write()?;
        let folder = {
            let id = next_id(&write_txn, "folders")?;
            let folder = Folder {
                id,
                name: new_folder.name,
                user_id: new_folder.user_id,
            };
            let mut table = write_txn.open_table(TABLE_FOLDERS)?;
            table.insert(id, serde_json::to_string(&folder)?.as_str())?;
            folder
        };
        write_txn.commit()?;
        Ok(folder)
    }

    async fn folder(&self, id: i64) -> StoreResult<Option<Folder>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_FOLDERS)?;
        let value = table.get(id)?;
        decode(value)
    }

    async fn folders_for_user(&self, user_id: i64) -> StoreResult<Vec<Folder>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_FOLDERS)?;

        let mut folders = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let folder: Folder = serde_json::from_str(value.value())?;
            if folder.user_id == user_id {
                folders.push(folder);
            }
        }
        Ok(folders)
    }

    async fn delete_folder(&self, id: i64) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut folders = write_txn.open_table(TABLE_FOLDERS)?;
            folders.remove(id)?;

            let mut links = write_txn.open_table(TABLE_LINKS)?;
            let mut orphaned = Vec::new();
            for entry in links.iter()? {
                let (_, value) = entry?;
                let link: Link = serde_json::from_str(value.value())?;
                if link.folder_id == Some(id) {
                    orphaned.push(link);
                }
            }
            for mut link in orphaned {
                link.folder_id = None;
                links.insert(link.short_code.as_str(), serde_json::to_string(&link)?.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn link_exists(&self, short_code: &str) -> StoreResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_LINKS)?;
        let exists = table.get(short_code)?.is_some();
        Ok(exists)
    }

    async fn insert_link(&self, link: &Link) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_LINKS)?;
            if table.get(link.short_code.as_str())?.is_some() {
                return Err(StoreError::Conflict(format!("short code {}", link.short_code)));
            }
            table.insert(link.short_code.as_str(), serde_json::to_string(link)?.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn link(&self, short_code: &str) -> StoreResult<Option<Link>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_LINKS)?;
        let value = table.get(short_code)?;
        decode(value)
    }

    // Full scan; fine for a single-node store.
    async fn links_for_user(&self, user_id: i64) -> StoreResult<Vec<Link>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_LINKS)?;

        let mut links = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let link: Link = serde_json::from_str(value.value())?;
            if link.user_id == Some(user_id) {
                links.push(link);
            }
        }
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(links)
    }

    async fn rename_link(
        &self,
        short_code: &str,
        new_code: &str,
        new_content: Option<&str>,
    ) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_LINKS)?;
            if table.get(new_code)?.is_some() {
                return Err(StoreError::Conflict(format!("short code {new_code}")));
            }
            let existing = table.remove(short_code)?.map(|guard| guard.value().to_string());
            let mut link: Link = match existing {
                Some(json) => serde_json::from_str(&json)?,
                None => return Err(StoreError::Missing(format!("short code {short_code}"))),
            };
            link.short_code = new_code.to_string();
            if let Some(content) = new_content {
                link.content = content.to_string();
            }
            table.insert(new_code, serde_json::to_string(&link)?.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn delete_link(&self, short_code: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_LINKS)?;
            table.remove(short_code)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for EmbeddedStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>, _mime: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_OBJECTS)?;
            if table.get(key)?.is_some() {
                return Err(StoreError::Conflict(format!("object {key}")));
            }
            table.insert(key, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    async fn download(&self, key: &str) -> StoreResult<Vec<u8>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_OBJECTS)?;
        let bytes = table.get(key)?.map(|guard| guard.value().to_vec());
        bytes.ok_or_else(|| StoreError::Missing(format!("object {key}")))
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TABLE_OBJECTS)?;
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Served by the `/content/{key}` route
    fn public_url(&self, key: &str) -> String {
        format!("/{BUCKET}/{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentKind;
    use chrono::{Duration, Utc};
    use tempfile::NamedTempFile;

    fn setup_store() -> (EmbeddedStore, NamedTempFile) {
        let temp_db = NamedTempFile::new().expect("Failed to create temp file");
        let store = EmbeddedStore::open(temp_db.path()).expect("Failed to open store");
        (store, temp_db)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            created_at: Utc::now(),
        }
    }

    fn link(code: &str, user_id: Option<i64>, folder_id: Option<i64>) -> Link {
        Link {
            short_code: code.to_string(),
            content_type: ContentKind::Text,
            content: "hello".to_string(),
            user_id,
            folder_id,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_user_ids_increase_and_emails_are_unique() {
        let (store, _temp_db) = setup_store();

        let first = store.create_user(new_user("a@example.com")).await.unwrap();
        let second = store.create_user(new_user("b@example.com")).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        let duplicate = store.create_user(new_user("a@example.com")).await;
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));

        let found = store.user_by_email("b@example.com").await.unwrap().unwrap();
        assert_eq!(found, second);
    }

    #[tokio::test]
    async fn test_update_user_moves_email_index() {
        let (store, _temp_db) = setup_store();
        let mut user = store.create_user(new_user("old@example.com")).await.unwrap();
        store.create_user(new_user("taken@example.com")).await.unwrap();

        user.email = "taken@example.com".to_string();
        assert!(matches!(store.update_user(&user).await, Err(StoreError::Conflict(_))));

        user.email = "new@example.com".to_string();
        store.update_user(&user).await.unwrap();
        assert!(store.user_by_email("old@example.com").await.unwrap().is_none());
        assert_eq!(store.user_by_email("new@example.com").await.unwrap().unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_revoke_session_is_idempotent() {
        let (store, _temp_db) = setup_store();
        let session = Session {
            id: "token".to_string(),
            user_id: 1,
            expires_at: Utc::now() + Duration::days(7),
            revoked: false,
        };
        store.insert_session(&session).await.unwrap();

        store.revoke_session("token").await.unwrap();
        store.revoke_session("token").await.unwrap();
        store.revoke_session("missing").await.unwrap();

        assert!(store.session("token").await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn test_delete_folder_unfiles_links() {
        let (store, _temp_db) = setup_store();
        let folder = store
            .create_folder(NewFolder { name: "work".to_string(), user_id: 1 })
            .await
            .unwrap();
        store.insert_link(&link("filed", Some(1), Some(folder.id))).await.unwrap();

        store.delete_folder(folder.id).await.unwrap();

        assert!(store.folder(folder.id).await.unwrap().is_none());
        let orphan = store.link("filed").await.unwrap().unwrap();
        assert_eq!(orphan.folder_id, None);
    }

    #[tokio::test]
    async fn test_rename_link_rejects_taken_code() {
        let (store, _temp_db) = setup_store();
        store.insert_link(&link("first", Some(1), None)).await.unwrap();
        store.insert_link(&link("second", Some(1), None)).await.unwrap();

        let result = store.rename_link("first", "second", None).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        store.rename_link("first", "renamed", None).await.unwrap();
        assert!(!store.link_exists("first").await.unwrap());
        let renamed = store.link("renamed").await.unwrap().unwrap();
        assert_eq!(renamed.short_code, "renamed");
        assert_eq!(renamed.content, "hello");

        store
            .rename_link("renamed", "again", Some("/content/again_a.png"))
            .await
            .unwrap();
        assert_eq!(store.link("again").await.unwrap().unwrap().content, "/content/again_a.png");

        let missing = store.rename_link("gone", "other", None).await;
        assert!(matches!(missing, Err(StoreError::Missing(_))));
    }

    #[tokio::test]
    async fn test_object_round_trip_and_public_url() {
        let (store, _temp_db) = setup_store();
        store.upload("abc123_photo.png", vec![1, 2, 3], "image/png").await.unwrap();

        let url = store.public_url("abc123_photo.png");
        assert_eq!(url, "/content/abc123_photo.png");
        assert_eq!(store.key_from_url(&url).as_deref(), Some("abc123_photo.png"));
        assert_eq!(store.download("abc123_photo.png").await.unwrap(), vec![1, 2, 3]);

        store.remove("abc123_photo.png").await.unwrap();
        assert!(matches!(store.download("abc123_photo.png").await, Err(StoreError::Missing(_))));
    }
}
