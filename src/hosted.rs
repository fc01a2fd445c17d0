//! Hosted Content Store over HTTP
//!
//! Talks to a PostgREST-style table API (`/rest/v1/{table}`) and a storage API
//! (`/storage/v1/object/...`) authenticated by a single API key. Rows use the
//! same field names as the models, so the tables are `users`, `sessions`,
//! `folders` and `links` with matching columns.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::error::{StoreError, StoreResult};
use crate::model::{Folder, Link, NewFolder, NewUser, Session, User};
use crate::store::{ContentStore, ObjectStore, BUCKET};

#[derive(Clone)]
pub struct HostedStore {
    client: Client,
    base_url: String,
    key: String,
}

impl HostedStore {
    pub fn new(base_url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            key: key.into(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{BUCKET}/{key}", self.base_url)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", &self.key).bearer_auth(&self.key)
    }

    async fn select<T: DeserializeOwned + Send>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> StoreResult<Vec<T>> {
        let rows = self
            .authed(self.client.get(self.table_url(table)))
            .query(&[("select", "*")])
            .query(filters)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(rows)
    }

    async fn select_one<T: DeserializeOwned + Send>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> StoreResult<Option<T>> {
        Ok(self.select(table, filters).await?.into_iter().next())
    }

    async fn insert<B: Serialize + Sync, T: DeserializeOwned + Send>(
        &self,
        table: &str,
        row: &B,
    ) -> StoreResult<T> {
        let response = self
            .authed(self.client.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(StoreError::Conflict(format!("{table} row")));
        }
        let rows: Vec<T> = response.error_for_status()?.json().await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Missing(format!("inserted {table} row")))
    }

    async fn update(
        &self,
        table: &str,
        filters: &[(&str, String)],
        patch: serde_json::Value,
    ) -> StoreResult<()> {
        let response = self
            .authed(self.client.patch(self.table_url(table)))
            .query(filters)
            .json(&patch)
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(StoreError::Conflict(format!("{table} row")));
        }
        response.error_for_status()?;
        Ok(())
    }

    async fn delete(&self, table: &str, filters: &[(&str, String)]) -> StoreResult<()> {
        self.authed(self.client.delete(self.table_url(table)))
            .query(filters)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn eq(column: &'static str, value: impl std::fmt::Display) -> (&'static str, String) {
    (column, format!("eq.{value}"))
}

#[async_trait]
impl ContentStore for HostedStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.insert("users", &user).await
    }

    async fn user_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        self.select_one("users", &[eq("id", id)]).await
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.select_one("users", &[eq("email", email)]).await
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        self.update(
            "users",
            &[eq("id", user.id)],
            json!({ "email": user.email, "password_hash": user.password_hash }),
        )
        .await
    }

    async fn insert_session(&self, session: &Session) -> StoreResult<()> {
        let _: Session = self.insert("sessions", session).await?;
        Ok(())
    }

    async fn session(&self, id: &str) -> StoreResult<Option<Session>> {
        self.select_one("sessions", &[eq("id", id)]).await
    }

    async fn revoke_session(&self, id: &str) -> StoreResult<()> {
        self.update("sessions", &[eq("id", id)], json!({ "revoked": true }))
            .await
    }

    async fn create_folder(&self, folder: NewFolder) -> StoreResult<Folder> {
        self.insert("folders", &folder).await
    }

    async fn folder(&self, id: i64) -> StoreResult<Option<Folder>> {
        self.select_one("folders", &[eq("id", id)]).await
    }

    async fn folders_for_user(&self, user_id: i64) -> StoreResult<Vec<Folder>> {
        self.select("folders", &[eq("user_id", user_id), ("order", "name.asc".to_string())])
            .await
    }

    async fn delete_folder(&self, id: i64) -> StoreResult<()> {
        self.update("links", &[eq("folder_id", id)], json!({ "folder_id": null }))
            .await?;
        self.delete("folders", &[eq("id", id)]).await
    }

    async fn link_exists(&self, short_code: &str) -> StoreResult<bool> {
        let rows: Vec<serde_json::Value> = self
            .authed(self.client.get(self.table_url("links")))
            .query(&[("select", "short_code".to_string()), eq("short_code", short_code)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(!rows.is_empty())
    }

    async fn insert_link(&self, link: &Link) -> StoreResult<()> {
        let _: Link = self.insert("links", link).await?;
        Ok(())
    }

    async fn link(&self, short_code: &str) -> StoreResult<Option<Link>> {
        self.select_one("links", &[eq("short_code", short_code)]).await
    }

    async fn links_for_user(&self, user_id: i64) -> StoreResult<Vec<Link>> {
        self.select(
            "links",
            &[eq("user_id", user_id), ("order", "created_at.desc".to_string())],
        )
        .await
    }

    async fn rename_link(
        &self,
        short_code: &str,
        new_code: &str,
        new_content: Option<&str>,
    ) -> StoreResult<()> {
        let patch = match new_content {
            Some(content) => json!({ "short_code": new_code, "content": content }),
            None => json!({ "short_code": new_code }),
        };
        self.update("links", &[eq("short_code", short_code)], patch)
            .await
    }

    async fn delete_link(&self, short_code: &str) -> StoreResult<()> {
        self.delete("links", &[eq("short_code", short_code)]).await
    }
}

#[async_trait]
impl ObjectStore for HostedStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>, mime: &str) -> StoreResult<()> {
        let response = self
            .authed(self.client.post(self.object_url(key)))
            .header(reqwest::header::CONTENT_TYPE, mime)
            .body(bytes)
            .send()
            .await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(StoreError::Conflict(format!("object {key}")));
        }
        response.error_for_status()?;
        Ok(())
    }

    async fn download(&self, key: &str) -> StoreResult<Vec<u8>> {
        let response = self
            .authed(self.client.get(self.object_url(key)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::Missing(format!("object {key}")));
        }
        let bytes = response.error_for_status()?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.authed(
            self.client
                .delete(format!("{}/storage/v1/object/{BUCKET}", self.base_url)),
        )
        .json(&json!({ "prefixes": [key] }))
        .send()
        .await?
        .error_for_status()?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/public/{BUCKET}/{key}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_follow_the_hosted_layout() {
        let store = HostedStore::new("https://project.example.co", "key");
        assert_eq!(store.table_url("links"), "https://project.example.co/rest/v1/links");
        assert_eq!(
            store.object_url("abc123_a.png"),
            "https://project.example.co/storage/v1/object/content/abc123_a.png"
        );
    }

    #[test]
    fn test_key_round_trips_through_public_url() {
        let store = HostedStore::new("https://project.example.co", "key");
        let url = store.public_url("abc123_report.pdf");
        assert_eq!(
            url,
            "https://project.example.co/storage/v1/object/public/content/abc123_report.pdf"
        );
        assert_eq!(store.key_from_url(&url).as_deref(), Some("abc123_report.pdf"));
    }

    #[test]
    fn test_eq_filter_syntax() {
        assert_eq!(eq("id", 7), ("id", "eq.7".to_string()));
    }
}
