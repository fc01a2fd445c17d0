//! Data models for the content shortener
//!
//! Records mirror the four store tables (users, sessions, folders, links).
//! Form payloads are deserialized straight from urlencoded bodies.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,

    /// Unique across all users
    pub email: String,

    /// Argon2id PHC string, never the plaintext password
    pub password_hash: String,

    pub created_at: DateTime<Utc>,
}

/// Insert payload for a user; the store assigns the id
#[derive(Serialize, Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A login session backed by the sessions table
///
/// The id doubles as the opaque token stored in the `session_id` cookie.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked: bool,
}

impl Session {
    /// A session is valid iff it is not revoked and not yet expired
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Folder {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
}

#[derive(Serialize, Debug, Clone)]
pub struct NewFolder {
    pub name: String,
    pub user_id: i64,
}

/// What a short code points at
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Url,
    Text,
    Image,
    Document,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Url => "url",
            ContentKind::Text => "text",
            ContentKind::Image => "image",
            ContentKind::Document => "document",
        }
    }

    /// Image and document content lives in the object store
    pub fn is_file(&self) -> bool {
        matches!(self, ContentKind::Image | ContentKind::Document)
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(ContentKind::Url),
            "text" => Ok(ContentKind::Text),
            "image" => Ok(ContentKind::Image),
            "document" => Ok(ContentKind::Document),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}

/// A shortened piece of content
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Link {
    /// Unique key used in the short URL path
    pub short_code: String,

    pub content_type: ContentKind,

    /// Target URL, raw text, or the object-store public URL
    pub content: String,

    /// `None` for anonymous submissions
    pub user_id: Option<i64>,

    /// `None` when the link is unfiled
    pub folder_id: Option<i64>,

    pub created_at: DateTime<Utc>,
}

/// Register and login form
#[derive(Deserialize, Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct ProfileForm {
    pub email: String,
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Deserialize, Debug)]
pub struct FolderForm {
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct RenameForm {
    pub new_code: String,
}

/// Flash messages carried on redirects
#[derive(Deserialize, Debug, Default)]
pub struct Flash {
    pub error: Option<String>,
    pub success: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(expires_in: Duration, revoked: bool) -> Session {
        Session {
            id: "token".to_string(),
            user_id: 1,
            expires_at: Utc::now() + expires_in,
            revoked,
        }
    }

    #[test]
    fn session_validity_requires_unrevoked_and_unexpired() {
        let now = Utc::now();
        assert!(session(Duration::hours(1), false).is_active(now));
        assert!(!session(Duration::hours(1), true).is_active(now));
        assert!(!session(Duration::hours(-1), false).is_active(now));
    }

    #[test]
    fn content_kind_parses_form_values() {
        assert_eq!("image".parse::<ContentKind>(), Ok(ContentKind::Image));
        assert!("video".parse::<ContentKind>().is_err());
        assert!(ContentKind::Document.is_file());
        assert!(!ContentKind::Url.is_file());
    }

    #[test]
    fn link_serializes_kind_in_lowercase() {
        let link = Link {
            short_code: "abc123".to_string(),
            content_type: ContentKind::Text,
            content: "hello".to_string(),
            user_id: None,
            folder_id: None,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&link).unwrap();
        assert_eq!(value["content_type"], "text");
        assert!(value["user_id"].is_null());
    }
}
