//! Error types shared by the store backends and the HTTP layer

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::password::PasswordError;

/// Failures reported by a Content Store or object store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed record: {0}")]
    Serde(#[from] serde_json::Error),

    /// A unique key (email, short code) is already present
    #[error("{0} already exists")]
    Conflict(String),

    #[error("{0} not found")]
    Missing(String),
}

// redb splits its errors per operation; funnel every kind through redb::Error.
macro_rules! redb_error_from {
    ($($kind:ty),* $(,)?) => {
        $(
            impl From<$kind> for StoreError {
                fn from(err: $kind) -> Self {
                    StoreError::Database(redb::Error::from(err))
                }
            }
        )*
    };
}

redb_error_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that end a request with an error page
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

const NOT_FOUND_PAGE: &str = include_str!("../templates/404.html");

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response(),
            other => {
                tracing::error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html("<h1>Something went wrong</h1><p>Please try again later.</p>"),
                )
                    .into_response()
            }
        }
    }
}
