//! Short code generation
//!
//! Random codes are drawn uniformly from ASCII letters and digits. Uniqueness
//! is checked against the Content Store, so a code is only as unique as the
//! store's answer at the time of the check.

use once_cell::sync::Lazy;
use rand::{distr::Alphanumeric, Rng};
use regex::Regex;
use thiserror::Error;

use crate::error::StoreError;
use crate::store::ContentStore;

/// Length of generated codes
pub const CODE_LENGTH: usize = 6;

static CUSTOM_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,10}$").expect("valid custom code pattern"));

/// First path segments owned by fixed routes
///
/// A link stored under one of these could never be opened, so they are
/// treated as already taken.
pub const RESERVED_CODES: &[&str] = &[
    "add_folder",
    "content",
    "dashboard",
    "delete_folder",
    "delete_link",
    "delete_selected_folders",
    "download",
    "login",
    "logout",
    "profile",
    "register",
    "shorten",
    "update_link",
];

#[derive(Debug, Error)]
pub enum CodeError {
    #[error("Invalid custom code! Use 3-10 characters (letters, digits, _ or -).")]
    InvalidFormat,

    #[error("Custom code is already taken! Try another one.")]
    Taken,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Random letters and digits; not unique by itself
pub fn generate(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn is_valid_custom(code: &str) -> bool {
    CUSTOM_CODE.is_match(code)
}

pub fn is_reserved(code: &str) -> bool {
    RESERVED_CODES.contains(&code)
}

/// Generates candidates until one is unused in the store
///
/// There is no retry ceiling; the loop only ends early on a store error.
pub async fn allocate_unique(store: &dyn ContentStore) -> Result<String, StoreError> {
    loop {
        let candidate = generate(CODE_LENGTH);
        if !is_reserved(&candidate) && !store.link_exists(&candidate).await? {
            return Ok(candidate);
        }
        tracing::debug!(code = %candidate, "generated code collided, retrying");
    }
}

/// Validates a user-chosen code and confirms it is still free
///
/// Route names such as `login` count as taken.
pub async fn claim_custom(store: &dyn ContentStore, code: &str) -> Result<String, CodeError> {
    if !is_valid_custom(code) {
        return Err(CodeError::InvalidFormat);
    }
    if is_reserved(code) || store.link_exists(code).await? {
        return Err(CodeError::Taken);
    }
    Ok(code.to_string())
}

/// Uses the custom code when one was given, otherwise allocates a random one
pub async fn resolve(store: &dyn ContentStore, custom: Option<&str>) -> Result<String, CodeError> {
    match custom.map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => claim_custom(store, code).await,
        None => Ok(allocate_unique(store).await?),
    }
}
