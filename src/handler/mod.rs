//! HTTP request handlers
//!
//! - [`content`]: shortening, viewing and downloading content
//! - [`account`]: register, login, logout and profile
//! - [`folder`]: dashboard, folders and link management for signed-in users
//!
//! Validation problems are rendered inline on the originating form or carried
//! back as `?error=` flash parameters on a redirect.

use axum::response::{IntoResponse, Redirect, Response};

pub mod account;
pub mod content;
pub mod folder;

/// Generic message for store and backend failures
pub const BACKEND_FAILURE: &str = "Something went wrong. Please try again.";

pub(crate) fn redirect_error(path: &str, message: &str) -> Response {
    Redirect::to(&format!("{path}?error={}", urlencoding::encode(message))).into_response()
}

pub(crate) fn redirect_success(path: &str, message: &str) -> Response {
    Redirect::to(&format!("{path}?success={}", urlencoding::encode(message))).into_response()
}

pub(crate) fn login_required() -> Response {
    redirect_error("/login", "Please log in first!")
}
