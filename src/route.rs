//! Route definitions
//!
//! Every route runs behind [`session_middleware`], so handlers can take the
//! current [`Viewer`](crate::middleware::Viewer) as an extension.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::handler::{account, content, folder};
use crate::middleware::session_middleware;
use crate::state::AppState;
use crate::upload::MAX_UPLOAD_BYTES;

/// Room for the multipart framing and text fields next to a maximum-size file
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Creates the application router
///
/// - `GET /` and `POST /shorten`: the shorten form
/// - `GET|POST /register`, `GET|POST /login`, `GET|POST /logout`
/// - `GET|POST /profile`: change own email or password
/// - `GET /dashboard`, `POST /add_folder`, `POST /delete_folder/{id}`,
///   `POST /delete_selected_folders`
/// - `POST /update_link/{short_code}`, `POST /delete_link/{short_code}`
/// - `GET /download/{short_code}`, `GET /content/{key}`
/// - `GET /{short_code}`: view content
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(content::index))
        .route("/shorten", post(content::shorten))
        .route("/register", get(account::register_form).post(account::register))
        .route("/login", get(account::login_form).post(account::login))
        .route("/logout", get(account::logout).post(account::logout))
        .route("/profile", get(account::profile_form).post(account::update_profile))
        .route("/dashboard", get(folder::dashboard))
        .route("/add_folder", post(folder::add_folder))
        .route("/delete_folder/{id}", post(folder::delete_folder))
        .route("/delete_selected_folders", post(folder::delete_selected_folders))
        .route("/update_link/{short_code}", post(folder::update_link))
        .route("/delete_link/{short_code}", post(folder::delete_link))
        .route("/download/{short_code}", get(content::download))
        .route("/content/{key}", get(content::serve_object))
        .route("/{short_code}", get(content::view))
        .layer(middleware::from_fn_with_state(state.clone(), session_middleware))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + FORM_OVERHEAD_BYTES))
        .with_state(state)
}
