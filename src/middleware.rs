//! Per-request session resolution
//!
//! Reads the `session_id` cookie, resolves it through the Content Store and
//! stores the outcome as a [`Viewer`] request extension. Lookup failures leave
//! the request anonymous; they never reject it.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::model::User;
use crate::session;
use crate::state::AppState;

/// The user behind the current request, if any
#[derive(Clone, Debug, Default)]
pub struct Viewer {
    pub user: Option<User>,

    /// Whether cookies set for this request should carry `Secure`
    pub secure: bool,

    /// Host the request was addressed to, used to build short URLs
    pub host: String,
}

impl Viewer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.host)
    }
}

pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost")
        .to_string();

    let user = match session::token_from_headers(request.headers()) {
        Some(token) => session::current_user(state.store.as_ref(), &token).await,
        None => None,
    };

    request.extensions_mut().insert(Viewer {
        user,
        secure: session::is_secure_host(&host),
        host,
    });
    next.run(request).await
}
