//! Account handlers: register, login, logout and profile

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use chrono::Utc;
use tera::Context;

use crate::error::{AppError, StoreError};
use crate::handler::{login_required, redirect_success};
use crate::middleware::Viewer;
use crate::model::{Credentials, Flash, NewUser, ProfileForm, User};
use crate::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::render::page_context;
use crate::session;
use crate::state::AppState;

const EMAIL_TAKEN: &str = "Email is already registered!";
const BAD_CREDENTIALS: &str = "Invalid email or password!";

/// Which of the two credential forms is being shown
#[derive(Clone, Copy)]
enum AuthPage {
    Login,
    Register,
}

impl AuthPage {
    fn heading(self) -> &'static str {
        match self {
            AuthPage::Login => "Log in",
            AuthPage::Register => "Register",
        }
    }

    fn action(self) -> &'static str {
        match self {
            AuthPage::Login => "/login",
            AuthPage::Register => "/register",
        }
    }
}

fn auth_context(page: AuthPage, viewer: &Viewer, flash: &Flash, email: &str) -> Context {
    let mut context = page_context(viewer.user.as_ref(), flash);
    context.insert("heading", page.heading());
    context.insert("action", page.action());
    context.insert("email", email);
    context
}

fn auth_error(
    state: &AppState,
    viewer: &Viewer,
    page: AuthPage,
    status: StatusCode,
    email: &str,
    message: &str,
) -> Result<Response, AppError> {
    let flash = Flash {
        error: Some(message.to_string()),
        success: None,
    };
    let context = auth_context(page, viewer, &flash, email);
    state.pages.render_status(status, "auth.html", &context)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Minimal shape check: one `@` with text on both sides
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && !domain.is_empty() && !domain.contains('@') && email.len() <= 254 =>
        {
            Ok(())
        }
        _ => Err("Please enter a valid email address!"),
    }
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!("Password must be at least {MIN_PASSWORD_LEN} characters!"));
    }
    Ok(())
}

/// Issues a session and redirects to the dashboard with the cookie set
async fn sign_in(state: &AppState, viewer: &Viewer, user: &User) -> Result<Response, AppError> {
    let session = session::issue(state.store.as_ref(), user.id).await?;
    let cookie = session::session_cookie(&session.id, viewer.secure);
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/dashboard")).into_response())
}

/// `GET /register`
pub async fn register_form(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(flash): Query<Flash>,
) -> Result<Response, AppError> {
    let context = auth_context(AuthPage::Register, &viewer, &flash, "");
    Ok(state.pages.render("auth.html", &context)?.into_response())
}

/// `POST /register`
pub async fn register(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Form(form): Form<Credentials>,
) -> Result<Response, AppError> {
    let page = AuthPage::Register;
    let email = normalize_email(&form.email);

    if let Err(message) = validate_email(&email) {
        return auth_error(&state, &viewer, page, StatusCode::BAD_REQUEST, &email, message);
    }
    if let Err(message) = validate_password(&form.password) {
        return auth_error(&state, &viewer, page, StatusCode::BAD_REQUEST, &email, &message);
    }
    if state.store.user_by_email(&email).await?.is_some() {
        return auth_error(&state, &viewer, page, StatusCode::CONFLICT, &email, EMAIL_TAKEN);
    }

    let new_user = NewUser {
        email: email.clone(),
        password_hash: hash_password(&form.password)?,
        created_at: Utc::now(),
    };
    let user = match state.store.create_user(new_user).await {
        Ok(user) => user,
        Err(StoreError::Conflict(_)) => {
            return auth_error(&state, &viewer, page, StatusCode::CONFLICT, &email, EMAIL_TAKEN)
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = user.id, "user registered");
    sign_in(&state, &viewer, &user).await
}

/// `GET /login`
pub async fn login_form(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(flash): Query<Flash>,
) -> Result<Response, AppError> {
    if viewer.user.is_some() {
        return Ok(Redirect::to("/dashboard").into_response());
    }
    let context = auth_context(AuthPage::Login, &viewer, &flash, "");
    Ok(state.pages.render("auth.html", &context)?.into_response())
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Form(form): Form<Credentials>,
) -> Result<Response, AppError> {
    let page = AuthPage::Login;
    let email = normalize_email(&form.email);

    let user = match state.store.user_by_email(&email).await? {
        Some(user) if verify_password(&form.password, &user.password_hash)? => user,
        _ => {
            tracing::warn!("failed login attempt");
            return auth_error(&state, &viewer, page, StatusCode::UNAUTHORIZED, &email, BAD_CREDENTIALS);
        }
    };

    tracing::info!(user_id = user.id, "user logged in");
    sign_in(&state, &viewer, &user).await
}

/// `GET /logout`
///
/// Revoking is idempotent, and the cookie is cleared even when the store
/// cannot be reached.
pub async fn logout(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    headers: HeaderMap,
) -> Response {
    if let Some(token) = session::token_from_headers(&headers) {
        match session::revoke(state.store.as_ref(), &token).await {
            Ok(()) => tracing::info!("session revoked"),
            Err(e) => tracing::error!(error = %e, "failed to revoke session"),
        }
    }

    let cookie = session::clear_cookie(viewer.secure);
    ([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response()
}

/// `GET /profile`
pub async fn profile_form(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(flash): Query<Flash>,
) -> Result<Response, AppError> {
    if viewer.user.is_none() {
        return Ok(login_required());
    }
    let context = page_context(viewer.user.as_ref(), &flash);
    Ok(state.pages.render("profile.html", &context)?.into_response())
}

/// `POST /profile`
///
/// Changes the signed-in user's own email and/or password. The current
/// password is required for either change.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let Some(current) = viewer.user.as_ref() else {
        return Ok(login_required());
    };

    let profile_error = |status: StatusCode, message: &str| {
        let flash = Flash {
            error: Some(message.to_string()),
            success: None,
        };
        state
            .pages
            .render_status(status, "profile.html", &page_context(Some(current), &flash))
    };

    if !verify_password(&form.current_password, &current.password_hash)? {
        return profile_error(StatusCode::UNAUTHORIZED, "Current password is incorrect!");
    }

    let mut updated = current.clone();
    updated.email = normalize_email(&form.email);
    if let Err(message) = validate_email(&updated.email) {
        return profile_error(StatusCode::BAD_REQUEST, message);
    }
    if !form.new_password.is_empty() {
        if let Err(message) = validate_password(&form.new_password) {
            return profile_error(StatusCode::BAD_REQUEST, &message);
        }
        updated.password_hash = hash_password(&form.new_password)?;
    }

    if updated.email != current.email && state.store.user_by_email(&updated.email).await?.is_some() {
        return profile_error(StatusCode::CONFLICT, EMAIL_TAKEN);
    }

    match state.store.update_user(&updated).await {
        Ok(()) => {}
        Err(StoreError::Conflict(_)) => return profile_error(StatusCode::CONFLICT, EMAIL_TAKEN),
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = updated.id, "profile updated");
    Ok(redirect_success("/profile", "Profile updated!"))
}
