//! Server-rendered pages
//!
//! Templates are compiled into the binary and parsed once at startup.
//! Tera autoescapes `.html` templates, so stored text is rendered safely.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tera::{Context, Tera};

use crate::error::AppError;
use crate::model::{Flash, User};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("auth.html", include_str!("../templates/auth.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    ("profile.html", include_str!("../templates/profile.html")),
    ("content.html", include_str!("../templates/content.html")),
    ("404.html", include_str!("../templates/404.html")),
];

pub struct Pages {
    tera: Tera,
}

impl Pages {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.to_vec())?;
        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, context: &Context) -> Result<Html<String>, AppError> {
        Ok(Html(self.tera.render(template, context)?))
    }

    /// Renders with a non-200 status, used for inline form errors
    pub fn render_status(
        &self,
        status: StatusCode,
        template: &str,
        context: &Context,
    ) -> Result<Response, AppError> {
        Ok((status, self.render(template, context)?).into_response())
    }
}

/// Base context shared by every page: the signed-in user and flash messages
pub fn page_context(user: Option<&User>, flash: &Flash) -> Context {
    let mut context = Context::new();
    if let Some(user) = user {
        context.insert("user", user);
    }
    if let Some(error) = &flash.error {
        context.insert("error", error);
    }
    if let Some(success) = &flash.success {
        context.insert("success", success);
    }
    context
}
