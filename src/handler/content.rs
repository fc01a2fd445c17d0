//! Content and retrieval handlers
//!
//! `POST /shorten` accepts a multipart form with `content_type`, optional
//! `custom_code` and `folder_id`, and one of `url`, `text` or `file`.
//! Everything that can be checked locally is checked before the first store
//! call.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Extension,
};
use chrono::Utc;
use tera::Context;

use crate::code::{self, CodeError};
use crate::error::{AppError, StoreError};
use crate::handler::{redirect_error, BACKEND_FAILURE};
use crate::middleware::Viewer;
use crate::model::{ContentKind, Flash, Link};
use crate::render::page_context;
use crate::state::AppState;
use crate::upload::{self, UploadError};

const EMPTY_CONTENT: &str = "Invalid content! Make sure the URL, text, or file is filled in.";

/// Raw fields of a shorten form
#[derive(Debug, Default)]
struct Submission {
    content_type: String,
    custom_code: String,
    folder_id: String,
    url: String,
    text: String,
    file: Option<UploadedFile>,
}

#[derive(Debug)]
struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

/// Validated content waiting for a short code
enum Pending {
    Inline(String),
    File(UploadedFile),
}

async fn read_submission(mut multipart: Multipart) -> Result<Submission, String> {
    let mut submission = Submission::default();

    let unreadable = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            UploadError::TooLarge.to_string()
        } else {
            tracing::debug!(error = %e, "unreadable shorten form");
            "Invalid form submission!".to_string()
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(unreadable)? {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("").to_string();
            let bytes = field.bytes().await.map_err(unreadable)?;
            if !filename.is_empty() {
                submission.file = Some(UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field.text().await.map_err(unreadable)?;
        match name.as_str() {
            "content_type" => submission.content_type = value,
            "custom_code" => submission.custom_code = value,
            "folder_id" => submission.folder_id = value,
            "url" => submission.url = value,
            "text" => submission.text = value,
            _ => {}
        }
    }

    Ok(submission)
}

/// Prefixes `http://` when no scheme is present
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

/// Accepts only positive integers; anything else leaves the content unfiled
pub fn parse_folder_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

fn validate(kind: ContentKind, submission: Submission) -> Result<Pending, String> {
    match kind {
        ContentKind::Url => {
            if submission.url.trim().is_empty() {
                return Err(EMPTY_CONTENT.to_string());
            }
            Ok(Pending::Inline(normalize_url(&submission.url)))
        }
        ContentKind::Text => {
            if submission.text.is_empty() {
                return Err(EMPTY_CONTENT.to_string());
            }
            Ok(Pending::Inline(submission.text))
        }
        ContentKind::Image | ContentKind::Document => {
            let file = submission.file.ok_or_else(|| UploadError::Missing.to_string())?;
            upload::validate(kind, &file.filename, file.bytes.len()).map_err(|e| e.to_string())?;
            Ok(Pending::File(file))
        }
    }
}

async fn index_context(
    state: &AppState,
    viewer: &Viewer,
    flash: &Flash,
) -> Result<Context, AppError> {
    let mut context = page_context(viewer.user.as_ref(), flash);
    if let Some(user) = &viewer.user {
        let folders = state.store.folders_for_user(user.id).await?;
        context.insert("folders", &folders);
    }
    Ok(context)
}

async fn form_error(
    state: &AppState,
    viewer: &Viewer,
    status: StatusCode,
    message: &str,
) -> Result<Response, AppError> {
    let flash = Flash {
        error: Some(message.to_string()),
        success: None,
    };
    let context = index_context(state, viewer, &flash).await?;
    state.pages.render_status(status, "index.html", &context)
}

async fn code_taken(state: &AppState, viewer: &Viewer) -> Result<Response, AppError> {
    let message = CodeError::Taken.to_string();
    form_error(state, viewer, StatusCode::CONFLICT, &message).await
}

/// `GET /`
pub async fn index(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(flash): Query<Flash>,
) -> Result<Html<String>, AppError> {
    let context = index_context(&state, &viewer, &flash).await?;
    state.pages.render("index.html", &context)
}

/// `POST /shorten`
pub async fn shorten(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let submission = match read_submission(multipart).await {
        Ok(submission) => submission,
        Err(message) => return form_error(&state, &viewer, StatusCode::BAD_REQUEST, &message).await,
    };

    let kind = match submission.content_type.parse::<ContentKind>() {
        Ok(kind) => kind,
        Err(_) => {
            return form_error(&state, &viewer, StatusCode::BAD_REQUEST, "Invalid content type!").await
        }
    };
    let custom_code = submission.custom_code.clone();
    let requested_folder = parse_folder_id(&submission.folder_id);

    let pending = match validate(kind, submission) {
        Ok(pending) => pending,
        Err(message) => {
            tracing::debug!(%kind, %message, "rejected submission");
            return form_error(&state, &viewer, StatusCode::BAD_REQUEST, &message).await;
        }
    };

    let short_code = match code::resolve(state.store.as_ref(), Some(custom_code.as_str())).await {
        Ok(short_code) => short_code,
        Err(CodeError::InvalidFormat) => {
            let message = CodeError::InvalidFormat.to_string();
            return form_error(&state, &viewer, StatusCode::BAD_REQUEST, &message).await;
        }
        Err(CodeError::Taken) => return code_taken(&state, &viewer).await,
        Err(CodeError::Store(e)) => {
            tracing::error!(error = %e, "short code allocation failed");
            return form_error(&state, &viewer, StatusCode::INTERNAL_SERVER_ERROR, BACKEND_FAILURE)
                .await;
        }
    };

    let (user_id, folder_id) = match &viewer.user {
        Some(user) => {
            let folder_id = match requested_folder {
                Some(id) => state
                    .store
                    .folder(id)
                    .await?
                    .filter(|folder| folder.user_id == user.id)
                    .map(|folder| folder.id),
                None => None,
            };
            (Some(user.id), folder_id)
        }
        None => (None, None),
    };

    let mut uploaded_key = None;
    let content = match pending {
        Pending::Inline(content) => content,
        Pending::File(file) => {
            let key = upload::object_key(&short_code, &file.filename);
            let mime = upload::mime_for(&file.filename);
            if let Err(e) = state.objects.upload(&key, file.bytes, mime).await {
                if let StoreError::Conflict(_) = e {
                    tracing::warn!(%key, "stored file already exists for code");
                    return code_taken(&state, &viewer).await;
                }
                tracing::error!(error = %e, %key, "file upload failed");
                return form_error(
                    &state,
                    &viewer,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to upload file. Please try again.",
                )
                .await;
            }
            let url = state.objects.public_url(&key);
            uploaded_key = Some(key);
            url
        }
    };

    let link = Link {
        short_code: short_code.clone(),
        content_type: kind,
        content,
        user_id,
        folder_id,
        created_at: Utc::now(),
    };

    if let Err(e) = state.store.insert_link(&link).await {
        if let Some(key) = uploaded_key {
            if let Err(e) = state.objects.remove(&key).await {
                tracing::warn!(error = %e, %key, "failed to remove orphaned upload");
            }
        }
        // Another request claimed the code after the availability check
        if let StoreError::Conflict(_) = e {
            tracing::warn!(%short_code, "short code claimed concurrently");
            return code_taken(&state, &viewer).await;
        }
        tracing::error!(error = %e, %short_code, "failed to store link");
        return form_error(
            &state,
            &viewer,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save link. Please try again.",
        )
        .await;
    }

    tracing::info!(%short_code, %kind, user_id = ?user_id, "link created");

    let short_url = format!("{}/{}", viewer.base_url(), short_code);
    let flash = Flash {
        error: None,
        success: Some(format!("Shortened! Your link: {short_url}")),
    };
    let mut context = index_context(&state, &viewer, &flash).await?;
    context.insert("short_url", &short_url);
    Ok(state.pages.render("index.html", &context)?.into_response())
}

/// `GET /{short_code}`
pub async fn view(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(short_code): Path<String>,
) -> Result<Html<String>, AppError> {
    let link = state
        .store
        .link(&short_code)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut context = page_context(viewer.user.as_ref(), &Flash::default());
    context.insert("short_code", &link.short_code);
    context.insert("content_type", link.content_type.as_str());
    context.insert("content", &link.content);
    state.pages.render("content.html", &context)
}

fn attachment(bytes: Vec<u8>, mime: &str, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, mime.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// `GET /download/{short_code}`
pub async fn download(
    State(state): State<AppState>,
    Path(short_code): Path<String>,
) -> Result<Response, AppError> {
    let link = state
        .store
        .link(&short_code)
        .await?
        .ok_or(AppError::NotFound)?;

    match link.content_type {
        ContentKind::Url => Ok(redirect_error("/", "URL content cannot be downloaded!")),
        ContentKind::Text => {
            let filename = upload::sanitize_filename(&format!("{}.txt", link.short_code));
            Ok(attachment(
                link.content.into_bytes(),
                "text/plain; charset=utf-8",
                &filename,
            ))
        }
        ContentKind::Image | ContentKind::Document => {
            let Some(key) = state.objects.key_from_url(&link.content) else {
                tracing::warn!(%short_code, content = %link.content, "stored file url has no object key");
                return Ok(redirect_error("/", "Content cannot be downloaded!"));
            };

            match state.objects.download(&key).await {
                Ok(bytes) => {
                    let filename = upload::original_filename(&key, &link.short_code);
                    Ok(attachment(bytes, upload::mime_for(&filename), &filename))
                }
                Err(e) => {
                    tracing::error!(error = %e, %key, "file download failed");
                    Ok(redirect_error("/", "Failed to download file."))
                }
            }
        }
    }
}

/// `GET /content/{key}`: serves objects of the embedded object store
pub async fn serve_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    match state.objects.download(&key).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, upload::mime_for(&key))], bytes).into_response()),
        Err(StoreError::Missing(_)) => Err(AppError::NotFound),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_adds_missing_scheme() {
        assert_eq!(normalize_url("example.com"), "http://example.com");
        assert_eq!(normalize_url(" https://example.com/a "), "https://example.com/a");
        assert_eq!(normalize_url("http://x.io"), "http://x.io");
    }

    #[test]
    fn test_parse_folder_id() {
        assert_eq!(parse_folder_id("12"), Some(12));
        assert_eq!(parse_folder_id("0"), None);
        assert_eq!(parse_folder_id("-3"), None);
        assert_eq!(parse_folder_id("abc"), None);
        assert_eq!(parse_folder_id(""), None);
    }

    #[test]
    fn test_validate_rejects_empty_text_and_bad_extension() {
        let empty = Submission {
            content_type: "text".to_string(),
            ..Default::default()
        };
        assert_eq!(validate(ContentKind::Text, empty).err().as_deref(), Some(EMPTY_CONTENT));

        let wrong = Submission {
            file: Some(UploadedFile {
                filename: "notes.txt".to_string(),
                bytes: vec![1],
            }),
            ..Default::default()
        };
        assert!(validate(ContentKind::Image, wrong).is_err());
    }
}
