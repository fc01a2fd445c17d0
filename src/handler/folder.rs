//! Dashboard, folder and link management
//!
//! Every mutation is scoped to the signed-in user: a folder or link owned by
//! someone else is reported as not found.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Form,
};
use serde::Serialize;

use crate::code::{self, CodeError};
use crate::error::{AppError, StoreError};
use crate::handler::{login_required, redirect_error, redirect_success};
use crate::middleware::Viewer;
use crate::model::{Flash, Folder, FolderForm, Link, NewFolder, RenameForm};
use crate::render::page_context;
use crate::state::AppState;
use crate::upload;

const FOLDER_NOT_FOUND: &str = "Folder not found!";
const LINK_NOT_FOUND: &str = "Link not found!";
pub const MAX_FOLDER_NAME: usize = 50;

#[derive(Serialize)]
struct FolderGroup {
    folder: Folder,
    links: Vec<Link>,
}

/// Splits links into per-folder groups plus the unfiled remainder
fn group_links(folders: Vec<Folder>, links: Vec<Link>) -> (Vec<FolderGroup>, Vec<Link>) {
    let mut groups: Vec<FolderGroup> = folders
        .into_iter()
        .map(|folder| FolderGroup {
            folder,
            links: Vec::new(),
        })
        .collect();
    let mut unfiled = Vec::new();

    for link in links {
        let group = link
            .folder_id
            .and_then(|id| groups.iter_mut().find(|group| group.folder.id == id));
        match group {
            Some(group) => group.links.push(link),
            None => unfiled.push(link),
        }
    }

    (groups, unfiled)
}

/// `GET /dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(flash): Query<Flash>,
) -> Result<Response, AppError> {
    let Some(user) = viewer.user.as_ref() else {
        return Ok(login_required());
    };

    let folders = state.store.folders_for_user(user.id).await?;
    let links = state.store.links_for_user(user.id).await?;
    let (groups, unfiled) = group_links(folders, links);

    let mut context = page_context(Some(user), &flash);
    context.insert("groups", &groups);
    context.insert("unfiled", &unfiled);
    context.insert("base_url", &viewer.base_url());
    Ok(state.pages.render("dashboard.html", &context)?.into_response())
}

/// `POST /add_folder`
pub async fn add_folder(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Form(form): Form<FolderForm>,
) -> Result<Response, AppError> {
    let Some(user) = viewer.user.as_ref() else {
        return Ok(login_required());
    };

    let name = form.name.trim();
    if name.is_empty() {
        return Ok(redirect_error("/dashboard", "Folder name cannot be empty!"));
    }
    if name.chars().count() > MAX_FOLDER_NAME {
        return Ok(redirect_error(
            "/dashboard",
            &format!("Folder name must be at most {MAX_FOLDER_NAME} characters!"),
        ));
    }

    let existing = state.store.folders_for_user(user.id).await?;
    if existing.iter().any(|folder| folder.name == name) {
        return Ok(redirect_error("/dashboard", "You already have a folder with that name!"));
    }

    let folder = state
        .store
        .create_folder(NewFolder {
            name: name.to_string(),
            user_id: user.id,
        })
        .await?;
    tracing::info!(folder_id = folder.id, user_id = user.id, "folder created");
    Ok(redirect_success("/dashboard", "Folder created!"))
}

/// Returns the folder only when `user_id` owns it
async fn owned_folder(
    state: &AppState,
    user_id: i64,
    folder_id: i64,
) -> Result<Option<Folder>, StoreError> {
    Ok(state
        .store
        .folder(folder_id)
        .await?
        .filter(|folder| folder.user_id == user_id))
}

/// `POST /delete_folder/{id}`
///
/// Links inside the folder are kept and become unfiled.
pub async fn delete_folder(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(folder_id): Path<i64>,
) -> Result<Response, AppError> {
    let Some(user) = viewer.user.as_ref() else {
        return Ok(login_required());
    };

    if owned_folder(&state, user.id, folder_id).await?.is_none() {
        return Ok(redirect_error("/dashboard", FOLDER_NOT_FOUND));
    }

    state.store.delete_folder(folder_id).await?;
    tracing::info!(folder_id, user_id = user.id, "folder deleted");
    Ok(redirect_success("/dashboard", "Folder deleted!"))
}

/// `POST /delete_selected_folders`
///
/// Takes repeated `folder_ids` fields. Ids the user does not own are skipped.
pub async fn delete_selected_folders(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let Some(user) = viewer.user.as_ref() else {
        return Ok(login_required());
    };

    let ids: Vec<i64> = fields
        .iter()
        .filter(|(name, _)| name == "folder_ids")
        .filter_map(|(_, value)| value.trim().parse().ok())
        .collect();
    if ids.is_empty() {
        return Ok(redirect_error("/dashboard", "No folders selected!"));
    }

    let mut deleted = 0;
    for id in ids {
        if owned_folder(&state, user.id, id).await?.is_some() {
            state.store.delete_folder(id).await?;
            deleted += 1;
        }
    }

    if deleted == 0 {
        return Ok(redirect_error("/dashboard", FOLDER_NOT_FOUND));
    }
    tracing::info!(deleted, user_id = user.id, "folders deleted");
    Ok(redirect_success("/dashboard", &format!("Deleted {deleted} folder(s).")))
}

/// Returns the link only when `user_id` owns it
async fn owned_link(
    state: &AppState,
    user_id: i64,
    short_code: &str,
) -> Result<Option<Link>, StoreError> {
    Ok(state
        .store
        .link(short_code)
        .await?
        .filter(|link| link.user_id == Some(user_id)))
}

/// A file copied to the key of a link's new short code
struct MovedObject {
    old_key: String,
    new_key: String,
    url: String,
}

/// Copies a file link's object to `{new_code}_{filename}`
///
/// The old object is left in place until the link row points at the copy.
/// Returns `None` when the link has no object to move.
async fn move_object(
    state: &AppState,
    link: &Link,
    new_code: &str,
) -> Result<Option<MovedObject>, StoreError> {
    let Some(old_key) = state.objects.key_from_url(&link.content) else {
        return Ok(None);
    };

    let bytes = match state.objects.download(&old_key).await {
        Ok(bytes) => bytes,
        Err(StoreError::Missing(_)) => {
            tracing::warn!(key = %old_key, "renamed link has no stored file");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let filename = upload::original_filename(&old_key, &link.short_code);
    let new_key = upload::object_key(new_code, &filename);
    state
        .objects
        .upload(&new_key, bytes, upload::mime_for(&filename))
        .await?;

    Ok(Some(MovedObject {
        url: state.objects.public_url(&new_key),
        old_key,
        new_key,
    }))
}

async fn discard_object(state: &AppState, key: &str) {
    if let Err(e) = state.objects.remove(key).await {
        tracing::warn!(error = %e, %key, "failed to remove stored file");
    }
}

/// `POST /update_link/{short_code}`
///
/// Image and document links take their stored file along, so the object key
/// always starts with the current short code.
pub async fn update_link(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(short_code): Path<String>,
    Form(form): Form<RenameForm>,
) -> Result<Response, AppError> {
    let Some(user) = viewer.user.as_ref() else {
        return Ok(login_required());
    };

    let Some(link) = owned_link(&state, user.id, &short_code).await? else {
        return Ok(redirect_error("/dashboard", LINK_NOT_FOUND));
    };

    let new_code = match code::claim_custom(state.store.as_ref(), form.new_code.trim()).await {
        Ok(new_code) => new_code,
        Err(CodeError::Store(e)) => return Err(e.into()),
        Err(e) => return Ok(redirect_error("/dashboard", &e.to_string())),
    };

    let moved = if link.content_type.is_file() {
        match move_object(&state, &link, &new_code).await {
            Ok(moved) => moved,
            Err(StoreError::Conflict(_)) => {
                return Ok(redirect_error("/dashboard", &CodeError::Taken.to_string()))
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        None
    };

    let new_content = moved.as_ref().map(|moved| moved.url.as_str());
    if let Err(e) = state.store.rename_link(&short_code, &new_code, new_content).await {
        if let Some(moved) = &moved {
            discard_object(&state, &moved.new_key).await;
        }
        return match e {
            StoreError::Conflict(_) => Ok(redirect_error("/dashboard", &CodeError::Taken.to_string())),
            e => Err(e.into()),
        };
    }

    if let Some(moved) = &moved {
        discard_object(&state, &moved.old_key).await;
    }

    tracing::info!(from = %short_code, to = %new_code, "short code changed");
    Ok(redirect_success("/dashboard", "Short code updated!"))
}

/// `POST /delete_link/{short_code}`
///
/// Image and document links also lose their stored file.
pub async fn delete_link(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Path(short_code): Path<String>,
) -> Result<Response, AppError> {
    let Some(user) = viewer.user.as_ref() else {
        return Ok(login_required());
    };

    let Some(link) = owned_link(&state, user.id, &short_code).await? else {
        return Ok(redirect_error("/dashboard", LINK_NOT_FOUND));
    };

    state.store.delete_link(&short_code).await?;

    if link.content_type.is_file() {
        if let Some(key) = state.objects.key_from_url(&link.content) {
            discard_object(&state, &key).await;
        }
    }

    tracing::info!(%short_code, user_id = user.id, "link deleted");
    Ok(redirect_success("/dashboard", "Link deleted!"))
}
