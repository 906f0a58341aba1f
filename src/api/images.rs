//! Image upload and gallery endpoints.
//!
//! Single-image operations are ownership-scoped: an image that belongs to
//! another user yields the same 404 as one that does not exist.

use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    http::StatusCode,
    Extension, Json,
};
use bytes::BytesMut;
use serde_json::Value;
use std::sync::Arc;

use crate::db::{
    normalize_tags, parse_tag_list, DeleteImageResponse, Image, ImageChanges, ImageOwner,
    ImageResponse, NewImage, User,
};
use crate::storage::{ImageStorage, StorageError};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    check_update_fields, optional_text, parse_bool_flag, validate_description, validate_title,
    DEFAULT_TITLE, IMAGE_UPDATE_FIELDS,
};

/// Multipart field carrying the file
const FILE_FIELD: &str = "image";

const IMAGE_NOT_FOUND: &str = "Image not found";

/// A validated file part held in memory
#[derive(Debug)]
struct UploadedFile {
    extension: String,
    data: BytesMut,
}

/// All parts of an upload form
#[derive(Debug, Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    title: Option<String>,
    description: Option<String>,
    is_public: Option<String>,
    tags: Option<String>,
}

/// Read the upload form, validating the file part as it streams in
async fn read_upload_form(
    multipart: &mut Multipart,
    storage: &ImageStorage,
) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            FILE_FIELD => {
                if form.file.is_some() {
                    return Err(ApiError::validation_field(
                        FILE_FIELD,
                        "Only one image can be uploaded at a time",
                    ));
                }
                form.file = Some(read_file_field(field, storage).await?);
            }
            "title" => form.title = Some(field.text().await?),
            "description" => form.description = Some(field.text().await?),
            "isPublic" => form.is_public = Some(field.text().await?),
            "tags" => form.tags = Some(field.text().await?),
            other => {
                tracing::debug!(field = %other, "Ignoring unknown upload form field");
            }
        }
    }

    Ok(form)
}

/// Check type and extension up front, then read the body chunk by chunk,
/// stopping as soon as the size ceiling is exceeded
async fn read_file_field(
    mut field: Field<'_>,
    storage: &ImageStorage,
) -> Result<UploadedFile, ApiError> {
    let original_name = field.file_name().unwrap_or_default().to_string();
    let extension = storage.validate_type(&original_name, field.content_type())?;

    let mut data = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        storage.check_size(data.len() + chunk.len())?;
        data.extend_from_slice(&chunk);
    }

    Ok(UploadedFile { extension, data })
}

/// Upload an image with its metadata
///
/// POST /api/images/upload
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ImageResponse>), ApiError> {
    let mut multipart = multipart?;
    let form = read_upload_form(&mut multipart, &state.storage).await?;

    let file = form
        .file
        .ok_or_else(|| ApiError::validation_field(FILE_FIELD, "Please upload an image"))?;

    let title = form
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_string();
    let description = form
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_title(&title) {
        errors.add("title", e);
    }
    if let Some(Err(e)) = description.as_deref().map(validate_description) {
        errors.add("description", e);
    }
    errors.finish()?;

    let stored = state.storage.save(&file.extension, &file.data).await?;

    let new_image = NewImage {
        user_id: user.id.clone(),
        title,
        description,
        filename: stored.filename.clone(),
        path: stored.path.clone(),
        is_public: form.is_public.as_deref().is_some_and(parse_bool_flag),
        tags: form.tags.as_deref().map(parse_tag_list).unwrap_or_default(),
    };

    // The file is already on disk; a failed insert leaves it orphaned
    let image = Image::create(&state.db, &new_image).await.map_err(|e| {
        tracing::warn!(filename = %stored.filename, "Image record insert failed after file write");
        ApiError::from(e)
    })?;

    tracing::info!(
        image_id = %image.id,
        user_id = %user.id,
        size = stored.size,
        "Uploaded image"
    );

    Ok((StatusCode::CREATED, Json(ImageResponse::from(image))))
}

/// List the caller's images, newest first, regardless of visibility
///
/// GET /api/images/my-images
pub async fn my_images(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<ImageResponse>>, ApiError> {
    let images = Image::list_for_user(&state.db, &user.id).await?;
    Ok(Json(images.into_iter().map(ImageResponse::from).collect()))
}

/// List public images of all users, newest first
///
/// GET /api/images/public
pub async fn public_images(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ImageResponse<ImageOwner>>>, ApiError> {
    let rows = Image::list_public(&state.db).await?;
    Ok(Json(rows.into_iter().map(ImageResponse::from).collect()))
}

/// Get one of the caller's images
///
/// GET /api/images/:id
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<ImageResponse>, ApiError> {
    let image = Image::get_owned(&state.db, &id, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found(IMAGE_NOT_FOUND))?;

    Ok(Json(ImageResponse::from(image)))
}

/// Parse an image update body into validated changes
fn parse_image_changes(body: &Value) -> Result<ImageChanges, ApiError> {
    let fields = check_update_fields(body, IMAGE_UPDATE_FIELDS)?;

    let mut changes = ImageChanges::default();
    let mut errors = ValidationErrorBuilder::new();

    for (key, value) in fields {
        match key.as_str() {
            "title" => match value.as_str().map(str::trim) {
                Some(title) => match validate_title(title) {
                    Ok(()) => changes.title = Some(title.to_string()),
                    Err(e) => {
                        errors.add("title", e);
                    }
                },
                None => {
                    errors.add("title", "Title must be a string");
                }
            },
            "description" => match optional_text(value) {
                Ok(description) => {
                    if let Some(Err(e)) = description.as_deref().map(validate_description) {
                        errors.add("description", e);
                    }
                    changes.description = Some(description);
                }
                Err(()) => {
                    errors.add("description", "Description must be a string or null");
                }
            },
            "isPublic" => match value {
                Value::Bool(b) => changes.is_public = Some(*b),
                Value::String(s) => changes.is_public = Some(parse_bool_flag(s)),
                _ => {
                    errors.add("isPublic", "isPublic must be a boolean");
                }
            },
            "tags" => match value {
                Value::Array(items) => {
                    let tags: Option<Vec<String>> = items
                        .iter()
                        .map(|item| item.as_str().map(str::to_string))
                        .collect();
                    match tags {
                        Some(tags) => changes.tags = Some(normalize_tags(tags)),
                        None => {
                            errors.add("tags", "Tags must be strings");
                        }
                    }
                }
                Value::String(s) => changes.tags = Some(parse_tag_list(s)),
                _ => {
                    errors.add("tags", "Tags must be an array of strings");
                }
            },
            _ => return Err(ApiError::invalid("Invalid updates")),
        }
    }
    errors.finish()?;

    Ok(changes)
}

/// Update metadata of one of the caller's images
///
/// PATCH /api/images/:id
pub async fn update_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ImageResponse>, ApiError> {
    let Json(body) = payload?;
    let changes = parse_image_changes(&body)?;

    let image = Image::update_owned(&state.db, &id, &user.id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found(IMAGE_NOT_FOUND))?;

    tracing::info!(image_id = %image.id, "Updated image metadata");

    Ok(Json(ImageResponse::from(image)))
}

/// Delete one of the caller's images and its stored file
///
/// DELETE /api/images/:id
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> Result<Json<DeleteImageResponse>, ApiError> {
    let mut tx = state.db.begin().await?;

    let filename = Image::delete_owned(&mut tx, &id, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found(IMAGE_NOT_FOUND))?;

    // The file goes first; the record is only committed away once it is gone
    if let Err(e) = state.storage.remove(&filename).await {
        if let StorageError::Io(ref io) = e {
            tracing::error!(image_id = %id, filename = %filename, "Failed to remove image file: {}", io);
        }
        if let Err(rollback) = tx.rollback().await {
            tracing::error!(image_id = %id, "Failed to roll back image delete: {}", rollback);
        }
        return Err(ApiError::from(e));
    }

    tx.commit().await?;

    tracing::info!(image_id = %id, user_id = %user.id, "Deleted image");

    Ok(Json(DeleteImageResponse {
        message: "Image deleted successfully".to_string(),
    }))
}
