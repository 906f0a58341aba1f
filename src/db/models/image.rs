//! Image metadata models and ownership-scoped queries.
//!
//! Every query that reads or mutates a single image filters on both the
//! image id and the owner id, so an image owned by someone else behaves
//! exactly like one that does not exist.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};

use super::common::{parse_tags, serialize_tags, timestamp_now};

#[derive(Debug, Clone, FromRow)]
pub struct Image {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub filename: String,
    /// Public URL path of the stored file, e.g. `/uploads/1700000000000-42.png`
    pub path: String,
    pub is_public: bool,
    /// JSON array of tags
    pub tags: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Public listing row: an image joined with its owner's username
#[derive(Debug, Clone, FromRow)]
pub struct PublicImageRow {
    #[sqlx(flatten)]
    pub image: Image,
    pub owner_username: String,
}

/// Owner reference shown in the public gallery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageOwner {
    pub id: String,
    pub username: String,
}

/// Image as returned by the API. `O` is the owner representation: the owner
/// id for the caller's own images, an [`ImageOwner`] in the public gallery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse<O = String> {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub filename: String,
    pub path: String,
    pub user: O,
    pub is_public: bool,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Image {
    fn into_response_with<O>(self, user: O) -> ImageResponse<O> {
        ImageResponse {
            tags: parse_tags(&self.tags),
            id: self.id,
            title: self.title,
            description: self.description,
            filename: self.filename,
            path: self.path,
            user,
            is_public: self.is_public,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<Image> for ImageResponse {
    fn from(image: Image) -> Self {
        let owner = image.user_id.clone();
        image.into_response_with(owner)
    }
}

impl From<PublicImageRow> for ImageResponse<ImageOwner> {
    fn from(row: PublicImageRow) -> Self {
        let owner = ImageOwner {
            id: row.image.user_id.clone(),
            username: row.owner_username,
        };
        row.image.into_response_with(owner)
    }
}

/// Fields for a new image record
#[derive(Debug, Clone)]
pub struct NewImage {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub filename: String,
    pub path: String,
    pub is_public: bool,
    pub tags: Vec<String>,
}

/// Validated metadata changes. `None` leaves a column untouched.
#[derive(Debug, Default, Clone)]
pub struct ImageChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteImageResponse {
    pub message: String,
}

impl Image {
    /// Insert an image record. This is the commit point of an upload.
    pub async fn create(db: &SqlitePool, new: &NewImage) -> Result<Image, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = timestamp_now();

        sqlx::query(
            r#"
            INSERT INTO images (id, user_id, title, description, filename, path, is_public, tags, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.user_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.filename)
        .bind(&new.path)
        .bind(new.is_public)
        .bind(serialize_tags(&new.tags))
        .bind(&now)
        .bind(&now)
        .execute(db)
        .await?;

        Self::get_owned(db, &id, &new.user_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// Get an image by id, only if it belongs to `user_id`
    pub async fn get_owned(
        db: &SqlitePool,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Image>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM images WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(db)
            .await
    }

    /// All images of a user regardless of visibility, newest first
    pub async fn list_for_user(db: &SqlitePool, user_id: &str) -> Result<Vec<Image>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM images
            WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await
    }

    /// Public images of every user with the owner's username, newest first
    pub async fn list_public(db: &SqlitePool) -> Result<Vec<PublicImageRow>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT images.*, users.username AS owner_username
            FROM images
            JOIN users ON users.id = images.user_id
            WHERE images.is_public = 1
            ORDER BY images.created_at DESC, images.rowid DESC
            "#,
        )
        .fetch_all(db)
        .await
    }

    /// Apply metadata changes to an owned image.
    ///
    /// Returns `None` when no image with this id belongs to `user_id`.
    pub async fn update_owned(
        db: &SqlitePool,
        id: &str,
        user_id: &str,
        changes: &ImageChanges,
    ) -> Result<Option<Image>, sqlx::Error> {
        let now = timestamp_now();
        let tags = changes.tags.as_deref().map(serialize_tags);

        let result = sqlx::query(
            r#"
            UPDATE images SET
                title = COALESCE(?, title),
                description = CASE WHEN ? THEN ? ELSE description END,
                is_public = COALESCE(?, is_public),
                tags = COALESCE(?, tags),
                updated_at = ?
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(&changes.title)
        .bind(changes.description.is_some())
        .bind(changes.description.clone().flatten())
        .bind(changes.is_public)
        .bind(tags)
        .bind(&now)
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Self::get_owned(db, id, user_id).await
    }

    /// Delete an owned image record inside `tx`, returning the stored filename.
    ///
    /// Returns `None` when no image with this id belongs to `user_id`. The
    /// deletion only becomes visible once the caller commits.
    pub async fn delete_owned(
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
        user_id: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar("DELETE FROM images WHERE id = ? AND user_id = ? RETURNING filename")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await
    }
}
