/// Image Catalog - registered image assets and document image collections
use crate::{
    db::format_timestamp,
    error::{AnnoResult, AnnotationError},
    media::resolver::normalize_url,
};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// URL to image lookup collaborator
#[async_trait]
pub trait ImageLookup: Send + Sync {
    /// Image id registered under exactly this URL
    async fn find_by_url(&self, url: &str) -> AnnoResult<Option<i64>>;
}

/// Catalog backed by the `image_asset` and `document_image` tables
#[derive(Clone)]
pub struct ImageCatalog {
    db: SqlitePool,
}

impl ImageCatalog {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register an image URL, returning its id
    ///
    /// URLs are stored normalized; registering the same image twice returns
    /// the existing id.
    pub async fn register_image(&self, url: &str) -> AnnoResult<i64> {
        let normalized = normalize_url(url).ok_or_else(|| {
            AnnotationError::InvalidRequest(format!("Invalid image URL: {}", url))
        })?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO image_asset (url, created_at)
            VALUES (?1, ?2)
            ON CONFLICT(url) DO UPDATE SET url = excluded.url
            RETURNING id
            "#,
        )
        .bind(&normalized)
        .bind(format_timestamp(&chrono::Utc::now()))
        .fetch_one(&self.db)
        .await?;

        tracing::debug!(image_id = id, url = %normalized, "registered image");

        Ok(id)
    }

    /// Register an image under an id assigned by the host content system
    ///
    /// Fails with `Conflict` when the id or the URL is already registered
    /// to a different image.
    pub async fn register_image_as(&self, image_id: i64, url: &str) -> AnnoResult<i64> {
        if image_id <= 0 {
            return Err(AnnotationError::InvalidRequest(format!(
                "Invalid image ID: {}",
                image_id
            )));
        }
        let normalized = normalize_url(url).ok_or_else(|| {
            AnnotationError::InvalidRequest(format!("Invalid image URL: {}", url))
        })?;

        if let Some(existing) = self.find_by_url(&normalized).await? {
            if existing == image_id {
                return Ok(existing);
            }
            return Err(AnnotationError::Conflict(format!(
                "Image URL already registered as image ID: {}",
                existing
            )));
        }

        sqlx::query("INSERT INTO image_asset (id, url, created_at) VALUES (?1, ?2, ?3)")
            .bind(image_id)
            .bind(&normalized)
            .bind(format_timestamp(&chrono::Utc::now()))
            .execute(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AnnotationError::Conflict(format!("Image ID {} already registered", image_id))
                }
                other => AnnotationError::Storage(other),
            })?;

        tracing::debug!(image_id, url = %normalized, "registered image");

        Ok(image_id)
    }

    /// Replace the ordered image collection of a document
    ///
    /// Duplicates are dropped, keeping the first position. Returns the
    /// stored order.
    pub async fn set_document_images(
        &self,
        document_id: i64,
        image_ids: &[i64],
    ) -> AnnoResult<Vec<i64>> {
        if let Some(bad) = image_ids.iter().find(|id| **id <= 0) {
            return Err(AnnotationError::InvalidRequest(format!(
                "Invalid image ID: {}",
                bad
            )));
        }

        let mut ordered: Vec<i64> = Vec::with_capacity(image_ids.len());
        for id in image_ids {
            if !ordered.contains(id) {
                ordered.push(*id);
            }
        }

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM document_image WHERE document_id = ?1")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for (position, image_id) in ordered.iter().enumerate() {
            sqlx::query(
                "INSERT INTO document_image (document_id, position, image_id) VALUES (?1, ?2, ?3)",
            )
            .bind(document_id)
            .bind(position as i64)
            .bind(image_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(ordered)
    }

    /// Ordered image ids attached to a document
    pub async fn document_images(&self, document_id: i64) -> AnnoResult<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT image_id FROM document_image WHERE document_id = ?1 ORDER BY position",
        )
        .bind(document_id)
        .fetch_all(&self.db)
        .await?;

        Ok(ids)
    }
}

#[async_trait]
impl ImageLookup for ImageCatalog {
    async fn find_by_url(&self, url: &str) -> AnnoResult<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM image_asset WHERE url = ?1")
            .bind(url)
            .fetch_optional(&self.db)
            .await?;

        Ok(id)
    }
}
