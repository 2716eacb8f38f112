/// Annotation Store - current-state CRUD over `annotation_current`
use crate::{
    annotation_store::{models::AnnotationRecord, payload::AnnotationPayload},
    db::{format_timestamp, parse_timestamp},
    error::{AnnoResult, AnnotationError},
    sanitize::Sanitizer,
};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;

const RECORD_COLUMNS: &str = "id, external_id, image_id, payload, created_at, updated_at";

/// Annotation Store - one row per annotation, unique on external id
#[derive(Clone)]
pub struct AnnotationStore {
    db: SqlitePool,
    sanitizer: Arc<dyn Sanitizer>,
}

impl AnnotationStore {
    /// Create a new annotation store
    pub fn new(db: SqlitePool, sanitizer: Arc<dyn Sanitizer>) -> Self {
        Self { db, sanitizer }
    }

    /// List all annotations on an image, oldest first
    ///
    /// Unknown images simply have no annotations.
    pub async fn list_by_image(&self, image_id: i64) -> AnnoResult<Vec<AnnotationRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS}
             FROM annotation_current
             WHERE image_id = ?1
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(image_id)
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// List annotations for several images, grouped in the given image order
    pub async fn list_by_images(&self, image_ids: &[i64]) -> AnnoResult<Vec<AnnotationRecord>> {
        let mut records = Vec::new();
        for image_id in image_ids {
            records.extend(self.list_by_image(*image_id).await?);
        }

        Ok(records)
    }

    /// Get an annotation by its external id
    pub async fn get(&self, external_id: &str) -> AnnoResult<Option<AnnotationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM annotation_current WHERE external_id = ?1"
        ))
        .bind(external_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Insert a new annotation
    ///
    /// The external id is a uniqueness constraint, not an upsert key: a
    /// duplicate fails with `Conflict` and leaves the existing row untouched.
    pub async fn insert(
        &self,
        external_id: &str,
        image_id: i64,
        mut payload: AnnotationPayload,
    ) -> AnnoResult<AnnotationRecord> {
        payload.sanitize_bodies(self.sanitizer.as_ref());
        let payload_json = payload.to_json()?;
        let now = format_timestamp(&chrono::Utc::now());

        let row = sqlx::query(&format!(
            "INSERT INTO annotation_current (external_id, image_id, payload, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(external_id)
        .bind(image_id)
        .bind(&payload_json)
        .bind(&now)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AnnotationError::Conflict(format!("Annotation {} already exists", external_id))
            }
            other => AnnotationError::Storage(other),
        })?;

        let record = record_from_row(&row)?;
        tracing::debug!(
            record_id = record.id,
            external_id,
            image_id,
            "inserted annotation"
        );

        Ok(record)
    }

    /// Replace the payload of an existing annotation
    ///
    /// Both the external id and the image id must match so that an id
    /// collision across images cannot overwrite the wrong annotation.
    pub async fn update(
        &self,
        external_id: &str,
        image_id: i64,
        mut payload: AnnotationPayload,
    ) -> AnnoResult<AnnotationRecord> {
        payload.sanitize_bodies(self.sanitizer.as_ref());
        let payload_json = payload.to_json()?;
        let now = format_timestamp(&chrono::Utc::now());

        let row = sqlx::query(&format!(
            "UPDATE annotation_current
             SET payload = ?1, updated_at = ?2
             WHERE external_id = ?3 AND image_id = ?4
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(&payload_json)
        .bind(&now)
        .bind(external_id)
        .bind(image_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| not_found(image_id))?;

        record_from_row(&row)
    }

    /// Delete an annotation, returning the payload it held
    pub async fn delete(&self, external_id: &str, image_id: i64) -> AnnoResult<serde_json::Value> {
        let payload: String = sqlx::query_scalar(
            "DELETE FROM annotation_current
             WHERE external_id = ?1 AND image_id = ?2
             RETURNING payload",
        )
        .bind(external_id)
        .bind(image_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| not_found(image_id))?;

        parse_payload(&payload)
    }
}

fn not_found(image_id: i64) -> AnnotationError {
    AnnotationError::NotFound(format!("Annotation not found for image ID: {}", image_id))
}

fn parse_payload(raw: &str) -> AnnoResult<serde_json::Value> {
    serde_json::from_str(raw)
        .map_err(|e| AnnotationError::Internal(format!("Stored annotation payload is corrupt: {}", e)))
}

fn record_from_row(row: &SqliteRow) -> AnnoResult<AnnotationRecord> {
    Ok(AnnotationRecord {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        image_id: row.try_get("image_id")?,
        payload: parse_payload(&row.try_get::<String, _>("payload")?)?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, sanitize::HtmlSanitizer};
    use serde_json::json;

    async fn create_test_store() -> AnnotationStore {
        let db = db::memory_pool().await.unwrap();
        AnnotationStore::new(db, Arc::new(HtmlSanitizer::new()))
    }

    fn payload(id: &str, source: &str, comment: &str) -> AnnotationPayload {
        AnnotationPayload::from_value(json!({
            "id": id,
            "type": "Annotation",
            "body": [{"type": "TextualBody", "value": comment}],
            "target": {"source": source, "selector": {"type": "FragmentSelector", "value": "xywh=pixel:0,0,10,10"}}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_list_round_trip() {
        let store = create_test_store().await;
        let p = payload("a1", "http://x/42.jpg", "plain note");

        let record = store.insert("a1", 42, p.clone()).await.unwrap();
        assert!(record.id > 0);

        let listed = store.list_by_image(42).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].external_id, "a1");
        assert_eq!(listed[0].payload, p.to_value().unwrap());
    }

    #[tokio::test]
    async fn test_insert_sanitizes_body() {
        let store = create_test_store().await;

        let record = store
            .insert("a1", 42, payload("a1", "http://x/42.jpg", "<script>x</script>ok"))
            .await
            .unwrap();

        assert_eq!(record.payload["body"][0]["value"], "ok");
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let store = create_test_store().await;
        store.insert("a1", 42, payload("a1", "http://x/42.jpg", "first")).await.unwrap();

        let err = store
            .insert("a1", 7, payload("a1", "http://x/7.jpg", "second"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnnotationError::Conflict(_)));

        let existing = store.get("a1").await.unwrap().unwrap();
        assert_eq!(existing.image_id, 42);
        assert_eq!(existing.payload["body"][0]["value"], "first");
    }

    #[tokio::test]
    async fn test_update_requires_matching_image() {
        let store = create_test_store().await;
        store.insert("a1", 42, payload("a1", "http://x/42.jpg", "first")).await.unwrap();

        let err = store
            .update("a1", 7, payload("a1", "http://x/7.jpg", "moved"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnnotationError::NotFound(_)));

        let updated = store
            .update("a1", 42, payload("a1", "http://x/42.jpg", "second"))
            .await
            .unwrap();
        assert_eq!(updated.payload["body"][0]["value"], "second");
        assert!(updated.updated_at >= updated.created_at);
    }

    #[tokio::test]
    async fn test_update_replaces_wholesale() {
        let store = create_test_store().await;
        let mut first = payload("a1", "http://x/42.jpg", "first");
        first.extra.insert("motivation".to_string(), json!("tagging"));
        store.insert("a1", 42, first).await.unwrap();

        let updated = store
            .update("a1", 42, payload("a1", "http://x/42.jpg", "second"))
            .await
            .unwrap();
        assert!(updated.payload.get("motivation").is_none());
    }

    #[tokio::test]
    async fn test_delete_returns_prior_payload() {
        let store = create_test_store().await;
        let record = store
            .insert("a1", 42, payload("a1", "http://x/42.jpg", "bye"))
            .await
            .unwrap();

        assert!(matches!(
            store.delete("a1", 7).await,
            Err(AnnotationError::NotFound(_))
        ));

        let prior = store.delete("a1", 42).await.unwrap();
        assert_eq!(prior, record.payload);
        assert!(store.list_by_image(42).await.unwrap().is_empty());
        assert!(matches!(
            store.delete("a1", 42).await,
            Err(AnnotationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_unknown_image_is_empty() {
        let store = create_test_store().await;
        assert!(store.list_by_image(999).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_by_images_keeps_image_order() {
        let store = create_test_store().await;
        store.insert("a", 1, payload("a", "http://x/1.jpg", "one")).await.unwrap();
        store.insert("b", 2, payload("b", "http://x/2.jpg", "two")).await.unwrap();
        store.insert("c", 1, payload("c", "http://x/1.jpg", "three")).await.unwrap();

        let ids: Vec<String> = store
            .list_by_images(&[2, 1])
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.external_id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
