/// History Ledger - append-only audit trail in `annotation_history`
use crate::{
    config::HistoryConfig,
    db::{format_timestamp, parse_timestamp},
    directory::ActorNames,
    error::{AnnoResult, AnnotationError},
    history::models::{ActionType, HistoryEntry, HistoryEntryView, HistoryFilter},
};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::HashMap;

/// History ledger
///
/// Rows are only ever inserted. Deleting an annotation leaves its history
/// in place.
#[derive(Clone)]
pub struct HistoryLedger {
    db: SqlitePool,
    actor_names: ActorNames,
    config: HistoryConfig,
}

impl HistoryLedger {
    pub fn new(db: SqlitePool, actor_names: ActorNames, config: HistoryConfig) -> Self {
        Self {
            db,
            actor_names,
            config,
        }
    }

    /// Append an entry, reporting failure as `false`
    ///
    /// History is best-effort auditing; the caller's mutation has already
    /// been committed and is never rolled back here.
    pub async fn record(
        &self,
        external_id: &str,
        image_id: i64,
        action: ActionType,
        snapshot: &serde_json::Value,
        actor_id: i64,
    ) -> bool {
        match self
            .append(external_id, image_id, action, snapshot, actor_id)
            .await
        {
            Ok(entry_id) => {
                tracing::debug!(entry_id, external_id, %action, actor_id, "history recorded");
                true
            }
            Err(e) => {
                tracing::warn!(
                    external_id,
                    image_id,
                    %action,
                    error = %e,
                    "failed to record annotation history"
                );
                false
            }
        }
    }

    /// Append an entry, returning its id
    pub async fn append(
        &self,
        external_id: &str,
        image_id: i64,
        action: ActionType,
        snapshot: &serde_json::Value,
        actor_id: i64,
    ) -> AnnoResult<i64> {
        let snapshot_json = serde_json::to_string(snapshot)
            .map_err(|e| AnnotationError::Internal(format!("Failed to serialize snapshot: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO annotation_history
            (external_id, image_id, action_type, payload_snapshot, actor_id, action_timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(external_id)
        .bind(image_id)
        .bind(action.as_str())
        .bind(&snapshot_json)
        .bind(actor_id)
        .bind(format_timestamp(&chrono::Utc::now()))
        .execute(&self.db)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Query history newest-first
    ///
    /// Requires an image id, an external id, or both.
    pub async fn query(&self, filter: &HistoryFilter) -> AnnoResult<Vec<HistoryEntry>> {
        if filter.is_empty() {
            return Err(AnnotationError::InvalidQuery(
                "History query requires imageId or externalId".to_string(),
            ));
        }

        let limit = filter
            .limit
            .unwrap_or(self.config.default_limit)
            .min(self.config.max_limit)
            .max(1);

        let rows = sqlx::query(
            r#"
            SELECT id, external_id, image_id, action_type, payload_snapshot, actor_id, action_timestamp
            FROM annotation_history
            WHERE (?1 IS NULL OR image_id = ?1)
              AND (?2 IS NULL OR external_id = ?2)
            ORDER BY action_timestamp DESC, id DESC
            LIMIT ?3
            "#,
        )
        .bind(filter.image_id)
        .bind(filter.external_id())
        .bind(i64::from(limit))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Query history and attach actor display names
    pub async fn query_with_actors(
        &self,
        filter: &HistoryFilter,
    ) -> AnnoResult<Vec<HistoryEntryView>> {
        let entries = self.query(filter).await?;

        // Names are looked up once per distinct actor in this result
        let mut names: HashMap<i64, String> = HashMap::new();
        let mut views = Vec::with_capacity(entries.len());
        for entry in entries {
            let actor_name = match names.get(&entry.actor_id) {
                Some(name) => name.clone(),
                None => {
                    let name = self.actor_names.resolve(entry.actor_id).await;
                    names.insert(entry.actor_id, name.clone());
                    name
                }
            };
            views.push(HistoryEntryView { entry, actor_name });
        }

        Ok(views)
    }
}

fn entry_from_row(row: &SqliteRow) -> AnnoResult<HistoryEntry> {
    let snapshot: String = row.try_get("payload_snapshot")?;

    Ok(HistoryEntry {
        id: row.try_get("id")?,
        external_id: row.try_get("external_id")?,
        image_id: row.try_get("image_id")?,
        action_type: row.try_get::<String, _>("action_type")?.parse()?,
        payload_snapshot: serde_json::from_str(&snapshot).map_err(|e| {
            AnnotationError::Internal(format!("Stored history snapshot is corrupt: {}", e))
        })?,
        actor_id: row.try_get("actor_id")?,
        timestamp: parse_timestamp(&row.try_get::<String, _>("action_timestamp")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        directory::{SqliteUserDirectory, UserDirectory},
    };
    use serde_json::json;
    use std::sync::Arc;

    async fn create_test_ledger() -> (HistoryLedger, SqliteUserDirectory) {
        let db = db::memory_pool().await.unwrap();
        let directory = SqliteUserDirectory::new(db.clone());
        let names = ActorNames::new(
            Arc::new(directory.clone()) as Arc<dyn UserDirectory>,
            "Guest",
            "Unknown user",
        );
        (
            HistoryLedger::new(db, names, HistoryConfig::default()),
            directory,
        )
    }

    #[tokio::test]
    async fn test_query_requires_filter() {
        let (ledger, _) = create_test_ledger().await;
        let err = ledger.query(&HistoryFilter::default()).await.unwrap_err();
        assert!(matches!(err, AnnotationError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_entries_newest_first() {
        let (ledger, _) = create_test_ledger().await;
        let snapshot = json!({"id": "a1"});

        assert!(ledger.record("a1", 42, ActionType::Created, &snapshot, 0).await);
        assert!(ledger.record("a1", 42, ActionType::Updated, &snapshot, 0).await);
        assert!(ledger.record("a1", 42, ActionType::Deleted, &snapshot, 0).await);
        assert!(ledger.record("b2", 42, ActionType::Created, &snapshot, 0).await);

        let entries = ledger.query(&HistoryFilter::for_annotation("a1")).await.unwrap();
        let actions: Vec<ActionType> = entries.iter().map(|e| e.action_type).collect();
        assert_eq!(
            actions,
            vec![ActionType::Deleted, ActionType::Updated, ActionType::Created]
        );
        assert!(entries.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let by_image = ledger.query(&HistoryFilter::for_image(42)).await.unwrap();
        assert_eq!(by_image.len(), 4);
        assert_eq!(by_image[0].external_id, "b2");
    }

    #[tokio::test]
    async fn test_combined_filter_and_limit() {
        let (ledger, _) = create_test_ledger().await;
        let snapshot = json!({});
        for _ in 0..5 {
            ledger.record("a1", 1, ActionType::Updated, &snapshot, 0).await;
        }
        ledger.record("a1", 2, ActionType::Updated, &snapshot, 0).await;

        let filter = HistoryFilter {
            image_id: Some(1),
            external_id: Some("a1".to_string()),
            limit: Some(3),
        };
        let entries = ledger.query(&filter).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.image_id == 1));
    }

    #[tokio::test]
    async fn test_zero_max_limit_still_returns_newest() {
        let db = db::memory_pool().await.unwrap();
        let names = ActorNames::new(
            Arc::new(SqliteUserDirectory::new(db.clone())) as Arc<dyn UserDirectory>,
            "Guest",
            "Unknown user",
        );
        let config = HistoryConfig {
            default_limit: 0,
            max_limit: 0,
        };
        let ledger = HistoryLedger::new(db, names, config);
        ledger.record("a1", 1, ActionType::Created, &json!({}), 0).await;
        ledger.record("a1", 1, ActionType::Updated, &json!({}), 0).await;

        let entries = ledger.query(&HistoryFilter::for_annotation("a1")).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action_type, ActionType::Updated);
    }

    #[tokio::test]
    async fn test_snapshot_preserved() {
        let (ledger, _) = create_test_ledger().await;
        let snapshot = json!({"id": "a1", "body": [{"value": "note"}]});
        ledger.record("a1", 3, ActionType::Deleted, &snapshot, 9).await;

        let entries = ledger.query(&HistoryFilter::for_image(3)).await.unwrap();
        assert_eq!(entries[0].payload_snapshot, snapshot);
        assert_eq!(entries[0].actor_id, 9);
    }

    #[tokio::test]
    async fn test_actor_names_attached() {
        let (ledger, directory) = create_test_ledger().await;
        directory.put_user(5, "Editor Five").await.unwrap();
        let snapshot = json!({});
        ledger.record("a1", 1, ActionType::Created, &snapshot, 0).await;
        ledger.record("a1", 1, ActionType::Updated, &snapshot, 5).await;
        ledger.record("a1", 1, ActionType::Updated, &snapshot, 6).await;

        let views = ledger
            .query_with_actors(&HistoryFilter::for_annotation("a1"))
            .await
            .unwrap();
        let names: Vec<&str> = views.iter().map(|v| v.actor_name.as_str()).collect();
        assert_eq!(names, vec!["Unknown user", "Editor Five", "Guest"]);
    }

    #[tokio::test]
    async fn test_record_failure_is_soft() {
        let (ledger, _) = create_test_ledger().await;
        sqlx::query("DROP TABLE annotation_history")
            .execute(&ledger.db)
            .await
            .unwrap();

        assert!(!ledger.record("a1", 1, ActionType::Created, &json!({}), 0).await);
    }
}
