/// Annotation store database models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current state of one annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    /// Row identifier, returned to callers as `recordId`
    pub id: i64,
    pub external_id: String,
    pub image_id: i64,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
