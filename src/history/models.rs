/// History ledger models
use crate::error::AnnotationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mutation recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Snapshot is the stored post-state
    Created,
    /// Snapshot is the stored post-state
    Updated,
    /// Snapshot is the payload removed
    Deleted,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Created => "created",
            ActionType::Updated => "updated",
            ActionType::Deleted => "deleted",
        }
    }
}

impl FromStr for ActionType {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ActionType::Created),
            "updated" => Ok(ActionType::Updated),
            "deleted" => Ok(ActionType::Deleted),
            _ => Err(AnnotationError::Internal(format!("Invalid history action: {}", s))),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub external_id: String,
    pub image_id: i64,
    pub action_type: ActionType,
    pub payload_snapshot: serde_json::Value,
    /// 0 for anonymous actors
    pub actor_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// History entry with the actor resolved to a display name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryView {
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub actor_name: String,
}

/// History query filter; at least one of `image_id` and `external_id` is required
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFilter {
    pub image_id: Option<i64>,
    pub external_id: Option<String>,
    pub limit: Option<u32>,
}

impl HistoryFilter {
    pub fn for_image(image_id: i64) -> Self {
        Self {
            image_id: Some(image_id),
            ..Self::default()
        }
    }

    pub fn for_annotation(external_id: impl Into<String>) -> Self {
        Self {
            external_id: Some(external_id.into()),
            ..Self::default()
        }
    }

    /// Blank external ids count as absent
    pub fn external_id(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.image_id.is_none() && self.external_id().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_str() {
        assert_eq!("created".parse::<ActionType>().unwrap(), ActionType::Created);
        assert_eq!("deleted".parse::<ActionType>().unwrap(), ActionType::Deleted);
        assert!("purged".parse::<ActionType>().is_err());
    }

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ActionType::Updated).unwrap(), "\"updated\"");
    }

    #[test]
    fn test_filter_emptiness() {
        assert!(HistoryFilter::default().is_empty());
        assert!(HistoryFilter::for_annotation("  ").is_empty());
        assert!(!HistoryFilter::for_image(3).is_empty());
        assert!(!HistoryFilter::for_annotation("a1").is_empty());
    }
}
