/// User Directory - actor id to display name lookup
///
/// The surrounding content system owns user accounts; this service only
/// needs a name to show next to each history entry.
use crate::error::AnnoResult;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Actor id used for anonymous and guest edits
pub const ANONYMOUS_ACTOR: i64 = 0;

/// User directory collaborator
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Display name for an actor, `None` when the actor is unknown
    async fn display_name(&self, actor_id: i64) -> AnnoResult<Option<String>>;
}

/// Directory backed by the `user_directory` table
#[derive(Clone)]
pub struct SqliteUserDirectory {
    db: SqlitePool,
}

impl SqliteUserDirectory {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create or rename a directory entry
    pub async fn put_user(&self, actor_id: i64, display_name: &str) -> AnnoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_directory (id, display_name)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name
            "#,
        )
        .bind(actor_id)
        .bind(display_name)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn display_name(&self, actor_id: i64) -> AnnoResult<Option<String>> {
        let name: Option<String> =
            sqlx::query_scalar("SELECT display_name FROM user_directory WHERE id = ?1")
                .bind(actor_id)
                .fetch_optional(&self.db)
                .await?;

        Ok(name)
    }
}

/// Resolves actors to the names shown in history, with fallback labels
#[derive(Clone)]
pub struct ActorNames {
    directory: Arc<dyn UserDirectory>,
    anonymous_label: String,
    unknown_label: String,
}

impl ActorNames {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        anonymous_label: impl Into<String>,
        unknown_label: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            anonymous_label: anonymous_label.into(),
            unknown_label: unknown_label.into(),
        }
    }

    /// Display name for an actor; never fails
    pub async fn resolve(&self, actor_id: i64) -> String {
        if actor_id == ANONYMOUS_ACTOR {
            return self.anonymous_label.clone();
        }

        match self.directory.display_name(actor_id).await {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => self.unknown_label.clone(),
            Err(e) => {
                tracing::warn!(actor_id, error = %e, "user directory lookup failed");
                self.unknown_label.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, error::AnnotationError};

    struct FailingDirectory;

    #[async_trait]
    impl UserDirectory for FailingDirectory {
        async fn display_name(&self, _actor_id: i64) -> AnnoResult<Option<String>> {
            Err(AnnotationError::Internal("directory offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_directory_lookup() {
        let directory = SqliteUserDirectory::new(db::memory_pool().await.unwrap());
        directory.put_user(7, "Ada").await.unwrap();
        directory.put_user(7, "Ada Lovelace").await.unwrap();

        assert_eq!(
            directory.display_name(7).await.unwrap(),
            Some("Ada Lovelace".to_string())
        );
        assert_eq!(directory.display_name(8).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_actor_names_fallbacks() {
        let directory = SqliteUserDirectory::new(db::memory_pool().await.unwrap());
        directory.put_user(7, "Ada").await.unwrap();
        let names = ActorNames::new(Arc::new(directory), "Guest", "Unknown user");

        assert_eq!(names.resolve(0).await, "Guest");
        assert_eq!(names.resolve(7).await, "Ada");
        assert_eq!(names.resolve(99).await, "Unknown user");
    }

    #[tokio::test]
    async fn test_directory_failure_uses_placeholder() {
        let names = ActorNames::new(Arc::new(FailingDirectory), "Guest", "Unknown user");
        assert_eq!(names.resolve(5).await, "Unknown user");
    }
}
