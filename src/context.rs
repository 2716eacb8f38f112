/// Application context and dependency injection
use crate::{
    annotation_store::AnnotationStore,
    config::ServerConfig,
    db,
    directory::{ActorNames, SqliteUserDirectory},
    error::{AnnoResult, AnnotationError},
    history::HistoryLedger,
    media::{ImageCatalog, ImageResolver},
    sanitize::HtmlSanitizer,
    service::AnnotationService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub directory: Arc<SqliteUserDirectory>,
    pub service: Arc<AnnotationService>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AnnoResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(
            &config.storage.database,
            db::DatabaseOptions {
                max_connections: config.storage.max_connections,
                enable_wal: config.storage.enable_wal,
            },
        )
        .await?;

        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        tracing::info!(database = %config.storage.database.display(), "database ready");

        Ok(Self::with_pool(config, db))
    }

    /// Wire services over an already-migrated pool
    pub fn with_pool(config: ServerConfig, db: SqlitePool) -> Self {
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "wiring services with an invalid configuration");
        }

        let directory = Arc::new(SqliteUserDirectory::new(db.clone()));
        let actor_names = ActorNames::new(
            directory.clone(),
            config.actors.anonymous_label.clone(),
            config.actors.unknown_label.clone(),
        );

        let catalog = ImageCatalog::new(db.clone());
        let resolver = ImageResolver::new(Arc::new(catalog.clone()));
        let store = AnnotationStore::new(db.clone(), Arc::new(HtmlSanitizer::new()));
        let ledger = HistoryLedger::new(db.clone(), actor_names, config.history.clone());

        let service = Arc::new(AnnotationService::new(store, ledger, catalog, resolver));

        Self {
            config: Arc::new(config),
            db,
            directory,
            service,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> AnnoResult<()> {
        let dir = &config.storage.data_directory;
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                AnnotationError::Config(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::with_database(dir.path().join("nested").join("anno.sqlite"));

        let ctx = AppContext::new(config).await.unwrap();
        assert!(dir.path().join("nested").join("anno.sqlite").exists());
        assert_eq!(ctx.service_url(), "http://127.0.0.1:8787");
        assert!(ctx.service.annotations_for_image(1).await.unwrap().is_empty());
    }
}
