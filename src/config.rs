/// Configuration management for the annotation ledger
use crate::error::{AnnoResult, AnnotationError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub history: HistoryConfig,
    pub actors: ActorConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub max_connections: u32,
    pub enable_wal: bool,
}

/// History query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Entries returned when the caller gives no limit
    pub default_limit: u32,
    /// Upper bound on any requested limit
    pub max_limit: u32,
}

/// Actor identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Accept the acting user id from the `X-Actor-Id` header
    pub trust_actor_header: bool,
    /// Display name for actor 0
    pub anonymous_label: String,
    /// Display name when the directory cannot resolve an actor
    pub unknown_label: String,
}

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "annotation_ledger=debug,tower_http=debug";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives
    pub level: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 500,
        }
    }
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            trust_actor_header: false,
            anonymous_label: "Guest".to_string(),
            unknown_label: "Unknown user".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AnnoResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("ANNO_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("ANNO_PORT")
            .unwrap_or_else(|_| "8787".to_string())
            .parse()
            .map_err(|_| AnnotationError::Config("Invalid port number".to_string()))?;
        let version = env::var("ANNO_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let data_directory: PathBuf = env::var("ANNO_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("ANNO_DATABASE_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("annotations.sqlite"));
        let max_connections = env::var("ANNO_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        let enable_wal = env::var("ANNO_DB_ENABLE_WAL")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let history_defaults = HistoryConfig::default();
        let default_limit = env::var("ANNO_HISTORY_DEFAULT_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(history_defaults.default_limit);
        let max_limit = env::var("ANNO_HISTORY_MAX_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(history_defaults.max_limit);

        let actor_defaults = ActorConfig::default();
        let trust_actor_header = env::var("ANNO_TRUST_ACTOR_HEADER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(actor_defaults.trust_actor_header);
        let anonymous_label =
            env::var("ANNO_ANONYMOUS_LABEL").unwrap_or(actor_defaults.anonymous_label);
        let unknown_label =
            env::var("ANNO_UNKNOWN_ACTOR_LABEL").unwrap_or(actor_defaults.unknown_label);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
                max_connections,
                enable_wal,
            },
            history: HistoryConfig {
                default_limit,
                max_limit,
            },
            actors: ActorConfig {
                trust_actor_header,
                anonymous_label,
                unknown_label,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AnnoResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AnnotationError::Config("Hostname cannot be empty".to_string()));
        }

        if self.storage.max_connections == 0 {
            return Err(AnnotationError::Config(
                "Database pool needs at least one connection".to_string(),
            ));
        }

        if self.history.default_limit == 0 || self.history.max_limit == 0 {
            return Err(AnnotationError::Config(
                "History limits must be positive".to_string(),
            ));
        }

        if self.history.default_limit > self.history.max_limit {
            return Err(AnnotationError::Config(format!(
                "History default limit {} exceeds max limit {}",
                self.history.default_limit, self.history.max_limit
            )));
        }

        Ok(())
    }
}

impl ServerConfig {
    /// Defaults for a single local database file
    pub fn with_database(database: PathBuf) -> Self {
        Self {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 8787,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            storage: StorageConfig {
                data_directory: database
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".")),
                database,
                max_connections: 1,
                enable_wal: true,
            },
            history: HistoryConfig::default(),
            actors: ActorConfig::default(),
            logging: LoggingConfig {
                level: DEFAULT_LOG_FILTER.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_inverted_limits() {
        let mut config = ServerConfig::with_database(PathBuf::from("/tmp/anno.sqlite"));
        assert!(config.validate().is_ok());

        config.history.default_limit = 1000;
        assert!(matches!(config.validate(), Err(AnnotationError::Config(_))));
    }

    #[test]
    fn test_actor_header_untrusted_by_default() {
        let config = ServerConfig::with_database(PathBuf::from("/tmp/anno.sqlite"));
        assert!(!config.actors.trust_actor_header);
        assert!(!ActorConfig::default().trust_actor_header);
    }

    #[test]
    fn test_default_log_filter_parses() {
        let config = ServerConfig::with_database(PathBuf::from("/tmp/anno.sqlite"));
        assert_eq!(config.logging.level, DEFAULT_LOG_FILTER);
        assert!(tracing_subscriber::EnvFilter::try_new(&config.logging.level).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_hostname() {
        let mut config = ServerConfig::with_database(PathBuf::from("/tmp/anno.sqlite"));
        config.service.hostname.clear();
        assert!(config.validate().is_err());
    }
}
