/// Annotation Ledger
///
/// Persistence and audit history for image annotations: a current-state
/// store keyed by the client-generated annotation id, an append-only
/// history ledger, and the HTTP API the viewer and content system call.

pub mod annotation_store;
pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod directory;
pub mod error;
pub mod history;
pub mod media;
pub mod sanitize;
pub mod server;
pub mod service;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{AnnoResult, AnnotationError};
pub use server::build_router;
