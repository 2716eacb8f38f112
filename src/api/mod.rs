/// API routes and handlers
pub mod annotations;
pub mod documents;
pub mod health;
pub mod middleware;

use crate::context::AppContext;
use axum::{Json, Router};
use serde::Serialize;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(annotations::routes())
        .merge(documents::routes())
        .merge(health::routes())
}

/// Success envelope; `data` fields are flattened next to `success` and `message`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
            data,
        })
    }
}
