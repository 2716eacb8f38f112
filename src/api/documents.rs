/// Document image collections and image registration
use crate::{
    api::Envelope,
    context::AppContext,
    error::AnnoResult,
};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build document and image routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/documents/:document_id/images",
            get(get_document_images).put(set_document_images),
        )
        .route("/images", post(register_image))
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentImages {
    pub image_ids: Vec<i64>,
}

/// Image registration request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterImageInput {
    pub url: String,
    /// Id assigned by the host content system; generated when absent
    pub image_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredImage {
    pub image_id: i64,
}

pub async fn get_document_images(
    State(ctx): State<AppContext>,
    document_id: Result<Path<i64>, PathRejection>,
) -> AnnoResult<Json<Envelope<DocumentImages>>> {
    let Path(document_id) = document_id?;
    let image_ids = ctx.service.document_images(document_id).await?;

    Ok(Envelope::ok(
        format!("{} image(s) attached.", image_ids.len()),
        DocumentImages { image_ids },
    ))
}

/// Replace a document's image collection; an empty list detaches everything
pub async fn set_document_images(
    State(ctx): State<AppContext>,
    document_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<DocumentImages>, JsonRejection>,
) -> AnnoResult<Json<Envelope<DocumentImages>>> {
    let Path(document_id) = document_id?;
    let Json(body) = body?;

    let image_ids = ctx
        .service
        .set_document_images(document_id, &body.image_ids)
        .await?;

    tracing::info!(document_id, count = image_ids.len(), "document images saved");

    Ok(Envelope::ok("Document images saved.", DocumentImages { image_ids }))
}

pub async fn register_image(
    State(ctx): State<AppContext>,
    body: Result<Json<RegisterImageInput>, JsonRejection>,
) -> AnnoResult<Json<Envelope<RegisteredImage>>> {
    let Json(body) = body?;
    let image_id = ctx.service.register_image(&body.url, body.image_id).await?;

    Ok(Envelope::ok("Image registered.", RegisteredImage { image_id }))
}
