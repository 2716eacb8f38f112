/// Annotation endpoints: list, add, update, delete and history
use crate::{
    annotation_store::AnnotationRecord,
    api::{middleware::RequestContext, Envelope},
    context::AppContext,
    error::{AnnoResult, AnnotationError},
    history::{HistoryEntryView, HistoryFilter},
    service::{AddOutcome, MutationOutcome, MutationRequest},
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build annotation routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/annotations", get(list_annotations))
        .route("/annotations/add", post(add_annotation))
        .route("/annotations/update", post(update_annotation))
        .route("/annotations/delete", post(delete_annotation))
        .route("/annotations/history", get(annotation_history))
}

/// Query parameters for listing; exactly one of the two is required
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAnnotationsParams {
    pub image_id: Option<i64>,
    pub document_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AnnotationList {
    pub annotations: Vec<AnnotationRecord>,
}

#[derive(Debug, Serialize)]
pub struct HistoryList {
    pub history: Vec<HistoryEntryView>,
}

/// List annotations for an image or for every image of a document
pub async fn list_annotations(
    State(ctx): State<AppContext>,
    params: Result<Query<ListAnnotationsParams>, QueryRejection>,
) -> AnnoResult<Json<Envelope<AnnotationList>>> {
    let Query(params) = params?;

    let annotations = match (params.image_id, params.document_id) {
        (Some(image_id), None) => ctx.service.annotations_for_image(image_id).await?,
        (None, Some(document_id)) => ctx.service.annotations_for_document(document_id).await?,
        _ => {
            return Err(AnnotationError::InvalidRequest(
                "Exactly one of imageId or documentId is required.".to_string(),
            ))
        }
    };

    Ok(Envelope::ok(
        format!("{} annotation(s) found.", annotations.len()),
        AnnotationList { annotations },
    ))
}

/// Create an annotation
pub async fn add_annotation(
    State(ctx): State<AppContext>,
    Extension(request): Extension<RequestContext>,
    body: Result<Json<MutationRequest>, JsonRejection>,
) -> AnnoResult<Json<Envelope<AddOutcome>>> {
    let Json(body) = body?;
    let outcome = ctx.service.add(body, request.actor_id).await?;

    Ok(Envelope::ok("Annotation saved successfully.", outcome))
}

/// Replace an annotation
pub async fn update_annotation(
    State(ctx): State<AppContext>,
    Extension(request): Extension<RequestContext>,
    body: Result<Json<MutationRequest>, JsonRejection>,
) -> AnnoResult<Json<Envelope<MutationOutcome>>> {
    let Json(body) = body?;
    let outcome = ctx.service.update(body, request.actor_id).await?;

    Ok(Envelope::ok("Annotation updated successfully.", outcome))
}

/// Delete an annotation
pub async fn delete_annotation(
    State(ctx): State<AppContext>,
    Extension(request): Extension<RequestContext>,
    body: Result<Json<MutationRequest>, JsonRejection>,
) -> AnnoResult<Json<Envelope<MutationOutcome>>> {
    let Json(body) = body?;
    let outcome = ctx.service.delete(body, request.actor_id).await?;

    Ok(Envelope::ok("Annotation deleted successfully.", outcome))
}

/// Query the history ledger
pub async fn annotation_history(
    State(ctx): State<AppContext>,
    filter: Result<Query<HistoryFilter>, QueryRejection>,
) -> AnnoResult<Json<Envelope<HistoryList>>> {
    let Query(filter) = filter?;
    let history = ctx.service.history(&filter).await?;

    Ok(Envelope::ok(
        "History retrieved.",
        HistoryList { history },
    ))
}
