/// Annotation Service
///
/// Validates caller input, resolves the owning image, applies the mutation
/// to the store and records it in the history ledger.
use crate::{
    annotation_store::{AnnotationPayload, AnnotationRecord, AnnotationStore},
    error::{AnnoResult, AnnotationError},
    history::{ActionType, HistoryEntryView, HistoryFilter, HistoryLedger},
    media::{ImageCatalog, ImageResolver},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Annotation as posted by a caller
///
/// The viewer posts the annotation JSON-encoded inside a form field; API
/// clients may send the object inline.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AnnotationInput {
    Encoded(String),
    Inline(Value),
}

impl AnnotationInput {
    fn is_blank(&self) -> bool {
        match self {
            AnnotationInput::Encoded(raw) => raw.trim().is_empty(),
            AnnotationInput::Inline(value) => value.is_null(),
        }
    }

    fn into_payload(self) -> AnnoResult<AnnotationPayload> {
        match self {
            AnnotationInput::Encoded(raw) => AnnotationPayload::parse(&raw),
            AnnotationInput::Inline(value) => AnnotationPayload::from_value(value),
        }
    }
}

/// Add, update or delete request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRequest {
    #[serde(default)]
    pub annotation: Option<AnnotationInput>,

    /// Required for update and delete
    #[serde(default)]
    pub annotation_id: Option<String>,

    /// Image the caller believes owns the annotation; checked, never trusted
    #[serde(default)]
    pub image_id: Option<i64>,
}

impl MutationRequest {
    fn annotation_id(&self) -> Option<&str> {
        self.annotation_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn has_annotation(&self) -> bool {
        self.annotation.as_ref().is_some_and(|a| !a.is_blank())
    }
}

/// Result of a successful add
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOutcome {
    pub record_id: i64,
    pub history_logged: bool,
}

/// Result of a successful update or delete
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    pub history_logged: bool,
}

/// Validated mutation target
struct Resolved {
    external_id: String,
    image_id: i64,
    payload: AnnotationPayload,
}

#[derive(Clone)]
pub struct AnnotationService {
    store: AnnotationStore,
    ledger: HistoryLedger,
    catalog: ImageCatalog,
    resolver: ImageResolver,
}

impl AnnotationService {
    pub fn new(
        store: AnnotationStore,
        ledger: HistoryLedger,
        catalog: ImageCatalog,
        resolver: ImageResolver,
    ) -> Self {
        Self {
            store,
            ledger,
            catalog,
            resolver,
        }
    }

    /// All annotations on one image
    pub async fn annotations_for_image(&self, image_id: i64) -> AnnoResult<Vec<AnnotationRecord>> {
        self.store.list_by_image(image_id).await
    }

    /// Annotations on every image of a document, in collection order
    pub async fn annotations_for_document(
        &self,
        document_id: i64,
    ) -> AnnoResult<Vec<AnnotationRecord>> {
        let image_ids = self.catalog.document_images(document_id).await?;
        self.store.list_by_images(&image_ids).await
    }

    /// Create an annotation
    pub async fn add(&self, request: MutationRequest, actor_id: i64) -> AnnoResult<AddOutcome> {
        if !request.has_annotation() {
            return Err(AnnotationError::InvalidRequest(
                "Annotation data missing.".to_string(),
            ));
        }

        let target = self.validate(request, None).await?;
        let record = self
            .store
            .insert(&target.external_id, target.image_id, target.payload)
            .await?;

        let history_logged = self
            .ledger
            .record(
                &record.external_id,
                record.image_id,
                ActionType::Created,
                &record.payload,
                actor_id,
            )
            .await;

        tracing::info!(
            record_id = record.id,
            external_id = %record.external_id,
            image_id = record.image_id,
            actor_id,
            "annotation created"
        );

        Ok(AddOutcome {
            record_id: record.id,
            history_logged,
        })
    }

    /// Replace an existing annotation's payload
    pub async fn update(
        &self,
        request: MutationRequest,
        actor_id: i64,
    ) -> AnnoResult<MutationOutcome> {
        let annotation_id = required_annotation_id(&request)?;
        let target = self.validate(request, Some(annotation_id)).await?;

        let record = self
            .store
            .update(&target.external_id, target.image_id, target.payload)
            .await?;

        let history_logged = self
            .ledger
            .record(
                &record.external_id,
                record.image_id,
                ActionType::Updated,
                &record.payload,
                actor_id,
            )
            .await;

        tracing::info!(
            external_id = %record.external_id,
            image_id = record.image_id,
            actor_id,
            "annotation updated"
        );

        Ok(MutationOutcome { history_logged })
    }

    /// Remove an annotation; its history stays
    pub async fn delete(
        &self,
        request: MutationRequest,
        actor_id: i64,
    ) -> AnnoResult<MutationOutcome> {
        let annotation_id = required_annotation_id(&request)?;
        let target = self.validate(request, Some(annotation_id)).await?;

        let prior = self
            .store
            .delete(&target.external_id, target.image_id)
            .await?;

        let history_logged = self
            .ledger
            .record(
                &target.external_id,
                target.image_id,
                ActionType::Deleted,
                &prior,
                actor_id,
            )
            .await;

        tracing::info!(
            external_id = %target.external_id,
            image_id = target.image_id,
            actor_id,
            "annotation deleted"
        );

        Ok(MutationOutcome { history_logged })
    }

    /// History entries, newest first, with actor names
    pub async fn history(&self, filter: &HistoryFilter) -> AnnoResult<Vec<HistoryEntryView>> {
        self.ledger.query_with_actors(filter).await
    }

    /// Replace a document's ordered image collection
    pub async fn set_document_images(
        &self,
        document_id: i64,
        image_ids: &[i64],
    ) -> AnnoResult<Vec<i64>> {
        self.catalog.set_document_images(document_id, image_ids).await
    }

    pub async fn document_images(&self, document_id: i64) -> AnnoResult<Vec<i64>> {
        self.catalog.document_images(document_id).await
    }

    /// Register an image URL, optionally under the host system's id
    pub async fn register_image(&self, url: &str, image_id: Option<i64>) -> AnnoResult<i64> {
        match image_id {
            Some(id) => self.catalog.register_image_as(id, url).await,
            None => self.catalog.register_image(url).await,
        }
    }

    /// Parse the payload and resolve the image it targets
    ///
    /// `annotation_id` is the caller-supplied id for update and delete; the
    /// payload's own id must agree with it when present.
    async fn validate(
        &self,
        request: MutationRequest,
        annotation_id: Option<String>,
    ) -> AnnoResult<Resolved> {
        let hint = request.image_id;
        let payload = request
            .annotation
            .ok_or_else(|| AnnotationError::InvalidRequest("Annotation data missing.".to_string()))?
            .into_payload()?;

        let source = payload
            .source()
            .ok_or_else(|| {
                AnnotationError::InvalidRequest("Annotation target source URL missing.".to_string())
            })?
            .to_string();

        let external_id = match (annotation_id, payload.external_id()) {
            (Some(requested), Some(embedded)) if requested != embedded => {
                return Err(AnnotationError::InvalidRequest(format!(
                    "Annotation ID {} does not match annotation data.",
                    requested
                )));
            }
            (Some(requested), _) => requested,
            (None, Some(embedded)) => embedded.to_string(),
            (None, None) => {
                return Err(AnnotationError::InvalidRequest(
                    "Annotation ID missing.".to_string(),
                ));
            }
        };

        let image_id = self.resolver.resolve(&source).await?.ok_or_else(|| {
            AnnotationError::NotFound(format!(
                "Could not find image ID for source URL: {}",
                source
            ))
        })?;

        if let Some(expected) = hint {
            if expected != image_id {
                return Err(AnnotationError::InvalidRequest(format!(
                    "Annotation target does not belong to image ID: {}",
                    expected
                )));
            }
        }

        Ok(Resolved {
            external_id,
            image_id,
            payload,
        })
    }
}

fn required_annotation_id(request: &MutationRequest) -> AnnoResult<String> {
    match request.annotation_id() {
        Some(id) if request.has_annotation() => Ok(id.to_string()),
        _ => Err(AnnotationError::InvalidRequest(
            "Missing annotationId or annotation data.".to_string(),
        )),
    }
}
