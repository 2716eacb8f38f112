/// Annotation Store - current-state annotation records
///
/// Holds exactly one row per annotation instance, keyed by the identifier
/// the client annotation tool generates and scoped to the owning image.

pub mod models;
pub mod payload;
pub mod store;

pub use models::AnnotationRecord;
pub use payload::{AnnotationBody, AnnotationPayload, AnnotationTarget, BodyField, TargetField};
pub use store::AnnotationStore;
