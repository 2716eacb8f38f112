/// Typed annotation document
///
/// Only the fields the service acts on are modelled; everything else the
/// annotation tool sends (selectors, context, motivation, ...) is carried
/// through untouched in the flattened remainders.
use crate::{
    error::{AnnoResult, AnnotationError},
    sanitize::Sanitizer,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Annotation payload as submitted by the viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPayload {
    /// Client-generated identifier; only a string counts as an id
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    #[serde(default, deserialize_with = "present_target", skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetField>,

    #[serde(default, deserialize_with = "present_body", skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyField>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Annotation target: an object carrying `source`, or anything else kept as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetField {
    Object(AnnotationTarget),
    Other(Value),
}

/// Target object; `source` is the public URL of the annotated image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationTarget {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Annotation body: a list of bodies, a single body, or an opaque value
/// such as a bare IRI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodyField {
    Many(Vec<AnnotationBody>),
    One(AnnotationBody),
    Other(Value),
}

/// One annotation body; a string `value` is the rich-text comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationBody {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// A field that is present is `Some`, even when it holds `null`, so the
// stored document keeps exactly the keys the client sent.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

fn present_target<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<TargetField>, D::Error> {
    TargetField::deserialize(deserializer).map(Some)
}

fn present_body<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<BodyField>, D::Error> {
    BodyField::deserialize(deserializer).map(Some)
}

fn non_blank(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl AnnotationPayload {
    /// Parse a JSON-encoded annotation
    pub fn parse(raw: &str) -> AnnoResult<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| AnnotationError::InvalidRequest(format!("Invalid JSON data: {}", e)))?;
        Self::from_value(value)
    }

    /// Convert an already-decoded JSON value; it must be an object
    pub fn from_value(value: Value) -> AnnoResult<Self> {
        if !value.is_object() {
            return Err(AnnotationError::InvalidRequest(
                "Annotation data must be a JSON object.".to_string(),
            ));
        }
        serde_json::from_value(value)
            .map_err(|e| AnnotationError::InvalidRequest(format!("Invalid JSON data: {}", e)))
    }

    /// Client identifier, if it is a non-blank string
    pub fn external_id(&self) -> Option<&str> {
        non_blank(self.id.as_ref())
    }

    /// Target image URL, if `target.source` is a non-blank string
    pub fn source(&self) -> Option<&str> {
        match &self.target {
            Some(TargetField::Object(target)) => non_blank(target.source.as_ref()),
            _ => None,
        }
    }

    fn bodies(&self) -> &[AnnotationBody] {
        match &self.body {
            Some(BodyField::Many(bodies)) => bodies,
            Some(BodyField::One(body)) => std::slice::from_ref(body),
            Some(BodyField::Other(_)) | None => &[],
        }
    }

    /// Iterate over the string body values
    pub fn body_values(&self) -> impl Iterator<Item = &str> {
        self.bodies()
            .iter()
            .filter_map(|b| b.value.as_ref().and_then(Value::as_str))
    }

    /// Sanitize every string body value in place; other values are left alone
    pub fn sanitize_bodies(&mut self, sanitizer: &dyn Sanitizer) {
        let bodies: &mut [AnnotationBody] = match &mut self.body {
            Some(BodyField::Many(bodies)) => bodies,
            Some(BodyField::One(body)) => std::slice::from_mut(body),
            Some(BodyField::Other(_)) | None => &mut [],
        };

        for body in bodies {
            if let Some(Value::String(value)) = body.value.as_mut() {
                *value = sanitizer.sanitize(value);
            }
        }
    }

    /// Serialize to the stored JSON text
    pub fn to_json(&self) -> AnnoResult<String> {
        serde_json::to_string(self)
            .map_err(|e| AnnotationError::Internal(format!("Failed to serialize annotation: {}", e)))
    }

    /// Serialize to a JSON value
    pub fn to_value(&self) -> AnnoResult<Value> {
        serde_json::to_value(self)
            .map_err(|e| AnnotationError::Internal(format!("Failed to serialize annotation: {}", e)))
    }
}
