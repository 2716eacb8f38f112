/// Request-scoped actor and request id middleware
use crate::{context::AppContext, directory::ANONYMOUS_ACTOR};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// Header carrying the acting user's id, set by the fronting content system
pub const ACTOR_HEADER: &str = "x-actor-id";

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request state, created fresh for every request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
    /// 0 for anonymous callers
    pub actor_id: i64,
}

/// Extract the actor id from headers
///
/// Missing, malformed or negative values mean an anonymous actor.
pub fn extract_actor_id(headers: &HeaderMap) -> i64 {
    headers
        .get(ACTOR_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .unwrap_or(ANONYMOUS_ACTOR)
}

/// Attach a `RequestContext` to the request and tag the response with its id
pub async fn request_context(
    State(ctx): State<AppContext>,
    mut req: Request,
    next: Next,
) -> Response {
    let actor_id = if ctx.config.actors.trust_actor_header {
        extract_actor_id(req.headers())
    } else {
        ANONYMOUS_ACTOR
    };

    let request = RequestContext {
        request_id: Uuid::new_v4(),
        actor_id,
    };
    req.extensions_mut().insert(request);

    let span = tracing::info_span!(
        "request",
        request_id = %request.request_id,
        actor_id = request.actor_id
    );
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&request.request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
