/// HTTP server setup and routing
use crate::{
    api::middleware::{request_context, ACTOR_HEADER},
    context::AppContext,
    error::{AnnoResult, AnnotationError},
};
use axum::{
    http::{header, HeaderName, Method},
    middleware,
    response::IntoResponse,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
/// Returns Router<()> because state is already provided
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(ACTOR_HEADER)]);

    Router::new()
        .merge(crate::api::routes())
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        // Provide state - converts Router<AppContext> to Router<()>
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx, request_context))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Unknown routes get the same envelope as every other failure
async fn not_found() -> impl IntoResponse {
    AnnotationError::NotFound("Endpoint not found".to_string())
}

/// Known path, wrong method
async fn method_not_allowed() -> impl IntoResponse {
    AnnotationError::InvalidRequest("Method not allowed for this endpoint".to_string())
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> AnnoResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("annotation ledger listening on {}", addr);
    info!("   Service URL: {}", ctx.service_url());

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AnnotationError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| AnnotationError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
