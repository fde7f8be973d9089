use axum::{Router, middleware};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// HTTP 请求日志中间件
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let started = std::time::Instant::now();
    let response = next.run(request).await;

    tracing::info!(
        target: "http_access",
        request_id = %request_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "{} {} {}",
        method,
        uri,
        response.status()
    );

    response
}

/// Build the Axum router (without state)
pub fn routes(state: &ServerState) -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(crate::api::health::router())
        .merge(crate::api::orders::router())
        .merge(crate::api::locker::router())
        .merge(crate::api::telemetry::router())
        .merge(crate::api::inventory::router())
        .merge(crate::api::admin::router(state))
}

/// Full application: routes, state and the tower middleware stack
///
/// Outermost first: request id, trace, access log, compression, CORS.
pub fn build_app(state: ServerState) -> Router {
    routes(&state).with_state(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn(log_request))
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive()),
    )
}
