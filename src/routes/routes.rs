//! Defines the gateway's HTTP surface.
//!
//! ## Structure
//! - **Object endpoints**
//!   - `POST /store/{filename}` — legacy upload, key `{date}/{filename}.ttl`
//!   - `PUT  /store/{*path}` — upload under `path`
//!   - `GET  /store/{*path}` — download (HEAD answered automatically)
//!   - `GET  /signed/{*path}` — presigned download URL, valid 30 minutes
//!
//! - **Probes**
//!   - `GET /healthz`, `GET /readyz`
//!
//! The wildcard `*path` allows nested keys like `models/2025/graph.ttl`.
//! Every route answers with the body as plain text on success; failures
//! are rendered by `GatewayError`.

use crate::{
    errors::GatewayError,
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{download_object, presigned_url, upload_by_filename, upload_by_path},
    },
    services::storage_service::StorageService,
};
use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::{HeaderName, HeaderValue, Method, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::any::Any as PanicPayload;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

/// Build the route table.
///
/// `POST` and `PUT` share the `/store/{*path}` wildcard; the legacy handler
/// rejects anything that is not a single segment.
pub fn routes() -> Router<StorageService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/store/{*path}",
            get(download_object)
                .put(upload_by_path)
                .post(upload_by_filename),
        )
        .route("/signed/{*path}", get(presigned_url))
}

/// Routes plus state and the HTTP plumbing: CORS, default headers,
/// panic recovery and request tracing.
pub fn app(service: StorageService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::OPTIONS,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    routes()
        .with_state(service)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-engine"),
            HeaderValue::from_static("store-gateway"),
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request| {
                let method = req.method();
                let uri = req.uri();
                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched_path| matched_path.as_str());

                tracing::info_span!("request", %method, %uri, matched_path)
            }),
        )
}

/// A panicking handler still answers: 500 with the panic message attached.
fn panic_response(payload: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    GatewayError::Unhandled(anyhow::anyhow!("handler panicked: {}", message)).into_response()
}
