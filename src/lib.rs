pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::handlers::{documents, fallback, health};
use crate::config::AppConfig;
use crate::services::processor::DocumentProcessor;
use crate::services::storage::StorageService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Headroom on top of the file ceiling for multipart boundaries and headers
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::root,
        api::handlers::health::health_check,
        api::handlers::health::api_test,
        api::handlers::documents::documents_info,
        api::handlers::documents::documents_health,
        api::handlers::documents::list_documents,
        api::handlers::documents::upload_document,
        api::handlers::documents::simplify_document,
    ),
    components(
        schemas(
            api::error::ErrorBody,
            api::handlers::health::RootResponse,
            api::handlers::health::HealthResponse,
            api::handlers::health::MemoryUsage,
            api::handlers::health::ApiTestResponse,
            api::handlers::documents::UploadForm,
            api::handlers::documents::UploadResponse,
            api::handlers::documents::UploadData,
            api::handlers::documents::SimplifyResponse,
            api::handlers::documents::DocumentsInfoResponse,
            api::handlers::documents::DocumentsHealthResponse,
            api::handlers::documents::ProcessorStatus,
            api::handlers::documents::DemoDocument,
            api::handlers::documents::DocumentListResponse,
            models::ProcessingRequest,
        )
    ),
    tags(
        (name = "system", description = "Liveness and diagnostics"),
        (name = "documents", description = "Document upload and simplification")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageService>,
    pub processor: Arc<dyn DocumentProcessor>,
    pub config: AppConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn StorageService>,
        processor: Arc<dyn DocumentProcessor>,
    ) -> Self {
        Self {
            storage,
            processor,
            config,
            started_at: Instant::now(),
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .expose_headers([api::middleware::request_id::REQUEST_ID_HEADER.clone()])
}

pub fn create_app(state: AppState) -> Router {
    let environment = state.config.environment;
    let upload_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/api/test", get(health::api_test))
        .route("/documents", get(documents::documents_info))
        .route("/documents/health", get(documents::documents_health))
        .route("/documents/list", get(documents::list_documents))
        .route(
            "/documents/upload",
            post(documents::upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/documents/simplify", post(documents::simplify_document))
        .fallback(fallback::not_found)
        .layer(CatchPanicLayer::custom(move |panic| {
            fallback::panic_response(panic, environment)
        }))
        // Inside the request id layer so spans see the assigned id
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(&api::middleware::request_id::REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    tracing::info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors_layer(&state.config.allowed_origins))
        .with_state(state)
}
