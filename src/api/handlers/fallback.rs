use axum::{
    Json,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::any::Any;

use super::KNOWN_ENDPOINTS;
use crate::api::error::ErrorBody;
use crate::config::Environment;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotFoundBody {
    success: bool,
    error: &'static str,
    message: String,
    available_endpoints: &'static [&'static str],
}

pub async fn not_found(method: Method, uri: Uri) -> Response {
    tracing::debug!("No route for {} {}", method, uri.path());

    let body = NotFoundBody {
        success: false,
        error: "NOT_FOUND",
        message: format!("Route {} {} not found", method, uri.path()),
        available_endpoints: KNOWN_ENDPOINTS,
    };

    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// Converts a handler panic into the standard 500 body
pub fn panic_response(panic: Box<dyn Any + Send + 'static>, environment: Environment) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    };

    tracing::error!("💥 Handler panicked: {}", detail);

    let message = if environment.is_production() {
        "Internal server error".to_string()
    } else {
        detail
    };

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("INTERNAL_ERROR", message, None)),
    )
        .into_response()
}
