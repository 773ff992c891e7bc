use crate::AppState;
use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::KNOWN_ENDPOINTS;

#[derive(Serialize, ToSchema)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
    pub endpoints: Vec<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    /// Resident set size, when the platform exposes it
    pub rss_bytes: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Seconds since the server started
    pub uptime: f64,
    pub memory: MemoryUsage,
    pub environment: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct ApiTestResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service information", body = RootResponse)
    ),
    tag = "system"
)]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Document Simplifier API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        endpoints: KNOWN_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Process health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime: state.started_at.elapsed().as_secs_f64(),
        memory: MemoryUsage {
            rss_bytes: resident_memory_bytes().await,
        },
        environment: state.config.environment.as_str().to_string(),
        timestamp: Utc::now(),
    })
}

#[utoipa::path(
    get,
    path = "/api/test",
    responses(
        (status = 200, description = "Static probe", body = ApiTestResponse)
    ),
    tag = "system"
)]
pub async fn api_test() -> Json<ApiTestResponse> {
    Json(ApiTestResponse {
        success: true,
        message: "API is working".to_string(),
        timestamp: Utc::now(),
    })
}

/// Reads VmRSS from procfs; `None` where procfs is unavailable
async fn resident_memory_bytes() -> Option<u64> {
    let status = tokio::fs::read_to_string("/proc/self/status").await.ok()?;
    parse_vm_rss(&status)
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_rss() {
        let sample = "Name:\tdoc-simplifier\nVmPeak:\t  20000 kB\nVmRSS:\t   1234 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss(sample), Some(1234 * 1024));
        assert_eq!(parse_vm_rss("Name:\tx\n"), None);
    }
}
