pub mod documents;
pub mod fallback;
pub mod health;

/// Routes advertised by `/` and by the 404 fallback
pub const KNOWN_ENDPOINTS: &[&str] = &[
    "GET /",
    "GET /health",
    "GET /documents",
    "GET /documents/health",
    "GET /documents/list",
    "POST /documents/upload",
    "POST /documents/simplify",
    "GET /api/test",
];
