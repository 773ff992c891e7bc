use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use utoipa::ToSchema;

/// A document persisted to the content directory by an upload
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub generated_name: String,
    pub original_name: String,
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
    pub mime_type: String,
    pub stored_at: DateTime<Utc>,
}

/// Body of `POST /documents/simplify`
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRequest {
    pub file_path: Option<String>,
}

/// Outcome of one completed run of the external program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingResult {
    pub success: bool,
    pub output: Option<String>,
    pub error_detail: Option<String>,
    pub processed_file_name: String,
}

impl ProcessingResult {
    pub fn succeeded(output: String, processed_file_name: String) -> Self {
        Self {
            success: true,
            output: Some(output),
            error_detail: None,
            processed_file_name,
        }
    }

    pub fn failed(error_detail: String, processed_file_name: String) -> Self {
        Self {
            success: false,
            output: None,
            error_detail: Some(error_detail),
            processed_file_name,
        }
    }
}
