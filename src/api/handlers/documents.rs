use crate::AppState;
use crate::api::error::{AppError, ErrorBody};
use crate::models::{ProcessingRequest, StoredFile};
use crate::services::storage::{IncomingFile, StorageError};
use crate::utils::validation::{
    ALLOWED_EXTENSIONS, ValidationError, original_basename, resolve_mime_type, validate_extension,
};
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::MultipartError,
        rejection::JsonRejection,
    },
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use serde::Serialize;
use std::path::Path;
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

/// Multipart field that carries the document
pub const UPLOAD_FIELD: &str = "file";

/// OpenAPI description of the multipart form
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadData {
    pub upload_id: String,
    pub filename: String,
    pub original_name: String,
    pub file_path: String,
    pub size: u64,
    pub mimetype: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<StoredFile> for UploadData {
    fn from(file: StoredFile) -> Self {
        Self {
            upload_id: format!("upload_{}", file.stored_at.timestamp_millis()),
            filename: file.generated_name,
            original_name: file.original_name,
            file_path: file.absolute_path.display().to_string(),
            size: file.size_bytes,
            mimetype: file.mime_type,
            uploaded_at: file.stored_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub data: UploadData,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SimplifyResponse {
    pub success: bool,
    pub output: String,
    pub processed_at: DateTime<Utc>,
    pub file_processed: String,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentsInfoResponse {
    pub service: String,
    pub status: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProcessorStatus {
    pub available: bool,
    pub script: String,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentsHealthResponse {
    pub status: String,
    pub service: String,
    pub processor: ProcessorStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DemoDocument {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: u64,
    pub uploaded_at: String,
    pub status: String,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentListResponse {
    pub success: bool,
    pub documents: Vec<DemoDocument>,
    pub total: usize,
}

#[utoipa::path(
    get,
    path = "/documents",
    responses(
        (status = 200, description = "Document service information", body = DocumentsInfoResponse)
    ),
    tag = "documents"
)]
pub async fn documents_info() -> Json<DocumentsInfoResponse> {
    Json(DocumentsInfoResponse {
        service: "Document Service".to_string(),
        status: "active".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: [
            "GET /documents/health",
            "GET /documents/list",
            "POST /documents/upload",
            "POST /documents/simplify",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    })
}

#[utoipa::path(
    get,
    path = "/documents/health",
    responses(
        (status = 200, description = "Document service health", body = DocumentsHealthResponse)
    ),
    tag = "documents"
)]
pub async fn documents_health(State(state): State<AppState>) -> Json<DocumentsHealthResponse> {
    let available = state.processor.health_check().await;

    Json(DocumentsHealthResponse {
        status: if available { "ok" } else { "degraded" }.to_string(),
        service: "documents".to_string(),
        processor: ProcessorStatus {
            available,
            script: state.processor.describe(),
        },
        timestamp: Utc::now(),
    })
}

#[utoipa::path(
    get,
    path = "/documents/list",
    responses(
        (status = 200, description = "Demo document listing", body = DocumentListResponse)
    ),
    tag = "documents"
)]
pub async fn list_documents() -> Json<DocumentListResponse> {
    let documents = vec![
        DemoDocument {
            id: "doc_1".to_string(),
            name: "Sample Contract.pdf".to_string(),
            kind: "pdf".to_string(),
            size: 245_760,
            uploaded_at: "2024-01-15T10:30:00Z".to_string(),
            status: "processed".to_string(),
        },
        DemoDocument {
            id: "doc_2".to_string(),
            name: "Terms of Service.docx".to_string(),
            kind: "docx".to_string(),
            size: 102_400,
            uploaded_at: "2024-01-16T14:45:00Z".to_string(),
            status: "processed".to_string(),
        },
        DemoDocument {
            id: "doc_3".to_string(),
            name: "Meeting Notes.txt".to_string(),
            kind: "txt".to_string(),
            size: 8_192,
            uploaded_at: "2024-01-17T09:15:00Z".to_string(),
            status: "pending".to_string(),
        },
    ];

    Json(DocumentListResponse {
        success: true,
        total: documents.len(),
        documents,
    })
}

#[utoipa::path(
    post,
    path = "/documents/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "Document upload"),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "Missing, disallowed or oversized file", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    ),
    tag = "documents"
)]
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut stored: Option<StoredFile> = None;

    let result: Result<StoredFile, AppError> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(&e, state.config.max_file_size))?
        {
            let name = field.name().unwrap_or_default().to_string();

            // Plain form values are not part of the contract
            let Some(file_name) = field.file_name().map(str::to_string) else {
                continue;
            };

            if name != UPLOAD_FIELD {
                return Err(AppError::UploadFailed(format!(
                    "Unexpected file field '{}'",
                    name
                )));
            }
            if stored.is_some() {
                return Err(AppError::UploadFailed(
                    "Only one file may be uploaded per request".to_string(),
                ));
            }

            // 1. Extension check happens before any byte reaches disk
            let original_name = original_basename(&file_name);
            validate_extension(&original_name).map_err(|e| {
                tracing::warn!("Rejected upload '{}': {}", original_name, e);
                AppError::UploadFailed(validation_message(&e))
            })?;

            let mime_type = resolve_mime_type(&original_name, field.content_type());

            // 2. Stream to the content directory, enforcing the size ceiling
            let body_with_io_error = field.map_err(std::io::Error::other);
            let reader = StreamReader::new(body_with_io_error);

            let file = state
                .storage
                .store_stream(
                    IncomingFile {
                        field_name: &name,
                        original_name: &original_name,
                        mime_type: &mime_type,
                    },
                    Box::new(reader),
                )
                .await
                .map_err(|e| storage_error(e, &state))?;

            stored = Some(file);
        }

        stored.take().ok_or(AppError::NoFileUploaded)
    }
    .await;

    match result {
        Ok(file) => {
            tracing::info!(
                "📄 Upload accepted: {} -> {}",
                file.original_name,
                file.absolute_path.display()
            );
            Ok(Json(UploadResponse {
                success: true,
                data: file.into(),
            }))
        }
        Err(e) => {
            if let Some(orphan) = stored.take() {
                if let Err(cleanup) = state.storage.delete_file(&orphan.absolute_path).await {
                    tracing::warn!(
                        "Failed to remove {} after rejected upload: {}",
                        orphan.absolute_path.display(),
                        cleanup
                    );
                }
            }

            // Drain what is left so the client sees our JSON instead of a connection reset
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}

#[utoipa::path(
    post,
    path = "/documents/simplify",
    request_body = ProcessingRequest,
    responses(
        (status = 200, description = "Document simplified", body = SimplifyResponse),
        (status = 400, description = "Missing file path", body = ErrorBody),
        (status = 404, description = "File does not exist", body = ErrorBody),
        (status = 408, description = "Processing timed out", body = ErrorBody),
        (status = 500, description = "Processing failed or script unavailable", body = ErrorBody)
    ),
    tag = "documents"
)]
pub async fn simplify_document(
    State(state): State<AppState>,
    payload: Result<Json<ProcessingRequest>, JsonRejection>,
) -> Result<Json<SimplifyResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    let file_path = request
        .file_path
        .filter(|p| !p.trim().is_empty())
        .ok_or(AppError::FilePathRequired)?;

    tracing::info!("🧠 Simplification requested for {}", file_path);

    let result = state.processor.simplify(Path::new(&file_path)).await?;

    if !result.success {
        return Err(AppError::ProcessingFailed {
            message: "Document processing failed".to_string(),
            details: result.error_detail,
        });
    }

    Ok(Json(SimplifyResponse {
        success: true,
        output: result.output.unwrap_or_default(),
        processed_at: Utc::now(),
        file_processed: result.processed_file_name,
    }))
}

fn too_large_message(max_file_size: usize) -> String {
    format!(
        "File size exceeds the {} MB limit",
        max_file_size / 1024 / 1024
    )
}

fn multipart_error(e: &MultipartError, max_file_size: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::FileTooLarge(too_large_message(max_file_size))
    } else {
        AppError::UploadFailed(e.body_text())
    }
}

fn storage_error(e: StorageError, state: &AppState) -> AppError {
    match e {
        StorageError::TooLarge { limit } => AppError::FileTooLarge(too_large_message(limit)),
        StorageError::Body(io_err) => {
            match io_err
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<MultipartError>())
            {
                Some(multipart) => multipart_error(multipart, state.config.max_file_size),
                None => AppError::UploadFailed(io_err.to_string()),
            }
        }
        StorageError::Io(io_err) => AppError::internal(io_err, state.config.environment),
    }
}

fn validation_message(e: &anyhow::Error) -> String {
    e.downcast_ref::<ValidationError>()
        .map(|v| v.message.clone())
        .unwrap_or_else(|| {
            format!(
                "Invalid file type. Allowed extensions: {}",
                ALLOWED_EXTENSIONS.join(", ")
            )
        })
}

