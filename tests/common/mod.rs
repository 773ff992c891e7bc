#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, header},
    response::Response,
};
use doc_simplifier_backend::config::AppConfig;
use doc_simplifier_backend::services::processor::ScriptProcessor;
use doc_simplifier_backend::services::storage::LocalStorageService;
use doc_simplifier_backend::{AppState, create_app};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const BOUNDARY: &str = "----doc-simplifier-test-boundary";

pub struct TestApp {
    pub app: Router,
    pub dir: TempDir,
    pub config: AppConfig,
}

impl TestApp {
    /// App with a content dir under a temp dir and no simplification script on disk
    pub fn spawn() -> Self {
        Self::spawn_with(|_, _| {})
    }

    /// `customize` also receives the temp dir, for scripts and fixtures
    pub fn spawn_with(customize: impl FnOnce(&mut AppConfig, &Path)) -> Self {
        let dir = TempDir::new().expect("temp dir");

        let mut config = AppConfig::development();
        config.content_dir = dir.path().join("content");
        config.interpreter = "sh".to_string();
        config.script_path = dir.path().join("missing-script.sh");
        customize(&mut config, dir.path());

        let storage = Arc::new(LocalStorageService::new(
            config.content_dir.clone(),
            config.max_file_size,
        ));
        let processor = Arc::new(ScriptProcessor::from_config(&config));
        let state = AppState::new(config.clone(), storage, processor);

        Self {
            app: create_app(state),
            dir,
            config,
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.config.content_dir
    }

    /// Files currently in the content directory
    pub fn stored_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.content_dir()) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Writes an executable shell script into `dir` and returns its path
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    path
}

pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn file(filename: &'a str, content_type: &'a str, data: &'a [u8]) -> Self {
        Self {
            name: "file",
            filename: Some(filename),
            content_type: Some(content_type),
            data,
        }
    }

    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            filename: None,
            content_type: None,
            data: value.as_bytes(),
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes(),
            ),
        }
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/documents/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn simplify_request(payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/documents/simplify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn read_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}
