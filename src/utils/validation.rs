use anyhow::{Result, anyhow};
use rand::Rng;
use std::path::Path;

/// Extensions accepted by the upload endpoint, compared case-insensitively
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt"];

/// MIME types implied by each allowed extension
const EXTENSION_MIME_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("txt", "text/plain"),
];

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Lowercased extension of `filename`, if any
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// Rejects anything that is not a PDF, Word or plain-text document
pub fn validate_extension(filename: &str) -> Result<()> {
    match file_extension(filename) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(anyhow!(ValidationError {
            code: "INVALID_FILE_TYPE",
            message: "Invalid file type. Only PDF, DOC, DOCX, and TXT files are allowed."
                .to_string(),
        })),
    }
}

/// Picks the declared content type when it parses, otherwise derives one from the extension
pub fn resolve_mime_type(filename: &str, content_type: Option<&str>) -> String {
    if let Some(parsed) = content_type.and_then(|ct| ct.parse::<mime::Mime>().ok()) {
        return parsed.essence_str().to_string();
    }

    file_extension(filename)
        .and_then(|ext| {
            EXTENSION_MIME_TYPES
                .iter()
                .find(|(e, _)| *e == ext)
                .map(|(_, m)| m.to_string())
        })
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.essence_str().to_string())
}

/// Strips any client-supplied directory components from an upload name
pub fn original_basename(filename: &str) -> String {
    let normalized = filename.replace('\\', "/");
    normalized
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("unnamed")
        .to_string()
}

/// Builds `<field>-<millis>-<random><.ext>`, keeping the original extension as written
pub fn generate_stored_name(field_name: &str, original_name: &str, now_millis: i64) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let extension = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    format!("{}-{}-{}{}", field_name, now_millis, suffix, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_validate_extension() {
        assert!(validate_extension("report.pdf").is_ok());
        assert!(validate_extension("notes.TXT").is_ok());
        assert!(validate_extension("letter.doc").is_ok());
        assert!(validate_extension("letter.docx").is_ok());

        assert!(validate_extension("malware.exe").is_err());
        assert!(validate_extension("archive.zip").is_err());
        assert!(validate_extension("no_extension").is_err());
        assert!(validate_extension("pdf").is_err());
    }

    #[test]
    fn test_validate_extension_error_code() {
        let err = validate_extension("virus.exe").unwrap_err();
        let validation = err.downcast_ref::<ValidationError>().unwrap();
        assert_eq!(validation.code, "INVALID_FILE_TYPE");
    }

    #[test]
    fn test_resolve_mime_type() {
        assert_eq!(
            resolve_mime_type("a.txt", Some("text/plain; charset=utf-8")),
            "text/plain"
        );
        assert_eq!(resolve_mime_type("a.pdf", None), "application/pdf");
        assert_eq!(resolve_mime_type("a.DOC", Some("not a mime")), "application/msword");
        assert_eq!(resolve_mime_type("a", None), "application/octet-stream");
    }

    #[test]
    fn test_original_basename() {
        assert_eq!(original_basename("report.pdf"), "report.pdf");
        assert_eq!(original_basename("../../etc/passwd.txt"), "passwd.txt");
        assert_eq!(original_basename("C:\\docs\\memo.docx"), "memo.docx");
        assert_eq!(original_basename("dir/"), "unnamed");
    }

    #[test]
    fn test_generate_stored_name_format() {
        let name = generate_stored_name("file", "Quarterly Report.PDF", 1_700_000_000_000);
        assert!(name.starts_with("file-1700000000000-"));
        assert!(name.ends_with(".PDF"));

        let without_ext = generate_stored_name("file", "README", 1);
        assert!(without_ext.starts_with("file-1-"));
        assert!(!without_ext.contains('.'));
    }

    #[test]
    fn test_generate_stored_name_unique_within_same_millisecond() {
        let names: HashSet<String> = (0..200)
            .map(|_| generate_stored_name("file", "a.txt", 42))
            .collect();
        assert_eq!(names.len(), 200);
    }
}
