use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum accepted upload size: 10 MiB
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Wall-clock budget for one simplification run
pub const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parses `APP_ENV`; anything other than "production"/"prod" is development
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// Runtime configuration for the document service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listening port (default: 10000)
    pub port: u16,

    /// Deployment environment, controls error verbosity (default: development)
    pub environment: Environment,

    /// Directory uploaded documents are written to (default: "content")
    pub content_dir: PathBuf,

    /// Maximum file size in bytes (default: 10 MiB)
    pub max_file_size: usize,

    /// Program used to run the simplification script (default: "python3")
    pub interpreter: String,

    /// Path of the external simplification script
    pub script_path: PathBuf,

    /// Hard deadline for one simplification run (default: 30s)
    pub processing_timeout: Duration,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 10000,
            environment: Environment::Development,
            content_dir: PathBuf::from("content"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            interpreter: "python3".to_string(),
            script_path: PathBuf::from("scripts/simplify.py"),
            processing_timeout: Duration::from_secs(DEFAULT_PROCESSING_TIMEOUT_SECS),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            environment: env::var("APP_ENV")
                .map(|v| Environment::parse(&v))
                .unwrap_or(default.environment),

            content_dir: env::var("CONTENT_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.content_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            interpreter: env::var("SIMPLIFY_INTERPRETER").unwrap_or(default.interpreter),

            script_path: env::var("SIMPLIFY_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or(default.script_path),

            processing_timeout: env::var("PROCESSING_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.processing_timeout),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (verbose errors, local origins)
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            ..Self::default()
        }
    }

    /// Create config for production (internal causes hidden)
    pub fn production() -> Self {
        let default = Self::default();
        Self {
            environment: Environment::Production,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins.clone()),
            ..default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, 10000);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.processing_timeout, Duration::from_secs(30));
        assert_eq!(config.content_dir, PathBuf::from("content"));
        assert!(!config.environment.is_production());
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.environment.as_str(), "development");
    }

    #[test]
    fn test_production_config() {
        let config = AppConfig::production();
        assert!(config.environment.is_production());
        assert!(!config.allowed_origins.contains(&"*".to_string()));
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse(" PROD "), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
    }
}
