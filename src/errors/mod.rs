use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // Delta filtering errors
    #[error("Invalid last-run timestamp: {0}")]
    InvalidTimestamp(String),

    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MirrorResult<T> = Result<T, MirrorError>;
