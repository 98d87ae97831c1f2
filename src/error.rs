use thiserror::Error;

#[derive(Error, Debug)]
pub enum HectorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing data: {0}")]
    MissingData(&'static str),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid fail-under threshold {0}: must be between 0 and 100")]
    InvalidThreshold(i64),

    #[error("Environment variable {0} is required")]
    MissingEnv(&'static str),
}

pub type Result<T> = std::result::Result<T, HectorError>;
