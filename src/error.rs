use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template bundle error: {0}")]
    Bundle(#[from] bincode::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid template name: {0:?}")]
    InvalidTemplateName(String),

    #[error("Malformed frame on line {line}: {reason}")]
    MalformedFrame { line: usize, reason: String },

    #[error("Frame resize failed: {0}")]
    Resize(String),

    #[error("Unknown gesture label: {0:?}")]
    UnknownGesture(String),
}

pub type Result<T> = std::result::Result<T, Error>;
