//! Error types for the CNPJ importer

use thiserror::Error;

/// Result type alias for importer operations
pub type Result<T> = std::result::Result<T, CnpjError>;

/// Main error type for the CNPJ importer
#[derive(Error, Debug)]
pub enum CnpjError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid CNPJ: {0}")]
    InvalidCnpj(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
