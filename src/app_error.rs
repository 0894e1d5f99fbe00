use std::fmt::{Display, Formatter};

use chrono::ParseError as ChronoParseError;
use lmdb::Error as LmdbError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

/// Every failure the content layer can report.
///
/// Variants carry a human readable message so the admin surface can show it
/// directly in an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppError {
    TransportError(String),
    SerializationError(String),
    NotFound(String),
    ValidationError(String),
    BadRequest(String),
    StorageError(String),
    ConfigError(String),
    MissingTranslation(String),
    Cancelled(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::TransportError(msg) => write!(f, "Transport error: {}", msg),
            AppError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::MissingTranslation(key) => write!(f, "Missing translation: {}", key),
            AppError::Cancelled(msg) => write!(f, "Cancelled: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<SerdeError> for AppError {
    fn from(err: SerdeError) -> Self {
        AppError::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return AppError::SerializationError(format!("Malformed backend response: {}", err));
        }
        match err.status() {
            Some(status) => AppError::TransportError(format!("HTTP {}: {}", status, err)),
            None => AppError::TransportError(format!("Request failed: {}", err)),
        }
    }
}

impl From<LmdbError> for AppError {
    fn from(err: LmdbError) -> Self {
        match err {
            LmdbError::NotFound => AppError::NotFound("Key not found in preference store".to_string()),
            LmdbError::MapFull => AppError::StorageError("Preference store is full".to_string()),
            _ => AppError::StorageError(format!("LMDB error: {}", err)),
        }
    }
}

impl From<ChronoParseError> for AppError {
    fn from(err: ChronoParseError) -> Self {
        AppError::SerializationError(format!("Invalid timestamp: {}", err))
    }
}

impl AppError {
    /// True for failures of the backend call itself (network, auth, status).
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::TransportError(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }
}
