//! The contract a record type fulfils to be mirrored by a
//! [`ContentStore`](crate::content_store::ContentStore).
//!
//! A record type names its backend collection, its listing order, how it maps
//! to and from backend rows, how a draft is validated, and which dataset to
//! show when the collection cannot provide one.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::app_error::AppError;
use crate::remote_client::{ListOrder, Row};

pub trait ContentRecord: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Fields supplied by the admin when creating a record; no id.
    type Draft: Clone + Debug + Send + Sync;

    const COLLECTION: &'static str;
    const ORDER: ListOrder;

    fn id(&self) -> &str;

    fn image_url(&self) -> Option<&str> {
        None
    }

    fn from_row(row: &Row) -> Result<Self, AppError>;

    /// Checks required fields. `asset_pending` is true when an upload will
    /// supply the image URL before the insert.
    fn validate(draft: &Self::Draft, asset_pending: bool) -> Result<(), AppError>;

    fn to_draft(&self) -> Self::Draft;

    fn insert_fields(draft: &Self::Draft) -> Row;

    /// Mutable fields of an existing record, sent as a patch keyed by id.
    fn patch_fields(&self) -> Row;

    fn attach_image(_draft: &mut Self::Draft, _url: String) -> Result<(), AppError> {
        Err(AppError::BadRequest(format!(
            "Collection '{}' does not reference uploaded images",
            Self::COLLECTION
        )))
    }

    fn fallback_dataset() -> Vec<Self>;
}

/// Reads the row id. Numeric ids are normalized to their decimal string.
pub(crate) fn row_id(row: &Row) -> Result<String, AppError> {
    match row.get("id") {
        Some(JsonValue::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(JsonValue::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(AppError::SerializationError(format!("Unsupported id value: {other}"))),
        None => Err(AppError::SerializationError("Row has no id".to_string())),
    }
}

pub(crate) fn row_text(row: &Row, column: &str) -> Result<String, AppError> {
    match row.get(column) {
        Some(JsonValue::String(s)) => Ok(s.clone()),
        Some(JsonValue::Null) | None => Err(AppError::SerializationError(format!(
            "Row is missing column '{column}'"
        ))),
        Some(other) => Err(AppError::SerializationError(format!(
            "Column '{column}' is not text: {other}"
        ))),
    }
}

/// Text column that may be absent, null or blank.
pub(crate) fn row_optional_text(row: &Row, column: &str) -> Option<String> {
    match row.get(column) {
        Some(JsonValue::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

pub(crate) fn row_timestamp(row: &Row, column: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    match row.get(column) {
        Some(JsonValue::String(raw)) => {
            let parsed = DateTime::parse_from_rfc3339(raw)?;
            Ok(Some(parsed.with_timezone(&Utc)))
        }
        _ => Ok(None),
    }
}

pub(crate) fn optional_json(value: &Option<String>) -> JsonValue {
    match value {
        Some(s) => JsonValue::String(s.clone()),
        None => JsonValue::Null,
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}
