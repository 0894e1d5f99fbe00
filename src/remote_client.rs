//! The boundary to the hosted backend.
//!
//! Everything the content layer needs from the outside world goes through
//! [`RemoteCollectionClient`]: row-oriented collections, upsert-by-key settings
//! documents and a blob bucket. Implementations live in
//! [`crate::rest_backend`] and [`crate::memory_backend`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::app_error::AppError;

/// A single backend row, keyed by column name.
pub type Row = Map<String, JsonValue>;

/// Column every collection is ordered by.
pub const CREATED_AT_COLUMN: &str = "created_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_query(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOrder {
    pub column: &'static str,
    pub direction: SortDirection,
}

impl ListOrder {
    pub const fn by_insertion(direction: SortDirection) -> Self {
        Self { column: CREATED_AT_COLUMN, direction }
    }
}

/// Capability-typed facade over the hosted backend.
///
/// Write operations report every failure; callers decide whether it is
/// propagated or swallowed.
#[async_trait]
pub trait RemoteCollectionClient: Send + Sync {
    async fn list(&self, collection: &str, order: &ListOrder) -> Result<Vec<Row>, AppError>;

    /// Inserts `fields` and returns the row as the server stored it,
    /// including the server-assigned `id`.
    async fn insert(&self, collection: &str, fields: Row) -> Result<Row, AppError>;

    async fn update(&self, collection: &str, id: &str, patch: Row) -> Result<(), AppError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError>;

    /// Reads the settings document stored under `key`, `None` when absent.
    async fn fetch_setting(&self, key: &str) -> Result<Option<JsonValue>, AppError>;

    async fn upsert_setting(&self, key: &str, value: JsonValue) -> Result<(), AppError>;

    async fn upload_blob(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), AppError>;

    /// Derives the public URL of an object. Pure, never fails.
    fn public_url(&self, bucket: &str, key: &str) -> String;

    async fn remove_blobs(&self, bucket: &str, keys: &[String]) -> Result<(), AppError>;
}
