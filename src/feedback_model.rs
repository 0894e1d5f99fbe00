use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::app_error::AppError;
use crate::content_record::{require_text, row_id, row_text, row_timestamp, ContentRecord};
use crate::fallback_data;
use crate::remote_client::{ListOrder, Row, SortDirection, CREATED_AT_COLUMN};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// A customer testimonial. `text` is stored in the `message` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub id: String,
    pub name: String,
    pub rating: u8,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackDraft {
    pub name: String,
    pub rating: u8,
    pub text: String,
}

impl FeedbackDraft {
    pub fn new(name: impl Into<String>, rating: u8, text: impl Into<String>) -> Self {
        Self { name: name.into(), rating, text: text.into() }
    }
}

impl FeedbackRecord {
    /// Short month and year, e.g. "Dec 2023". Empty when the server sent no
    /// timestamp.
    pub fn display_date(&self) -> String {
        self.created_at
            .map(|at| at.format("%b %Y").to_string())
            .unwrap_or_default()
    }
}

/// Mean rating of `records`, `None` for an empty slice.
pub fn average_rating(records: &[FeedbackRecord]) -> Option<f32> {
    if records.is_empty() {
        return None;
    }
    let total: u32 = records.iter().map(|r| u32::from(r.rating)).sum();
    Some(total as f32 / records.len() as f32)
}

fn row_rating(row: &Row) -> Result<u8, AppError> {
    let rating = row
        .get("rating")
        .and_then(JsonValue::as_u64)
        .ok_or_else(|| AppError::SerializationError("Row has no numeric rating".to_string()))?;
    u8::try_from(rating)
        .ok()
        .filter(|r| (MIN_RATING..=MAX_RATING).contains(r))
        .ok_or_else(|| AppError::SerializationError(format!("Rating {rating} out of range")))
}

impl ContentRecord for FeedbackRecord {
    type Draft = FeedbackDraft;

    const COLLECTION: &'static str = "feedback";
    const ORDER: ListOrder = ListOrder::by_insertion(SortDirection::Descending);

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> Result<Self, AppError> {
        Ok(FeedbackRecord {
            id: row_id(row)?,
            name: row_text(row, "name")?,
            rating: row_rating(row)?,
            text: row_text(row, "message")?,
            created_at: row_timestamp(row, CREATED_AT_COLUMN)?,
        })
    }

    fn validate(draft: &FeedbackDraft, _asset_pending: bool) -> Result<(), AppError> {
        require_text("Name", &draft.name)?;
        require_text("Feedback message", &draft.text)?;
        if !(MIN_RATING..=MAX_RATING).contains(&draft.rating) {
            return Err(AppError::validation(format!(
                "Rating must be between {MIN_RATING} and {MAX_RATING}, got {}",
                draft.rating
            )));
        }
        Ok(())
    }

    fn to_draft(&self) -> FeedbackDraft {
        FeedbackDraft { name: self.name.clone(), rating: self.rating, text: self.text.clone() }
    }

    fn insert_fields(draft: &FeedbackDraft) -> Row {
        let mut row = Row::new();
        row.insert("name".into(), JsonValue::String(draft.name.clone()));
        row.insert("rating".into(), JsonValue::from(draft.rating));
        row.insert("message".into(), JsonValue::String(draft.text.clone()));
        row
    }

    fn patch_fields(&self) -> Row {
        Self::insert_fields(&self.to_draft())
    }

    fn fallback_dataset() -> Vec<Self> {
        fallback_data::default_testimonials()
    }
}
