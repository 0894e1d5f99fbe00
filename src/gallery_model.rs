//! Gallery images.
//!
//! Every gallery record points at an object in the gallery bucket. The
//! category is free text on the backend; [`GalleryCategory`] only lists the
//! values the site offers as filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::app_error::AppError;
use crate::content_record::{require_text, row_id, row_text, row_timestamp, ContentRecord};
use crate::fallback_data;
use crate::remote_client::{ListOrder, Row, SortDirection, CREATED_AT_COLUMN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GalleryCategory {
    Wedding,
    Tent,
    Lighting,
    Party,
}

impl GalleryCategory {
    pub const ALL: [GalleryCategory; 4] = [
        GalleryCategory::Wedding,
        GalleryCategory::Tent,
        GalleryCategory::Lighting,
        GalleryCategory::Party,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GalleryCategory::Wedding => "Wedding",
            GalleryCategory::Tent => "Tent",
            GalleryCategory::Lighting => "Lighting",
            GalleryCategory::Party => "Party",
        }
    }

    /// Case-insensitive match against the filter labels.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(label))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryRecord {
    pub id: String,
    pub title: String,
    pub category: String,
    pub image_url: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryDraft {
    pub title: String,
    pub category: String,
    /// Filled in from the upload when the image is published alongside
    /// the record.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl GalleryDraft {
    pub fn new(title: impl Into<String>, category: impl Into<String>) -> Self {
        Self { title: title.into(), category: category.into(), image_url: None }
    }
}

impl GalleryRecord {
    pub fn category_kind(&self) -> Option<GalleryCategory> {
        GalleryCategory::from_label(&self.category)
    }
}

/// Records matching `filter`; `None` keeps everything.
pub fn filter_by_category(
    records: &[GalleryRecord],
    filter: Option<GalleryCategory>,
) -> Vec<GalleryRecord> {
    match filter {
        None => records.to_vec(),
        Some(wanted) => records
            .iter()
            .filter(|record| record.category_kind() == Some(wanted))
            .cloned()
            .collect(),
    }
}

impl ContentRecord for GalleryRecord {
    type Draft = GalleryDraft;

    const COLLECTION: &'static str = "gallery";
    const ORDER: ListOrder = ListOrder::by_insertion(SortDirection::Descending);

    fn id(&self) -> &str {
        &self.id
    }

    fn image_url(&self) -> Option<&str> {
        Some(&self.image_url)
    }

    fn from_row(row: &Row) -> Result<Self, AppError> {
        Ok(GalleryRecord {
            id: row_id(row)?,
            title: row_text(row, "title")?,
            category: row_text(row, "category")?,
            image_url: row_text(row, "image_url")?,
            created_at: row_timestamp(row, CREATED_AT_COLUMN)?,
        })
    }

    fn validate(draft: &GalleryDraft, asset_pending: bool) -> Result<(), AppError> {
        require_text("Gallery title", &draft.title)?;
        require_text("Gallery category", &draft.category)?;
        if asset_pending {
            return Ok(());
        }
        match &draft.image_url {
            Some(url) => require_text("Gallery image URL", url),
            None => Err(AppError::validation("Gallery records require an image")),
        }
    }

    fn to_draft(&self) -> GalleryDraft {
        GalleryDraft {
            title: self.title.clone(),
            category: self.category.clone(),
            image_url: Some(self.image_url.clone()),
        }
    }

    fn insert_fields(draft: &GalleryDraft) -> Row {
        let mut row = Row::new();
        row.insert("title".into(), JsonValue::String(draft.title.clone()));
        row.insert("category".into(), JsonValue::String(draft.category.clone()));
        if let Some(url) = &draft.image_url {
            row.insert("image_url".into(), JsonValue::String(url.clone()));
        }
        row
    }

    fn patch_fields(&self) -> Row {
        let mut row = Row::new();
        row.insert("title".into(), JsonValue::String(self.title.clone()));
        row.insert("category".into(), JsonValue::String(self.category.clone()));
        row.insert("image_url".into(), JsonValue::String(self.image_url.clone()));
        row
    }

    fn attach_image(draft: &mut GalleryDraft, url: String) -> Result<(), AppError> {
        draft.image_url = Some(url);
        Ok(())
    }

    fn fallback_dataset() -> Vec<Self> {
        fallback_data::default_gallery()
    }
}
