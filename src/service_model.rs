//! Services offered by the business.
//!
//! A service is shown either with an uploaded image or, when none is set,
//! with an icon from the fixed [`ServiceIcon`] registry. The icon name is
//! stored as free text in the `icon` column and never validated remotely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::app_error::AppError;
use crate::content_record::{
    optional_json, require_text, row_id, row_optional_text, row_text, row_timestamp,
    ContentRecord,
};
use crate::fallback_data;
use crate::remote_client::{ListOrder, Row, SortDirection, CREATED_AT_COLUMN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceIcon {
    Tent,
    Flower2,
    Lightbulb,
    Music,
    Utensils,
    CalendarDays,
    Star,
    Crown,
    Heart,
    Camera,
    Gift,
    Truck,
}

impl ServiceIcon {
    pub const ALL: [ServiceIcon; 12] = [
        ServiceIcon::Tent,
        ServiceIcon::Flower2,
        ServiceIcon::Lightbulb,
        ServiceIcon::Music,
        ServiceIcon::Utensils,
        ServiceIcon::CalendarDays,
        ServiceIcon::Star,
        ServiceIcon::Crown,
        ServiceIcon::Heart,
        ServiceIcon::Camera,
        ServiceIcon::Gift,
        ServiceIcon::Truck,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ServiceIcon::Tent => "Tent",
            ServiceIcon::Flower2 => "Flower2",
            ServiceIcon::Lightbulb => "Lightbulb",
            ServiceIcon::Music => "Music",
            ServiceIcon::Utensils => "Utensils",
            ServiceIcon::CalendarDays => "CalendarDays",
            ServiceIcon::Star => "Star",
            ServiceIcon::Crown => "Crown",
            ServiceIcon::Heart => "Heart",
            ServiceIcon::Camera => "Camera",
            ServiceIcon::Gift => "Gift",
            ServiceIcon::Truck => "Truck",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|icon| icon.name() == name)
    }
}

/// What the presentation layer should draw for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceVisual<'a> {
    Image(&'a str),
    Icon(ServiceIcon),
    UnknownIcon(&'a str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon_name: String,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDraft {
    pub title: String,
    pub description: String,
    pub icon_name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl ServiceDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>, icon: ServiceIcon) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            icon_name: icon.name().to_string(),
            image_url: None,
            category: None,
        }
    }
}

impl ServiceRecord {
    pub fn visual(&self) -> ServiceVisual<'_> {
        if let Some(url) = self.image_url.as_deref() {
            return ServiceVisual::Image(url);
        }
        match ServiceIcon::from_name(&self.icon_name) {
            Some(icon) => ServiceVisual::Icon(icon),
            None => ServiceVisual::UnknownIcon(&self.icon_name),
        }
    }
}

impl ContentRecord for ServiceRecord {
    type Draft = ServiceDraft;

    const COLLECTION: &'static str = "services";
    const ORDER: ListOrder = ListOrder::by_insertion(SortDirection::Ascending);

    fn id(&self) -> &str {
        &self.id
    }

    fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    fn from_row(row: &Row) -> Result<Self, AppError> {
        Ok(ServiceRecord {
            id: row_id(row)?,
            title: row_text(row, "title")?,
            description: row_optional_text(row, "description").unwrap_or_default(),
            icon_name: row_optional_text(row, "icon")
                .unwrap_or_else(|| ServiceIcon::Tent.name().to_string()),
            image_url: row_optional_text(row, "image_url"),
            category: row_optional_text(row, "category"),
            created_at: row_timestamp(row, CREATED_AT_COLUMN)?,
        })
    }

    fn validate(draft: &ServiceDraft, _asset_pending: bool) -> Result<(), AppError> {
        require_text("Service title", &draft.title)?;
        require_text("Service description", &draft.description)
    }

    fn to_draft(&self) -> ServiceDraft {
        ServiceDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            icon_name: self.icon_name.clone(),
            image_url: self.image_url.clone(),
            category: self.category.clone(),
        }
    }

    fn insert_fields(draft: &ServiceDraft) -> Row {
        let mut row = Row::new();
        row.insert("title".into(), JsonValue::String(draft.title.clone()));
        row.insert("description".into(), JsonValue::String(draft.description.clone()));
        row.insert("icon".into(), JsonValue::String(draft.icon_name.clone()));
        if let Some(url) = &draft.image_url {
            row.insert("image_url".into(), JsonValue::String(url.clone()));
        }
        if let Some(category) = &draft.category {
            row.insert("category".into(), JsonValue::String(category.clone()));
        }
        row
    }

    fn patch_fields(&self) -> Row {
        let mut row = Row::new();
        row.insert("title".into(), JsonValue::String(self.title.clone()));
        row.insert("description".into(), JsonValue::String(self.description.clone()));
        row.insert("icon".into(), JsonValue::String(self.icon_name.clone()));
        row.insert("image_url".into(), optional_json(&self.image_url));
        row.insert("category".into(), optional_json(&self.category));
        row
    }

    fn attach_image(draft: &mut ServiceDraft, url: String) -> Result<(), AppError> {
        draft.image_url = Some(url);
        Ok(())
    }

    fn fallback_dataset() -> Vec<Self> {
        fallback_data::default_services()
    }
}
