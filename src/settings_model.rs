//! Singleton settings documents.
//!
//! The backend stores each document as an untyped JSON value under a fixed
//! key; the shape is owned by this crate.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::app_error::AppError;
use crate::content_record::require_text;
use crate::fallback_data;

pub trait SettingsDocument:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KEY: &'static str;

    fn fallback() -> Self;

    fn validate(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Contact details shown in the header, footer and contact page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub whatsapp: String,
    pub email: String,
    pub instagram: String,
    pub maps_link: String,
    pub rating: f32,
}

impl BusinessInfo {
    /// Click-to-chat link built from the WhatsApp number.
    pub fn whatsapp_link(&self) -> String {
        let digits: String = self.whatsapp.chars().filter(char::is_ascii_digit).collect();
        format!("https://wa.me/{digits}")
    }
}

impl SettingsDocument for BusinessInfo {
    const KEY: &'static str = "business_info";

    fn fallback() -> Self {
        fallback_data::default_business_info()
    }

    fn validate(&self) -> Result<(), AppError> {
        require_text("Business name", &self.name)?;
        require_text("Phone", &self.phone)?;
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(AppError::validation(format!(
                "Business rating must be between 0 and 5, got {}",
                self.rating
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroCopy {
    pub tagline: String,
    pub title_line1: String,
    pub title_line2: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AboutCopy {
    pub title_start: String,
    pub title_highlight: String,
    pub description: String,
    pub years_experience: String,
    pub clients_count: String,
}

/// Editable hero and about copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteCopy {
    pub hero: HeroCopy,
    pub about: AboutCopy,
}

impl SettingsDocument for SiteCopy {
    const KEY: &'static str = "site_content";

    fn fallback() -> Self {
        fallback_data::default_site_copy()
    }

    fn validate(&self) -> Result<(), AppError> {
        require_text("Hero title", &self.hero.title_line1)?;
        require_text("About title", &self.about.title_start)
    }
}
