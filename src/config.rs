use std::env;
use std::path::PathBuf;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app_error::AppError;

pub const URL_VAR: &str = "CONTENT_BACKEND_URL";
pub const ANON_KEY_VAR: &str = "CONTENT_BACKEND_ANON_KEY";
pub const GALLERY_BUCKET_VAR: &str = "CONTENT_GALLERY_BUCKET";
pub const SERVICES_BUCKET_VAR: &str = "CONTENT_SERVICES_BUCKET";
pub const SETTINGS_TABLE_VAR: &str = "CONTENT_SETTINGS_TABLE";
pub const PREFS_PATH_VAR: &str = "CONTENT_PREFS_PATH";

const DEFAULT_GALLERY_BUCKET: &str = "gallery-images";
const DEFAULT_SERVICES_BUCKET: &str = "service-images";
const DEFAULT_SETTINGS_TABLE: &str = "settings";
const DEFAULT_PREFS_PATH: &str = "content_prefs";

fn default_gallery_bucket() -> String {
    DEFAULT_GALLERY_BUCKET.to_string()
}

fn default_services_bucket() -> String {
    DEFAULT_SERVICES_BUCKET.to_string()
}

fn default_settings_table() -> String {
    DEFAULT_SETTINGS_TABLE.to_string()
}

fn default_prefs_path() -> PathBuf {
    PathBuf::from(DEFAULT_PREFS_PATH)
}

/// Where the hosted backend lives and how its resources are named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    #[serde(default = "default_gallery_bucket")]
    pub gallery_bucket: String,
    #[serde(default = "default_services_bucket")]
    pub services_bucket: String,
    #[serde(default = "default_settings_table")]
    pub settings_table: String,
    #[serde(default = "default_prefs_path")]
    pub prefs_path: PathBuf,
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            gallery_bucket: default_gallery_bucket(),
            services_bucket: default_services_bucket(),
            settings_table: default_settings_table(),
            prefs_path: default_prefs_path(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, e.g. the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| {
                    warn!("Environment variable {key} not found");
                    AppError::ConfigError(format!("{key} must be set"))
                })
        };
        let optional = |key: &str, default: &str| {
            lookup(key).filter(|value| !value.trim().is_empty()).unwrap_or_else(|| {
                info!("{key} not set, using default: {default}");
                default.to_string()
            })
        };

        let config = Self {
            url: required(URL_VAR)?,
            anon_key: required(ANON_KEY_VAR)?,
            gallery_bucket: optional(GALLERY_BUCKET_VAR, DEFAULT_GALLERY_BUCKET),
            services_bucket: optional(SERVICES_BUCKET_VAR, DEFAULT_SERVICES_BUCKET),
            settings_table: optional(SETTINGS_TABLE_VAR, DEFAULT_SETTINGS_TABLE),
            prefs_path: PathBuf::from(optional(PREFS_PATH_VAR, DEFAULT_PREFS_PATH)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(AppError::ConfigError(format!(
                "Backend URL must be http(s), got '{}'",
                self.url
            )));
        }
        if self.anon_key.trim().is_empty() {
            return Err(AppError::ConfigError("Anon key must not be empty".to_string()));
        }
        for (name, value) in [
            ("gallery bucket", &self.gallery_bucket),
            ("services bucket", &self.services_bucket),
            ("settings table", &self.settings_table),
        ] {
            if value.is_empty() || value.contains('/') {
                return Err(AppError::ConfigError(format!("Invalid {name}: '{value}'")));
            }
        }
        Ok(())
    }
}
