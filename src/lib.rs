//! # Content Sync Core
//!
//! Content layer for a small business website whose text, services, gallery
//! and testimonials are edited by an admin and stored in a hosted backend
//! (Postgres tables behind a REST API, plus object storage for images).
//!
//! ## Features
//!
//! - **Mirrored collections**: every collection is held in memory and read
//!   synchronously; fetches never fail and fall back to built-in content
//! - **Asset lifecycle**: images are uploaded under collision-free keys before
//!   the record referencing them, and deleted best-effort after it
//! - **Settings documents**: singleton JSON documents upserted by key
//! - **Cancellation**: aborted stores drop late results and reject writes
//! - **Localization**: English and Hindi catalogs with the language choice
//!   persisted in LMDB
//!
//! ## Quick Start
//!
//! ```no_run
//! use content_sync_core::{BackendConfig, LocaleState, PreferenceStore, Site};
//!
//! # async fn run() -> Result<(), content_sync_core::AppError> {
//! let config = BackendConfig::from_env()?;
//! let locale = LocaleState::open(PreferenceStore::open(&config.prefs_path)?)?;
//! let site = Site::connect(&config, locale)?;
//!
//! site.initialize().await;
//! for service in site.services.list() {
//!     println!("{}", service.title);
//! }
//! println!("{}", site.t("nav.home")?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Building blocks
//!
//! - [`ContentStore`] - mirror of one collection of [`ContentRecord`]s
//! - [`SettingsStore`] - mirror of one [`SettingsDocument`]
//! - [`AssetLifecycleCoordinator`] - publish and retract bucket objects
//! - [`RemoteCollectionClient`] - the backend seam, implemented by
//!   [`RestBackend`] and [`MemoryBackend`]
//! - [`LocaleState`] - active language and text lookup
//! - [`Site`] - all of the above wired over one client

pub mod abort_scope;
pub mod app_error;
pub mod asset_lifecycle;
pub mod config;
pub mod content_record;
pub mod content_store;
pub mod fallback_data;
pub mod feedback_model;
pub mod gallery_model;
pub mod localization;
pub mod memory_backend;
pub mod preference_store;
pub mod remote_client;
pub mod rest_backend;
pub mod service_model;
pub mod settings_model;
pub mod settings_store;
pub mod site;
mod test;

pub use abort_scope::AbortScope;
pub use app_error::AppError;
pub use asset_lifecycle::{AssetLifecycleCoordinator, BlobUpload};
pub use config::BackendConfig;
pub use content_record::ContentRecord;
pub use content_store::{ContentStore, FallbackReason, SnapshotOrigin};
pub use feedback_model::{FeedbackDraft, FeedbackRecord};
pub use gallery_model::{GalleryCategory, GalleryDraft, GalleryRecord};
pub use localization::{Catalog, Language, LocaleState};
pub use memory_backend::{MemoryBackend, Operation};
pub use preference_store::PreferenceStore;
pub use remote_client::{ListOrder, RemoteCollectionClient, Row, SortDirection};
pub use rest_backend::RestBackend;
pub use service_model::{ServiceDraft, ServiceIcon, ServiceRecord, ServiceVisual};
pub use settings_model::{AboutCopy, BusinessInfo, HeroCopy, SettingsDocument, SiteCopy};
pub use settings_store::SettingsStore;
pub use site::Site;
