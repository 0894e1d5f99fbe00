//! Everything the site reads from and writes to the backend, behind one value.
//!
//! A [`Site`] owns one store per collection and settings document, all over a
//! single shared client, and the active [`LocaleState`]. Views read snapshots
//! from the stores; the admin dashboard goes through the flows below.

use std::sync::Arc;

use log::info;

use crate::app_error::AppError;
use crate::asset_lifecycle::{AssetLifecycleCoordinator, BlobUpload};
use crate::config::BackendConfig;
use crate::content_record::ContentRecord;
use crate::content_store::ContentStore;
use crate::feedback_model::{FeedbackDraft, FeedbackRecord};
use crate::gallery_model::{GalleryDraft, GalleryRecord};
use crate::localization::{Language, LocaleState};
use crate::remote_client::RemoteCollectionClient;
use crate::rest_backend::RestBackend;
use crate::service_model::{ServiceDraft, ServiceRecord};
use crate::settings_model::{BusinessInfo, SiteCopy};
use crate::settings_store::SettingsStore;

pub struct Site {
    pub services: ContentStore<ServiceRecord>,
    pub gallery: ContentStore<GalleryRecord>,
    pub feedback: ContentStore<FeedbackRecord>,
    pub business_info: SettingsStore<BusinessInfo>,
    pub site_copy: SettingsStore<SiteCopy>,
    pub locale: LocaleState,
    rest: Option<Arc<RestBackend>>,
}

impl Site {
    /// Connects to the hosted backend described by `config`.
    pub fn connect(config: &BackendConfig, locale: LocaleState) -> Result<Self, AppError> {
        let rest = Arc::new(RestBackend::new(config)?);
        info!("Connecting site to {}", config.url);

        let mut site = Self::assemble(rest.clone(), config, locale);
        site.rest = Some(rest);
        Ok(site)
    }

    /// Builds the site over any backend, with an unpersisted English locale.
    pub fn with_client(
        client: Arc<dyn RemoteCollectionClient>,
        config: &BackendConfig,
    ) -> Result<Self, AppError> {
        let locale = LocaleState::in_memory(Language::default())?;
        Ok(Self::assemble(client, config, locale))
    }

    pub fn with_locale(mut self, locale: LocaleState) -> Self {
        self.locale = locale;
        self
    }

    fn assemble(client: Arc<dyn RemoteCollectionClient>, config: &BackendConfig, locale: LocaleState) -> Self {
        let gallery_assets = AssetLifecycleCoordinator::new(client.clone(), config.gallery_bucket.clone());
        let service_assets = AssetLifecycleCoordinator::new(client.clone(), config.services_bucket.clone());

        Self {
            services: ContentStore::new(client.clone()).with_assets(service_assets),
            gallery: ContentStore::new(client.clone()).with_assets(gallery_assets),
            feedback: ContentStore::new(client.clone()),
            business_info: SettingsStore::new(client.clone()),
            site_copy: SettingsStore::new(client),
            locale,
            rest: None,
        }
    }

    /// The REST backend when the site was built with [`Site::connect`], for
    /// admin sign-in.
    pub fn rest_backend(&self) -> Option<&RestBackend> {
        self.rest.as_deref()
    }

    /// Loads every store concurrently. Each store keeps its own loading flag
    /// and falls back independently.
    pub async fn initialize(&self) {
        tokio::join!(
            self.services.initialize(),
            self.gallery.initialize(),
            self.feedback.initialize(),
            self.business_info.initialize(),
            self.site_copy.initialize(),
        );
        info!("Site content initialized");
    }

    /// Tears the site down. Fetches still in flight are discarded and further
    /// writes are rejected.
    pub fn abort(&self) {
        self.services.scope().abort();
        self.gallery.scope().abort();
        self.feedback.scope().abort();
        self.business_info.scope().abort();
        self.site_copy.scope().abort();
        info!("Site stores aborted");
    }

    pub fn is_loading(&self) -> bool {
        self.services.is_loading()
            || self.gallery.is_loading()
            || self.feedback.is_loading()
            || self.business_info.is_loading()
            || self.site_copy.is_loading()
    }

    pub async fn upload_gallery_image(
        &self,
        upload: BlobUpload,
        title: &str,
        category: &str,
    ) -> Result<GalleryRecord, AppError> {
        self.gallery.add(GalleryDraft::new(title, category), Some(upload)).await
    }

    pub async fn delete_gallery_image(&self, id: &str, image_url: &str) -> Result<(), AppError> {
        self.gallery.remove(id, Some(image_url)).await
    }

    pub async fn add_service(
        &self,
        draft: ServiceDraft,
        image: Option<BlobUpload>,
    ) -> Result<ServiceRecord, AppError> {
        self.services.add(draft, image).await
    }

    /// Deletes a service and, when it carries an uploaded image, that image.
    pub async fn delete_service(&self, id: &str) -> Result<(), AppError> {
        let image_url = self.services.get(id).and_then(|service| service.image_url().map(str::to_string));
        self.services.remove(id, image_url.as_deref()).await
    }

    pub async fn submit_feedback(
        &self,
        name: &str,
        rating: u8,
        text: &str,
    ) -> Result<FeedbackRecord, AppError> {
        self.feedback.add(FeedbackDraft::new(name, rating, text), None).await
    }

    pub fn t(&self, key: &str) -> Result<&str, AppError> {
        self.locale.t(key)
    }
}
