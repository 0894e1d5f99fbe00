//! # Test Suite for Content Sync Core
//!
//! All tests run against [`MemoryBackend`](crate::memory_backend::MemoryBackend)
//! with per-operation failure injection, or against LMDB stores in temporary
//! directories. Nothing here touches the network.
//!
//! ## Test Categories
//!
//! ### 1. Store Contract Tests
//! - Snapshot refresh, fallback on empty and on failure, loading flags
//! - Write propagation for add, update and remove
//!
//! ### 2. Asset Lifecycle Tests
//! - Object key naming and file name sanitization
//! - Publish failures, orphaned uploads, best-effort retraction
//!
//! ### 3. Cancellation Tests
//! - Late results after abort, writes after abort
//!
//! ### 4. Settings Tests
//! - Fallback documents, upsert and validation
//!
//! ### 5. Localization and Preference Tests
//! - Catalog lookups, language toggle persisted in LMDB
//!
//! ### 6. Configuration and Backend Tests
//! - Environment loading, REST endpoint construction, admin session guards
//!
//! ### 7. Site Tests
//! - The gallery upload walkthrough and the admin flows end to end
//!
//! ## Running the Tests
//!
//! ```bash
//! cargo test
//! cargo test test_asset_      # Asset lifecycle tests
//! cargo test test_abort_      # Cancellation tests
//! ```

#[cfg(test)]
pub mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value as JsonValue};
    use tempfile::TempDir;

    use crate::app_error::AppError;
    use crate::asset_lifecycle::{object_key, object_name_from_url, sanitize_file_name, AssetLifecycleCoordinator, BlobUpload};
    use crate::config::BackendConfig;
    use crate::content_record::ContentRecord;
    use crate::content_store::{ContentStore, FallbackReason, SnapshotOrigin};
    use crate::fallback_data;
    use crate::feedback_model::{average_rating, FeedbackDraft, FeedbackRecord};
    use crate::gallery_model::{filter_by_category, GalleryCategory, GalleryDraft, GalleryRecord};
    use crate::localization::{Catalog, Language, LocaleState, LANGUAGE_KEY};
    use crate::memory_backend::{MemoryBackend, Operation};
    use crate::preference_store::PreferenceStore;
    use crate::remote_client::{ListOrder, RemoteCollectionClient, Row};
    use crate::rest_backend::RestBackend;
    use crate::service_model::{ServiceDraft, ServiceIcon, ServiceRecord, ServiceVisual};
    use crate::settings_model::{BusinessInfo, SiteCopy};
    use crate::settings_store::SettingsStore;
    use crate::site::Site;

    const GALLERY_BUCKET: &str = "gallery-images";

    // Helper to build a backend row from a JSON object literal
    fn row(value: JsonValue) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    fn gallery_row(title: &str, category: &str, image_url: &str) -> Row {
        row(json!({ "title": title, "category": category, "image_url": image_url }))
    }

    fn service_row(title: &str, icon: &str) -> Row {
        row(json!({ "title": title, "description": format!("{title} description"), "icon": icon }))
    }

    fn gallery_store(backend: &Arc<MemoryBackend>) -> ContentStore<GalleryRecord> {
        let client: Arc<dyn RemoteCollectionClient> = backend.clone();
        ContentStore::new(client.clone()).with_assets(AssetLifecycleCoordinator::new(client, GALLERY_BUCKET))
    }

    fn test_config() -> BackendConfig {
        BackendConfig::new("https://project.example.co/", "anon-key")
    }

    fn ids<R: ContentRecord>(records: &[R]) -> Vec<String> {
        records.iter().map(|r| r.id().to_string()).collect()
    }

    // Yields to spawned tasks until `done` holds, giving up after a bounded number of turns
    async fn yield_until(mut done: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if done() {
                return true;
            }
            tokio::task::yield_now().await;
        }
        done()
    }

    /// Backend whose insert echo is rewritten before the store sees it.
    struct TamperedEcho {
        inner: Arc<MemoryBackend>,
        tamper: fn(&mut Row),
    }

    #[async_trait]
    impl RemoteCollectionClient for TamperedEcho {
        async fn list(&self, collection: &str, order: &ListOrder) -> Result<Vec<Row>, AppError> {
            self.inner.list(collection, order).await
        }

        async fn insert(&self, collection: &str, fields: Row) -> Result<Row, AppError> {
            let mut row = self.inner.insert(collection, fields).await?;
            (self.tamper)(&mut row);
            Ok(row)
        }

        async fn update(&self, collection: &str, id: &str, patch: Row) -> Result<(), AppError> {
            self.inner.update(collection, id, patch).await
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
            self.inner.delete(collection, id).await
        }

        async fn fetch_setting(&self, key: &str) -> Result<Option<JsonValue>, AppError> {
            self.inner.fetch_setting(key).await
        }

        async fn upsert_setting(&self, key: &str, value: JsonValue) -> Result<(), AppError> {
            self.inner.upsert_setting(key, value).await
        }

        async fn upload_blob(
            &self,
            bucket: &str,
            key: &str,
            bytes: Vec<u8>,
            content_type: Option<&str>,
        ) -> Result<(), AppError> {
            self.inner.upload_blob(bucket, key, bytes, content_type).await
        }

        fn public_url(&self, bucket: &str, key: &str) -> String {
            self.inner.public_url(bucket, key)
        }

        async fn remove_blobs(&self, bucket: &str, keys: &[String]) -> Result<(), AppError> {
            self.inner.remove_blobs(bucket, keys).await
        }
    }

    // ===============================
    // STORE CONTRACT TESTS
    // ===============================

    #[tokio::test]
    async fn test_refresh_twice_yields_identical_snapshot() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("services", vec![service_row("Tents", "Tent"), service_row("Lights", "Lightbulb")]);
        let store: ContentStore<ServiceRecord> = ContentStore::new(backend.clone());

        store.refresh().await;
        let first = store.list();
        store.refresh().await;
        let second = store.list();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(store.origin(), SnapshotOrigin::Remote);
    }

    #[tokio::test]
    async fn test_initialize_empty_collection_shows_fallback() {
        let backend = Arc::new(MemoryBackend::new());
        let store: ContentStore<GalleryRecord> = ContentStore::new(backend.clone());
        assert!(store.is_loading());

        store.initialize().await;

        assert_eq!(store.list(), fallback_data::default_gallery());
        assert_eq!(store.origin(), SnapshotOrigin::Fallback(FallbackReason::Empty));
        assert!(store.last_error().is_none());
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_initialize_transport_failure_is_not_raised() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_on(Operation::List);
        let store: ContentStore<FeedbackRecord> = ContentStore::new(backend.clone());

        store.initialize().await;

        assert_eq!(store.list(), fallback_data::default_testimonials());
        assert!(matches!(store.origin(), SnapshotOrigin::Fallback(FallbackReason::TransportFailure(_))));
        assert!(store.last_error().is_some());
        assert!(!store.is_loading());

        // Recovery replaces the fallback with remote rows
        backend.recover(Operation::List);
        backend.seed("feedback", vec![row(json!({ "name": "Asha", "rating": 5, "message": "Lovely" }))]);
        store.refresh().await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.origin(), SnapshotOrigin::Remote);
    }

    #[tokio::test]
    async fn test_malformed_rows_are_skipped() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            "feedback",
            vec![
                row(json!({ "name": "Good", "rating": 4, "message": "Fine" })),
                row(json!({ "name": "Bad", "rating": 9, "message": "Out of range" })),
            ],
        );
        let store: ContentStore<FeedbackRecord> = ContentStore::new(backend.clone());

        store.initialize().await;

        let records = store.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Good");
    }

    #[tokio::test]
    async fn test_add_rejected_insert_propagates() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_on(Operation::Insert);
        let store: ContentStore<FeedbackRecord> = ContentStore::new(backend.clone());
        store.initialize().await;
        let before = store.list();

        let result = store.add(FeedbackDraft::new("Ravi", 5, "Great"), None).await;

        assert!(matches!(result, Err(AppError::TransportError(_))));
        assert_eq!(store.list(), before);
    }

    #[tokio::test]
    async fn test_add_fills_columns_missing_from_insert_echo() {
        let backend = Arc::new(MemoryBackend::echoing());
        let client: Arc<dyn RemoteCollectionClient> = Arc::new(TamperedEcho {
            inner: backend.clone(),
            tamper: |row| {
                row.remove("image_url");
            },
        });
        let store: ContentStore<GalleryRecord> = ContentStore::new(client.clone())
            .with_assets(AssetLifecycleCoordinator::new(client, GALLERY_BUCKET));
        store.initialize().await;

        let record = store
            .add(GalleryDraft::new("T", "Wedding"), Some(BlobUpload::new("a.png", vec![1])))
            .await
            .unwrap();

        assert!(record.image_url.starts_with("memory://gallery-images/"), "{}", record.image_url);
        assert!(record.image_url.ends_with("-a.png"), "{}", record.image_url);
        assert_eq!(store.len(), 9);
        assert_eq!(store.list()[8].title, "T");
        assert_eq!(store.list()[8].image_url, record.image_url);
    }

    #[tokio::test]
    async fn test_add_reads_back_record_when_echo_is_unreadable() {
        let backend = Arc::new(MemoryBackend::new());
        let client: Arc<dyn RemoteCollectionClient> = Arc::new(TamperedEcho {
            inner: backend.clone(),
            tamper: |row| {
                row.insert("created_at".into(), json!("not a date"));
            },
        });
        let store: ContentStore<FeedbackRecord> = ContentStore::new(client);
        store.initialize().await;

        let record = store.add(FeedbackDraft::new("Ravi", 5, "Great"), None).await.unwrap();

        assert_eq!(record.name, "Ravi");
        assert!(record.created_at.is_some());
        assert_eq!(store.origin(), SnapshotOrigin::Remote);
        assert_eq!(store.get(&record.id), Some(record));
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_last_resolved_wins() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("services", vec![service_row("First", "Tent")]);
        let store: Arc<ContentStore<ServiceRecord>> = Arc::new(ContentStore::new(backend.clone()));
        let gate = backend.hold_lists();

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh().await })
        };
        let second = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh().await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(store.is_loading());

        gate.notify_one();
        assert!(yield_until(|| store.origin() == SnapshotOrigin::Remote).await);
        assert_eq!(store.len(), 1);
        // The other refresh is still held at the backend
        assert!(store.is_loading());

        backend.seed("services", vec![service_row("Second", "Tent")]);
        gate.notify_one();
        assert!(yield_until(|| store.len() == 2).await);

        let titles: Vec<String> = store.list().into_iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["First", "Second"]);
        first.await.unwrap();
        second.await.unwrap();
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_add_validation_happens_before_backend() {
        let backend = Arc::new(MemoryBackend::new());
        let store: ContentStore<FeedbackRecord> = ContentStore::new(backend.clone());

        let blank = store.add(FeedbackDraft::new("  ", 5, "Great"), None).await;
        let rating = store.add(FeedbackDraft::new("Ravi", 6, "Great"), None).await;

        assert!(matches!(blank, Err(AppError::ValidationError(_))));
        assert!(matches!(rating, Err(AppError::ValidationError(_))));
        assert_eq!(backend.calls(Operation::Insert), 0);
    }

    #[tokio::test]
    async fn test_add_with_upload_needs_asset_bucket() {
        let backend = Arc::new(MemoryBackend::new());
        let store: ContentStore<ServiceRecord> = ContentStore::new(backend.clone());

        let result = store
            .add(
                ServiceDraft::new("Stage", "Stage setup", ServiceIcon::Star),
                Some(BlobUpload::new("stage.png", vec![1, 2, 3])),
            )
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(backend.calls(Operation::Upload), 0);
    }

    #[tokio::test]
    async fn test_update_sends_patch_and_refreshes() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("services", vec![service_row("Tents", "Tent")]);
        let store: ContentStore<ServiceRecord> = ContentStore::new(backend.clone());
        store.initialize().await;

        let mut service = store.list()[0].clone();
        service.title = "Royal Tents".to_string();
        service.icon_name = ServiceIcon::Crown.name().to_string();
        store.update(&service).await.unwrap();

        assert_eq!(store.list()[0].title, "Royal Tents");
        assert_eq!(backend.rows("services")[0]["icon"], json!("Crown"));

        // Invalid edits never reach the backend
        service.title = String::new();
        let result = store.update(&service).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(backend.calls(Operation::Update), 1);
    }

    #[tokio::test]
    async fn test_update_failure_propagates() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("services", vec![service_row("Tents", "Tent")]);
        let store: ContentStore<ServiceRecord> = ContentStore::new(backend.clone());
        store.initialize().await;
        backend.fail_on(Operation::Update);

        let mut service = store.list()[0].clone();
        service.title = "Renamed".to_string();

        assert!(store.update(&service).await.is_err());
        assert_eq!(store.list()[0].title, "Tents");
    }

    #[tokio::test]
    async fn test_remove_survives_blob_cleanup_failure() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("gallery", vec![gallery_row("Stage", "Wedding", "memory://gallery-images/stage.png")]);
        let store = gallery_store(&backend);
        store.initialize().await;
        let record = store.list()[0].clone();
        backend.fail_on(Operation::RemoveBlobs);

        let result = store.remove(&record.id, Some(&record.image_url)).await;

        // Verify that the record is gone even though storage refused the delete
        assert!(result.is_ok());
        assert!(store.get(&record.id).is_none());
        assert!(backend.rows("gallery").is_empty());
        assert_eq!(backend.calls(Operation::RemoveBlobs), 1);
    }

    #[tokio::test]
    async fn test_remove_failure_keeps_record() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("gallery", vec![gallery_row("Stage", "Wedding", "memory://gallery-images/stage.png")]);
        let store = gallery_store(&backend);
        store.initialize().await;
        let record = store.list()[0].clone();
        backend.fail_on(Operation::Delete);

        let result = store.remove(&record.id, Some(&record.image_url)).await;

        assert!(matches!(result, Err(AppError::TransportError(_))));
        assert!(store.get(&record.id).is_some());
        assert_eq!(backend.calls(Operation::RemoveBlobs), 0);
    }

    #[tokio::test]
    async fn test_remove_deletes_blob() {
        let backend = Arc::new(MemoryBackend::new());
        let store = gallery_store(&backend);
        store.initialize().await;

        let record = store
            .add(GalleryDraft::new("Night", "Lighting"), Some(BlobUpload::new("night.jpg", vec![7; 16])))
            .await
            .unwrap();
        assert_eq!(backend.blob_keys(GALLERY_BUCKET).len(), 1);

        store.remove(&record.id, Some(&record.image_url)).await.unwrap();

        assert!(backend.blob_keys(GALLERY_BUCKET).is_empty());
        assert!(store.get(&record.id).is_none());
    }

    #[tokio::test]
    async fn test_gallery_lists_newest_first() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            "gallery",
            vec![
                gallery_row("Older", "Tent", "memory://gallery-images/a.png"),
                gallery_row("Newer", "Party", "memory://gallery-images/b.png"),
            ],
        );
        let store: ContentStore<GalleryRecord> = ContentStore::new(backend.clone());

        store.initialize().await;

        let titles: Vec<String> = store.list().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["Newer", "Older"]);
    }

    #[tokio::test]
    async fn test_confirmed_inserts_cleared_by_remote_listing() {
        let backend = Arc::new(MemoryBackend::echoing());
        let store: ContentStore<FeedbackRecord> = ContentStore::new(backend.clone());
        store.initialize().await;

        store.add(FeedbackDraft::new("Meena", 4, "Nice"), None).await.unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(store.list()[3].name, "Meena");

        backend.seed("feedback", vec![row(json!({ "name": "Kiran", "rating": 5, "message": "Wow" }))]);
        store.refresh().await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].name, "Kiran");
    }

    // ===============================
    // ASSET LIFECYCLE TESTS
    // ===============================

    #[tokio::test]
    async fn test_asset_upload_then_add_lists_one_new_record() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            "gallery",
            vec![
                gallery_row("One", "Tent", "memory://gallery-images/one.png"),
                gallery_row("Two", "Party", "memory://gallery-images/two.png"),
            ],
        );
        let store = gallery_store(&backend);
        store.initialize().await;
        let coordinator = store.assets().unwrap().clone();

        let url = coordinator.publish(BlobUpload::new("stage.png", vec![1, 2, 3])).await.unwrap();
        let mut draft = GalleryDraft::new("Stage", "Wedding");
        draft.image_url = Some(url.clone());
        store.add(draft, None).await.unwrap();

        let records = store.list();
        assert_eq!(records.len(), 3);
        assert_eq!(records.iter().filter(|r| r.image_url == url).count(), 1);
    }

    #[tokio::test]
    async fn test_asset_orphaned_when_insert_fails() {
        let backend = Arc::new(MemoryBackend::new());
        let store = gallery_store(&backend);
        store.initialize().await;
        backend.fail_on(Operation::Insert);

        let result = store
            .add(GalleryDraft::new("Test", "Wedding"), Some(BlobUpload::new("My Photo.JPG", vec![1, 2, 3])))
            .await;

        // The failure surfaces, and exactly one unreferenced object is left behind
        assert!(matches!(result, Err(AppError::TransportError(_))));
        assert_eq!(backend.blob_keys(GALLERY_BUCKET).len(), 1);
        assert!(backend.rows("gallery").is_empty());
        assert_eq!(store.list(), fallback_data::default_gallery());
    }

    #[tokio::test]
    async fn test_asset_upload_failure_mints_no_url() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_on(Operation::Upload);
        let coordinator = AssetLifecycleCoordinator::new(backend.clone(), GALLERY_BUCKET);

        let result = coordinator.publish(BlobUpload::new("a.png", vec![1])).await;

        assert!(result.unwrap_err().is_transport());
        assert!(backend.blob_keys(GALLERY_BUCKET).is_empty());
    }

    #[tokio::test]
    async fn test_asset_empty_payload_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = AssetLifecycleCoordinator::new(backend.clone(), GALLERY_BUCKET);

        let result = coordinator.publish(BlobUpload::new("a.png", Vec::new())).await;

        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(backend.calls(Operation::Upload), 0);
    }

    #[tokio::test]
    async fn test_asset_publish_keeps_payload_and_extension() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = AssetLifecycleCoordinator::new(backend.clone(), GALLERY_BUCKET);

        let url = coordinator
            .publish(BlobUpload::new("Mandap Night.webp", vec![9, 8, 7]).with_content_type("image/webp"))
            .await
            .unwrap();

        let keys = backend.blob_keys(GALLERY_BUCKET);
        assert_eq!(keys.len(), 1);
        assert!(keys[0].ends_with("-Mandap_Night.webp"));
        assert_eq!(url, format!("memory://{GALLERY_BUCKET}/{}", keys[0]));
        assert_eq!(backend.blob(GALLERY_BUCKET, &keys[0]), Some(vec![9, 8, 7]));
    }

    #[tokio::test]
    async fn test_asset_publish_names_do_not_collide() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = AssetLifecycleCoordinator::new(backend.clone(), GALLERY_BUCKET);

        let first = coordinator.publish(BlobUpload::new("same.png", vec![1])).await.unwrap();
        let second = coordinator.publish(BlobUpload::new("same.png", vec![2])).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(backend.blob_keys(GALLERY_BUCKET).len(), 2);
    }

    #[tokio::test]
    async fn test_asset_retract_skips_unusable_url() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = AssetLifecycleCoordinator::new(backend.clone(), GALLERY_BUCKET);

        coordinator.retract("https://project.example.co/storage/v1/object/public/gallery-images/").await;
        coordinator.retract("").await;

        assert_eq!(backend.calls(Operation::RemoveBlobs), 0);
    }

    #[tokio::test]
    async fn test_asset_retract_never_deletes_a_different_object() {
        let backend = Arc::new(MemoryBackend::new());
        let coordinator = AssetLifecycleCoordinator::new(backend.clone(), GALLERY_BUCKET);
        backend.upload_blob(GALLERY_BUCKET, "My20Photo.jpg", vec![1], None).await.unwrap();

        coordinator.retract("memory://gallery-images/My%20Photo.jpg").await;

        assert_eq!(backend.calls(Operation::RemoveBlobs), 0);
        assert_eq!(backend.blob_keys(GALLERY_BUCKET), vec!["My20Photo.jpg".to_string()]);

        backend.upload_blob(GALLERY_BUCKET, "1-ab-x.y.png", vec![2], None).await.unwrap();
        coordinator.retract("memory://gallery-images/1-ab-x%2Ey.png").await;

        assert_eq!(backend.blob("gallery-images", "1-ab-x.y.png"), None);
        assert_eq!(backend.blob_keys(GALLERY_BUCKET), vec!["My20Photo.jpg".to_string()]);
    }

    #[test]
    fn test_asset_object_key_format() {
        let key = object_key("My Photo.JPG", 1_700_000_000_000, "a1b2c3d4");
        assert_eq!(key, "1700000000000-a1b2c3d4-My_Photo.JPG");
    }

    #[test]
    fn test_asset_sanitize_strips_separators_and_controls() {
        let hostile = [
            "../../etc/pa\0ss\nwd.png",
            "..\\..\\windows\\evil.exe",
            "a/b\\c\td\r.jpg",
            "\u{1b}[31mred.gif",
        ];

        for name in hostile {
            let key = object_key(name, 1, "abcd");
            assert!(!key.is_empty());
            assert!(!key.contains('/'), "{key}");
            assert!(!key.contains('\\'), "{key}");
            assert!(!key.chars().any(char::is_control), "{key}");
            assert!(!key.contains(".."), "{key}");
        }
        assert_eq!(sanitize_file_name("../../etc/pa\0ss\nwd.png"), "etcpasswd.png");
    }

    #[test]
    fn test_asset_sanitize_edge_cases() {
        assert_eq!(sanitize_file_name("My Photo.JPG"), "My_Photo.JPG");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name("фото.png"), "upload.png");
        assert_eq!(sanitize_file_name("archive.tar.gz"), "archive.tar.gz");
        assert_eq!(sanitize_file_name("no_extension"), "no_extension");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
    }

    #[test]
    fn test_asset_object_name_from_url() {
        assert_eq!(
            object_name_from_url("https://x.co/storage/v1/object/public/gallery-images/17-ab-My_Photo.JPG?t=1"),
            Some("17-ab-My_Photo.JPG".to_string())
        );
        assert_eq!(object_name_from_url("memory://gallery-images/a.png#frag"), Some("a.png".to_string()));
        assert_eq!(object_name_from_url("https://x.co/bucket/"), None);
        assert_eq!(object_name_from_url("https://x.co/bucket/.."), None);

        // Escapes are decoded before the name is checked, never stripped
        assert_eq!(object_name_from_url("https://x.co/bucket/17-ab-a%2Eb.png"), Some("17-ab-a.b.png".to_string()));
        assert_eq!(object_name_from_url("https://x.co/bucket/My%20Photo.jpg"), None);
        assert_eq!(object_name_from_url("https://x.co/bucket/%2F..%2Fetc"), None);
        assert_eq!(object_name_from_url("https://x.co/bucket/a%zz.png"), None);
        assert_eq!(object_name_from_url("https://x.co/bucket/a%2"), None);
        assert_eq!(object_name_from_url("https://x.co/bucket/My Photo.jpg"), None);
    }

    // ===============================
    // CANCELLATION TESTS
    // ===============================

    #[tokio::test]
    async fn test_abort_discards_late_listing() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("gallery", vec![gallery_row("Late", "Tent", "memory://gallery-images/late.png")]);
        let store = Arc::new(gallery_store(&backend));
        let gate = backend.hold_lists();

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh().await })
        };
        tokio::task::yield_now().await;
        assert!(store.is_loading());

        store.scope().abort();
        gate.notify_one();
        pending.await.unwrap();

        // Verify that the result arriving after abort was never applied
        assert_eq!(store.list(), fallback_data::default_gallery());
        assert_eq!(store.origin(), SnapshotOrigin::Pending);
    }

    #[tokio::test]
    async fn test_abort_rejects_writes() {
        let backend = Arc::new(MemoryBackend::new());
        let store = gallery_store(&backend);
        store.initialize().await;
        store.scope().abort();

        let add = store
            .add(GalleryDraft::new("Test", "Wedding"), Some(BlobUpload::new("a.png", vec![1])))
            .await;
        let remove = store.remove("1", None).await;

        assert!(matches!(add, Err(AppError::Cancelled(_))));
        assert!(matches!(remove, Err(AppError::Cancelled(_))));
        assert_eq!(backend.calls(Operation::Upload), 0);
        assert_eq!(backend.calls(Operation::Insert), 0);
        assert_eq!(backend.calls(Operation::Delete), 0);
    }

    #[tokio::test]
    async fn test_abort_makes_refresh_a_no_op() {
        let backend = Arc::new(MemoryBackend::new());
        let store: ContentStore<ServiceRecord> = ContentStore::new(backend.clone());
        let scope = store.scope();
        scope.abort();

        store.initialize().await;

        assert_eq!(backend.calls(Operation::List), 0);
        assert!(!store.scope().is_live());
    }

    // ===============================
    // SETTINGS TESTS
    // ===============================

    #[tokio::test]
    async fn test_settings_fallback_then_update() {
        let backend = Arc::new(MemoryBackend::new());
        let store: SettingsStore<BusinessInfo> = SettingsStore::new(backend.clone());

        store.initialize().await;
        assert_eq!(store.get(), fallback_data::default_business_info());
        assert_eq!(store.origin(), SnapshotOrigin::Fallback(FallbackReason::Empty));
        assert!(!store.is_loading());

        let mut info = store.get();
        info.phone = "+91 90000 00000".to_string();
        store.update(info.clone()).await.unwrap();

        assert_eq!(store.get(), info);
        assert_eq!(store.origin(), SnapshotOrigin::Remote);
        assert_eq!(backend.setting("business_info").unwrap()["phone"], json!("+91 90000 00000"));
    }

    #[tokio::test]
    async fn test_settings_update_failures() {
        let backend = Arc::new(MemoryBackend::new());
        let store: SettingsStore<BusinessInfo> = SettingsStore::new(backend.clone());
        store.initialize().await;

        let mut invalid = store.get();
        invalid.rating = 7.0;
        assert!(matches!(store.update(invalid).await, Err(AppError::ValidationError(_))));
        assert_eq!(backend.calls(Operation::UpsertSetting), 0);

        backend.fail_on(Operation::UpsertSetting);
        assert!(matches!(store.update(store.get()).await, Err(AppError::TransportError(_))));
        assert!(backend.setting("business_info").is_none());
    }

    #[tokio::test]
    async fn test_dropped_refresh_clears_loading() {
        let backend = Arc::new(MemoryBackend::new());
        let settings: SettingsStore<BusinessInfo> = SettingsStore::new(backend.clone());
        let gallery = gallery_store(&backend);
        settings.initialize().await;
        gallery.initialize().await;
        let _settings_gate = backend.hold_settings();
        let _list_gate = backend.hold_lists();

        let settings_refresh = tokio::time::timeout(Duration::from_millis(50), settings.refresh()).await;
        let gallery_refresh = tokio::time::timeout(Duration::from_millis(50), gallery.refresh()).await;

        assert!(settings_refresh.is_err());
        assert!(gallery_refresh.is_err());
        assert!(!settings.is_loading());
        assert!(!gallery.is_loading());
        assert_eq!(settings.origin(), SnapshotOrigin::Fallback(FallbackReason::Empty));
        assert_eq!(gallery.origin(), SnapshotOrigin::Fallback(FallbackReason::Empty));
    }

    #[tokio::test]
    async fn test_settings_malformed_document_falls_back() {
        let backend = Arc::new(MemoryBackend::new());
        backend.upsert_setting("site_content", json!({ "hero": 1 })).await.unwrap();
        let store: SettingsStore<SiteCopy> = SettingsStore::new(backend.clone());

        store.initialize().await;

        assert_eq!(store.get(), fallback_data::default_site_copy());
        assert!(matches!(store.origin(), SnapshotOrigin::Fallback(FallbackReason::TransportFailure(_))));
    }

    #[test]
    fn test_business_whatsapp_link() {
        let info = fallback_data::default_business_info();
        assert_eq!(info.whatsapp_link(), "https://wa.me/919876543210");
    }

    // ===============================
    // RECORD MAPPING TESTS
    // ===============================

    #[test]
    fn test_numeric_ids_normalized() {
        let record = FeedbackRecord::from_row(&row(json!({
            "id": 42,
            "name": "Sita",
            "rating": 5,
            "message": "Perfect",
            "created_at": "2023-12-05T10:00:00+00:00"
        })))
        .unwrap();

        assert_eq!(record.id, "42");
        assert_eq!(record.display_date(), "Dec 2023");
    }

    #[test]
    fn test_feedback_display_and_average() {
        let testimonials = fallback_data::default_testimonials();
        let dates: Vec<String> = testimonials.iter().map(FeedbackRecord::display_date).collect();
        assert_eq!(dates, vec!["Dec 2023", "Jan 2024", "Feb 2024"]);

        let average = average_rating(&testimonials).unwrap();
        assert!((average - 14.0 / 3.0).abs() < 1e-5);
        assert_eq!(average_rating(&[]), None);
    }

    #[test]
    fn test_service_visual_and_defaults() {
        let plain = ServiceRecord::from_row(&row(json!({ "id": "s1", "title": "Plain" }))).unwrap();
        assert_eq!(plain.icon_name, "Tent");
        assert_eq!(plain.visual(), ServiceVisual::Icon(ServiceIcon::Tent));

        let unknown = ServiceRecord::from_row(&row(json!({ "id": "s2", "title": "Odd", "icon": "Rocket" }))).unwrap();
        assert_eq!(unknown.visual(), ServiceVisual::UnknownIcon("Rocket"));

        let pictured = ServiceRecord::from_row(&row(json!({
            "id": "s3", "title": "Pic", "icon": "Star", "image_url": "https://x.co/a.png"
        })))
        .unwrap();
        assert_eq!(pictured.visual(), ServiceVisual::Image("https://x.co/a.png"));
    }

    #[test]
    fn test_gallery_category_filter() {
        let gallery = fallback_data::default_gallery();

        let weddings = filter_by_category(&gallery, Some(GalleryCategory::Wedding));
        assert_eq!(ids(&weddings), vec!["1", "4", "8"]);
        assert_eq!(filter_by_category(&gallery, None).len(), 8);
        assert_eq!(GalleryCategory::from_label(" lighting "), Some(GalleryCategory::Lighting));
        assert_eq!(GalleryCategory::from_label("Garden"), None);
    }

    #[test]
    fn test_gallery_row_requires_image() {
        let result = GalleryRecord::from_row(&row(json!({ "id": 1, "title": "No image", "category": "Tent" })));
        assert!(matches!(result, Err(AppError::SerializationError(_))));
    }

    // ===============================
    // LOCALIZATION AND PREFERENCE TESTS
    // ===============================

    fn same_shape(a: &JsonValue, b: &JsonValue, path: &str) -> Vec<String> {
        match (a, b) {
            (JsonValue::Object(a), JsonValue::Object(b)) => {
                let mut diffs = Vec::new();
                for key in a.keys().chain(b.keys()) {
                    let child = format!("{path}.{key}");
                    match (a.get(key), b.get(key)) {
                        (Some(x), Some(y)) => diffs.extend(same_shape(x, y, &child)),
                        _ => diffs.push(child),
                    }
                }
                diffs
            }
            (JsonValue::Array(a), JsonValue::Array(b)) if a.len() == b.len() => Vec::new(),
            (JsonValue::String(_), JsonValue::String(_)) => Vec::new(),
            _ => vec![path.to_string()],
        }
    }

    #[test]
    fn test_catalogs_share_schema() {
        let en: JsonValue = serde_json::from_str(include_str!("../locales/en.json")).unwrap();
        let hi: JsonValue = serde_json::from_str(include_str!("../locales/hi.json")).unwrap();

        assert!(same_shape(&en, &hi, "").is_empty());
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = Catalog::embedded().unwrap();

        assert_eq!(catalog.lookup(Language::En, "nav.home").unwrap(), "Home");
        assert_eq!(catalog.lookup(Language::Hi, "nav.home").unwrap(), "होम");
        assert_eq!(catalog.lookup(Language::En, "features.local.title").unwrap(), "Local Expertise");

        let tags = catalog.lookup_list(Language::En, "about_page.tags").unwrap();
        assert_eq!(tags.len(), 4);
        assert_eq!(tags[0], "German Hangar Tents");
    }

    #[test]
    fn test_catalog_missing_keys_fail() {
        let catalog = Catalog::embedded().unwrap();

        for key in ["nav.missing", "nav", "", "nav.home.deeper"] {
            assert!(matches!(catalog.lookup(Language::En, key), Err(AppError::MissingTranslation(_))), "{key}");
        }
        assert!(catalog.lookup_list(Language::Hi, "nav.home").is_err());
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::from_code("hi"), Some(Language::Hi));
        assert_eq!(Language::from_code("fr"), None);
        assert_eq!(Language::En.toggled(), Language::Hi);
        assert_eq!(Language::Hi.toggled().code(), "en");
    }

    #[test]
    fn test_preference_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let prefs = PreferenceStore::open(dir.path().join("prefs")).unwrap();

        assert_eq!(prefs.get("flag").unwrap(), None);
        prefs.set("flag", "on").unwrap();
        assert_eq!(prefs.get("flag").unwrap(), Some("on".to_string()));
        prefs.set("flag", "off").unwrap();
        assert_eq!(prefs.get("flag").unwrap(), Some("off".to_string()));
        assert!(prefs.remove("flag").unwrap());
        assert!(!prefs.remove("flag").unwrap());
        assert!(prefs.path().ends_with("prefs.lmdb"));
    }

    #[test]
    fn test_language_toggle_persists_across_sessions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site_prefs");

        {
            let locale = LocaleState::open(PreferenceStore::open(&path).unwrap()).unwrap();
            assert_eq!(locale.language(), Language::En);
            assert_eq!(locale.t("nav.contact").unwrap(), "Contact");
            assert_eq!(locale.toggle(), Language::Hi);
        }

        // Reopening simulates the next session
        let locale = LocaleState::open(PreferenceStore::open(&path).unwrap()).unwrap();
        assert_eq!(locale.language(), Language::Hi);
        assert_eq!(locale.t("nav.home").unwrap(), "होम");
    }

    #[test]
    fn test_unknown_language_flag_defaults_to_english() {
        let dir = TempDir::new().unwrap();
        let prefs = PreferenceStore::open(dir.path().join("prefs")).unwrap();
        prefs.set(LANGUAGE_KEY, "fr").unwrap();

        let locale = LocaleState::open(prefs).unwrap();

        assert_eq!(locale.language(), Language::En);
    }

    #[test]
    fn test_in_memory_locale_switch() {
        let locale = LocaleState::in_memory(Language::Hi).unwrap();
        locale.set_language(Language::En);
        assert_eq!(locale.t("nav.home").unwrap(), "Home");
    }

    // ===============================
    // CONFIGURATION AND BACKEND TESTS
    // ===============================

    fn lookup_from(vars: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> {
        move |key| vars.get(key).map(|value| value.to_string())
    }

    #[test]
    fn test_config_defaults() {
        let config = BackendConfig::from_lookup(lookup_from(HashMap::from([
            ("CONTENT_BACKEND_URL", "https://project.example.co"),
            ("CONTENT_BACKEND_ANON_KEY", "anon"),
        ])))
        .unwrap();

        assert_eq!(config.gallery_bucket, "gallery-images");
        assert_eq!(config.services_bucket, "service-images");
        assert_eq!(config.settings_table, "settings");
        assert_eq!(config.prefs_path, std::path::PathBuf::from("content_prefs"));
    }

    #[test]
    fn test_config_errors() {
        let missing = BackendConfig::from_lookup(lookup_from(HashMap::from([("CONTENT_BACKEND_ANON_KEY", "anon")])));
        assert!(matches!(missing, Err(AppError::ConfigError(_))));

        let bad_url = BackendConfig::from_lookup(lookup_from(HashMap::from([
            ("CONTENT_BACKEND_URL", "ftp://project.example.co"),
            ("CONTENT_BACKEND_ANON_KEY", "anon"),
        ])));
        assert!(matches!(bad_url, Err(AppError::ConfigError(_))));

        let bad_bucket = BackendConfig::from_lookup(lookup_from(HashMap::from([
            ("CONTENT_BACKEND_URL", "https://project.example.co"),
            ("CONTENT_BACKEND_ANON_KEY", "anon"),
            ("CONTENT_GALLERY_BUCKET", "a/b"),
        ])));
        assert!(matches!(bad_bucket, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_rest_backend_urls() {
        let backend = RestBackend::new(&test_config()).unwrap();

        assert_eq!(backend.table_url("services"), "https://project.example.co/rest/v1/services");
        assert_eq!(
            backend.object_url("gallery-images", "1-ab-a.png"),
            "https://project.example.co/storage/v1/object/gallery-images/1-ab-a.png"
        );
        assert_eq!(
            backend.public_url("gallery-images", "1-ab-a.png"),
            "https://project.example.co/storage/v1/object/public/gallery-images/1-ab-a.png"
        );
        assert_eq!(
            object_name_from_url(&backend.public_url("gallery-images", "1-ab-a.png")),
            Some("1-ab-a.png".to_string())
        );
    }

    #[tokio::test]
    async fn test_rest_backend_session_guards() {
        let backend = RestBackend::new(&test_config()).unwrap();
        assert!(!backend.is_admin());

        let result = backend.sign_in("  ", "secret").await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));

        backend.sign_out();
        assert!(!backend.is_admin());

        let invalid = RestBackend::new(&BackendConfig::new("not-a-url", "anon"));
        assert!(matches!(invalid, Err(AppError::ConfigError(_))));
    }

    // ===============================
    // SITE TESTS
    // ===============================

    #[tokio::test]
    async fn test_site_gallery_upload_walkthrough() {
        let backend = Arc::new(MemoryBackend::echoing());
        let site = Site::with_client(backend.clone(), &test_config()).unwrap();

        site.initialize().await;
        let gallery = site.gallery.list();
        assert_eq!(ids(&gallery), vec!["1", "2", "3", "4", "5", "6", "7", "8"]);
        assert_eq!(gallery[0].title, "Royal Stage");
        assert_eq!(gallery[1].title, "Entrance Walkway");

        let added = site
            .upload_gallery_image(BlobUpload::new("My Photo.JPG", vec![0xFF, 0xD8, 0xFF]), "Test", "Wedding")
            .await
            .unwrap();

        let gallery = site.gallery.list();
        assert_eq!(gallery.len(), 9);
        assert_eq!(gallery[8].title, "Test");
        assert_eq!(gallery[8].category, "Wedding");
        assert_eq!(gallery[8].image_url, added.image_url);
        assert!(added.image_url.ends_with("-My_Photo.JPG"));
        assert_eq!(backend.blob_keys(GALLERY_BUCKET).len(), 1);
    }

    #[tokio::test]
    async fn test_site_initialize_settles_every_store() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_on(Operation::FetchSetting);
        let site = Site::with_client(backend.clone(), &test_config()).unwrap();
        assert!(site.is_loading());

        site.initialize().await;

        assert!(!site.is_loading());
        assert_eq!(site.services.list(), fallback_data::default_services());
        assert_eq!(site.site_copy.get(), fallback_data::default_site_copy());
        assert!(site.business_info.origin().is_fallback());
        assert!(site.rest_backend().is_none());
    }

    #[tokio::test]
    async fn test_site_service_with_image_lifecycle() {
        let backend = Arc::new(MemoryBackend::new());
        let config = test_config();
        let site = Site::with_client(backend.clone(), &config).unwrap();
        site.initialize().await;

        let service = site
            .add_service(
                ServiceDraft::new("Stage", "Stage and backdrop", ServiceIcon::Crown),
                Some(BlobUpload::new("stage.png", vec![1, 2])),
            )
            .await
            .unwrap();
        assert_eq!(backend.blob_keys(&config.services_bucket).len(), 1);
        assert!(matches!(service.visual(), ServiceVisual::Image(_)));

        site.delete_service(&service.id).await.unwrap();
        assert!(backend.blob_keys(&config.services_bucket).is_empty());
        assert!(site.services.get(&service.id).is_none());
    }

    #[tokio::test]
    async fn test_site_feedback_and_abort() {
        let backend = Arc::new(MemoryBackend::new());
        let site = Site::with_client(backend.clone(), &test_config()).unwrap();
        site.initialize().await;

        let feedback = site.submit_feedback("Neha", 5, "Beautiful mandap").await.unwrap();
        assert_eq!(site.feedback.list()[0].id, feedback.id);
        assert!(matches!(site.submit_feedback("Neha", 0, "Zero").await, Err(AppError::ValidationError(_))));

        site.abort();
        let result = site.submit_feedback("Late", 4, "After teardown").await;
        assert!(matches!(result, Err(AppError::Cancelled(_))));
        assert_eq!(backend.calls(Operation::Insert), 1);
    }

    #[tokio::test]
    async fn test_site_delete_gallery_image() {
        let backend = Arc::new(MemoryBackend::new());
        let site = Site::with_client(backend.clone(), &test_config()).unwrap();
        site.initialize().await;

        let record = site
            .upload_gallery_image(BlobUpload::new("walk.jpg", vec![5; 8]), "Walkway", "Tent")
            .await
            .unwrap();
        site.delete_gallery_image(&record.id, &record.image_url).await.unwrap();

        assert!(backend.blob_keys(GALLERY_BUCKET).is_empty());
        assert_eq!(site.gallery.list(), Vec::<GalleryRecord>::new());
    }

    #[tokio::test]
    async fn test_site_translations() {
        let backend = Arc::new(MemoryBackend::new());
        let site = Site::with_client(backend, &test_config())
            .unwrap()
            .with_locale(LocaleState::in_memory(Language::Hi).unwrap());

        assert_eq!(site.t("nav.home").unwrap(), "होम");
        site.locale.toggle();
        assert_eq!(site.t("nav.home").unwrap(), "Home");
        assert!(site.t("nav.nowhere").is_err());
    }
}
