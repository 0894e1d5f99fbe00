use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, error, info, warn};

use crate::abort_scope::AbortScope;
use crate::app_error::AppError;
use crate::content_store::{FallbackReason, SnapshotOrigin};
use crate::remote_client::RemoteCollectionClient;
use crate::settings_model::SettingsDocument;

struct SettingsState<D> {
    document: D,
    origin: SnapshotOrigin,
    in_flight: usize,
    settled: bool,
}

/// Mirror of one upsert-by-key settings document.
///
/// Same contract as [`ContentStore`](crate::content_store::ContentStore):
/// reads are synchronous, fetches never fail and fall back to the built-in
/// document, updates propagate failures.
pub struct SettingsStore<D: SettingsDocument> {
    client: Arc<dyn RemoteCollectionClient>,
    state: RwLock<SettingsState<D>>,
    scope: AbortScope,
}

/// Keeps `in_flight` accurate even when a pending fetch is dropped.
struct FetchGuard<'a, D: SettingsDocument> {
    store: &'a SettingsStore<D>,
}

impl<'a, D: SettingsDocument> FetchGuard<'a, D> {
    fn enter(store: &'a SettingsStore<D>) -> Self {
        store.write_state().in_flight += 1;
        Self { store }
    }
}

impl<D: SettingsDocument> Drop for FetchGuard<'_, D> {
    fn drop(&mut self) {
        let mut state = self.store.write_state();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

impl<D: SettingsDocument> SettingsStore<D> {
    pub fn new(client: Arc<dyn RemoteCollectionClient>) -> Self {
        Self {
            client,
            state: RwLock::new(SettingsState {
                document: D::fallback(),
                origin: SnapshotOrigin::Pending,
                in_flight: 0,
                settled: false,
            }),
            scope: AbortScope::new(),
        }
    }

    pub fn key(&self) -> &'static str {
        D::KEY
    }

    pub fn scope(&self) -> AbortScope {
        self.scope.clone()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SettingsState<D>> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SettingsState<D>> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self) -> D {
        self.read_state().document.clone()
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.read_state().origin.clone()
    }

    pub fn is_loading(&self) -> bool {
        let state = self.read_state();
        !state.settled || state.in_flight > 0
    }

    pub async fn initialize(&self) {
        self.refresh().await
    }

    pub async fn refresh(&self) {
        if !self.scope.is_live() {
            debug!("Settings '{}' aborted; skipping refresh", D::KEY);
            return;
        }

        let _guard = FetchGuard::enter(self);
        let fetched = self.client.fetch_setting(D::KEY).await;

        if !self.scope.is_live() {
            debug!("Settings '{}' aborted while fetching; discarding result", D::KEY);
            return;
        }

        let mut state = self.write_state();

        let decoded = fetched.and_then(|value| match value {
            Some(value) => serde_json::from_value::<D>(value).map(Some).map_err(AppError::from),
            None => Ok(None),
        });

        match decoded {
            Ok(Some(document)) => {
                info!("Loaded settings '{}'", D::KEY);
                state.document = document;
                state.origin = SnapshotOrigin::Remote;
            }
            Ok(None) => {
                warn!("Settings '{}' not stored yet; using defaults", D::KEY);
                state.document = D::fallback();
                state.origin = SnapshotOrigin::Fallback(FallbackReason::Empty);
            }
            Err(e) => {
                warn!("Error fetching settings '{}': {e}; using defaults", D::KEY);
                state.document = D::fallback();
                state.origin = SnapshotOrigin::Fallback(FallbackReason::TransportFailure(e.to_string()));
            }
        }
        state.settled = true;
    }

    /// Replaces the stored document, then refreshes.
    pub async fn update(&self, document: D) -> Result<(), AppError> {
        if !self.scope.is_live() {
            return Err(AppError::Cancelled(format!("update on aborted settings '{}'", D::KEY)));
        }
        document.validate()?;

        let value = serde_json::to_value(&document)?;
        self.client.upsert_setting(D::KEY, value).await.map_err(|e| {
            error!("Saving settings '{}' failed: {e}", D::KEY);
            e
        })?;

        info!("Saved settings '{}'", D::KEY);
        self.refresh().await;
        Ok(())
    }
}
