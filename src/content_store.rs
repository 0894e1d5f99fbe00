//! In-memory mirror of one remote collection.
//!
//! A [`ContentStore`] holds the current snapshot of a collection and mediates
//! every read and write the site makes against it:
//!
//! - reads ([`ContentStore::list`]) are synchronous and never touch the
//!   network;
//! - [`ContentStore::initialize`] and [`ContentStore::refresh`] re-fetch the
//!   whole collection and never fail; an empty or unreachable collection is
//!   replaced by the record type's fallback dataset and the reason is kept in
//!   [`SnapshotOrigin`];
//! - writes ([`ContentStore::add`], [`ContentStore::update`],
//!   [`ContentStore::remove`]) propagate backend failures to the caller.
//!
//! Operations on one store are not sequenced against each other. Two
//! overlapping refreshes both apply; whichever resolves last wins.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::abort_scope::AbortScope;
use crate::app_error::AppError;
use crate::asset_lifecycle::{AssetLifecycleCoordinator, BlobUpload};
use crate::content_record::{row_id, ContentRecord};
use crate::remote_client::{RemoteCollectionClient, Row};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackReason {
    /// The collection was listed successfully but had no rows.
    Empty,
    /// The listing itself failed.
    TransportFailure(String),
}

/// Where the current snapshot came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotOrigin {
    /// No fetch has settled yet; the fallback dataset is showing.
    Pending,
    Remote,
    Fallback(FallbackReason),
}

impl SnapshotOrigin {
    pub fn is_fallback(&self) -> bool {
        !matches!(self, SnapshotOrigin::Remote)
    }
}

struct StoreState<R> {
    records: Vec<R>,
    origin: SnapshotOrigin,
    /// Inserts the backend confirmed while the collection listed nothing.
    /// Shown after the fallback dataset until a non-empty listing arrives.
    confirmed: Vec<R>,
    in_flight: usize,
    settled: bool,
}

pub struct ContentStore<R: ContentRecord> {
    client: Arc<dyn RemoteCollectionClient>,
    assets: Option<AssetLifecycleCoordinator>,
    state: RwLock<StoreState<R>>,
    scope: AbortScope,
}

/// Keeps `in_flight` accurate on every exit path of a fetch.
struct FetchGuard<'a, R: ContentRecord> {
    store: &'a ContentStore<R>,
}

impl<'a, R: ContentRecord> FetchGuard<'a, R> {
    fn enter(store: &'a ContentStore<R>) -> Self {
        store.write_state().in_flight += 1;
        Self { store }
    }
}

impl<R: ContentRecord> Drop for FetchGuard<'_, R> {
    fn drop(&mut self) {
        let mut state = self.store.write_state();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

impl<R: ContentRecord> ContentStore<R> {
    pub fn new(client: Arc<dyn RemoteCollectionClient>) -> Self {
        Self {
            client,
            assets: None,
            state: RwLock::new(StoreState {
                records: R::fallback_dataset(),
                origin: SnapshotOrigin::Pending,
                confirmed: Vec::new(),
                in_flight: 0,
                settled: false,
            }),
            scope: AbortScope::new(),
        }
    }

    /// Enables image uploads on [`ContentStore::add`] and blob cleanup on
    /// [`ContentStore::remove`].
    pub fn with_assets(mut self, assets: AssetLifecycleCoordinator) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn collection(&self) -> &'static str {
        R::COLLECTION
    }

    /// Handle the owner aborts on teardown.
    pub fn scope(&self) -> AbortScope {
        self.scope.clone()
    }

    pub fn assets(&self) -> Option<&AssetLifecycleCoordinator> {
        self.assets.as_ref()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, StoreState<R>> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState<R>> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current snapshot. No network access.
    pub fn list(&self) -> Vec<R> {
        self.read_state().records.clone()
    }

    pub fn get(&self, id: &str) -> Option<R> {
        self.read_state().records.iter().find(|r| r.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read_state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_state().records.is_empty()
    }

    pub fn origin(&self) -> SnapshotOrigin {
        self.read_state().origin.clone()
    }

    /// Message of the transport failure behind the current fallback, if any.
    pub fn last_error(&self) -> Option<String> {
        match &self.read_state().origin {
            SnapshotOrigin::Fallback(FallbackReason::TransportFailure(msg)) => Some(msg.clone()),
            _ => None,
        }
    }

    /// True until the first fetch settles and while any fetch is in flight.
    pub fn is_loading(&self) -> bool {
        let state = self.read_state();
        !state.settled || state.in_flight > 0
    }

    /// First load of the collection. Never fails; see [`ContentStore::refresh`].
    pub async fn initialize(&self) {
        self.refresh().await
    }

    /// Re-fetches the whole collection and replaces the snapshot.
    ///
    /// A failed or empty listing installs the fallback dataset, followed by
    /// any inserts this store has seen confirmed in the meantime. Errors are
    /// logged, never returned.
    pub async fn refresh(&self) {
        if !self.scope.is_live() {
            debug!("Store '{}' aborted; skipping refresh", R::COLLECTION);
            return;
        }

        let _guard = FetchGuard::enter(self);
        let listing = self.client.list(R::COLLECTION, &R::ORDER).await;

        if !self.scope.is_live() {
            debug!("Store '{}' aborted while listing; discarding result", R::COLLECTION);
            return;
        }

        let mut state = self.write_state();
        match listing.map(decode_rows::<R>) {
            Ok(records) if !records.is_empty() => {
                info!("Loaded {} records from '{}'", records.len(), R::COLLECTION);
                state.records = records;
                state.confirmed.clear();
                state.origin = SnapshotOrigin::Remote;
            }
            Ok(_) => {
                warn!("Collection '{}' is empty; showing fallback dataset", R::COLLECTION);
                let records = with_overlay(&state.confirmed);
                state.records = records;
                state.origin = SnapshotOrigin::Fallback(FallbackReason::Empty);
            }
            Err(e) => {
                warn!("Error fetching '{}': {e}; showing fallback dataset", R::COLLECTION);
                let records = with_overlay(&state.confirmed);
                state.records = records;
                state.origin = SnapshotOrigin::Fallback(FallbackReason::TransportFailure(e.to_string()));
            }
        }
        state.settled = true;
    }

    /// Validates and inserts a new record, publishing `asset` first when
    /// given, then refreshes the snapshot.
    ///
    /// # Errors
    ///
    /// Validation, upload and insert failures are returned to the caller. If
    /// the upload succeeded and the insert failed, the uploaded object stays
    /// in the bucket.
    ///
    /// Once the backend accepts the insert the call succeeds. Columns missing
    /// from the echoed row are taken from the draft; an echo that still cannot
    /// be read is looked up by id in the refreshed snapshot. Only an echo
    /// without a usable id that the listing does not show either is reported
    /// as an error.
    pub async fn add(&self, mut draft: R::Draft, asset: Option<BlobUpload>) -> Result<R, AppError> {
        self.ensure_live("add")?;
        R::validate(&draft, asset.is_some())?;

        let mut published = None;
        if let Some(upload) = asset {
            let assets = self.assets.as_ref().ok_or_else(|| {
                AppError::BadRequest(format!("Collection '{}' has no asset bucket", R::COLLECTION))
            })?;
            let url = assets.publish(upload).await?;
            R::attach_image(&mut draft, url.clone())?;
            published = Some(url);
        }

        let row = match self.client.insert(R::COLLECTION, R::insert_fields(&draft)).await {
            Ok(row) => row,
            Err(e) => {
                error!("Insert into '{}' failed: {e}", R::COLLECTION);
                if let Some(url) = published {
                    warn!("Uploaded object {url} is orphaned after the failed insert");
                }
                return Err(e);
            }
        };

        let inserted_id = row_id(&row).ok();
        match decode_inserted::<R>(&draft, row) {
            Ok(record) => {
                info!("Inserted record '{}' into '{}'", record.id(), R::COLLECTION);
                if self.scope.is_live() {
                    self.write_state().confirmed.push(record.clone());
                }
                self.refresh().await;
                Ok(record)
            }
            Err(e) => {
                warn!("Record inserted into '{}' but the returned row is unreadable: {e}", R::COLLECTION);
                self.refresh().await;
                inserted_id.and_then(|id| self.get(&id)).ok_or(e)
            }
        }
    }

    /// Sends the mutable fields of `record` keyed by its id, then refreshes.
    pub async fn update(&self, record: &R) -> Result<(), AppError> {
        self.ensure_live("update")?;
        R::validate(&record.to_draft(), false)?;

        self.client
            .update(R::COLLECTION, record.id(), record.patch_fields())
            .await
            .map_err(|e| {
                error!("Update of '{}' in '{}' failed: {e}", record.id(), R::COLLECTION);
                e
            })?;

        info!("Updated record '{}' in '{}'", record.id(), R::COLLECTION);
        self.refresh().await;
        Ok(())
    }

    /// Deletes the record, then makes a best-effort attempt to delete the
    /// blob behind `blob_url`. The local snapshot drops the id without a
    /// re-fetch.
    ///
    /// # Errors
    ///
    /// Only the record deletion can fail the operation.
    pub async fn remove(&self, id: &str, blob_url: Option<&str>) -> Result<(), AppError> {
        self.ensure_live("remove")?;

        self.client.delete(R::COLLECTION, id).await.map_err(|e| {
            error!("Delete of '{id}' from '{}' failed: {e}", R::COLLECTION);
            e
        })?;

        if let Some(url) = blob_url {
            match &self.assets {
                Some(assets) => assets.retract(url).await,
                None => warn!("No asset bucket for '{}'; leaving {url} in place", R::COLLECTION),
            }
        }

        if !self.scope.is_live() {
            debug!("Store '{}' aborted; not applying removal of '{id}'", R::COLLECTION);
            return Ok(());
        }

        let mut state = self.write_state();
        state.records.retain(|r| r.id() != id);
        state.confirmed.retain(|r| r.id() != id);
        info!("Removed record '{id}' from '{}'", R::COLLECTION);
        Ok(())
    }

    fn ensure_live(&self, operation: &str) -> Result<(), AppError> {
        if self.scope.is_live() {
            Ok(())
        } else {
            Err(AppError::Cancelled(format!("{operation} on aborted store '{}'", R::COLLECTION)))
        }
    }
}

fn decode_rows<R: ContentRecord>(rows: Vec<Row>) -> Vec<R> {
    rows.iter()
        .filter_map(|row| match R::from_row(row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping malformed row in '{}': {e}", R::COLLECTION);
                None
            }
        })
        .collect()
}

/// Reads the row the backend echoed for an insert, filling columns the echo
/// left out from the submitted fields.
fn decode_inserted<R: ContentRecord>(draft: &R::Draft, echoed: Row) -> Result<R, AppError> {
    let mut row = R::insert_fields(draft);
    row.extend(echoed);
    R::from_row(&row)
}

fn with_overlay<R: ContentRecord>(confirmed: &[R]) -> Vec<R> {
    let mut records = R::fallback_dataset();
    records.extend(confirmed.iter().cloned());
    records
}
