//! In-process backend.
//!
//! Keeps collections, settings documents and bucket objects in memory with
//! the same observable behavior as the hosted service: ids and `created_at`
//! are assigned on insert, deletes and updates of unknown ids succeed
//! without touching anything, public URLs are derived without I/O.
//!
//! Every operation can be made to fail on demand, and listings can be held
//! at a gate, so callers can exercise their failure and race handling.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::info;
use serde_json::Value as JsonValue;
use tokio::sync::Notify;

use crate::app_error::AppError;
use crate::remote_client::{ListOrder, RemoteCollectionClient, Row, SortDirection, CREATED_AT_COLUMN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Insert,
    Update,
    Delete,
    FetchSetting,
    UpsertSetting,
    Upload,
    RemoveBlobs,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, Vec<Row>>,
    settings: HashMap<String, JsonValue>,
    buckets: HashMap<String, BTreeMap<String, Vec<u8>>>,
    failing: HashSet<Operation>,
    calls: HashMap<Operation, usize>,
    next_id: u64,
}

pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    epoch: DateTime<Utc>,
    persist_inserts: bool,
    list_gate: Mutex<Option<Arc<Notify>>>,
    settings_gate: Mutex<Option<Arc<Notify>>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState { next_id: 1, ..MemoryState::default() }),
            epoch: Utc::now(),
            persist_inserts: true,
            list_gate: Mutex::new(None),
            settings_gate: Mutex::new(None),
        }
    }

    /// A backend that answers inserts with the stored row but never lists
    /// them back.
    pub fn echoing() -> Self {
        Self { persist_inserts: false, ..Self::new() }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_on(&self, operation: Operation) {
        self.lock().failing.insert(operation);
    }

    pub fn recover(&self, operation: Operation) {
        self.lock().failing.remove(&operation);
    }

    pub fn calls(&self, operation: Operation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Holds every `list` call until the returned gate is notified.
    pub fn hold_lists(&self) -> Arc<Notify> {
        install_gate(&self.list_gate)
    }

    /// Holds every `fetch_setting` call until the returned gate is notified.
    pub fn hold_settings(&self) -> Arc<Notify> {
        install_gate(&self.settings_gate)
    }

    /// Appends rows as if they had been inserted earlier. Rows without an
    /// id or timestamp get one.
    pub fn seed(&self, collection: &str, rows: Vec<Row>) {
        let mut state = self.lock();
        for row in rows {
            let row = self.stamp(&mut state, row);
            state.collections.entry(collection.to_string()).or_default().push(row);
        }
    }

    pub fn rows(&self, collection: &str) -> Vec<Row> {
        self.lock().collections.get(collection).cloned().unwrap_or_default()
    }

    pub fn setting(&self, key: &str) -> Option<JsonValue> {
        self.lock().settings.get(key).cloned()
    }

    pub fn blob_keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn blob(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.lock().buckets.get(bucket).and_then(|objects| objects.get(key).cloned())
    }

    fn stamp(&self, state: &mut MemoryState, mut row: Row) -> Row {
        let seq = state.next_id;
        state.next_id += 1;
        row.entry("id").or_insert_with(|| JsonValue::from(seq));
        row.entry(CREATED_AT_COLUMN).or_insert_with(|| {
            let created = self.epoch + Duration::milliseconds(seq as i64);
            JsonValue::String(created.to_rfc3339())
        });
        row
    }

    fn begin(&self, operation: Operation, target: &str) -> Result<MutexGuard<'_, MemoryState>, AppError> {
        let mut state = self.lock();
        *state.calls.entry(operation).or_insert(0) += 1;
        if state.failing.contains(&operation) {
            return Err(AppError::TransportError(format!("{operation:?} on '{target}' rejected")));
        }
        Ok(state)
    }
}

fn install_gate(slot: &Mutex<Option<Arc<Notify>>>) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    *slot.lock().unwrap_or_else(|p| p.into_inner()) = Some(gate.clone());
    gate
}

async fn pass_gate(slot: &Mutex<Option<Arc<Notify>>>) {
    let gate = slot.lock().unwrap_or_else(|p| p.into_inner()).clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
}

fn id_matches(row: &Row, id: &str) -> bool {
    match row.get("id") {
        Some(JsonValue::String(s)) => s == id,
        Some(JsonValue::Number(n)) => n.to_string() == id,
        _ => false,
    }
}

#[async_trait]
impl RemoteCollectionClient for MemoryBackend {
    async fn list(&self, collection: &str, order: &ListOrder) -> Result<Vec<Row>, AppError> {
        pass_gate(&self.list_gate).await;

        let state = self.begin(Operation::List, collection)?;
        let mut rows = state.collections.get(collection).cloned().unwrap_or_default();
        if order.direction == SortDirection::Descending {
            rows.reverse();
        }
        Ok(rows)
    }

    async fn insert(&self, collection: &str, fields: Row) -> Result<Row, AppError> {
        let mut state = self.begin(Operation::Insert, collection)?;
        let mut fields = fields;
        fields.remove("id");
        fields.remove(CREATED_AT_COLUMN);
        let row = self.stamp(&mut state, fields);
        if self.persist_inserts {
            state.collections.entry(collection.to_string()).or_default().push(row.clone());
        }
        info!("Memory backend stored row in '{collection}'");
        Ok(row)
    }

    async fn update(&self, collection: &str, id: &str, patch: Row) -> Result<(), AppError> {
        let mut state = self.begin(Operation::Update, collection)?;
        if let Some(row) = state
            .collections
            .get_mut(collection)
            .and_then(|rows| rows.iter_mut().find(|row| id_matches(row, id)))
        {
            for (column, value) in patch {
                if column != "id" && column != CREATED_AT_COLUMN {
                    row.insert(column, value);
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        let mut state = self.begin(Operation::Delete, collection)?;
        if let Some(rows) = state.collections.get_mut(collection) {
            rows.retain(|row| !id_matches(row, id));
        }
        Ok(())
    }

    async fn fetch_setting(&self, key: &str) -> Result<Option<JsonValue>, AppError> {
        pass_gate(&self.settings_gate).await;

        let state = self.begin(Operation::FetchSetting, key)?;
        Ok(state.settings.get(key).cloned())
    }

    async fn upsert_setting(&self, key: &str, value: JsonValue) -> Result<(), AppError> {
        let mut state = self.begin(Operation::UpsertSetting, key)?;
        state.settings.insert(key.to_string(), value);
        Ok(())
    }

    async fn upload_blob(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<(), AppError> {
        let mut state = self.begin(Operation::Upload, bucket)?;
        let objects = state.buckets.entry(bucket.to_string()).or_default();
        if objects.contains_key(key) {
            return Err(AppError::TransportError(format!("Object '{key}' already exists in '{bucket}'")));
        }
        objects.insert(key.to_string(), bytes);
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("memory://{bucket}/{key}")
    }

    async fn remove_blobs(&self, bucket: &str, keys: &[String]) -> Result<(), AppError> {
        let mut state = self.begin(Operation::RemoveBlobs, bucket)?;
        if let Some(objects) = state.buckets.get_mut(bucket) {
            for key in keys {
                objects.remove(key);
            }
        }
        Ok(())
    }
}
