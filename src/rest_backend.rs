//! HTTP backend for a hosted Postgres-REST service with object storage.
//!
//! Collections map to tables under `/rest/v1`, settings documents to rows of
//! a key/value table, blobs to objects under `/storage/v1`. Every request
//! carries the project's public key; writes made after [`RestBackend::sign_in`]
//! are authorized with the admin session instead.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use log::{info, warn};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::app_error::AppError;
use crate::config::BackendConfig;
use crate::remote_client::{ListOrder, RemoteCollectionClient, Row};

const PREFER: &str = "Prefer";
const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates";
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

pub struct RestBackend {
    http: Client,
    base_url: String,
    anon_key: String,
    settings_table: String,
    session: RwLock<Option<String>>,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self {
            http: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            settings_table: config.settings_table.clone(),
            session: RwLock::new(None),
        })
    }

    fn session(&self) -> RwLockReadGuard<'_, Option<String>> {
        self.session.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn session_mut(&self) -> RwLockWriteGuard<'_, Option<String>> {
        self.session.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, key)
    }

    fn token_url(&self) -> String {
        format!("{}/auth/v1/token?grant_type=password", self.base_url)
    }

    /// Session token when signed in, the public key otherwise.
    fn bearer(&self) -> String {
        self.session().clone().unwrap_or_else(|| self.anon_key.clone())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", &self.anon_key).bearer_auth(self.bearer())
    }

    /// Exchanges admin credentials for a session used by later requests.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AppError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::validation("Email and password are required"));
        }

        let response = self
            .http
            .post(self.token_url())
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = expect_success(response).await?.json().await?;

        *self.session_mut() = Some(token.access_token);
        info!("Admin session started for {email}");
        Ok(())
    }

    pub fn sign_out(&self) {
        if self.session_mut().take().is_some() {
            info!("Admin session ended");
        }
    }

    pub fn is_admin(&self) -> bool {
        self.session().is_some()
    }
}

async fn expect_success(response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    warn!("Backend call to {url} returned {status}");
    Err(AppError::TransportError(format!("HTTP {status}: {body}")))
}

fn id_filter(id: &str) -> [(&'static str, String); 1] {
    [("id", format!("eq.{id}"))]
}

#[async_trait]
impl RemoteCollectionClient for RestBackend {
    async fn list(&self, collection: &str, order: &ListOrder) -> Result<Vec<Row>, AppError> {
        let order_param = format!("{}.{}", order.column, order.direction.as_query());
        let request = self
            .http
            .get(self.table_url(collection))
            .query(&[("select", "*"), ("order", order_param.as_str())]);
        let response = self.authorized(request).send().await?;
        Ok(expect_success(response).await?.json::<Vec<Row>>().await?)
    }

    async fn insert(&self, collection: &str, fields: Row) -> Result<Row, AppError> {
        let request = self
            .http
            .post(self.table_url(collection))
            .header(PREFER, RETURN_REPRESENTATION)
            .json(&vec![fields]);
        let response = self.authorized(request).send().await?;
        let rows: Vec<Row> = expect_success(response).await?.json().await?;
        rows.into_iter().next().ok_or_else(|| {
            AppError::SerializationError(format!("Insert into '{collection}' returned no row"))
        })
    }

    async fn update(&self, collection: &str, id: &str, patch: Row) -> Result<(), AppError> {
        let request = self.http.patch(self.table_url(collection)).query(&id_filter(id)).json(&patch);
        let response = self.authorized(request).send().await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        let request = self.http.delete(self.table_url(collection)).query(&id_filter(id));
        let response = self.authorized(request).send().await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn fetch_setting(&self, key: &str) -> Result<Option<JsonValue>, AppError> {
        let filter = format!("eq.{key}");
        let request = self
            .http
            .get(self.table_url(&self.settings_table))
            .query(&[("key", filter.as_str()), ("select", "value")]);
        let response = self.authorized(request).send().await?;
        let rows: Vec<Row> = expect_success(response).await?.json().await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove("value"))
            .filter(|value| !value.is_null()))
    }

    async fn upsert_setting(&self, key: &str, value: JsonValue) -> Result<(), AppError> {
        let request = self
            .http
            .post(self.table_url(&self.settings_table))
            .query(&[("on_conflict", "key")])
            .header(PREFER, MERGE_DUPLICATES)
            .json(&json!([{ "key": key, "value": value }]));
        let response = self.authorized(request).send().await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn upload_blob(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), AppError> {
        let content_type = HeaderValue::from_str(content_type.unwrap_or(OCTET_STREAM))
            .map_err(|e| AppError::BadRequest(format!("Invalid content type: {e}")))?;
        let request = self
            .http
            .post(self.object_url(bucket, key))
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes);
        let response = self.authorized(request).send().await?;
        expect_success(response).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, key)
    }

    async fn remove_blobs(&self, bucket: &str, keys: &[String]) -> Result<(), AppError> {
        let request = self
            .http
            .delete(format!("{}/storage/v1/object/{}", self.base_url, bucket))
            .json(&json!({ "prefixes": keys }));
        let response = self.authorized(request).send().await?;
        expect_success(response).await?;
        Ok(())
    }
}
