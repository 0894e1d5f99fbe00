//! Upload and cleanup of images that records point at.
//!
//! Publishing uploads the bytes under a fresh object key and returns the
//! public URL; the record insert that follows belongs to the caller and is
//! not transactional with the upload. An insert failure after a successful
//! publish leaves the object orphaned in the bucket.
//!
//! Retracting derives the object key from the URL and deletes it on a best
//! effort basis: by then the record is already gone, so storage errors are
//! logged and dropped.

use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;

use crate::app_error::AppError;
use crate::remote_client::RemoteCollectionClient;

const FALLBACK_STEM: &str = "upload";
const SUFFIX_LEN: usize = 8;

/// A binary supplied by the admin, e.g. a picked image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl BlobUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), bytes, content_type: None }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Clone)]
pub struct AssetLifecycleCoordinator {
    client: Arc<dyn RemoteCollectionClient>,
    bucket: String,
}

impl AssetLifecycleCoordinator {
    pub fn new(client: Arc<dyn RemoteCollectionClient>, bucket: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into() }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Uploads `upload` and returns its public URL.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for an empty payload and propagates the
    /// upload failure as is; no URL is minted in either case.
    pub async fn publish(&self, upload: BlobUpload) -> Result<String, AppError> {
        if upload.bytes.is_empty() {
            return Err(AppError::validation(format!("File '{}' is empty", upload.file_name)));
        }

        let key = object_key(&upload.file_name, Utc::now().timestamp_millis(), &random_suffix());
        let size = upload.bytes.len();

        self.client
            .upload_blob(&self.bucket, &key, upload.bytes, upload.content_type.as_deref())
            .await
            .map_err(|e| {
                warn!("Upload of '{}' to bucket '{}' failed: {e}", key, self.bucket);
                e
            })?;

        let url = self.client.public_url(&self.bucket, &key);
        info!("Published {size} bytes as {url}");
        Ok(url)
    }

    /// Best-effort removal of the object behind `url`. Never fails.
    pub async fn retract(&self, url: &str) {
        let Some(key) = object_name_from_url(url) else {
            warn!("Could not derive an object name from '{url}'; skipping blob deletion");
            return;
        };

        match self.client.remove_blobs(&self.bucket, &[key.clone()]).await {
            Ok(()) => info!("Removed object '{key}' from bucket '{}'", self.bucket),
            Err(e) => warn!("Storage deletion error, object '{key}' may persist: {e}"),
        }
    }
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..SUFFIX_LEN].to_string()
}

/// Builds the object key `{millis}-{suffix}-{sanitized name}`.
pub fn object_key(file_name: &str, millis: i64, suffix: &str) -> String {
    let suffix = strip_disallowed(suffix);
    format!("{millis}-{suffix}-{}", sanitize_file_name(file_name))
}

/// Reduces a user-supplied file name to `[A-Za-z0-9._-]`, keeping its
/// extension. Spaces become underscores, everything else outside the set is
/// dropped, dot runs collapse and leading/trailing dots go. Never empty.
pub fn sanitize_file_name(name: &str) -> String {
    let (stem, extension) = split_extension(name);

    let mut stem = sanitize_segment(stem);
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }
    let extension: String = extension.chars().filter(char::is_ascii_alphanumeric).collect();

    if extension.is_empty() {
        stem
    } else {
        format!("{stem}.{extension}")
    }
}

/// Trailing path segment of `url`, percent-decoded.
///
/// `None` unless the decoded name is a key [`object_key`] could have produced:
/// only `[A-Za-z0-9._-]`, and no leading or trailing dot. A name that would
/// need characters dropped to fit is not guessed at.
pub fn object_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    let name = percent_decode(segment)?;

    let allowed = name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if name.is_empty() || !allowed || name.starts_with('.') || name.ends_with('.') {
        None
    } else {
        Some(name)
    }
}

/// `None` on a malformed escape or a result that is not UTF-8.
fn percent_decode(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3).filter(|h| h.iter().all(u8::is_ascii_hexdigit))?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains(['/', '\\']) => (stem, ext),
        _ => (name, ""),
    }
}

fn sanitize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            c if c.is_ascii_alphanumeric() || c == '-' || c == '_' => out.push(c),
            '.' if !out.ends_with('.') => out.push('.'),
            ' ' => out.push('_'),
            _ => {}
        }
    }
    out.trim_matches('.').to_string()
}

fn strip_disallowed(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}
