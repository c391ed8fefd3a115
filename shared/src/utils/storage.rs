use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::http_client::{BackendHttpClient, HttpClientError};

// Constants untuk validasi upload gambar chat
pub const MAX_IMAGE_SIZE: usize = 5 * 1024 * 1024;
const ALLOWED_IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Tipe file tidak diizinkan: {0}")]
    UnsupportedType(String),

    #[error("File terlalu besar: {size} bytes (maksimal {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("File kosong")]
    Empty,

    #[error("Upload gagal: {0}")]
    Upload(#[from] HttpClientError),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(rename = "Key", alias = "key")]
    pub key: String,
}

// Validasi gambar sebelum upload, return extension file
pub fn validate_image(content_type: &str, size: usize) -> Result<&'static str, StorageError> {
    if size == 0 {
        return Err(StorageError::Empty);
    }

    if size > MAX_IMAGE_SIZE {
        return Err(StorageError::TooLarge {
            size,
            max: MAX_IMAGE_SIZE,
        });
    }

    let normalized = content_type.trim().to_lowercase();
    ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(mime, _)| *mime == normalized)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| StorageError::UnsupportedType(content_type.to_string()))
}

// Tebak content type dari nama file (untuk upload dari path lokal)
pub fn content_type_for_filename(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit('.').next()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

// Path object untuk gambar chat: <conversation_id>/<timestamp_millis>.<ext>
pub fn chat_image_path(conversation_id: &uuid::Uuid, timestamp_millis: i64, ext: &str) -> String {
    format!("{}/{}.{}", conversation_id, timestamp_millis, ext)
}

/// Client object storage pada managed backend
#[derive(Clone)]
pub struct StorageClient {
    http: BackendHttpClient,
    bucket: String,
}

impl StorageClient {
    pub fn new(http: BackendHttpClient, bucket: &str) -> Self {
        Self {
            http,
            bucket: bucket.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    // Upload file ke bucket pada path tertentu
    pub async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        token: &str,
    ) -> Result<UploadResponse, StorageError> {
        let endpoint = format!("/storage/v1/object/{}/{}", self.bucket, path);
        let size = bytes.len();

        let value = self
            .http
            .post_bytes(&endpoint, bytes, content_type, Some(token))
            .await?;

        let response: UploadResponse = serde_json::from_value(value)
            .map_err(|e| StorageError::Upload(HttpClientError::ParseError(e.to_string())))?;

        tracing::debug!("Object {} ({} bytes) terupload ke bucket {}", response.key, size, self.bucket);
        Ok(response)
    }

    // URL publik untuk object di bucket publik
    pub fn public_url(&self, path: &str) -> String {
        public_object_url(self.http.base_url(), &self.bucket, path)
    }
}

pub fn public_object_url(base_url: &str, bucket: &str, path: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        path.trim_start_matches('/')
    )
}
