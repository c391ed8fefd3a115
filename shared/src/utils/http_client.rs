use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Service tidak tersedia: {0}")]
    ServiceUnavailable(String),

    #[error("Response parsing error: {0}")]
    ParseError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Request ditolak ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Konfigurasi client tidak valid: {0}")]
    InvalidConfig(String),
}

impl HttpClientError {
    /// Status HTTP asli kalau error berasal dari response backend
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpClientError::Rejected { status, .. } => Some(*status),
            HttpClientError::Unauthorized(_) => Some(401),
            _ => None,
        }
    }
}

/// Client HTTP untuk managed backend (auth, REST tabel, object storage).
/// Setiap request membawa header `apikey` dan bearer token bila user sudah login.
#[derive(Clone)]
pub struct BackendHttpClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BackendHttpClient {
    // Buat client untuk project backend tertentu
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, HttpClientError> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(HttpClientError::InvalidConfig(format!(
                "Base URL harus http(s): {}",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpClientError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // Pasang header apikey + Authorization
    fn authorize(&self, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        let bearer = token.unwrap_or(&self.api_key);
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", bearer))
    }

    // GET request dengan authentication
    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        token: Option<&str>,
    ) -> Result<T, HttpClientError> {
        let request = self.authorize(self.client.get(self.url(endpoint)), token);
        self.send_json(request).await
    }

    // POST request dengan authentication
    pub async fn post<T: DeserializeOwned, B: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<T, HttpClientError> {
        let request = self
            .authorize(self.client.post(self.url(endpoint)), token)
            .header("Prefer", "return=representation")
            .json(body);
        self.send_json(request).await
    }

    // POST tanpa body response (insert tanpa representation, logout)
    pub async fn post_no_content<B: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<(), HttpClientError> {
        let request = self
            .authorize(self.client.post(self.url(endpoint)), token)
            .header("Prefer", "return=minimal")
            .json(body);
        self.send_empty(request).await
    }

    // PATCH request dengan authentication
    pub async fn patch<T: DeserializeOwned, B: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<T, HttpClientError> {
        let request = self
            .authorize(self.client.patch(self.url(endpoint)), token)
            .header("Prefer", "return=representation")
            .json(body);
        self.send_json(request).await
    }

    // Upload raw bytes (object storage)
    pub async fn post_bytes(
        &self,
        endpoint: &str,
        bytes: Vec<u8>,
        content_type: &str,
        token: Option<&str>,
    ) -> Result<serde_json::Value, HttpClientError> {
        let request = self
            .authorize(self.client.post(self.url(endpoint)), token)
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes);
        self.send_json(request).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, HttpClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| HttpClientError::RequestFailed(e.to_string()))?;

        self.handle_response(response).await
    }

    async fn send_empty(&self, request: RequestBuilder) -> Result<(), HttpClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| HttpClientError::RequestFailed(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    // Handle response dan parse JSON
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, HttpClientError> {
        if response.status().is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| HttpClientError::ParseError(e.to_string()))
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn error_from(response: Response) -> HttpClientError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let error = classify_status(status, &body);
        tracing::debug!("Backend menolak request: {}", error);
        error
    }
}

// Petakan status HTTP + body error backend ke HttpClientError
pub fn classify_status(status: StatusCode, body: &str) -> HttpClientError {
    let message = extract_error_message(body);

    match status {
        StatusCode::UNAUTHORIZED => HttpClientError::Unauthorized(message),
        s if s.is_server_error() => HttpClientError::ServiceUnavailable(message),
        s => HttpClientError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

// Ambil pesan error dari body JSON backend (format auth, REST, dan storage berbeda-beda)
pub fn extract_error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();

    if let Some(value) = parsed {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    return text.to_string();
                }
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Unknown error".to_string()
    } else {
        trimmed.to_string()
    }
}
