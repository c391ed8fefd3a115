// Konfigurasi messenger client + context yang dibagi ke semua halaman
use shared::utils::http_client::BackendHttpClient;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{Backend, MemoryBackend, RestBackend};
use crate::error::{AppError, AppResult};
use crate::pages::auth::AuthService;
use crate::session_store::SessionStore;

pub const MEMORY_BACKEND_URL: &str = "memory://";

const DEFAULT_BUCKET: &str = "chat-images";
const DEFAULT_SESSION_FILE: &str = ".obrolan-session.json";
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

// Application configuration yang di-load dari environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend_url: String,
    pub backend_anon_key: String,
    pub storage_bucket: String,
    pub session_file: String,
    pub search_debounce: Duration,
    pub http_timeout: Duration,
    pub environment: String,
}

impl AppConfig {
    // Load semua konfigurasi dari environment variables dengan validasi
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("BACKEND_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or("BACKEND_URL harus diset di environment")?;

        let is_memory = backend_url.starts_with(MEMORY_BACKEND_URL);

        let backend_anon_key = match lookup("BACKEND_ANON_KEY") {
            Some(key) if !key.trim().is_empty() => key.trim().to_string(),
            _ if is_memory => String::new(),
            _ => return Err("BACKEND_ANON_KEY harus diset di environment".to_string()),
        };

        if !is_memory && !backend_url.starts_with("http://") && !backend_url.starts_with("https://")
        {
            return Err(format!("BACKEND_URL tidak valid: {}", backend_url));
        }

        let storage_bucket =
            lookup("STORAGE_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string());

        let session_file =
            lookup("SESSION_FILE").unwrap_or_else(|| DEFAULT_SESSION_FILE.to_string());

        let search_debounce_ms = match lookup("SEARCH_DEBOUNCE_MS") {
            Some(raw) => raw
                .parse()
                .map_err(|_| format!("SEARCH_DEBOUNCE_MS bukan angka: {}", raw))?,
            None => DEFAULT_SEARCH_DEBOUNCE_MS,
        };

        let http_timeout_secs = match lookup("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse()
                .map_err(|_| format!("HTTP_TIMEOUT_SECS bukan angka: {}", raw))?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let environment = lookup("RUST_ENV").unwrap_or_else(|| "development".to_string());

        Ok(AppConfig {
            backend_url,
            backend_anon_key,
            storage_bucket,
            session_file,
            search_debounce: Duration::from_millis(search_debounce_ms),
            http_timeout: Duration::from_secs(http_timeout_secs),
            environment,
        })
    }

    pub fn is_memory_backend(&self) -> bool {
        self.backend_url.starts_with(MEMORY_BACKEND_URL)
    }

    // Helper cek production mode
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Context eksplisit untuk semua halaman: config, backend, dan penyimpanan session
#[derive(Clone)]
pub struct ClientContext {
    pub config: AppConfig,
    pub backend: Arc<dyn Backend>,
    pub sessions: Arc<SessionStore>,
}

impl ClientContext {
    // Inisialisasi context dari config (REST backend atau in-memory)
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let backend: Arc<dyn Backend> = if config.is_memory_backend() {
            tracing::warn!("⚠️ Menggunakan in-memory backend - data hilang saat keluar");
            Arc::new(MemoryBackend::new(&config.storage_bucket))
        } else {
            let http = BackendHttpClient::new(
                &config.backend_url,
                &config.backend_anon_key,
                config.http_timeout,
            )
            .map_err(|e| AppError::config(e.to_string()))?;
            Arc::new(RestBackend::new(http, &config.storage_bucket))
        };

        let sessions = if config.is_memory_backend() {
            SessionStore::memory()
        } else {
            SessionStore::file(&config.session_file)
        };

        Ok(Self::with_backend(config, backend, sessions))
    }

    pub fn with_backend(
        config: AppConfig,
        backend: Arc<dyn Backend>,
        sessions: SessionStore,
    ) -> Self {
        Self {
            config,
            backend,
            sessions: Arc::new(sessions),
        }
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.clone())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn memory_config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "BACKEND_URL" => Some(MEMORY_BACKEND_URL.to_string()),
            _ => None,
        })
        .unwrap()
    }

    pub fn memory_context() -> (ClientContext, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::default());
        let ctx = ClientContext::with_backend(memory_config(), backend.clone(), SessionStore::memory());
        (ctx, backend)
    }

    pub fn mock_context(backend: crate::backend::MockBackend) -> ClientContext {
        ClientContext::with_backend(memory_config(), Arc::new(backend), SessionStore::memory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("BACKEND_URL", "https://proj.example.co"),
            ("BACKEND_ANON_KEY", "anon"),
        ]))
        .unwrap();

        assert_eq!(config.storage_bucket, "chat-images");
        assert_eq!(config.session_file, ".obrolan-session.json");
        assert_eq!(config.search_debounce, Duration::from_millis(300));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert!(!config.is_production());
        assert!(!config.is_memory_backend());
    }

    #[test]
    fn test_missing_key_rejected_for_hosted_backend() {
        let result = AppConfig::from_lookup(lookup_from(&[("BACKEND_URL", "https://proj.example.co")]));
        assert!(result.unwrap_err().contains("BACKEND_ANON_KEY"));
    }

    #[test]
    fn test_memory_backend_needs_no_key() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("BACKEND_URL", "memory://"),
            ("SEARCH_DEBOUNCE_MS", "50"),
            ("RUST_ENV", "production"),
        ]))
        .unwrap();
        assert!(config.is_memory_backend());
        assert!(config.is_production());
        assert_eq!(config.search_debounce, Duration::from_millis(50));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("BACKEND_URL", "memory://"),
            ("HTTP_TIMEOUT_SECS", "lama"),
        ]));
        assert!(result.is_err());
    }
}
