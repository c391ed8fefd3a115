use shared::utils::storage::StorageError;
use std::fmt;

use crate::backend::BackendError;

// Tempat error ditampilkan ke user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSurface {
    // Pesan langsung ke user (kirim pesan, upload, buat chat)
    Alert,
    // Cukup di log (read path)
    Console,
    // Arahkan balik ke halaman login
    Redirect,
}

// Custom error type untuk messenger client
#[derive(Debug)]
pub enum AppError {
    Backend(BackendError),
    NotAuthenticated,
    NotFound(String),
    ValidationError(String),
    Upload(String),
    Realtime(String),
    Config(String),
    Io(std::io::Error),
    InternalServer(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    // Session hilang / ditolak backend
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            AppError::NotAuthenticated | AppError::Backend(BackendError::NotAuthenticated)
        )
    }

    pub fn surface(&self) -> ErrorSurface {
        match self {
            AppError::NotAuthenticated | AppError::Backend(BackendError::NotAuthenticated) => {
                ErrorSurface::Redirect
            }
            AppError::ValidationError(_)
            | AppError::Upload(_)
            | AppError::Backend(BackendError::Auth(_))
            | AppError::Backend(BackendError::Forbidden(_))
            | AppError::Backend(BackendError::Storage(_)) => ErrorSurface::Alert,
            _ => ErrorSurface::Console,
        }
    }

    // Teks yang ditampilkan ke user
    pub fn user_message(&self) -> String {
        match self {
            AppError::Backend(BackendError::Auth(msg)) => msg.clone(),
            AppError::Backend(BackendError::Forbidden(_)) => {
                "Anda tidak memiliki akses ke percakapan ini".to_string()
            }
            AppError::Backend(BackendError::Storage(err)) => format!("Upload gagal: {}", err),
            AppError::Backend(BackendError::NotAuthenticated) | AppError::NotAuthenticated => {
                "Sesi berakhir, silakan login kembali".to_string()
            }
            AppError::Backend(_) => "Gagal menghubungi server, coba lagi".to_string(),
            AppError::NotFound(msg) => format!("{} tidak ditemukan", msg),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::Upload(msg) => format!("Upload gagal: {}", msg),
            AppError::Realtime(_) => "Koneksi realtime terputus".to_string(),
            AppError::Config(msg) => format!("Konfigurasi tidak valid: {}", msg),
            AppError::Io(_) | AppError::InternalServer(_) => {
                "Terjadi kesalahan, coba lagi".to_string()
            }
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotAuthenticated => AppError::NotAuthenticated,
            BackendError::Realtime(msg) => AppError::Realtime(msg),
            other => AppError::Backend(other),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Upload(inner) => AppError::Backend(BackendError::Http(inner)),
            other => AppError::Upload(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{}: {}", field, e.code.as_ref()),
                })
            })
            .collect();
        messages.sort();
        AppError::validation(messages.join(", "))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!("IO error: {:?}", err);
        AppError::Io(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InternalServer(format!("JSON error: {}", err))
    }
}

// Display trait untuk error formatting
impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Backend(err) => write!(f, "Backend error: {}", err),
            AppError::NotAuthenticated => write!(f, "Not authenticated"),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Upload(msg) => write!(f, "Upload error: {}", msg),
            AppError::Realtime(msg) => write!(f, "Realtime error: {}", msg),
            AppError::Config(msg) => write!(f, "Config error: {}", msg),
            AppError::Io(err) => write!(f, "IO error: {}", err),
            AppError::InternalServer(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;
