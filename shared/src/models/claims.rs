use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("Access token tidak bisa dibaca: {0}")]
    Malformed(String),
}

/// Claims access token yang diterbitkan auth provider managed backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl AccessTokenClaims {
    /// Baca claims tanpa verifikasi signature.
    /// Signature tetap diverifikasi backend di setiap request, di sini hanya butuh `exp` dan `sub`.
    pub fn peek(token: &str) -> Result<Self, ClaimsError> {
        jsonwebtoken::dangerous::insecure_decode::<AccessTokenClaims>(token)
            .map(|data| data.claims)
            .map_err(|e| ClaimsError::Malformed(e.to_string()))
    }

    /// Cek apakah token sudah expired berdasarkan current time
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp <= now
    }

    /// Cek apakah token akan expired dalam `seconds` detik ke depan
    pub fn expires_within(&self, seconds: i64) -> bool {
        self.remaining_validity() <= seconds
    }

    /// Get remaining validity duration dalam detik
    pub fn remaining_validity(&self) -> i64 {
        let now = chrono::Utc::now().timestamp();
        (self.exp - now).max(0)
    }
}
