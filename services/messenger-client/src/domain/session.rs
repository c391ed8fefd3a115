// Domain model untuk identitas auth dan session
use serde::{Deserialize, Serialize};
use shared::models::claims::AccessTokenClaims;
use uuid::Uuid;

/// Identitas user yang diterbitkan auth provider (berbeda dari Profile)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl Session {
    // Cek apakah access token perlu di-refresh dalam `leeway_secs` detik ke depan
    pub fn needs_refresh(&self, leeway_secs: i64) -> bool {
        match AccessTokenClaims::peek(&self.access_token) {
            Ok(claims) => claims.expires_within(leeway_secs),
            Err(_) => match self.expires_at {
                Some(expires_at) => expires_at - chrono::Utc::now().timestamp() <= leeway_secs,
                None => false,
            },
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Hasil sign-up dari auth provider.
/// `session` kosong bila backend mewajibkan konfirmasi email lebih dulu.
#[derive(Debug, Clone)]
pub struct SignUpResponse {
    pub user: AuthUser,
    pub session: Option<Session>,
}
