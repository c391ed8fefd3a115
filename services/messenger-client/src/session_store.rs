// Penyimpanan session antar run (pengganti local storage di browser)
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::domain::Session;
use crate::error::AppResult;

pub enum SessionStore {
    File(PathBuf),
    Memory(Mutex<Option<Session>>),
}

impl SessionStore {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        SessionStore::File(path.into())
    }

    pub fn memory() -> Self {
        SessionStore::Memory(Mutex::new(None))
    }

    // Session tersimpan; file rusak dianggap tidak ada session
    pub async fn load(&self) -> AppResult<Option<Session>> {
        match self {
            SessionStore::File(path) => {
                let raw = match tokio::fs::read_to_string(path).await {
                    Ok(raw) => raw,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                match serde_json::from_str(&raw) {
                    Ok(session) => Ok(Some(session)),
                    Err(e) => {
                        tracing::warn!("File session {} tidak valid: {}", path.display(), e);
                        Ok(None)
                    }
                }
            }
            SessionStore::Memory(slot) => Ok(slot.lock().await.clone()),
        }
    }

    pub async fn save(&self, session: &Session) -> AppResult<()> {
        match self {
            SessionStore::File(path) => {
                let raw = serde_json::to_string_pretty(session)?;
                tokio::fs::write(path, raw).await?;
                tracing::debug!("Session disimpan ke {}", path.display());
                Ok(())
            }
            SessionStore::Memory(slot) => {
                *slot.lock().await = Some(session.clone());
                Ok(())
            }
        }
    }

    pub async fn clear(&self) -> AppResult<()> {
        match self {
            SessionStore::File(path) => match tokio::fs::remove_file(path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
            SessionStore::Memory(slot) => {
                *slot.lock().await = None;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AuthUser;
    use uuid::Uuid;

    fn sample_session() -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Some(1_900_000_000),
            user: AuthUser {
                id: Uuid::new_v4(),
                email: Some("budi@example.com".to_string()),
                user_metadata: serde_json::Value::Null,
            },
        }
    }

    #[tokio::test]
    async fn test_file_store_roundtrip_and_clear() {
        let path = std::env::temp_dir().join(format!("obrolan-session-{}.json", Uuid::new_v4()));
        let store = SessionStore::file(&path);

        assert!(store.load().await.unwrap().is_none());

        let session = sample_session();
        store.save(&session).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(session));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        // clear kedua kali tetap ok
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_ignored() {
        let path = std::env::temp_dir().join(format!("obrolan-session-{}.json", Uuid::new_v4()));
        tokio::fs::write(&path, "bukan json").await.unwrap();

        let store = SessionStore::file(&path);
        assert!(store.load().await.unwrap().is_none());
        store.clear().await.unwrap();
    }
}
