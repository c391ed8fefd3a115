// Auth: signup, login, logout, session, profile dan presence
use chrono::Utc;
use serde_json::json;
use shared::utils::validation::{is_valid_email, validate_display_name, validate_username};
use uuid::Uuid;
use validator::Validate;

use super::Navigation;
use crate::backend::BackendError;
use crate::config::ClientContext;
use crate::domain::{AuthUser, NewProfile, PresenceStatus, Profile, ProfileUpdate, Session};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Validate)]
pub struct SignUpInput {
    #[validate(email(message = "Format email tidak valid"))]
    pub email: String,
    #[validate(length(min = 6, max = 128, message = "Password minimal 6 karakter"))]
    pub password: String,
    pub username: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    SignedIn { session: Session, profile: Profile },
    // Backend mewajibkan konfirmasi email, belum ada session
    ConfirmationRequired { user: AuthUser },
}

impl SignUpOutcome {
    pub fn next_page(&self) -> Navigation {
        match self {
            SignUpOutcome::SignedIn { .. } => Navigation::Inbox,
            SignUpOutcome::ConfirmationRequired { .. } => Navigation::Login,
        }
    }
}

pub struct AuthService {
    ctx: ClientContext,
}

impl AuthService {
    pub fn new(ctx: ClientContext) -> Self {
        Self { ctx }
    }

    pub async fn sign_up(&self, input: SignUpInput) -> AppResult<SignUpOutcome> {
        input.validate()?;
        let username = input.username.trim();
        let display_name = input.display_name.trim();
        validate_username(username).map_err(AppError::validation)?;
        validate_display_name(display_name).map_err(AppError::validation)?;

        let email = input.email.trim();
        let response = self
            .ctx
            .backend
            .sign_up(
                email,
                &input.password,
                json!({ "username": username, "display_name": display_name }),
            )
            .await?;

        let Some(session) = response.session else {
            tracing::info!("📧 Sign up {} menunggu konfirmasi email", email);
            return Ok(SignUpOutcome::ConfirmationRequired {
                user: response.user,
            });
        };

        let profile = self
            .ctx
            .backend
            .insert_profile(&NewProfile {
                id: response.user.id,
                username: username.to_string(),
                display_name: Some(display_name.to_string()),
                avatar_url: None,
                status: PresenceStatus::Online,
                last_seen: Some(Utc::now()),
            })
            .await?;

        self.persist(&session).await;
        tracing::info!("✅ User {} terdaftar sebagai @{}", profile.id, profile.username);

        Ok(SignUpOutcome::SignedIn { session, profile })
    }

    pub async fn log_in(&self, email: &str, password: &str) -> AppResult<Session> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AppError::validation("Format email tidak valid"));
        }
        if password.is_empty() {
            return Err(AppError::validation("Password wajib diisi"));
        }

        let session = self
            .ctx
            .backend
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| {
                tracing::warn!("Login {} gagal: {}", email, e);
                AppError::from(e)
            })?;

        if let Err(e) = self.update_presence(session.user_id(), PresenceStatus::Online).await {
            tracing::warn!("Gagal set presence online untuk {}: {}", session.user_id(), e);
        }
        self.persist(&session).await;

        tracing::info!("🔐 User {} login", session.user_id());
        Ok(session)
    }

    pub async fn log_out(&self) -> AppResult<()> {
        if let Some(session) = self.ctx.backend.current_session().await {
            if let Err(e) = self.update_presence(session.user_id(), PresenceStatus::Offline).await {
                tracing::warn!("Gagal set presence offline untuk {}: {}", session.user_id(), e);
            }
            tracing::info!("👋 User {} logout", session.user_id());
        }

        let result = self.ctx.backend.sign_out().await;
        if let Err(e) = self.ctx.sessions.clear().await {
            tracing::warn!("Gagal menghapus session tersimpan: {}", e);
        }
        result.map_err(AppError::from)
    }

    // Session aktif; bila belum ada, coba pulihkan dari session tersimpan
    pub async fn restore(&self) -> AppResult<Option<Session>> {
        if let Some(session) = self.ctx.backend.current_session().await {
            // Backend bisa sudah me-rotate token; samakan dengan yang tersimpan
            if self.ctx.sessions.load().await?.as_ref() != Some(&session) {
                self.persist(&session).await;
            }
            return Ok(Some(session));
        }

        let Some(stored) = self.ctx.sessions.load().await? else {
            return Ok(None);
        };

        match self.ctx.backend.restore_session(stored).await {
            Ok(session) => {
                self.persist(&session).await;
                tracing::info!("🔄 Session user {} dipulihkan", session.user_id());
                Ok(Some(session))
            }
            Err(BackendError::Auth(reason)) => {
                tracing::warn!("Session tersimpan ditolak: {}", reason);
                self.ctx.sessions.clear().await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn current_user(&self) -> AppResult<Option<AuthUser>> {
        if self.ctx.backend.current_session().await.is_none() {
            return Ok(None);
        }
        Ok(Some(self.ctx.backend.get_user().await?))
    }

    pub async fn get_profile(&self, id: Uuid) -> AppResult<Option<Profile>> {
        Ok(self.ctx.backend.fetch_profile(id).await?)
    }

    pub async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> AppResult<Profile> {
        if update.is_empty() {
            return Err(AppError::validation("Tidak ada perubahan profile"));
        }
        if let Some(username) = &update.username {
            validate_username(username).map_err(AppError::validation)?;
        }
        if let Some(display_name) = &update.display_name {
            validate_display_name(display_name).map_err(AppError::validation)?;
        }
        Ok(self.ctx.backend.update_profile(id, update).await?)
    }

    pub async fn set_presence(&self, status: PresenceStatus) -> AppResult<Profile> {
        let session = self
            .ctx
            .backend
            .current_session()
            .await
            .ok_or(AppError::NotAuthenticated)?;
        self.update_presence(session.user_id(), status).await
    }

    // Halaman terlihat -> online, disembunyikan -> away
    pub async fn set_visibility(&self, visible: bool) -> AppResult<Profile> {
        let status = if visible {
            PresenceStatus::Online
        } else {
            PresenceStatus::Away
        };
        self.set_presence(status).await
    }

    async fn update_presence(&self, id: Uuid, status: PresenceStatus) -> AppResult<Profile> {
        let update = ProfileUpdate::presence(status, Utc::now());
        Ok(self.ctx.backend.update_profile(id, &update).await?)
    }

    async fn persist(&self, session: &Session) {
        if let Err(e) = self.ctx.sessions.save(session).await {
            tracing::warn!("Gagal menyimpan session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, MockBackend};
    use crate::config::test_support::{memory_context, mock_context};

    fn input(email: &str, username: &str) -> SignUpInput {
        SignUpInput {
            email: email.to_string(),
            password: "rahasia123".to_string(),
            username: username.to_string(),
            display_name: "Budi Santoso".to_string(),
        }
    }

    fn session_for(id: Uuid) -> Session {
        Session {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: None,
            user: AuthUser {
                id,
                email: Some("budi@example.com".to_string()),
                user_metadata: serde_json::Value::Null,
            },
        }
    }

    #[tokio::test]
    async fn test_sign_up_creates_session_and_matching_profile() {
        let (ctx, backend) = memory_context();
        let outcome = ctx.auth().sign_up(input("budi@example.com", "budi")).await.unwrap();

        let SignUpOutcome::SignedIn { session, profile } = &outcome else {
            panic!("expected session");
        };
        assert_eq!(outcome.next_page(), Navigation::Inbox);
        assert_eq!(profile.id, session.user_id());
        assert_eq!(profile.username, "budi");
        assert_eq!(profile.status, PresenceStatus::Online);

        let stored = backend.profile(session.user_id()).await.unwrap();
        assert_eq!(stored.username, "budi");
        assert_eq!(ctx.sessions.load().await.unwrap().as_ref(), Some(session));
    }

    #[tokio::test]
    async fn test_sign_up_validation_never_reaches_backend() {
        // MockBackend tanpa expectation: setiap call akan panic
        let ctx = mock_context(MockBackend::new());
        let auth = ctx.auth();

        let err = auth.sign_up(input("bukan-email", "budi")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = auth.sign_up(input("budi@example.com", "b!")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let mut short = input("budi@example.com", "budi");
        short.password = "123".to_string();
        assert!(auth.sign_up(short).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_password_leaves_no_session() {
        let (ctx, backend) = memory_context();
        let auth = ctx.auth();
        auth.sign_up(input("budi@example.com", "budi")).await.unwrap();
        auth.log_out().await.unwrap();

        let err = auth.log_in("budi@example.com", "salah-password").await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid login credentials");
        assert!(backend.current_session().await.is_none());
        assert!(ctx.sessions.load().await.unwrap().is_none());
        assert!(auth.restore().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_and_logout_update_presence() {
        let (ctx, backend) = memory_context();
        let auth = ctx.auth();
        let outcome = auth.sign_up(input("budi@example.com", "budi")).await.unwrap();
        let SignUpOutcome::SignedIn { profile, .. } = outcome else {
            panic!("expected session");
        };

        auth.set_visibility(false).await.unwrap();
        assert_eq!(backend.profile(profile.id).await.unwrap().status, PresenceStatus::Away);

        auth.log_out().await.unwrap();
        let after_logout = backend.profile(profile.id).await.unwrap();
        assert_eq!(after_logout.status, PresenceStatus::Offline);
        assert!(after_logout.last_seen.is_some());

        auth.log_in("budi@example.com", "rahasia123").await.unwrap();
        assert_eq!(backend.profile(profile.id).await.unwrap().status, PresenceStatus::Online);
        assert!(auth.current_user().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_presence_failure_does_not_fail_login() {
        let user_id = Uuid::new_v4();
        let mut mock = MockBackend::new();
        mock.expect_sign_in_with_password()
            .returning(move |_, _| Ok(session_for(user_id)));
        mock.expect_update_profile()
            .times(1)
            .returning(|_, _| Err(BackendError::Forbidden("rls".to_string())));

        let ctx = mock_context(mock);
        let session = ctx.auth().log_in("budi@example.com", "rahasia123").await.unwrap();
        assert_eq!(session.user_id(), user_id);
        assert_eq!(ctx.sessions.load().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_rejected_stored_session_is_cleared() {
        let mut mock = MockBackend::new();
        mock.expect_current_session().returning(|| None);
        mock.expect_restore_session()
            .returning(|_| Err(BackendError::Auth("Invalid Refresh Token".to_string())));

        let ctx = mock_context(mock);
        ctx.sessions.save(&session_for(Uuid::new_v4())).await.unwrap();

        assert!(ctx.auth().restore().await.unwrap().is_none());
        assert!(ctx.sessions.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_confirmation_required_goes_to_login() {
        let mut mock = MockBackend::new();
        mock.expect_sign_up().returning(|_, _, _| {
            Ok(crate::domain::SignUpResponse {
                user: AuthUser {
                    id: Uuid::new_v4(),
                    email: Some("budi@example.com".to_string()),
                    user_metadata: serde_json::Value::Null,
                },
                session: None,
            })
        });
        mock.expect_insert_profile().never();

        let ctx = mock_context(mock);
        let outcome = ctx.auth().sign_up(input("budi@example.com", "budi")).await.unwrap();
        assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired { .. }));
        assert_eq!(outcome.next_page(), Navigation::Login);
    }

    #[tokio::test]
    async fn test_restore_persists_rotated_session() {
        let user_id = Uuid::new_v4();
        let mut rotated = session_for(user_id);
        rotated.access_token = "rotated-access".to_string();
        rotated.refresh_token = "rotated-refresh".to_string();
        let current = rotated.clone();

        let mut mock = MockBackend::new();
        mock.expect_current_session().returning(move || Some(current.clone()));
        mock.expect_restore_session().never();

        let ctx = mock_context(mock);
        ctx.sessions.save(&session_for(user_id)).await.unwrap();

        assert_eq!(ctx.auth().restore().await.unwrap(), Some(rotated.clone()));
        assert_eq!(ctx.sessions.load().await.unwrap(), Some(rotated));
    }

    #[tokio::test]
    async fn test_update_profile_validates_then_writes() {
        let (ctx, backend) = memory_context();
        let auth = ctx.auth();
        let SignUpOutcome::SignedIn { profile, .. } =
            auth.sign_up(input("budi@example.com", "budi")).await.unwrap()
        else {
            panic!("expected session");
        };

        let err = auth
            .update_profile(profile.id, &ProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let bad_name = ProfileUpdate {
            username: Some("b d".to_string()),
            ..ProfileUpdate::default()
        };
        let err = auth.update_profile(profile.id, &bad_name).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(backend.profile(profile.id).await.unwrap().username, "budi");

        let update = ProfileUpdate {
            display_name: Some("Budi S.".to_string()),
            avatar_url: Some("https://cdn.example.co/budi.png".to_string()),
            ..ProfileUpdate::default()
        };
        let updated = auth.update_profile(profile.id, &update).await.unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Budi S."));

        let stored = backend.profile(profile.id).await.unwrap();
        assert_eq!(stored.display_name.as_deref(), Some("Budi S."));
        assert_eq!(stored.avatar_url.as_deref(), Some("https://cdn.example.co/budi.png"));
        assert_eq!(stored.username, "budi");
    }
}
