// Implementasi Backend di atas REST API managed backend
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use shared::utils::{
    http_client::{BackendHttpClient, HttpClientError},
    storage::StorageClient,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    query::{sanitize_search_term, Query},
    realtime::{self, RealtimeConfig},
    Backend, BackendError, BackendResult, ChangeFilter, Subscription, Table,
};
use crate::domain::{
    AuthUser, ChatRequest, Conversation, ConversationDetail, Message, NewChatRequest,
    NewConversation, NewMessage, NewProfile, Participant, ParticipantLink, Profile,
    ProfileUpdate, RequestStatus, Session, SignUpResponse,
};

// Select nested: conversation + peserta (dengan profile) + pesan
const CONVERSATION_SELECT: &str =
    "*,conversation_participants(user_id,profiles(*)),messages(*)";
const REFRESH_LEEWAY_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct ParticipantRow {
    user_id: Uuid,
    #[serde(default)]
    profiles: Option<Profile>,
}

#[derive(Debug, Deserialize)]
struct ConversationRow {
    #[serde(flatten)]
    conversation: Conversation,
    #[serde(default)]
    conversation_participants: Vec<ParticipantRow>,
    #[serde(default)]
    messages: Vec<Message>,
}

impl ConversationRow {
    fn into_detail(self) -> ConversationDetail {
        let mut detail = ConversationDetail {
            conversation: self.conversation,
            participants: self
                .conversation_participants
                .into_iter()
                .map(|row| Participant {
                    user_id: row.user_id,
                    profile: row.profiles,
                })
                .collect(),
            messages: self.messages,
        };
        detail.sort_messages();
        detail
    }
}

#[derive(Debug, Deserialize)]
struct MembershipRow {
    conversation_id: Uuid,
}

// Mapping error auth: 400/422 dari endpoint auth berarti kredensial/akun ditolak
fn auth_error(err: HttpClientError) -> BackendError {
    match err {
        HttpClientError::Rejected { message, .. } => BackendError::Auth(message),
        HttpClientError::Unauthorized(message) => BackendError::Auth(message),
        other => BackendError::Http(other),
    }
}

// Hasil sign-up: session lengkap bila auto-confirm, atau hanya user bila perlu konfirmasi email
pub fn parse_sign_up(value: serde_json::Value) -> BackendResult<SignUpResponse> {
    if value.get("access_token").is_some() {
        let session: Session =
            serde_json::from_value(value).map_err(|e| BackendError::Decode(e.to_string()))?;
        return Ok(SignUpResponse {
            user: session.user.clone(),
            session: Some(session),
        });
    }

    let user_value = value.get("user").cloned().unwrap_or(value);
    let user: AuthUser =
        serde_json::from_value(user_value).map_err(|e| BackendError::Decode(e.to_string()))?;
    Ok(SignUpResponse {
        user,
        session: None,
    })
}

fn first_or_not_found<T>(rows: Vec<T>, what: &str) -> BackendResult<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| BackendError::NotFound(what.to_string()))
}

pub struct RestBackend {
    http: BackendHttpClient,
    storage: StorageClient,
    realtime: RealtimeConfig,
    session: RwLock<Option<Session>>,
}

impl RestBackend {
    pub fn new(http: BackendHttpClient, bucket: &str) -> Self {
        let storage = StorageClient::new(http.clone(), bucket);
        let realtime = RealtimeConfig::from_backend_url(http.base_url(), http.api_key());

        Self {
            http,
            storage,
            realtime,
            session: RwLock::new(None),
        }
    }

    // Access token aktif, di-refresh dulu bila hampir expired
    async fn token(&self) -> BackendResult<String> {
        let current = self
            .session
            .read()
            .await
            .clone()
            .ok_or(BackendError::NotAuthenticated)?;
        if !current.needs_refresh(REFRESH_LEEWAY_SECS) {
            return Ok(current.access_token);
        }

        let mut guard = self.session.write().await;
        let session = guard.as_ref().ok_or(BackendError::NotAuthenticated)?;
        // Request lain sudah me-refresh selama menunggu lock
        if session.refresh_token != current.refresh_token
            || !session.needs_refresh(REFRESH_LEEWAY_SECS)
        {
            return Ok(session.access_token.clone());
        }

        match self.refresh(&session.refresh_token).await {
            Ok(fresh) => {
                let token = fresh.access_token.clone();
                *guard = Some(fresh);
                Ok(token)
            }
            Err(BackendError::Auth(reason)) => {
                tracing::warn!("Refresh token ditolak, session dihapus: {}", reason);
                *guard = None;
                Err(BackendError::NotAuthenticated)
            }
            Err(e) => Err(e),
        }
    }

    async fn store_session(&self, session: &Session) {
        *self.session.write().await = Some(session.clone());
    }

    async fn refresh(&self, refresh_token: &str) -> BackendResult<Session> {
        let session: Session = self
            .http
            .post(
                "/auth/v1/token?grant_type=refresh_token",
                &json!({ "refresh_token": refresh_token }),
                None,
            )
            .await
            .map_err(auth_error)?;

        tracing::info!("Session user {} di-refresh", session.user.id);
        Ok(session)
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> BackendResult<SignUpResponse> {
        let value: serde_json::Value = self
            .http
            .post(
                "/auth/v1/signup",
                &json!({ "email": email, "password": password, "data": metadata }),
                None,
            )
            .await
            .map_err(auth_error)?;

        let response = parse_sign_up(value)?;
        if let Some(session) = &response.session {
            self.store_session(session).await;
        }
        Ok(response)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let session: Session = self
            .http
            .post(
                "/auth/v1/token?grant_type=password",
                &json!({ "email": email, "password": password }),
                None,
            )
            .await
            .map_err(auth_error)?;

        self.store_session(&session).await;
        Ok(session)
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let token = self.session.write().await.take().map(|s| s.access_token);

        match token {
            Some(token) => self
                .http
                .post_no_content("/auth/v1/logout", &json!({}), Some(&token))
                .await
                .map_err(BackendError::from),
            None => Ok(()),
        }
    }

    async fn restore_session(&self, session: Session) -> BackendResult<Session> {
        let session = if session.needs_refresh(REFRESH_LEEWAY_SECS) {
            self.refresh(&session.refresh_token).await?
        } else {
            session
        };

        self.store_session(&session).await;
        Ok(session)
    }

    async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn get_user(&self) -> BackendResult<AuthUser> {
        let token = self.token().await?;
        self.http
            .get("/auth/v1/user", Some(&token))
            .await
            .map_err(auth_error)
    }

    async fn insert_profile(&self, profile: &NewProfile) -> BackendResult<Profile> {
        let token = self.token().await?;
        let rows: Vec<Profile> = self
            .http
            .post(&Query::from(Table::Profiles).to_path(), profile, Some(&token))
            .await?;
        first_or_not_found(rows, "profile baru")
    }

    async fn fetch_profile(&self, id: Uuid) -> BackendResult<Option<Profile>> {
        let token = self.token().await?;
        let path = Query::from(Table::Profiles)
            .select("*")
            .eq("id", id)
            .limit(1)
            .to_path();
        let rows: Vec<Profile> = self.http.get(&path, Some(&token)).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> BackendResult<Profile> {
        let token = self.token().await?;
        let path = Query::from(Table::Profiles).eq("id", id).to_path();
        let rows: Vec<Profile> = self.http.patch(&path, update, Some(&token)).await?;
        first_or_not_found(rows, &format!("profile {}", id))
    }

    async fn search_profiles(
        &self,
        term: &str,
        exclude: Uuid,
        limit: usize,
    ) -> BackendResult<Vec<Profile>> {
        let token = self.token().await?;
        let term = sanitize_search_term(term);
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let path = Query::from(Table::Profiles)
            .select("*")
            .or(&format!(
                "username.ilike.*{}*,display_name.ilike.*{}*",
                term, term
            ))
            .neq("id", exclude)
            .order("username", true, false)
            .limit(limit)
            .to_path();
        Ok(self.http.get(&path, Some(&token)).await?)
    }

    async fn fetch_conversations(&self, user_id: Uuid) -> BackendResult<Vec<ConversationDetail>> {
        let token = self.token().await?;

        // Cari conversation yang diikuti user
        let membership_path = Query::from(Table::ConversationParticipants)
            .select("conversation_id")
            .eq("user_id", user_id)
            .to_path();
        let memberships: Vec<MembershipRow> = self.http.get(&membership_path, Some(&token)).await?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = memberships.iter().map(|m| m.conversation_id).collect();
        let path = Query::from(Table::Conversations)
            .select(CONVERSATION_SELECT)
            .in_list("id", &ids)
            .order("last_message_at", false, true)
            .to_path();
        let rows: Vec<ConversationRow> = self.http.get(&path, Some(&token)).await?;

        Ok(rows.into_iter().map(ConversationRow::into_detail).collect())
    }

    async fn fetch_conversation(&self, id: Uuid) -> BackendResult<Option<ConversationDetail>> {
        let token = self.token().await?;
        let path = Query::from(Table::Conversations)
            .select(CONVERSATION_SELECT)
            .eq("id", id)
            .limit(1)
            .to_path();
        let rows: Vec<ConversationRow> = self.http.get(&path, Some(&token)).await?;
        Ok(rows.into_iter().next().map(ConversationRow::into_detail))
    }

    async fn insert_conversation(
        &self,
        conversation: &NewConversation,
    ) -> BackendResult<Conversation> {
        let token = self.token().await?;
        let rows: Vec<Conversation> = self
            .http
            .post(
                &Query::from(Table::Conversations).to_path(),
                conversation,
                Some(&token),
            )
            .await?;
        first_or_not_found(rows, "conversation baru")
    }

    async fn insert_participants(&self, links: &[ParticipantLink]) -> BackendResult<()> {
        let token = self.token().await?;
        self.http
            .post_no_content(
                &Query::from(Table::ConversationParticipants).to_path(),
                links,
                Some(&token),
            )
            .await?;
        Ok(())
    }

    async fn touch_conversation(&self, id: Uuid, at: DateTime<Utc>) -> BackendResult<()> {
        let token = self.token().await?;
        let path = Query::from(Table::Conversations).eq("id", id).to_path();
        let _: Vec<Conversation> = self
            .http
            .patch(&path, &json!({ "last_message_at": at }), Some(&token))
            .await?;
        Ok(())
    }

    async fn insert_message(&self, message: &NewMessage) -> BackendResult<Message> {
        let token = self.token().await?;
        let rows: Vec<Message> = self
            .http
            .post(&Query::from(Table::Messages).to_path(), message, Some(&token))
            .await?;
        first_or_not_found(rows, "message baru")
    }

    async fn fetch_message(&self, id: Uuid) -> BackendResult<Option<Message>> {
        let token = self.token().await?;
        let path = Query::from(Table::Messages)
            .select("*")
            .eq("id", id)
            .limit(1)
            .to_path();
        let rows: Vec<Message> = self.http.get(&path, Some(&token)).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_read_by(&self, id: Uuid, read_by: &[Uuid]) -> BackendResult<Message> {
        let token = self.token().await?;
        let path = Query::from(Table::Messages).eq("id", id).to_path();
        let rows: Vec<Message> = self
            .http
            .patch(&path, &json!({ "read_by": read_by }), Some(&token))
            .await?;
        first_or_not_found(rows, &format!("message {}", id))
    }

    async fn insert_chat_request(&self, request: &NewChatRequest) -> BackendResult<ChatRequest> {
        let token = self.token().await?;
        let rows: Vec<ChatRequest> = self
            .http
            .post(&Query::from(Table::ChatRequests).to_path(), request, Some(&token))
            .await?;
        first_or_not_found(rows, "chat request baru")
    }

    async fn fetch_pending_requests(&self, receiver_id: Uuid) -> BackendResult<Vec<ChatRequest>> {
        let token = self.token().await?;
        let path = Query::from(Table::ChatRequests)
            .select("*")
            .eq("receiver_id", receiver_id)
            .eq("status", RequestStatus::Pending.as_str())
            .order("created_at", true, false)
            .to_path();
        Ok(self.http.get(&path, Some(&token)).await?)
    }

    async fn update_request_status(
        &self,
        id: Uuid,
        status: RequestStatus,
    ) -> BackendResult<ChatRequest> {
        let token = self.token().await?;
        let path = Query::from(Table::ChatRequests).eq("id", id).to_path();
        let rows: Vec<ChatRequest> = self
            .http
            .patch(&path, &json!({ "status": status }), Some(&token))
            .await?;
        first_or_not_found(rows, &format!("chat request {}", id))
    }
    async fn upload_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<()> {
        let token = self.token().await?;
        self.storage.upload(path, bytes, content_type, &token).await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.storage.public_url(path)
    }

    async fn subscribe(&self, filter: ChangeFilter) -> BackendResult<Subscription> {
        let token = self.token().await?;
        realtime::subscribe(&self.realtime, &token, filter).await
    }
}
