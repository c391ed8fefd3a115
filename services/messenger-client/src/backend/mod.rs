// Akses ke managed backend (auth, tabel, realtime, object storage)
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::utils::{http_client::HttpClientError, storage::StorageError};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    AuthUser, ChatRequest, Conversation, ConversationDetail, Message, NewChatRequest,
    NewConversation, NewMessage, NewProfile, ParticipantLink, Profile, ProfileUpdate,
    RequestStatus, Session, SignUpResponse,
};

pub mod changes;
pub mod memory;
pub mod query;
pub mod realtime;
pub mod rest;

pub use changes::{ChangeEvent, ChangeFilter, ChangeKind, Subscription, Table};
pub use memory::MemoryBackend;
pub use rest::RestBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Auth ditolak: {0}")]
    Auth(String),

    #[error("Belum login")]
    NotAuthenticated,

    #[error("Data tidak ditemukan: {0}")]
    NotFound(String),

    #[error("Akses ditolak: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Http(#[from] HttpClientError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Realtime error: {0}")]
    Realtime(String),

    #[error("Payload tidak bisa di-decode: {0}")]
    Decode(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Semua operasi yang dipakai client terhadap managed backend.
/// Session aktif disimpan di dalam implementasi, sama seperti SDK client pada umumnya.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    // ===== AUTH =====
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> BackendResult<SignUpResponse>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session>;

    async fn sign_out(&self) -> BackendResult<()>;

    // Pasang session tersimpan, refresh bila access token hampir expired
    async fn restore_session(&self, session: Session) -> BackendResult<Session>;

    async fn current_session(&self) -> Option<Session>;

    async fn get_user(&self) -> BackendResult<AuthUser>;

    // ===== PROFILES =====
    async fn insert_profile(&self, profile: &NewProfile) -> BackendResult<Profile>;

    async fn fetch_profile(&self, id: Uuid) -> BackendResult<Option<Profile>>;

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> BackendResult<Profile>;

    async fn search_profiles(
        &self,
        term: &str,
        exclude: Uuid,
        limit: usize,
    ) -> BackendResult<Vec<Profile>>;

    // ===== CONVERSATIONS =====
    async fn fetch_conversations(&self, user_id: Uuid) -> BackendResult<Vec<ConversationDetail>>;

    async fn fetch_conversation(&self, id: Uuid) -> BackendResult<Option<ConversationDetail>>;

    async fn insert_conversation(
        &self,
        conversation: &NewConversation,
    ) -> BackendResult<Conversation>;

    async fn insert_participants(&self, links: &[ParticipantLink]) -> BackendResult<()>;

    async fn touch_conversation(&self, id: Uuid, at: DateTime<Utc>) -> BackendResult<()>;

    // ===== MESSAGES =====
    async fn insert_message(&self, message: &NewMessage) -> BackendResult<Message>;

    async fn fetch_message(&self, id: Uuid) -> BackendResult<Option<Message>>;

    async fn update_read_by(&self, id: Uuid, read_by: &[Uuid]) -> BackendResult<Message>;

    // ===== CHAT REQUESTS =====
    async fn insert_chat_request(&self, request: &NewChatRequest) -> BackendResult<ChatRequest>;

    async fn fetch_pending_requests(&self, receiver_id: Uuid) -> BackendResult<Vec<ChatRequest>>;

    async fn update_request_status(
        &self,
        id: Uuid,
        status: RequestStatus,
    ) -> BackendResult<ChatRequest>;

    // ===== STORAGE =====
    async fn upload_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<()>;

    fn public_url(&self, path: &str) -> String;

    // ===== REALTIME =====
    async fn subscribe(&self, filter: ChangeFilter) -> BackendResult<Subscription>;
}
