// Backend in-process untuk mode demo (BACKEND_URL=memory://) dan test
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use super::{
    Backend, BackendError, BackendResult, ChangeEvent, ChangeFilter, ChangeKind, Subscription,
    Table,
};
use crate::domain::{
    AuthUser, ChatRequest, Conversation, ConversationDetail, Message, NewChatRequest,
    NewConversation, NewMessage, NewProfile, Participant, ParticipantLink, Profile,
    ProfileUpdate, RequestStatus, Session, SignUpResponse,
};

const SESSION_TTL_SECS: i64 = 3600;
const CHANGE_BUFFER: usize = 256;

struct Account {
    password: String,
    user: AuthUser,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    refresh_tokens: HashMap<String, Uuid>,
    session: Option<Session>,
    profiles: HashMap<Uuid, Profile>,
    conversations: HashMap<Uuid, Conversation>,
    participants: Vec<ParticipantLink>,
    messages: Vec<Message>,
    requests: Vec<ChatRequest>,
    objects: HashMap<String, (Vec<u8>, String)>,
}

impl MemoryState {
    fn current_user(&self) -> BackendResult<Uuid> {
        self.session
            .as_ref()
            .map(|s| s.user.id)
            .ok_or(BackendError::NotAuthenticated)
    }

    fn issue_session(&mut self, user: AuthUser) -> Session {
        let refresh_token = format!("memory-refresh-{}", Uuid::new_v4());
        self.refresh_tokens.insert(refresh_token.clone(), user.id);

        let session = Session {
            access_token: format!("memory-access-{}", Uuid::new_v4()),
            refresh_token,
            expires_at: Some(Utc::now().timestamp() + SESSION_TTL_SECS),
            user,
        };
        self.session = Some(session.clone());
        session
    }

    fn is_member(&self, conversation_id: Uuid, user_id: Uuid) -> bool {
        self.participants
            .iter()
            .any(|l| l.conversation_id == conversation_id && l.user_id == user_id)
    }

    fn detail(&self, conversation_id: Uuid) -> Option<ConversationDetail> {
        let conversation = self.conversations.get(&conversation_id)?.clone();
        let participants = self
            .participants
            .iter()
            .filter(|l| l.conversation_id == conversation_id)
            .map(|l| Participant {
                user_id: l.user_id,
                profile: self.profiles.get(&l.user_id).cloned(),
            })
            .collect();
        let messages = self
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();

        let mut detail = ConversationDetail {
            conversation,
            participants,
            messages,
        };
        detail.sort_messages();
        Some(detail)
    }
}

/// Backend in-memory dengan semantik yang mendekati managed backend:
/// row-level akses berdasarkan keanggotaan dan push event untuk insert/update.
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
    changes: broadcast::Sender<ChangeEvent>,
    bucket: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new("chat-images")
    }
}

impl MemoryBackend {
    pub fn new(bucket: &str) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            state: RwLock::new(MemoryState::default()),
            changes,
            bucket: bucket.to_string(),
        }
    }

    fn publish<T: serde::Serialize>(&self, kind: ChangeKind, table: Table, row: &T) {
        match serde_json::to_value(row) {
            Ok(record) => {
                // Tidak ada subscriber bukan error
                let _ = self.changes.send(ChangeEvent::new(kind, table, record));
            }
            Err(e) => tracing::warn!("Gagal serialize change event {}: {}", table.as_str(), e),
        }
    }
}

#[cfg(test)]
impl MemoryBackend {
    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.len()
    }

    pub async fn messages_in(&self, conversation_id: Uuid) -> Vec<Message> {
        let state = self.state.read().await;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        messages
    }

    pub async fn conversation_count(&self) -> usize {
        self.state.read().await.conversations.len()
    }

    pub async fn profile(&self, id: Uuid) -> Option<Profile> {
        self.state.read().await.profiles.get(&id).cloned()
    }

    pub async fn object(&self, path: &str) -> Option<(Vec<u8>, String)> {
        self.state.read().await.objects.get(path).cloned()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: serde_json::Value,
    ) -> BackendResult<SignUpResponse> {
        let mut state = self.state.write().await;
        let key = email.trim().to_lowercase();

        if state.accounts.contains_key(&key) {
            return Err(BackendError::Auth("User already registered".to_string()));
        }

        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(key.clone()),
            user_metadata: metadata,
        };
        state.accounts.insert(
            key,
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        let session = state.issue_session(user.clone());

        Ok(SignUpResponse {
            user,
            session: Some(session),
        })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let mut state = self.state.write().await;
        let key = email.trim().to_lowercase();

        let user = match state.accounts.get(&key) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(BackendError::Auth("Invalid login credentials".to_string())),
        };

        Ok(state.issue_session(user))
    }

    async fn sign_out(&self) -> BackendResult<()> {
        let mut state = self.state.write().await;
        if let Some(session) = state.session.take() {
            state.refresh_tokens.remove(&session.refresh_token);
        }
        Ok(())
    }

    async fn restore_session(&self, session: Session) -> BackendResult<Session> {
        let mut state = self.state.write().await;
        let user_id = state
            .refresh_tokens
            .remove(&session.refresh_token)
            .ok_or_else(|| BackendError::Auth("Invalid Refresh Token".to_string()))?;

        let user = state
            .accounts
            .values()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
            .ok_or_else(|| BackendError::Auth("User not found".to_string()))?;

        Ok(state.issue_session(user))
    }

    async fn current_session(&self) -> Option<Session> {
        self.state.read().await.session.clone()
    }

    async fn get_user(&self) -> BackendResult<AuthUser> {
        let state = self.state.read().await;
        state
            .session
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or(BackendError::NotAuthenticated)
    }

    async fn insert_profile(&self, profile: &NewProfile) -> BackendResult<Profile> {
        let mut state = self.state.write().await;
        let me = state.current_user()?;
        if profile.id != me {
            return Err(BackendError::Forbidden("profile milik user lain".to_string()));
        }
        if state.profiles.contains_key(&profile.id)
            || state.profiles.values().any(|p| p.username == profile.username)
        {
            return Err(BackendError::Forbidden(
                "duplicate key value violates unique constraint".to_string(),
            ));
        }

        let created = profile.clone().into_profile();
        state.profiles.insert(created.id, created.clone());
        drop(state);

        self.publish(ChangeKind::Insert, Table::Profiles, &created);
        Ok(created)
    }

    async fn fetch_profile(&self, id: Uuid) -> BackendResult<Option<Profile>> {
        let state = self.state.read().await;
        state.current_user()?;
        Ok(state.profiles.get(&id).cloned())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> BackendResult<Profile> {
        let mut state = self.state.write().await;
        if state.current_user()? != id {
            return Err(BackendError::Forbidden("profile milik user lain".to_string()));
        }

        let profile = state
            .profiles
            .get_mut(&id)
            .ok_or_else(|| BackendError::NotFound(format!("profile {}", id)))?;
        update.apply_to(profile);
        let updated = profile.clone();
        drop(state);

        self.publish(ChangeKind::Update, Table::Profiles, &updated);
        Ok(updated)
    }

    async fn search_profiles(
        &self,
        term: &str,
        exclude: Uuid,
        limit: usize,
    ) -> BackendResult<Vec<Profile>> {
        let state = self.state.read().await;
        state.current_user()?;

        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut found: Vec<Profile> = state
            .profiles
            .values()
            .filter(|p| p.id != exclude)
            .filter(|p| {
                p.username.to_lowercase().contains(&needle)
                    || p.display_name
                        .as_deref()
                        .map(|d| d.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        found.truncate(limit);
        Ok(found)
    }

    async fn fetch_conversations(&self, user_id: Uuid) -> BackendResult<Vec<ConversationDetail>> {
        let state = self.state.read().await;
        let me = state.current_user()?;
        if me != user_id {
            return Err(BackendError::Forbidden("conversation user lain".to_string()));
        }

        let mut details: Vec<ConversationDetail> = state
            .conversations
            .keys()
            .filter(|id| state.is_member(**id, me))
            .filter_map(|id| state.detail(*id))
            .collect();
        details.sort_by(|a, b| b.conversation.last_message_at.cmp(&a.conversation.last_message_at));
        Ok(details)
    }

    async fn fetch_conversation(&self, id: Uuid) -> BackendResult<Option<ConversationDetail>> {
        let state = self.state.read().await;
        let me = state.current_user()?;
        if !state.is_member(id, me) {
            // Row-level policy: conversation orang lain tidak terlihat
            return Ok(None);
        }
        Ok(state.detail(id))
    }

    async fn insert_conversation(
        &self,
        conversation: &NewConversation,
    ) -> BackendResult<Conversation> {
        let mut state = self.state.write().await;
        state.current_user()?;

        let created = Conversation {
            id: Uuid::new_v4(),
            is_group: conversation.is_group,
            group_name: conversation.group_name.clone(),
            last_message_at: None,
            created_at: Utc::now(),
        };
        state.conversations.insert(created.id, created.clone());
        Ok(created)
    }

    async fn insert_participants(&self, links: &[ParticipantLink]) -> BackendResult<()> {
        let mut state = self.state.write().await;
        state.current_user()?;

        for link in links {
            if !state.conversations.contains_key(&link.conversation_id) {
                return Err(BackendError::NotFound(format!(
                    "conversation {}",
                    link.conversation_id
                )));
            }
            if !state.participants.contains(link) {
                state.participants.push(*link);
            }
        }
        Ok(())
    }

    async fn touch_conversation(&self, id: Uuid, at: DateTime<Utc>) -> BackendResult<()> {
        let mut state = self.state.write().await;
        let me = state.current_user()?;
        if !state.is_member(id, me) {
            return Err(BackendError::Forbidden(format!("conversation {}", id)));
        }

        let conversation = state
            .conversations
            .get_mut(&id)
            .ok_or_else(|| BackendError::NotFound(format!("conversation {}", id)))?;
        conversation.last_message_at = Some(at);
        let updated = conversation.clone();
        drop(state);

        self.publish(ChangeKind::Update, Table::Conversations, &updated);
        Ok(())
    }

    async fn insert_message(&self, message: &NewMessage) -> BackendResult<Message> {
        let mut state = self.state.write().await;
        let me = state.current_user()?;
        if message.sender_id != me || !state.is_member(message.conversation_id, me) {
            return Err(BackendError::Forbidden(
                "new row violates row-level security policy".to_string(),
            ));
        }

        // created_at selalu naik walau dua insert jatuh di timestamp yang sama
        let mut created_at = Utc::now();
        if let Some(latest) = state.messages.iter().map(|m| m.created_at).max() {
            if created_at <= latest {
                created_at = latest + Duration::microseconds(1);
            }
        }

        let created = Message {
            id: Uuid::new_v4(),
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            created_at,
            read_by: Vec::new(),
        };
        state.messages.push(created.clone());
        drop(state);

        self.publish(ChangeKind::Insert, Table::Messages, &created);
        Ok(created)
    }

    async fn fetch_message(&self, id: Uuid) -> BackendResult<Option<Message>> {
        let state = self.state.read().await;
        let me = state.current_user()?;
        Ok(state
            .messages
            .iter()
            .find(|m| m.id == id && state.is_member(m.conversation_id, me))
            .cloned())
    }

    async fn update_read_by(&self, id: Uuid, read_by: &[Uuid]) -> BackendResult<Message> {
        let mut state = self.state.write().await;
        let me = state.current_user()?;

        let conversation_id = state
            .messages
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.conversation_id)
            .ok_or_else(|| BackendError::NotFound(format!("message {}", id)))?;
        if !state.is_member(conversation_id, me) {
            return Err(BackendError::Forbidden(format!("message {}", id)));
        }

        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("message {}", id)))?;
        message.read_by = read_by.to_vec();
        let updated = message.clone();
        drop(state);

        self.publish(ChangeKind::Update, Table::Messages, &updated);
        Ok(updated)
    }

    async fn upload_object(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<()> {
        let mut state = self.state.write().await;
        state.current_user()?;

        if state.objects.contains_key(path) {
            return Err(BackendError::Forbidden(format!("object {} sudah ada", path)));
        }
        state
            .objects
            .insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn insert_chat_request(&self, request: &NewChatRequest) -> BackendResult<ChatRequest> {
        let mut state = self.state.write().await;
        let me = state.current_user()?;
        if request.sender_id != me || request.receiver_id == me {
            return Err(BackendError::Forbidden(
                "new row violates row-level security policy".to_string(),
            ));
        }
        if !state.profiles.contains_key(&request.receiver_id) {
            return Err(BackendError::NotFound(format!("profile {}", request.receiver_id)));
        }

        let created = ChatRequest {
            id: Uuid::new_v4(),
            sender_id: request.sender_id,
            receiver_id: request.receiver_id,
            status: request.status,
            created_at: Utc::now(),
        };
        state.requests.push(created.clone());
        drop(state);

        self.publish(ChangeKind::Insert, Table::ChatRequests, &created);
        Ok(created)
    }

    async fn fetch_pending_requests(&self, receiver_id: Uuid) -> BackendResult<Vec<ChatRequest>> {
        let state = self.state.read().await;
        let me = state.current_user()?;
        let mut pending: Vec<ChatRequest> = state
            .requests
            .iter()
            .filter(|r| r.receiver_id == receiver_id && r.is_pending())
            .filter(|r| r.receiver_id == me || r.sender_id == me)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        Ok(pending)
    }

    async fn update_request_status(
        &self,
        id: Uuid,
        status: RequestStatus,
    ) -> BackendResult<ChatRequest> {
        let mut state = self.state.write().await;
        let me = state.current_user()?;

        let request = state
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("chat request {}", id)))?;
        if request.receiver_id != me {
            return Err(BackendError::Forbidden(format!("chat request {}", id)));
        }
        request.status = status;
        let updated = request.clone();
        drop(state);

        self.publish(ChangeKind::Update, Table::ChatRequests, &updated);
        Ok(updated)
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://storage/{}/{}", self.bucket, path)
    }

    async fn subscribe(&self, filter: ChangeFilter) -> BackendResult<Subscription> {
        let me = self.state.read().await.current_user()?;
        let mut changes = self.changes.subscribe();
        let (tx, rx) = mpsc::channel(CHANGE_BUFFER);
        let topic = filter.topic();

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(event) => {
                        if !filter.matches(&event) {
                            continue;
                        }
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Subscriber {} tertinggal {} event", me, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(topic, rx, Some(task)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PresenceStatus;

    async fn signed_up(backend: &MemoryBackend, email: &str, username: &str) -> Uuid {
        let response = backend
            .sign_up(email, "rahasia123", serde_json::json!({ "username": username }))
            .await
            .unwrap();
        backend
            .insert_profile(&NewProfile {
                id: response.user.id,
                username: username.to_string(),
                display_name: None,
                avatar_url: None,
                status: PresenceStatus::Online,
                last_seen: None,
            })
            .await
            .unwrap();
        response.user.id
    }

    #[tokio::test]
    async fn test_wrong_password_creates_no_session() {
        let backend = MemoryBackend::default();
        signed_up(&backend, "budi@example.com", "budi").await;
        backend.sign_out().await.unwrap();

        let result = backend
            .sign_in_with_password("budi@example.com", "salah")
            .await;
        assert!(matches!(result, Err(BackendError::Auth(_))));
        assert!(backend.current_session().await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_rejected() {
        let backend = MemoryBackend::default();
        signed_up(&backend, "budi@example.com", "budi").await;

        let result = backend
            .sign_up("BUDI@example.com", "rahasia123", serde_json::Value::Null)
            .await;
        assert!(matches!(result, Err(BackendError::Auth(_))));
    }

    #[tokio::test]
    async fn test_refresh_token_is_single_use() {
        let backend = MemoryBackend::default();
        signed_up(&backend, "budi@example.com", "budi").await;
        let session = backend.current_session().await.unwrap();

        let restored = backend.restore_session(session.clone()).await.unwrap();
        assert_ne!(restored.access_token, session.access_token);
        assert!(backend.restore_session(session).await.is_err());
    }

    #[tokio::test]
    async fn test_non_member_cannot_see_or_post() {
        let backend = MemoryBackend::default();
        let budi = signed_up(&backend, "budi@example.com", "budi").await;
        let conv = backend
            .insert_conversation(&NewConversation::direct())
            .await
            .unwrap();
        backend
            .insert_participants(&[ParticipantLink {
                conversation_id: conv.id,
                user_id: budi,
            }])
            .await
            .unwrap();

        let sari = signed_up(&backend, "sari@example.com", "sari").await;
        assert!(backend.fetch_conversation(conv.id).await.unwrap().is_none());

        let result = backend
            .insert_message(&NewMessage::text(conv.id, sari, "halo").unwrap())
            .await;
        assert!(matches!(result, Err(BackendError::Forbidden(_))));
        assert_eq!(backend.message_count().await, 0);
    }

    #[tokio::test]
    async fn test_filtered_subscription_only_sees_its_conversation() {
        let backend = MemoryBackend::default();
        let budi = signed_up(&backend, "budi@example.com", "budi").await;

        let mut ids = Vec::new();
        for _ in 0..2 {
            let conv = backend
                .insert_conversation(&NewConversation::direct())
                .await
                .unwrap();
            backend
                .insert_participants(&[ParticipantLink {
                    conversation_id: conv.id,
                    user_id: budi,
                }])
                .await
                .unwrap();
            ids.push(conv.id);
        }

        let mut sub = backend
            .subscribe(ChangeFilter::inserts(Table::Messages).with_eq("conversation_id", ids[0]))
            .await
            .unwrap();

        backend
            .insert_message(&NewMessage::text(ids[1], budi, "lain").unwrap())
            .await
            .unwrap();
        let wanted = backend
            .insert_message(&NewMessage::text(ids[0], budi, "ini").unwrap())
            .await
            .unwrap();

        let event = sub.next().await.unwrap();
        let received: Message = event.decode().unwrap();
        assert_eq!(received.id, wanted.id);
        assert!(sub.try_next().is_none());
    }

    #[tokio::test]
    async fn test_search_profiles_excludes_self() {
        let backend = MemoryBackend::default();
        signed_up(&backend, "sari@example.com", "sari").await;
        signed_up(&backend, "sarah@example.com", "sarah").await;
        let me = signed_up(&backend, "sarimin@example.com", "sarimin").await;

        let found = backend.search_profiles("SAR", me, 20).await.unwrap();
        let names: Vec<&str> = found.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["sarah", "sari"]);
    }

    #[tokio::test]
    async fn test_chat_request_only_receiver_can_accept() {
        let backend = MemoryBackend::default();
        let budi = signed_up(&backend, "budi@example.com", "budi").await;
        let sari = signed_up(&backend, "sari@example.com", "sari").await;

        // Session aktif: sari
        let request = backend
            .insert_chat_request(&NewChatRequest::pending(sari, budi))
            .await
            .unwrap();
        assert!(matches!(
            backend.insert_chat_request(&NewChatRequest::pending(budi, sari)).await,
            Err(BackendError::Forbidden(_))
        ));
        assert!(matches!(
            backend.update_request_status(request.id, RequestStatus::Accepted).await,
            Err(BackendError::Forbidden(_))
        ));

        backend
            .sign_in_with_password("budi@example.com", "rahasia123")
            .await
            .unwrap();
        let pending = backend.fetch_pending_requests(budi).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sender_id, sari);

        let accepted = backend
            .update_request_status(request.id, RequestStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);
        assert!(backend.fetch_pending_requests(budi).await.unwrap().is_empty());
    }
}
