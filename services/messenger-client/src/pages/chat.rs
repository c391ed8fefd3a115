// Halaman chat: thread pesan, realtime insert/update, read receipt, kirim teks & gambar
use chrono::Utc;
use shared::utils::storage::{chat_image_path, content_type_for_filename, validate_image};
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::scope::PageScope;
use super::{conversation_id_from_query, next_change, LoadOutcome, Navigation};
use crate::backend::{ChangeEvent, ChangeFilter, ChangeKind, Subscription, Table};
use crate::config::ClientContext;
use crate::domain::{ConversationDetail, Message, NewMessage, Profile};
use crate::error::{AppError, AppResult};
use crate::view::{ChatView, Clock, UploadPlaceholder};

#[derive(Debug)]
pub struct UploadOutcome {
    pub placeholder: u64,
    pub result: AppResult<Message>,
}

#[derive(Debug)]
pub enum ChatEvent {
    Insert(Option<ChangeEvent>),
    Update(Option<ChangeEvent>),
    Presence(Option<ChangeEvent>),
    Upload(Option<UploadOutcome>),
}

#[derive(Debug)]
pub enum ChatUpdate {
    Appended(Uuid),
    ReadUpdated(Uuid),
    PresenceChanged(Uuid),
    UploadFinished(Uuid),
    // Ditampilkan sebagai alert
    UploadFailed(AppError),
    Ignored,
    // Error read path, cukup di-log
    Failed(AppError),
    Disconnected,
}

pub struct ChatPage {
    ctx: ClientContext,
    me: Uuid,
    detail: ConversationDetail,
    senders: HashMap<Uuid, Profile>,
    composer: String,
    inserts: Option<Subscription>,
    updates: Option<Subscription>,
    presence: Option<Subscription>,
    uploads: Vec<UploadPlaceholder>,
    next_upload_id: u64,
    upload_tx: mpsc::Sender<UploadOutcome>,
    upload_rx: mpsc::Receiver<UploadOutcome>,
    scope: PageScope,
}

impl ChatPage {
    /// Buka halaman chat dari query string (`id=<conversation uuid>`)
    pub async fn open(ctx: ClientContext, query: &str) -> LoadOutcome<Self> {
        let session = match ctx.auth().restore().await {
            Ok(Some(session)) => session,
            Ok(None) => return LoadOutcome::Redirect(Navigation::Login),
            Err(e) => {
                tracing::error!("Gagal memuat session: {}", e);
                return LoadOutcome::Redirect(Navigation::Login);
            }
        };
        let me = session.user_id();

        let Some(conversation_id) = conversation_id_from_query(query) else {
            tracing::warn!("Query chat tanpa id valid: {:?}", query);
            return LoadOutcome::Redirect(Navigation::Inbox);
        };

        let mut detail = match ctx.backend.fetch_conversation(conversation_id).await {
            Ok(Some(detail)) if detail.has_participant(me) => detail,
            Ok(_) => {
                tracing::warn!("User {} bukan peserta conversation {}", me, conversation_id);
                return LoadOutcome::Redirect(Navigation::Inbox);
            }
            Err(e) => {
                tracing::error!("Gagal memuat conversation {}: {}", conversation_id, e);
                return LoadOutcome::Redirect(Navigation::Login);
            }
        };
        detail.sort_messages();

        let senders: HashMap<Uuid, Profile> = detail
            .participants
            .iter()
            .filter_map(|p| p.profile.clone().map(|profile| (p.user_id, profile)))
            .collect();

        let inserts = subscribe_or_warn(
            &ctx,
            ChangeFilter::inserts(Table::Messages).with_eq("conversation_id", conversation_id),
        )
        .await;
        let updates = subscribe_or_warn(
            &ctx,
            ChangeFilter::updates(Table::Messages).with_eq("conversation_id", conversation_id),
        )
        .await;
        let presence = match (detail.conversation.is_group, detail.peer(me)) {
            (false, Some(peer)) => {
                subscribe_or_warn(
                    &ctx,
                    ChangeFilter::updates(Table::Profiles).with_eq("id", peer.user_id),
                )
                .await
            }
            _ => None,
        };

        let (upload_tx, upload_rx) = mpsc::channel(8);
        let mut page = Self {
            ctx,
            me,
            detail,
            senders,
            composer: String::new(),
            inserts,
            updates,
            presence,
            uploads: Vec::new(),
            next_upload_id: 1,
            upload_tx,
            upload_rx,
            scope: PageScope::new(),
        };

        let marked = page.mark_unread_as_read().await;
        if marked > 0 {
            tracing::debug!("{} pesan ditandai terbaca", marked);
        }

        tracing::info!("💬 Chat {} dibuka", conversation_id);
        LoadOutcome::Ready(page)
    }

    pub fn conversation_id(&self) -> Uuid {
        self.detail.id()
    }

    pub fn detail(&self) -> &ConversationDetail {
        &self.detail
    }

    #[cfg(test)]
    pub fn composer(&self) -> &str {
        &self.composer
    }

    pub fn set_composer(&mut self, text: &str) {
        self.composer = text.to_string();
    }

    pub fn pending_uploads(&self) -> &[UploadPlaceholder] {
        &self.uploads
    }

    pub fn view(&self, clock: &Clock) -> ChatView {
        ChatView::build(&self.detail, self.me, &self.senders, &self.uploads, clock)
    }

    // Tandai pesan orang lain yang belum terbaca, satu per satu.
    // Gagal di satu pesan hanya membuat pesan itu tetap unread.
    pub async fn mark_unread_as_read(&mut self) -> usize {
        let unread: Vec<Uuid> = self
            .detail
            .messages
            .iter()
            .filter(|m| m.is_unread_for(self.me))
            .map(|m| m.id)
            .collect();

        let mut marked = 0;
        for id in unread {
            match self.mark_read(id).await {
                Ok(true) => marked += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("Gagal menandai pesan {} terbaca: {}", id, e),
            }
        }
        marked
    }

    // Ambil read_by terbaru dulu supaya tidak menimpa receipt user lain
    pub async fn mark_read(&mut self, message_id: Uuid) -> AppResult<bool> {
        let mut fresh = self
            .ctx
            .backend
            .fetch_message(message_id)
            .await?
            .ok_or_else(|| AppError::not_found("Pesan"))?;

        if !fresh.mark_read_by(self.me) {
            self.detail.upsert_message(fresh);
            return Ok(false);
        }

        let updated = self
            .ctx
            .backend
            .update_read_by(message_id, &fresh.read_by)
            .await?;
        self.detail.upsert_message(updated);
        Ok(true)
    }

    /// Kirim isi composer. Kosong / spasi saja tidak mengirim apa pun.
    pub async fn send_composer(&mut self) -> AppResult<Option<Message>> {
        let Some(new_message) = NewMessage::text(self.detail.id(), self.me, &self.composer) else {
            return Ok(None);
        };

        let message = self.ctx.backend.insert_message(&new_message).await?;
        self.composer.clear();
        self.after_send(&message).await;
        Ok(Some(message))
    }

    pub async fn send_text(&mut self, text: &str) -> AppResult<Option<Message>> {
        self.set_composer(text);
        self.send_composer().await
    }

    /// Validasi lalu upload gambar di background; placeholder tampil sampai selesai
    pub fn send_image(
        &mut self,
        filename: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> AppResult<u64> {
        let content_type = content_type
            .or_else(|| content_type_for_filename(filename))
            .ok_or_else(|| AppError::upload(format!("Tipe file {} tidak dikenali", filename)))?
            .to_string();
        let ext = validate_image(&content_type, bytes.len())?;

        let placeholder = self.next_upload_id;
        self.next_upload_id += 1;
        self.uploads.push(UploadPlaceholder {
            id: placeholder,
            filename: filename.to_string(),
        });

        let conversation_id = self.detail.id();
        let me = self.me;
        let path = chat_image_path(&conversation_id, Utc::now().timestamp_millis(), ext);
        let backend = self.ctx.backend.clone();
        let tx = self.upload_tx.clone();

        self.scope.spawn(async move {
            let result = async {
                backend.upload_object(&path, bytes, &content_type).await?;
                let url = backend.public_url(&path);
                let message = backend
                    .insert_message(&NewMessage::image(conversation_id, me, &url))
                    .await?;
                Ok::<Message, AppError>(message)
            }
            .await;

            let _ = tx.send(UploadOutcome { placeholder, result }).await;
        });

        tracing::debug!("Upload {} dimulai", filename);
        Ok(placeholder)
    }

    /// Tunggu event berikutnya tanpa memprosesnya (aman dibatalkan di dalam select)
    pub async fn recv(&mut self) -> ChatEvent {
        tokio::select! {
            event = next_change(&mut self.inserts) => ChatEvent::Insert(event),
            event = next_change(&mut self.updates) => ChatEvent::Update(event),
            event = next_change(&mut self.presence) => ChatEvent::Presence(event),
            outcome = self.upload_rx.recv() => ChatEvent::Upload(outcome),
        }
    }

    pub async fn apply(&mut self, event: ChatEvent) -> ChatUpdate {
        let result = match event {
            ChatEvent::Insert(Some(event))
            | ChatEvent::Update(Some(event))
            | ChatEvent::Presence(Some(event)) => self.handle_event(event).await,
            ChatEvent::Insert(None) => {
                self.inserts = None;
                Ok(ChatUpdate::Disconnected)
            }
            ChatEvent::Update(None) => {
                self.updates = None;
                Ok(ChatUpdate::Disconnected)
            }
            ChatEvent::Presence(None) => {
                self.presence = None;
                Ok(ChatUpdate::Disconnected)
            }
            ChatEvent::Upload(Some(outcome)) => Ok(self.finish_upload(outcome).await),
            ChatEvent::Upload(None) => Ok(ChatUpdate::Ignored),
        };

        result.unwrap_or_else(ChatUpdate::Failed)
    }

    /// Insert/update pesan, presence peer, atau upload selesai, sudah diterapkan ke thread
    #[cfg(test)]
    pub async fn next_update(&mut self) -> ChatUpdate {
        let event = self.recv().await;
        self.apply(event).await
    }

    // Reducer event realtime, pesan di-key berdasarkan id
    pub async fn handle_event(&mut self, event: ChangeEvent) -> AppResult<ChatUpdate> {
        if event.table == Table::Profiles.as_str() {
            let profile: Profile = event.decode()?;
            return Ok(self.apply_profile(profile));
        }

        let message: Message = event.decode()?;
        if message.conversation_id != self.detail.id() {
            return Ok(ChatUpdate::Ignored);
        }

        match event.kind {
            ChangeKind::Insert => {
                if self.detail.messages.iter().any(|m| m.id == message.id) {
                    return Ok(ChatUpdate::Ignored);
                }

                let id = message.id;
                let from_other = !message.is_from(self.me);
                self.ensure_sender(message.sender_id).await;
                self.detail.upsert_message(message);
                self.detail.sort_messages();

                if from_other {
                    if let Err(e) = self.mark_read(id).await {
                        tracing::warn!("Gagal menandai pesan {} terbaca: {}", id, e);
                    }
                }
                Ok(ChatUpdate::Appended(id))
            }
            ChangeKind::Update => {
                match self.detail.messages.iter_mut().find(|m| m.id == message.id) {
                    Some(existing) => {
                        existing.read_by = message.read_by;
                        Ok(ChatUpdate::ReadUpdated(existing.id))
                    }
                    None => Ok(ChatUpdate::Ignored),
                }
            }
            _ => Ok(ChatUpdate::Ignored),
        }
    }

    fn apply_profile(&mut self, profile: Profile) -> ChatUpdate {
        let Some(participant) = self
            .detail
            .participants
            .iter_mut()
            .find(|p| p.user_id == profile.id)
        else {
            return ChatUpdate::Ignored;
        };

        let id = profile.id;
        participant.profile = Some(profile.clone());
        self.senders.insert(id, profile);
        ChatUpdate::PresenceChanged(id)
    }

    async fn finish_upload(&mut self, outcome: UploadOutcome) -> ChatUpdate {
        self.uploads.retain(|u| u.id != outcome.placeholder);

        match outcome.result {
            Ok(message) => {
                let id = message.id;
                self.after_send(&message).await;
                tracing::info!("🖼️ Gambar terkirim sebagai pesan {}", id);
                ChatUpdate::UploadFinished(id)
            }
            Err(e) => {
                tracing::error!("Upload gambar gagal: {}", e);
                ChatUpdate::UploadFailed(e)
            }
        }
    }

    // Setelah kirim: touch conversation, cache profile sendiri, append lokal
    async fn after_send(&mut self, message: &Message) {
        if let Err(e) = self
            .ctx
            .backend
            .touch_conversation(message.conversation_id, message.created_at)
            .await
        {
            tracing::warn!("Gagal update last_message_at: {}", e);
        }

        self.refresh_sender(self.me).await;
        self.detail.upsert_message(message.clone());
        self.detail.sort_messages();
    }

    async fn ensure_sender(&mut self, user_id: Uuid) {
        if !self.senders.contains_key(&user_id) {
            self.refresh_sender(user_id).await;
        }
    }

    async fn refresh_sender(&mut self, user_id: Uuid) {
        match self.ctx.backend.fetch_profile(user_id).await {
            Ok(Some(profile)) => {
                self.senders.insert(user_id, profile);
            }
            Ok(None) => tracing::debug!("Profile {} tidak ditemukan", user_id),
            Err(e) => tracing::warn!("Gagal memuat profile {}: {}", user_id, e),
        }
    }

    // Tinggalkan halaman: subscription dan upload yang berjalan dibatalkan
    pub fn leave(mut self) {
        self.scope.cancel_all();
        tracing::debug!("Meninggalkan chat {}", self.detail.id());
    }
}

async fn subscribe_or_warn(ctx: &ClientContext, filter: ChangeFilter) -> Option<Subscription> {
    match ctx.backend.subscribe(filter).await {
        Ok(subscription) => Some(subscription),
        Err(e) => {
            tracing::warn!("⚠️ Realtime chat tidak aktif: {}", e);
            None
        }
    }
}
