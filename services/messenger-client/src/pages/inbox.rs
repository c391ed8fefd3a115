// Halaman inbox: daftar conversation, realtime pesan baru, cari user, buat chat, chat request
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::debounce::Debouncer;
use super::{next_change, LoadOutcome, Navigation};
use crate::backend::{ChangeEvent, ChangeFilter, Subscription, Table};
use crate::config::ClientContext;
use crate::domain::{
    ChatRequest, ConversationDetail, Message, NewChatRequest, NewConversation, ParticipantLink,
    Profile, RequestStatus,
};
use crate::error::{AppError, AppResult};
use crate::view::{Clock, InboxView};

pub const SEARCH_LIMIT: usize = 20;
// Termasuk pembuat grup
pub const MIN_GROUP_MEMBERS: usize = 2;

/// State inbox: conversation per id, urutan berdasarkan aktivitas terbaru
#[derive(Debug, Default)]
pub struct InboxState {
    conversations: HashMap<Uuid, ConversationDetail>,
    order: Vec<Uuid>,
}

impl InboxState {
    pub fn new(details: Vec<ConversationDetail>) -> Self {
        let mut state = Self::default();
        state.replace_all(details);
        state
    }

    pub fn replace_all(&mut self, details: Vec<ConversationDetail>) {
        self.conversations = details.into_iter().map(|d| (d.id(), d)).collect();
        self.resort();
    }

    pub fn upsert(&mut self, detail: ConversationDetail) {
        self.conversations.insert(detail.id(), detail);
        self.resort();
    }

    // Pesan baru untuk conversation yang sudah dikenal; false bila belum dikenal
    pub fn apply_message(&mut self, message: Message) -> bool {
        match self.conversations.get_mut(&message.conversation_id) {
            Some(detail) => {
                detail.upsert_message(message);
                detail.sort_messages();
                self.resort();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn get(&self, id: Uuid) -> Option<&ConversationDetail> {
        self.conversations.get(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ordered(&self) -> impl Iterator<Item = &ConversationDetail> {
        self.order.iter().filter_map(|id| self.conversations.get(id))
    }

    pub fn find_direct_with(&self, me: Uuid, other: Uuid) -> Option<Uuid> {
        self.ordered()
            .find(|d| d.is_direct_between(me, other))
            .map(ConversationDetail::id)
    }

    fn resort(&mut self) {
        let mut order: Vec<(Uuid, chrono::DateTime<chrono::Utc>)> = self
            .conversations
            .values()
            .map(|d| (d.id(), d.activity_at()))
            .collect();
        order.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        self.order = order.into_iter().map(|(id, _)| id).collect();
    }
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub term: String,
    pub result: AppResult<Vec<Profile>>,
}

#[derive(Debug)]
pub enum InboxEvent {
    Change(Option<ChangeEvent>),
    Search(Option<SearchOutcome>),
}

#[derive(Debug)]
pub enum InboxUpdate {
    // Conversation berubah / baru muncul
    Conversation(Uuid),
    Ignored,
    SearchResults(usize),
    // Error read path, cukup di-log
    Failed(AppError),
    Disconnected,
}

pub struct InboxPage {
    ctx: ClientContext,
    me: Uuid,
    profile: Option<Profile>,
    state: InboxState,
    pending_requests: Vec<ChatRequest>,
    filter: String,
    messages: Option<Subscription>,
    debouncer: Debouncer,
    search_term: String,
    search_results: Vec<Profile>,
    search_tx: mpsc::Sender<SearchOutcome>,
    search_rx: mpsc::Receiver<SearchOutcome>,
}

impl InboxPage {
    pub async fn load(ctx: ClientContext) -> LoadOutcome<Self> {
        let auth = ctx.auth();
        let session = match auth.restore().await {
            Ok(Some(session)) => session,
            Ok(None) => return LoadOutcome::Redirect(Navigation::Login),
            Err(e) => {
                tracing::error!("Gagal memuat session: {}", e);
                return LoadOutcome::Redirect(Navigation::Login);
            }
        };
        let me = session.user_id();

        let profile = match auth.get_profile(me).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!("Gagal memuat profile {}: {}", me, e);
                None
            }
        };

        let conversations = match ctx.backend.fetch_conversations(me).await {
            Ok(conversations) => conversations,
            Err(e) => {
                tracing::error!("Gagal memuat conversation: {}", e);
                return LoadOutcome::Redirect(Navigation::Login);
            }
        };

        let pending_requests = match ctx.backend.fetch_pending_requests(me).await {
            Ok(requests) => requests,
            Err(e) => {
                tracing::warn!("Gagal memuat chat request: {}", e);
                Vec::new()
            }
        };

        let messages = match ctx.backend.subscribe(ChangeFilter::inserts(Table::Messages)).await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                tracing::warn!("⚠️ Realtime inbox tidak aktif: {}", e);
                None
            }
        };

        tracing::info!(
            "📥 Inbox dimuat: {} conversation, {} chat request",
            conversations.len(),
            pending_requests.len()
        );

        let (search_tx, search_rx) = mpsc::channel(8);
        let debouncer = Debouncer::new(ctx.config.search_debounce);

        LoadOutcome::Ready(Self {
            ctx,
            me,
            profile,
            state: InboxState::new(conversations),
            pending_requests,
            filter: String::new(),
            messages,
            debouncer,
            search_term: String::new(),
            search_results: Vec::new(),
            search_tx,
            search_rx,
        })
    }

    #[cfg(test)]
    pub fn me(&self) -> Uuid {
        self.me
    }

    #[cfg(test)]
    pub fn state(&self) -> &InboxState {
        &self.state
    }

    pub fn is_live(&self) -> bool {
        self.messages.is_some()
    }

    // Request yang menunggu jawaban user ini, terlama dulu
    pub fn pending_requests(&self) -> &[ChatRequest] {
        &self.pending_requests
    }

    pub fn search_results(&self) -> &[Profile] {
        &self.search_results
    }

    pub fn view(&self, clock: &Clock) -> InboxView {
        InboxView::build(
            self.profile.as_ref(),
            self.me,
            self.state.ordered(),
            &self.filter,
            clock,
        )
    }

    // Pencarian client-side atas teks item yang dirender
    pub fn set_filter(&mut self, term: &str) {
        self.filter = term.trim().to_string();
    }

    pub async fn reload(&mut self) -> AppResult<usize> {
        let conversations = self.ctx.backend.fetch_conversations(self.me).await?;
        self.state.replace_all(conversations);

        match self.ctx.backend.fetch_pending_requests(self.me).await {
            Ok(requests) => self.pending_requests = requests,
            Err(e) => tracing::warn!("Gagal memuat chat request: {}", e),
        }
        Ok(self.state.len())
    }

    /// Tunggu event berikutnya tanpa memprosesnya (aman dibatalkan di dalam select)
    pub async fn recv(&mut self) -> InboxEvent {
        tokio::select! {
            event = next_change(&mut self.messages) => InboxEvent::Change(event),
            outcome = self.search_rx.recv() => InboxEvent::Search(outcome),
        }
    }

    pub async fn apply(&mut self, event: InboxEvent) -> InboxUpdate {
        match event {
            InboxEvent::Change(Some(event)) => match self.handle_event(event).await {
                Ok(update) => update,
                Err(e) => InboxUpdate::Failed(e),
            },
            InboxEvent::Change(None) => {
                tracing::warn!("Realtime inbox terputus");
                self.messages = None;
                InboxUpdate::Disconnected
            }
            InboxEvent::Search(Some(outcome)) => self.apply_search(outcome),
            InboxEvent::Search(None) => InboxUpdate::Ignored,
        }
    }

    /// Event realtime atau hasil pencarian yang di-debounce, sudah diterapkan ke state
    #[cfg(test)]
    pub async fn next_update(&mut self) -> InboxUpdate {
        let event = self.recv().await;
        self.apply(event).await
    }

    // Reducer event insert pesan
    pub async fn handle_event(&mut self, event: ChangeEvent) -> AppResult<InboxUpdate> {
        let message: Message = event.decode()?;
        let conversation_id = message.conversation_id;

        if self.state.apply_message(message) {
            return Ok(InboxUpdate::Conversation(conversation_id));
        }

        // Conversation belum dikenal: ambil satu conversation itu saja
        match self.ctx.backend.fetch_conversation(conversation_id).await? {
            Some(detail) if detail.has_participant(self.me) => {
                self.state.upsert(detail);
                Ok(InboxUpdate::Conversation(conversation_id))
            }
            _ => Ok(InboxUpdate::Ignored),
        }
    }

    // Cari user (debounced); hasil datang lewat next_update
    pub fn search_users(&mut self, term: &str) {
        let term = term.trim().to_string();
        self.search_term = term.clone();

        if term.is_empty() {
            self.debouncer.cancel();
            self.search_results.clear();
            return;
        }

        let backend = self.ctx.backend.clone();
        let tx = self.search_tx.clone();
        let me = self.me;
        self.debouncer.call(async move {
            let result = backend
                .search_profiles(&term, me, SEARCH_LIMIT)
                .await
                .map_err(AppError::from);
            let _ = tx.send(SearchOutcome { term, result }).await;
        });
    }

    pub async fn search_users_now(&mut self, term: &str) -> AppResult<&[Profile]> {
        let term = term.trim();
        self.debouncer.cancel();
        self.search_term = term.to_string();

        self.search_results = if term.is_empty() {
            Vec::new()
        } else {
            self.ctx.backend.search_profiles(term, self.me, SEARCH_LIMIT).await?
        };
        Ok(&self.search_results)
    }

    fn apply_search(&mut self, outcome: SearchOutcome) -> InboxUpdate {
        // Hasil untuk term lama dibuang
        if outcome.term != self.search_term {
            return InboxUpdate::Ignored;
        }

        match outcome.result {
            Ok(profiles) => {
                self.search_results = profiles;
                InboxUpdate::SearchResults(self.search_results.len())
            }
            Err(e) => InboxUpdate::Failed(e),
        }
    }

    /// Buka direct chat; conversation non-grup dengan pasangan yang sama dipakai ulang
    pub async fn open_direct_chat(&mut self, other: Uuid) -> AppResult<Uuid> {
        if other == self.me {
            return Err(AppError::validation("Tidak bisa membuat chat dengan diri sendiri"));
        }

        if let Some(existing) = self.state.find_direct_with(self.me, other) {
            return Ok(existing);
        }

        // State lokal bisa tertinggal, cek ulang ke backend
        self.reload().await?;
        if let Some(existing) = self.state.find_direct_with(self.me, other) {
            return Ok(existing);
        }

        let conversation = self
            .ctx
            .backend
            .insert_conversation(&NewConversation::direct())
            .await?;
        self.ctx
            .backend
            .insert_participants(&[
                ParticipantLink {
                    conversation_id: conversation.id,
                    user_id: self.me,
                },
                ParticipantLink {
                    conversation_id: conversation.id,
                    user_id: other,
                },
            ])
            .await?;

        self.merge_conversation(conversation.id).await;
        tracing::info!("💬 Direct chat {} dibuat dengan {}", conversation.id, other);
        Ok(conversation.id)
    }

    /// Buat grup dari user terpilih; pembuat otomatis ikut
    pub async fn create_group(&mut self, name: &str, members: &[Uuid]) -> AppResult<Uuid> {
        let mut member_ids = vec![self.me];
        for id in members {
            if !member_ids.contains(id) {
                member_ids.push(*id);
            }
        }

        if member_ids.len() < MIN_GROUP_MEMBERS {
            return Err(AppError::validation(format!(
                "Grup membutuhkan minimal {} anggota",
                MIN_GROUP_MEMBERS
            )));
        }

        let name = name.trim();
        let group_name = (!name.is_empty()).then(|| name.to_string());

        let conversation = self
            .ctx
            .backend
            .insert_conversation(&NewConversation::group(group_name))
            .await?;
        let links: Vec<ParticipantLink> = member_ids
            .iter()
            .map(|user_id| ParticipantLink {
                conversation_id: conversation.id,
                user_id: *user_id,
            })
            .collect();
        self.ctx.backend.insert_participants(&links).await?;

        self.merge_conversation(conversation.id).await;
        tracing::info!(
            "👥 Grup {} dibuat dengan {} anggota",
            conversation.id,
            member_ids.len()
        );
        Ok(conversation.id)
    }

    /// Kirim chat request; penerima memutuskan dari inbox-nya
    pub async fn send_chat_request(&mut self, receiver: Uuid) -> AppResult<ChatRequest> {
        if receiver == self.me {
            return Err(AppError::validation("Tidak bisa mengirim request ke diri sendiri"));
        }

        let request = self
            .ctx
            .backend
            .insert_chat_request(&NewChatRequest::pending(self.me, receiver))
            .await?;
        tracing::info!("📨 Chat request {} dikirim ke {}", request.id, receiver);
        Ok(request)
    }

    /// Terima request: status jadi accepted lalu direct chat dengan pengirim dibuka
    pub async fn accept_request(&mut self, request_id: Uuid) -> AppResult<Uuid> {
        let sender = self.respond(request_id, RequestStatus::Accepted).await?;
        let conversation_id = self.open_direct_chat(sender).await?;
        tracing::info!("✅ Chat request {} diterima", request_id);
        Ok(conversation_id)
    }

    pub async fn decline_request(&mut self, request_id: Uuid) -> AppResult<()> {
        self.respond(request_id, RequestStatus::Declined).await?;
        tracing::info!("Chat request {} ditolak", request_id);
        Ok(())
    }

    // Ubah status request milik user ini; hasilnya id pengirim
    async fn respond(&mut self, request_id: Uuid, status: RequestStatus) -> AppResult<Uuid> {
        let request = self
            .pending_requests
            .iter()
            .find(|r| r.id == request_id && r.can_respond(self.me))
            .ok_or_else(|| AppError::not_found("Chat request"))?;
        let sender = request.sender_id;

        self.ctx.backend.update_request_status(request_id, status).await?;
        self.pending_requests.retain(|r| r.id != request_id);
        Ok(sender)
    }

    async fn merge_conversation(&mut self, id: Uuid) {
        match self.ctx.backend.fetch_conversation(id).await {
            Ok(Some(detail)) => self.state.upsert(detail),
            Ok(None) => tracing::warn!("Conversation {} belum terlihat", id),
            Err(e) => tracing::warn!("Gagal memuat conversation {}: {}", id, e),
        }
    }

    // Tinggalkan halaman: subscription dan pencarian pending dibatalkan
    pub fn leave(self) {
        tracing::debug!("Meninggalkan inbox");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::config::test_support::memory_context;
    use crate::domain::NewMessage;
    use crate::pages::auth::{SignUpInput, SignUpOutcome};

    async fn register(ctx: &ClientContext, username: &str) -> Uuid {
        let outcome = ctx
            .auth()
            .sign_up(SignUpInput {
                email: format!("{}@example.com", username),
                password: "rahasia123".to_string(),
                username: username.to_string(),
                display_name: username.to_uppercase(),
            })
            .await
            .unwrap();
        match outcome {
            SignUpOutcome::SignedIn { profile, .. } => profile.id,
            SignUpOutcome::ConfirmationRequired { .. } => panic!("expected session"),
        }
    }

    async fn login(ctx: &ClientContext, username: &str) {
        ctx.auth()
            .log_in(&format!("{}@example.com", username), "rahasia123")
            .await
            .unwrap();
    }

    async fn inbox(ctx: &ClientContext) -> InboxPage {
        InboxPage::load(ctx.clone()).await.ready().expect("inbox ready")
    }

    #[tokio::test]
    async fn test_requires_session() {
        let (ctx, _) = memory_context();
        let outcome = InboxPage::load(ctx).await;
        assert_eq!(outcome.redirect_target(), Some(Navigation::Login));
    }

    #[tokio::test]
    async fn test_direct_chat_is_reused() {
        let (ctx, backend) = memory_context();
        let sari = register(&ctx, "sari").await;
        register(&ctx, "budi").await;

        let mut page = inbox(&ctx).await;
        let first = page.open_direct_chat(sari).await.unwrap();
        let second = page.open_direct_chat(sari).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.conversation_count().await, 1);

        // Halaman baru tetap memakai conversation yang sama
        let mut fresh = inbox(&ctx).await;
        assert_eq!(fresh.open_direct_chat(sari).await.unwrap(), first);
        assert_eq!(backend.conversation_count().await, 1);
    }

    #[tokio::test]
    async fn test_group_direct_pair_is_not_reused_for_dm() {
        let (ctx, backend) = memory_context();
        let sari = register(&ctx, "sari").await;
        register(&ctx, "budi").await;

        let mut page = inbox(&ctx).await;
        let group = page.create_group("  ", &[sari]).await.unwrap();
        let direct = page.open_direct_chat(sari).await.unwrap();

        assert_ne!(group, direct);
        assert_eq!(backend.conversation_count().await, 2);
        let detail = page.state().get(group).unwrap();
        assert!(detail.conversation.is_group);
        assert_eq!(detail.conversation.group_name, None);
        assert_eq!(detail.title(page.me()), "SARI");
    }

    #[tokio::test]
    async fn test_group_needs_two_members() {
        let (ctx, backend) = memory_context();
        let me = register(&ctx, "budi").await;

        let mut page = inbox(&ctx).await;
        let err = page.create_group("Sendirian", &[me]).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(err.surface(), crate::error::ErrorSurface::Alert);
        assert_eq!(backend.conversation_count().await, 0);

        let err = page.create_group("Kosong", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(backend.conversation_count().await, 0);
    }

    #[tokio::test]
    async fn test_insert_event_updates_known_conversation_incrementally() {
        let (ctx, backend) = memory_context();
        let sari = register(&ctx, "sari").await;
        let budi = register(&ctx, "budi").await;

        let mut page = inbox(&ctx).await;
        let older = page.create_group("Lama", &[sari]).await.unwrap();
        let conv = page.open_direct_chat(sari).await.unwrap();

        backend
            .insert_message(&NewMessage::text(older, budi, "halo grup").unwrap())
            .await
            .unwrap();
        let update = page.next_update().await;
        assert!(matches!(update, InboxUpdate::Conversation(id) if id == older));

        // Sari membalas di direct chat
        login(&ctx, "sari").await;
        backend
            .insert_message(&NewMessage::text(conv, sari, "hai budi").unwrap())
            .await
            .unwrap();
        login(&ctx, "budi").await;

        let update = page.next_update().await;
        assert!(matches!(update, InboxUpdate::Conversation(id) if id == conv));

        let first = page.state().ordered().next().unwrap();
        assert_eq!(first.id(), conv);
        assert_eq!(first.unread_count(budi), 1);
        assert_eq!(backend.conversation_count().await, 2);
    }

    #[tokio::test]
    async fn test_insert_for_unknown_conversation_is_merged() {
        let (ctx, backend) = memory_context();
        let budi = register(&ctx, "budi").await;
        let sari = register(&ctx, "sari").await;

        // Budi membuka inbox, lalu Sari membuat chat baru dengan Budi
        login(&ctx, "budi").await;
        let mut page = inbox(&ctx).await;
        assert!(page.state().is_empty());

        login(&ctx, "sari").await;
        let conv = backend.insert_conversation(&NewConversation::direct()).await.unwrap();
        backend
            .insert_participants(&[
                ParticipantLink { conversation_id: conv.id, user_id: sari },
                ParticipantLink { conversation_id: conv.id, user_id: budi },
            ])
            .await
            .unwrap();
        backend
            .insert_message(&NewMessage::text(conv.id, sari, "halo").unwrap())
            .await
            .unwrap();
        login(&ctx, "budi").await;

        let update = page.next_update().await;
        assert!(matches!(update, InboxUpdate::Conversation(id) if id == conv.id));
        assert_eq!(page.state().len(), 1);
    }

    #[tokio::test]
    async fn test_accepted_request_opens_direct_chat() {
        let (ctx, backend) = memory_context();
        let budi = register(&ctx, "budi").await;
        let sari = register(&ctx, "sari").await;

        let mut sari_page = inbox(&ctx).await;
        let request = sari_page.send_chat_request(budi).await.unwrap();
        assert_eq!(request.status, RequestStatus::Pending);

        login(&ctx, "budi").await;
        let mut page = inbox(&ctx).await;
        assert_eq!(page.pending_requests().len(), 1);
        assert_eq!(page.pending_requests()[0].sender_id, sari);

        let conv = page.accept_request(request.id).await.unwrap();
        assert!(page.pending_requests().is_empty());
        assert_eq!(backend.conversation_count().await, 1);
        assert!(page.state().get(conv).unwrap().is_direct_between(budi, sari));

        // Request yang sudah dijawab tidak muncul lagi
        page.reload().await.unwrap();
        assert!(page.pending_requests().is_empty());
        let err = page.accept_request(request.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_accept_reuses_existing_direct_chat() {
        let (ctx, backend) = memory_context();
        let budi = register(&ctx, "budi").await;
        register(&ctx, "sari").await;

        let mut sari_page = inbox(&ctx).await;
        let existing = sari_page.open_direct_chat(budi).await.unwrap();
        let request = sari_page.send_chat_request(budi).await.unwrap();

        login(&ctx, "budi").await;
        let mut page = inbox(&ctx).await;
        assert_eq!(page.accept_request(request.id).await.unwrap(), existing);
        assert_eq!(backend.conversation_count().await, 1);
    }

    #[tokio::test]
    async fn test_sender_cannot_answer_own_request() {
        let (ctx, backend) = memory_context();
        let budi = register(&ctx, "budi").await;
        let sari = register(&ctx, "sari").await;

        let mut sari_page = inbox(&ctx).await;
        let err = sari_page.send_chat_request(sari).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let request = sari_page.send_chat_request(budi).await.unwrap();
        sari_page.reload().await.unwrap();
        assert!(sari_page.pending_requests().is_empty());
        let err = sari_page.accept_request(request.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        login(&ctx, "budi").await;
        let mut page = inbox(&ctx).await;
        page.decline_request(request.id).await.unwrap();
        page.reload().await.unwrap();
        assert!(page.pending_requests().is_empty());
        assert_eq!(backend.conversation_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_search_delivers_latest_term() {
        let (ctx, _) = memory_context();
        for name in ["sari", "sarah", "budi"] {
            register(&ctx, name).await;
        }
        login(&ctx, "budi").await;

        let mut page = inbox(&ctx).await;
        page.search_users("s");
        page.search_users("sar");

        match page.next_update().await {
            InboxUpdate::SearchResults(count) => assert_eq!(count, 2),
            other => panic!("unexpected update: {:?}", other),
        }
        let names: Vec<&str> = page.search_results().iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["sarah", "sari"]);

        page.search_users("  ");
        assert!(page.search_results().is_empty());
    }

    #[tokio::test]
    async fn test_search_now_excludes_self() {
        let (ctx, _) = memory_context();
        register(&ctx, "budiman").await;
        register(&ctx, "budi").await;

        let mut page = inbox(&ctx).await;
        let found = page.search_users_now("BUDI").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "budiman");
    }

    #[tokio::test]
    async fn test_unread_badge_and_filter_in_view() {
        let (ctx, backend) = memory_context();
        let sari = register(&ctx, "sari").await;
        register(&ctx, "budi").await;

        let mut page = inbox(&ctx).await;
        let conv = page.open_direct_chat(sari).await.unwrap();

        login(&ctx, "sari").await;
        for text in ["satu", "dua"] {
            backend
                .insert_message(&NewMessage::text(conv, sari, text).unwrap())
                .await
                .unwrap();
        }
        login(&ctx, "budi").await;
        page.reload().await.unwrap();

        let clock = Clock::local();
        let view = page.view(&clock);
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].unread, 2);
        assert_eq!(view.items[0].preview, "dua");
        assert_eq!(view.header, "BUDI (@budi)");

        page.set_filter("tidak-ada");
        assert!(page.view(&clock).visible().is_empty());
    }

    #[test]
    fn test_state_orders_by_activity() {
        use crate::domain::{Conversation, Participant};
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let make = |minutes_ago: i64| ConversationDetail {
            conversation: Conversation {
                id: Uuid::new_v4(),
                is_group: false,
                group_name: None,
                last_message_at: Some(now - Duration::minutes(minutes_ago)),
                created_at: now - Duration::days(1),
            },
            participants: vec![Participant { user_id: Uuid::new_v4(), profile: None }],
            messages: Vec::new(),
        };

        let old = make(30);
        let recent = make(1);
        let mut state = InboxState::new(vec![old.clone(), recent.clone()]);
        let ids: Vec<Uuid> = state.ordered().map(ConversationDetail::id).collect();
        assert_eq!(ids, vec![recent.id(), old.id()]);

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: old.id(),
            sender_id: Uuid::new_v4(),
            content: "baru".to_string(),
            created_at: now,
            read_by: Vec::new(),
        };
        assert!(state.apply_message(message));
        assert_eq!(state.ordered().next().unwrap().id(), old.id());

        let stranger = Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: "nyasar".to_string(),
            created_at: now,
            read_by: Vec::new(),
        };
        assert!(!state.apply_message(stranger));
        assert_eq!(state.len(), 2);
    }
}
