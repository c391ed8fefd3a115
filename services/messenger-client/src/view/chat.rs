// View model halaman chat: header, thread dengan separator tanggal, placeholder upload
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::{time, Clock};
use crate::domain::{ConversationDetail, MessageContent, PresenceStatus, Profile};

#[derive(Debug, Clone, PartialEq)]
pub enum ChatHeader {
    Direct { name: String, status: String },
    Group { name: String, member_count: usize },
}

impl ChatHeader {
    pub fn build(detail: &ConversationDetail, me: Uuid, clock: &Clock) -> Self {
        let name = detail.title(me);
        if detail.conversation.is_group {
            return ChatHeader::Group {
                name,
                member_count: detail.member_count(),
            };
        }

        let status = match detail.peer(me).and_then(|p| p.profile.as_ref()) {
            Some(profile) => match profile.status {
                PresenceStatus::Online => "online".to_string(),
                PresenceStatus::Away => "away".to_string(),
                PresenceStatus::Offline => time::last_seen_label(profile.last_seen, clock),
            },
            None => "offline".to_string(),
        };
        ChatHeader::Direct { name, status }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageBubble {
    pub id: Uuid,
    pub sender: String,
    pub mine: bool,
    pub body: MessageContent,
    pub time: String,
    // Hanya relevan untuk pesan sendiri
    pub seen: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadPlaceholder {
    pub id: u64,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThreadItem {
    DateSeparator(String),
    Message(MessageBubble),
    Uploading(UploadPlaceholder),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatView {
    pub header: ChatHeader,
    pub items: Vec<ThreadItem>,
}

impl ChatView {
    // `detail.messages` diasumsikan sudah terurut berdasarkan created_at
    pub fn build(
        detail: &ConversationDetail,
        me: Uuid,
        senders: &HashMap<Uuid, Profile>,
        uploads: &[UploadPlaceholder],
        clock: &Clock,
    ) -> Self {
        let mut items = Vec::with_capacity(detail.messages.len() + uploads.len());
        let mut current_day = None;

        for message in &detail.messages {
            let day = clock.to_local(message.created_at).date_naive();
            if current_day != Some(day) {
                items.push(ThreadItem::DateSeparator(time::date_separator_label(day, clock)));
                current_day = Some(day);
            }

            let mine = message.is_from(me);
            let sender = if mine {
                "You".to_string()
            } else {
                senders
                    .get(&message.sender_id)
                    .or_else(|| detail.profile_of(message.sender_id))
                    .map(|p| p.display_label().to_string())
                    .unwrap_or_else(|| "Unknown".to_string())
            };

            items.push(ThreadItem::Message(MessageBubble {
                id: message.id,
                sender,
                mine,
                body: message.content(),
                time: time::clock_time(message.created_at, clock),
                seen: mine && message.is_seen_by_others(),
            }));
        }

        items.extend(uploads.iter().cloned().map(ThreadItem::Uploading));

        Self {
            header: ChatHeader::build(detail, me, clock),
            items,
        }
    }

    pub fn bubbles(&self) -> impl Iterator<Item = &MessageBubble> {
        self.items.iter().filter_map(|item| match item {
            ThreadItem::Message(bubble) => Some(bubble),
            _ => None,
        })
    }
}

impl fmt::Display for ChatHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatHeader::Direct { name, status } => write!(f, "== {} ({}) ==", name, status),
            ChatHeader::Group { name, member_count } => {
                write!(f, "== {} · {} anggota ==", name, member_count)
            }
        }
    }
}

impl fmt::Display for MessageBubble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = match &self.body {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Image { url } => format!("[gambar] {}", url),
        };
        let receipt = match (self.mine, self.seen) {
            (true, true) => " ✓✓",
            (true, false) => " ✓",
            _ => "",
        };
        write!(f, "[{}] {}: {}{}", self.time, self.sender, body, receipt)
    }
}

impl fmt::Display for ChatView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        for item in &self.items {
            match item {
                ThreadItem::DateSeparator(label) => writeln!(f, "--- {} ---", label)?,
                ThreadItem::Message(bubble) => writeln!(f, "{}", bubble)?,
                ThreadItem::Uploading(upload) => {
                    writeln!(f, "[...] Mengupload {}", upload.filename)?
                }
            }
        }
        Ok(())
    }
}
