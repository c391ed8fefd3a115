// Domain model untuk Conversation
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Message, Profile};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: Uuid,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewConversation {
    pub is_group: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

impl NewConversation {
    pub fn direct() -> Self {
        Self {
            is_group: false,
            group_name: None,
        }
    }

    pub fn group(name: Option<String>) -> Self {
        Self {
            is_group: true,
            group_name: name,
        }
    }
}

// Link keanggotaan conversation x user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ParticipantLink {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub user_id: Uuid,
    pub profile: Option<Profile>,
}

impl Participant {
    pub fn display_label(&self) -> String {
        self.profile
            .as_ref()
            .map(|p| p.display_label().to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Conversation lengkap dengan peserta (beserta profile) dan pesan
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationDetail {
    pub conversation: Conversation,
    pub participants: Vec<Participant>,
    pub messages: Vec<Message>,
}

impl ConversationDetail {
    pub fn id(&self) -> Uuid {
        self.conversation.id
    }

    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    pub fn member_count(&self) -> usize {
        self.participants.len()
    }

    // Lawan bicara di direct chat
    pub fn peer(&self, me: Uuid) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id != me)
    }

    pub fn profile_of(&self, user_id: Uuid) -> Option<&Profile> {
        self.participants
            .iter()
            .find(|p| p.user_id == user_id)
            .and_then(|p| p.profile.as_ref())
    }

    // Judul conversation dari sudut pandang user `me`
    pub fn title(&self, me: Uuid) -> String {
        if self.conversation.is_group {
            if let Some(name) = self
                .conversation
                .group_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
            {
                return name.to_string();
            }

            let names: Vec<String> = self
                .participants
                .iter()
                .filter(|p| p.user_id != me)
                .map(Participant::display_label)
                .collect();
            return if names.is_empty() {
                "Grup".to_string()
            } else {
                names.join(", ")
            };
        }

        self.peer(me)
            .map(Participant::display_label)
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.iter().max_by_key(|m| m.created_at)
    }

    // Waktu aktivitas terakhir untuk sorting inbox
    pub fn activity_at(&self) -> DateTime<Utc> {
        let from_messages = self.last_message().map(|m| m.created_at);
        match (self.conversation.last_message_at, from_messages) {
            (Some(a), Some(b)) => a.max(b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => self.conversation.created_at,
        }
    }

    // Direct chat yang pesertanya persis pasangan (a, b)
    pub fn is_direct_between(&self, a: Uuid, b: Uuid) -> bool {
        !self.conversation.is_group
            && self.participants.len() == 2
            && self.has_participant(a)
            && self.has_participant(b)
    }

    pub fn unread_count(&self, me: Uuid) -> usize {
        self.messages.iter().filter(|m| m.is_unread_for(me)).count()
    }

    pub fn sort_messages(&mut self) {
        self.messages.sort_by_key(|m| m.created_at);
    }

    // Tambah / ganti pesan berdasarkan id
    pub fn upsert_message(&mut self, message: Message) {
        if let Some(existing) = self.messages.iter_mut().find(|m| m.id == message.id) {
            *existing = message;
        } else {
            if self
                .conversation
                .last_message_at
                .map_or(true, |at| at < message.created_at)
            {
                self.conversation.last_message_at = Some(message.created_at);
            }
            self.messages.push(message);
        }
    }
}
