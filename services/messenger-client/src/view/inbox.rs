// View model halaman inbox
use std::fmt;
use uuid::Uuid;

use super::{time, Clock};
use crate::domain::{ConversationDetail, PresenceStatus, Profile};

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationListItem {
    pub id: Uuid,
    pub title: String,
    pub initials: String,
    pub preview: String,
    pub time_label: Option<String>,
    pub unread: usize,
    pub is_group: bool,
    pub member_count: usize,
    pub peer_status: Option<PresenceStatus>,
}

impl ConversationListItem {
    pub fn build(detail: &ConversationDetail, me: Uuid, clock: &Clock) -> Self {
        let last = detail.last_message();
        let preview = match last {
            Some(message) if message.is_from(me) => format!("You: {}", message.content().preview()),
            Some(message) => message.content().preview(),
            None => "Belum ada pesan".to_string(),
        };
        let time_label = last
            .map(|m| m.created_at)
            .or(detail.conversation.last_message_at)
            .map(|at| time::relative_label(at, clock));

        let title = detail.title(me);
        let initials = if detail.conversation.is_group {
            title.chars().next().map(|c| c.to_uppercase().collect::<String>()).unwrap_or_default()
        } else {
            detail
                .peer(me)
                .and_then(|p| p.profile.as_ref())
                .map(Profile::initials)
                .unwrap_or_else(|| "?".to_string())
        };

        Self {
            id: detail.id(),
            title,
            initials,
            preview,
            time_label,
            unread: detail.unread_count(me),
            is_group: detail.conversation.is_group,
            member_count: detail.member_count(),
            peer_status: if detail.conversation.is_group {
                None
            } else {
                detail.peer(me).and_then(|p| p.profile.as_ref()).map(|p| p.status)
            },
        }
    }

    // Teks item seperti yang tampil di list, dipakai untuk pencarian client-side
    pub fn rendered_text(&self) -> String {
        let mut text = format!("{} {}", self.title, self.preview);
        if let Some(label) = &self.time_label {
            text.push(' ');
            text.push_str(label);
        }
        text
    }

    pub fn matches(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        needle.is_empty() || self.rendered_text().to_lowercase().contains(&needle)
    }
}

impl fmt::Display for ConversationListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.peer_status {
            Some(PresenceStatus::Online) => "●",
            Some(PresenceStatus::Away) => "◐",
            _ => " ",
        };
        write!(f, "{} [{}] {}", marker, self.initials, self.title)?;
        if self.is_group {
            write!(f, " ({} anggota)", self.member_count)?;
        }
        if let Some(label) = &self.time_label {
            write!(f, "  · {}", label)?;
        }
        if self.unread > 0 {
            write!(f, "  ({} baru)", self.unread)?;
        }
        write!(f, "\n      {}", self.preview)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboxView {
    pub header: String,
    pub items: Vec<ConversationListItem>,
    pub filter: String,
}

impl InboxView {
    // `conversations` sudah terurut dari aktivitas terbaru
    pub fn build<'a, I>(
        profile: Option<&Profile>,
        me: Uuid,
        conversations: I,
        filter: &str,
        clock: &Clock,
    ) -> Self
    where
        I: IntoIterator<Item = &'a ConversationDetail>,
    {
        Self {
            header: profile
                .map(|p| format!("{} (@{})", p.display_label(), p.username))
                .unwrap_or_else(|| "Inbox".to_string()),
            items: conversations
                .into_iter()
                .map(|c| ConversationListItem::build(c, me, clock))
                .collect(),
            filter: filter.to_string(),
        }
    }

    // Item yang lolos filter pencarian, urutan sama dengan list
    pub fn visible(&self) -> Vec<&ConversationListItem> {
        self.items.iter().filter(|i| i.matches(&self.filter)).collect()
    }

    pub fn total_unread(&self) -> usize {
        self.items.iter().map(|i| i.unread).sum()
    }
}

impl fmt::Display for InboxView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== {} ==", self.header)?;
        if !self.filter.trim().is_empty() {
            writeln!(f, "Filter: \"{}\"", self.filter.trim())?;
        }

        let visible = self.visible();
        if visible.is_empty() {
            return writeln!(f, "  (tidak ada percakapan)");
        }
        for (index, item) in visible.iter().enumerate() {
            writeln!(f, "{:>2}. {}", index + 1, item)?;
        }
        Ok(())
    }
}
