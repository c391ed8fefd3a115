// Domain model untuk Message
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use shared::utils::validation::{sanitize_html, unescape_html};
use uuid::Uuid;

// Markup gambar yang disimpan di kolom content
static IMAGE_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*<img\s+[^>]*src="([^"]+)"[^>]*>\s*$"#).unwrap());

const PREVIEW_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_by: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Image { url: String },
}

impl MessageContent {
    // Decode content mentah dari database
    pub fn parse(raw: &str) -> Self {
        match IMAGE_MARKUP.captures(raw).and_then(|caps| caps.get(1)) {
            Some(src) => MessageContent::Image {
                url: unescape_html(src.as_str()),
            },
            None => MessageContent::Text(raw.to_string()),
        }
    }

    // Encode ke format content yang disimpan
    pub fn to_markup(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Image { url } => format!(
                r#"<img src="{}" class="chat-image" alt="image">"#,
                sanitize_html(url)
            ),
        }
    }

    // Preview singkat untuk list inbox
    pub fn preview(&self) -> String {
        match self {
            MessageContent::Image { .. } => "📷 Gambar".to_string(),
            MessageContent::Text(text) => {
                let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if single_line.chars().count() > PREVIEW_MAX_CHARS {
                    let cut: String = single_line.chars().take(PREVIEW_MAX_CHARS).collect();
                    format!("{}...", cut)
                } else {
                    single_line
                }
            }
        }
    }
}

impl Message {
    pub fn content(&self) -> MessageContent {
        MessageContent::parse(&self.content)
    }

    pub fn is_from(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id
    }

    pub fn is_read_by(&self, user_id: Uuid) -> bool {
        self.read_by.contains(&user_id)
    }

    // Belum dibaca oleh user ini dan bukan pesan miliknya sendiri
    pub fn is_unread_for(&self, user_id: Uuid) -> bool {
        !self.is_from(user_id) && !self.is_read_by(user_id)
    }

    // Tandai sudah dibaca; idempotent, return true bila read_by berubah
    pub fn mark_read_by(&mut self, user_id: Uuid) -> bool {
        if self.is_read_by(user_id) {
            return false;
        }
        self.read_by.push(user_id);
        true
    }

    // Read indicator untuk pengirim: sudah dibaca minimal satu peserta lain
    pub fn is_seen_by_others(&self) -> bool {
        self.read_by.iter().any(|id| *id != self.sender_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
}

impl NewMessage {
    // Pesan teks; None bila isi kosong setelah di-trim
    pub fn text(conversation_id: Uuid, sender_id: Uuid, raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        Some(Self {
            conversation_id,
            sender_id,
            content: trimmed.to_string(),
        })
    }

    pub fn image(conversation_id: Uuid, sender_id: Uuid, url: &str) -> Self {
        Self {
            conversation_id,
            sender_id,
            content: MessageContent::Image {
                url: url.to_string(),
            }
            .to_markup(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender: Uuid) -> Message {
        Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: sender,
            content: "halo".to_string(),
            created_at: Utc::now(),
            read_by: Vec::new(),
        }
    }

    #[test]
    fn test_mark_read_by_is_idempotent() {
        let reader = Uuid::new_v4();
        let mut msg = message(Uuid::new_v4());

        assert!(msg.is_unread_for(reader));
        assert!(msg.mark_read_by(reader));
        assert!(!msg.mark_read_by(reader));
        assert_eq!(msg.read_by, vec![reader]);
        assert!(!msg.is_unread_for(reader));
        assert!(msg.is_seen_by_others());
    }

    #[test]
    fn test_own_message_is_never_unread() {
        let me = Uuid::new_v4();
        let msg = message(me);
        assert!(!msg.is_unread_for(me));
        assert!(!msg.is_seen_by_others());
    }

    #[test]
    fn test_new_text_message_trims_and_rejects_blank() {
        let conv = Uuid::new_v4();
        let me = Uuid::new_v4();

        assert!(NewMessage::text(conv, me, "   \n\t ").is_none());
        let msg = NewMessage::text(conv, me, "  apa kabar?  ").unwrap();
        assert_eq!(msg.content, "apa kabar?");
    }

    #[test]
    fn test_image_markup_parses_back() {
        let url = "https://proj.example.co/storage/v1/object/public/chat-images/a/1.png?t=1&x=2";
        let new = NewMessage::image(Uuid::new_v4(), Uuid::new_v4(), url);

        assert!(new.content.starts_with("<img src=\""));
        assert!(new.content.contains("class=\"chat-image\""));
        assert_eq!(
            MessageContent::parse(&new.content),
            MessageContent::Image { url: url.to_string() }
        );
    }

    #[test]
    fn test_text_that_mentions_img_stays_text() {
        let raw = "kirim <img> nanti ya";
        assert_eq!(MessageContent::parse(raw), MessageContent::Text(raw.to_string()));
    }

    #[test]
    fn test_preview() {
        assert_eq!(MessageContent::Text("a\nb   c".to_string()).preview(), "a b c");
        let long = "x".repeat(60);
        assert_eq!(MessageContent::Text(long).preview().chars().count(), 53);
        assert_eq!(
            MessageContent::Image { url: "u".to_string() }.preview(),
            "📷 Gambar"
        );
    }
}
