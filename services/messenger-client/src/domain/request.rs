// Domain model untuk permintaan chat (request -> accepted / declined)
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    #[serde(default)]
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

impl ChatRequest {
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    // Hanya penerima yang boleh menerima / menolak
    pub fn can_respond(&self, user_id: Uuid) -> bool {
        self.is_pending() && self.receiver_id == user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewChatRequest {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub status: RequestStatus,
}

impl NewChatRequest {
    pub fn pending(sender_id: Uuid, receiver_id: Uuid) -> Self {
        Self {
            sender_id,
            receiver_id,
            status: RequestStatus::Pending,
        }
    }
}
