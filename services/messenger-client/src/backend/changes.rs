// Tipe untuk change subscription (push notifikasi perubahan row)
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinHandle};

use super::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "*")]
    All,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
            ChangeKind::All => "*",
        }
    }

    pub fn covers(&self, other: ChangeKind) -> bool {
        *self == ChangeKind::All || *self == other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    Conversations,
    ConversationParticipants,
    Messages,
    ChatRequests,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Conversations => "conversations",
            Table::ConversationParticipants => "conversation_participants",
            Table::Messages => "messages",
            Table::ChatRequests => "chat_requests",
        }
    }
}

/// Filter subscription: satu tabel, satu jenis event, opsional `kolom = nilai`
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeFilter {
    pub table: Table,
    pub kind: ChangeKind,
    pub column_eq: Option<(String, String)>,
}

impl ChangeFilter {
    pub fn inserts(table: Table) -> Self {
        Self {
            table,
            kind: ChangeKind::Insert,
            column_eq: None,
        }
    }

    pub fn updates(table: Table) -> Self {
        Self {
            table,
            kind: ChangeKind::Update,
            column_eq: None,
        }
    }

    pub fn with_eq(mut self, column: &str, value: impl ToString) -> Self {
        self.column_eq = Some((column.to_string(), value.to_string()));
        self
    }

    // Format filter realtime: kolom=eq.nilai
    pub fn filter_expr(&self) -> Option<String> {
        self.column_eq
            .as_ref()
            .map(|(column, value)| format!("{}=eq.{}", column, value))
    }

    // Nama channel yang unik per filter
    pub fn topic(&self) -> String {
        match &self.column_eq {
            Some((column, value)) => format!(
                "realtime:{}:{}:{}={}",
                self.table.as_str(),
                self.kind.as_str().to_lowercase(),
                column,
                value
            ),
            None => format!(
                "realtime:{}:{}",
                self.table.as_str(),
                self.kind.as_str().to_lowercase()
            ),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table.as_str() || !self.kind.covers(event.kind) {
            return false;
        }

        match &self.column_eq {
            None => true,
            Some((column, expected)) => match event.record.get(column) {
                Some(serde_json::Value::String(actual)) => actual == expected,
                Some(other) => other.to_string() == *expected,
                None => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: String,
    pub record: serde_json::Value,
    #[serde(default)]
    pub old_record: Option<serde_json::Value>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, table: Table, record: serde_json::Value) -> Self {
        Self {
            kind,
            table: table.as_str().to_string(),
            record,
            old_record: None,
        }
    }

    // Decode record ke tipe domain
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BackendError> {
        serde_json::from_value(self.record.clone())
            .map_err(|e| BackendError::Decode(format!("{} record: {}", self.table, e)))
    }
}

/// Handle subscription aktif. Drop = unsubscribe (task forwarder dihentikan).
pub struct Subscription {
    topic: String,
    events: mpsc::Receiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(
        topic: String,
        events: mpsc::Receiver<ChangeEvent>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            topic,
            events,
            task,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    // Tunggu event berikutnya; None bila channel sudah ditutup
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    #[cfg(test)]
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        tracing::debug!("Unsubscribe dari {}", self.topic);
    }
}
