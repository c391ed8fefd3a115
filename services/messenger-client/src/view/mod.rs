// View model deklaratif: state halaman -> struktur yang siap dirender
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Utc};

pub mod chat;
pub mod inbox;
pub mod time;

pub use chat::{ChatView, UploadPlaceholder};
pub use inbox::InboxView;

/// Titik waktu "sekarang" + zona waktu untuk label relatif
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    pub now: DateTime<Utc>,
    pub offset: FixedOffset,
}

impl Clock {
    pub fn local() -> Self {
        let now = Local::now();
        Self {
            now: now.with_timezone(&Utc),
            offset: now.offset().fix(),
        }
    }

    #[cfg(test)]
    pub fn fixed(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self { now, offset }
    }

    pub fn to_local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }

    pub fn today(&self) -> NaiveDate {
        self.to_local(self.now).date_naive()
    }
}
