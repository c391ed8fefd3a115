// Controller halaman: auth, inbox, chat
use crate::backend::{ChangeEvent, Subscription};

pub mod auth;
pub mod chat;
pub mod debounce;
pub mod inbox;
pub mod navigation;
pub mod scope;

pub use navigation::{conversation_id_from_query, LoadOutcome, Navigation};

// Event berikutnya dari subscription opsional; tanpa subscription tidak pernah selesai
pub(crate) async fn next_change(subscription: &mut Option<Subscription>) -> Option<ChangeEvent> {
    match subscription {
        Some(subscription) => {
            let event = subscription.next().await;
            if event.is_none() {
                tracing::warn!("Subscription {} ditutup", subscription.topic());
            }
            event
        }
        None => std::future::pending().await,
    }
}
