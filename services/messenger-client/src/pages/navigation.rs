// Navigasi antar halaman (login.html / inbox.html / chat.html?id=...)
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Login,
    Inbox,
    Chat(Uuid),
}

impl Navigation {
    pub fn to_href(&self) -> String {
        match self {
            Navigation::Login => "login.html".to_string(),
            Navigation::Inbox => "inbox.html".to_string(),
            Navigation::Chat(id) => format!("chat.html?id={}", id),
        }
    }
}

/// Hasil load halaman: siap dipakai atau harus pindah halaman
#[derive(Debug)]
pub enum LoadOutcome<T> {
    Ready(T),
    Redirect(Navigation),
}

impl<T> LoadOutcome<T> {
    #[cfg(test)]
    pub fn redirect_target(&self) -> Option<Navigation> {
        match self {
            LoadOutcome::Ready(_) => None,
            LoadOutcome::Redirect(to) => Some(*to),
        }
    }

    #[cfg(test)]
    pub fn ready(self) -> Option<T> {
        match self {
            LoadOutcome::Ready(page) => Some(page),
            LoadOutcome::Redirect(_) => None,
        }
    }
}

// Ambil parameter `id` dari query string halaman chat
pub fn conversation_id_from_query(query: &str) -> Option<Uuid> {
    form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .find(|(key, _)| key == "id")
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_href_carries_id() {
        let id = Uuid::new_v4();
        let href = Navigation::Chat(id).to_href();
        assert_eq!(href, format!("chat.html?id={}", id));

        let (_, query) = href.split_once('?').unwrap();
        assert_eq!(conversation_id_from_query(query), Some(id));
        assert_eq!(Navigation::Inbox.to_href(), "inbox.html");
    }

    #[test]
    fn test_query_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(conversation_id_from_query(&format!("?foo=1&id={}", id)), Some(id));
        assert_eq!(conversation_id_from_query("id="), None);
        assert_eq!(conversation_id_from_query(""), None);
    }
}
