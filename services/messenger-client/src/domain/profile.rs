// Domain model untuk Profile
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    #[default]
    Offline,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Away => "away",
            PresenceStatus::Offline => "offline",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "online" => Some(PresenceStatus::Online),
            "away" => Some(PresenceStatus::Away),
            "offline" => Some(PresenceStatus::Offline),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub status: PresenceStatus,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Profile {
    // Nama yang ditampilkan: display name, fallback ke username
    pub fn display_label(&self) -> &str {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
    }

    // Inisial untuk avatar placeholder
    pub fn initials(&self) -> String {
        self.display_label()
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub status: PresenceStatus,
    pub last_seen: Option<DateTime<Utc>>,
}

impl NewProfile {
    pub fn into_profile(self) -> Profile {
        Profile {
            id: self.id,
            username: self.username,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            status: self.status,
            last_seen: self.last_seen,
        }
    }
}

// Partial update, field None tidak dikirim ke backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PresenceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl ProfileUpdate {
    pub fn presence(status: PresenceStatus, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(status),
            last_seen: Some(at),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &ProfileUpdate::default()
    }

    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(username) = &self.username {
            profile.username = username.clone();
        }
        if let Some(display_name) = &self.display_name {
            profile.display_name = Some(display_name.clone());
        }
        if let Some(avatar_url) = &self.avatar_url {
            profile.avatar_url = Some(avatar_url.clone());
        }
        if let Some(status) = self.status {
            profile.status = status;
        }
        if let Some(last_seen) = self.last_seen {
            profile.last_seen = Some(last_seen);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            username: "budi".to_string(),
            display_name: Some("Budi Santoso".to_string()),
            avatar_url: None,
            status: PresenceStatus::Offline,
            last_seen: None,
        }
    }

    #[test]
    fn test_display_label_fallback() {
        let mut p = profile();
        assert_eq!(p.display_label(), "Budi Santoso");
        p.display_name = Some("   ".to_string());
        assert_eq!(p.display_label(), "budi");
        p.display_name = None;
        assert_eq!(p.display_label(), "budi");
    }

    #[test]
    fn test_initials() {
        assert_eq!(profile().initials(), "BS");
    }

    #[test]
    fn test_presence_update_serializes_only_set_fields() {
        let now = Utc::now();
        let update = ProfileUpdate::presence(PresenceStatus::Online, now);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "online");
        assert!(json.get("username").is_none());

        let mut p = profile();
        update.apply_to(&mut p);
        assert_eq!(p.status, PresenceStatus::Online);
        assert_eq!(p.last_seen, Some(now));
    }

    #[test]
    fn test_status_defaults_to_offline() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "username": "sari"
        });
        let p: Profile = serde_json::from_value(json).unwrap();
        assert_eq!(p.status, PresenceStatus::Offline);
        assert_eq!(PresenceStatus::parse(" AWAY "), Some(PresenceStatus::Away));
    }
}
