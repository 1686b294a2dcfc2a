use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Chat id of a conversation (numeric). Doubles as the delivery address for
/// broadcasts; a member who never interacted has none.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// An invited participant. `username` is the stable external identity,
/// `label` the unique display alias shown on recipient keyboards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub username: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    pub is_admin: bool,
}

impl Member {
    pub fn new(username: impl Into<String>, label: impl Into<String>, is_admin: bool) -> Self {
        Self {
            username: username.into(),
            label: label.into(),
            chat_id: None,
            is_admin,
        }
    }
}

/// The singleton settings document: all members plus the global expiration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<NaiveDateTime>,
}

impl Directory {
    pub fn find_by_username(&self, username: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.username == username)
    }

    pub fn find_by_label(&self, label: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.label == label)
    }

    /// Resolves a label or a username to the member carrying it.
    pub fn resolve(&self, label_or_username: &str) -> Option<&Member> {
        self.find_by_label(label_or_username)
            .or_else(|| self.find_by_username(label_or_username))
    }
}

/// One saved note: a sender-chosen alias plus ordered text chunks.
///
/// Structural equality (alias, sender, parts, timestamp) is what the store's
/// set-insert dedup keys on, so every field participates in `PartialEq`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub parts: Vec<String>,
    pub created_at: NaiveDateTime,
}

/// The ordered collection of notes addressed to one member.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    #[serde(default)]
    pub entries: Vec<Entry>,
}

impl Board {
    pub fn has_alias(&self, alias: &str) -> bool {
        self.entries.iter().any(|e| e.alias == alias)
    }

    pub fn entry(&self, alias: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.alias == alias)
    }
}
