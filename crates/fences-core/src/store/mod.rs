//! Document-store port and adapters.
//!
//! The store only ever sees whole documents: the settings singleton and one
//! board per member. Every mutation replaces or extends a single document
//! atomically; cross-document consistency is the service layer's problem.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::info;

use crate::{
    config::Config,
    domain::{Board, Directory, Entry, Member},
    errors::Error,
    Result,
};

pub mod json;
pub mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;

pub const SETTINGS_COLLECTION: &str = "settings";
pub const BOARDS_COLLECTION: &str = "boards";

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Names of the collections that already exist; consulted once at startup
    /// to decide whether to seed.
    async fn collections(&self) -> Result<Vec<String>>;

    async fn get_settings(&self) -> Result<Option<Directory>>;
    async fn put_settings(&self, settings: &Directory) -> Result<()>;

    async fn get_board(&self, username: &str) -> Result<Option<Board>>;
    async fn create_board(&self, username: &str) -> Result<()>;
    async fn delete_board(&self, username: &str) -> Result<()>;

    /// Appends with set-insert semantics: an entry structurally equal to one
    /// already on the board is silently dropped.
    async fn append_entry(&self, username: &str, entry: Entry) -> Result<()>;
}

/// First-start initialization: create the settings singleton (with the
/// configured initial expiration) and make sure the configured admin exists.
pub async fn seed(store: &dyn DirectoryStore, cfg: &Config) -> Result<()> {
    let names = store.collections().await?;

    if !names.iter().any(|n| n == SETTINGS_COLLECTION) {
        info!("creating settings collection");
        let expires_at = match &cfg.initial_expiration {
            Some(raw) => Some(parse_expiration(raw, &cfg.datetime_pattern)?),
            None => None,
        };
        store
            .put_settings(&Directory {
                members: Vec::new(),
                expires_at,
            })
            .await?;
    }

    let (Some(username), Some(label)) = (&cfg.admin_username, &cfg.admin_label) else {
        return Ok(());
    };

    let mut settings = store.get_settings().await?.unwrap_or_default();
    if settings.find_by_username(username).is_none() {
        info!(%username, "seeding initial admin");
        settings.members.push(Member::new(username, label, true));
        store.put_settings(&settings).await?;
    }
    store.create_board(username).await?;

    Ok(())
}

fn parse_expiration(raw: &str, pattern: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), pattern).map_err(|_| {
        Error::Config(format!(
            "INITIAL_EXPIRATION {raw:?} does not match pattern {pattern:?}"
        ))
    })
}
