use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    domain::{Board, ChatId, Directory, Entry, Member},
    errors::Error,
    store::DirectoryStore,
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleFilter {
    All,
    Admin,
    Member,
}

impl RoleFilter {
    fn matches(self, m: &Member) -> bool {
        match self {
            RoleFilter::All => true,
            RoleFilter::Admin => m.is_admin,
            RoleFilter::Member => !m.is_admin,
        }
    }
}

/// Single source of truth for membership, roles and expiration.
///
/// Keeps a process-wide cache of the settings singleton; every mutation goes
/// write-to-store-then-invalidate. Mutations are serialized by one lock so a
/// duplicate check and its commit cannot interleave across sessions.
pub struct DirectoryService {
    store: Arc<dyn DirectoryStore>,
    datetime_pattern: String,
    cache: Mutex<Option<Arc<Directory>>>,
    write_lock: Mutex<()>,
}

impl DirectoryService {
    pub fn new(store: Arc<dyn DirectoryStore>, datetime_pattern: impl Into<String>) -> Self {
        Self {
            store,
            datetime_pattern: datetime_pattern.into(),
            cache: Mutex::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Cached directory; re-fetched on cache miss. Fails soft: a store error
    /// logs a warning and yields an empty directory, uncached, so the next
    /// call retries the store.
    pub async fn load(&self) -> Arc<Directory> {
        let mut cache = self.cache.lock().await;
        if let Some(dir) = cache.as_ref() {
            return dir.clone();
        }
        match self.store.get_settings().await {
            Ok(found) => {
                let dir = Arc::new(found.unwrap_or_default());
                *cache = Some(dir.clone());
                dir
            }
            Err(e) => {
                warn!("directory load failed, serving empty: {e}");
                Arc::new(Directory::default())
            }
        }
    }

    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    pub async fn is_member(&self, username: &str) -> bool {
        self.load().await.find_by_username(username).is_some()
    }

    pub async fn is_admin(&self, username: &str) -> bool {
        self.load()
            .await
            .find_by_username(username)
            .is_some_and(|m| m.is_admin)
    }

    pub async fn label_of(&self, username: &str) -> Option<String> {
        self.load()
            .await
            .find_by_username(username)
            .map(|m| m.label.clone())
    }

    pub async fn usernames(&self, role: RoleFilter) -> Vec<String> {
        self.project(role, |m| m.username.clone()).await
    }

    pub async fn labels(&self, role: RoleFilter) -> Vec<String> {
        self.project(role, |m| m.label.clone()).await
    }

    /// Ordered label → username pairs.
    pub async fn contacts(&self, role: RoleFilter) -> Vec<(String, String)> {
        self.project(role, |m| (m.label.clone(), m.username.clone()))
            .await
    }

    async fn project<T>(&self, role: RoleFilter, f: impl Fn(&Member) -> T) -> Vec<T> {
        self.load()
            .await
            .members
            .iter()
            .filter(|m| role.matches(m))
            .map(f)
            .collect()
    }

    pub async fn expires_at(&self) -> Option<NaiveDateTime> {
        self.load().await.expires_at
    }

    /// Adds a member and co-creates its empty board. If the board write
    /// fails, the member write is rolled back so the 1:1 invariant holds.
    pub async fn add_member(&self, username: &str, label: &str, is_admin: bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let current = self.load().await;
        if current.find_by_username(username).is_some() {
            return Err(Error::DuplicateUsername(username.to_string()));
        }
        if current.find_by_label(label).is_some() {
            return Err(Error::DuplicateLabel(label.to_string()));
        }

        let mut next = (*current).clone();
        next.members.push(Member::new(username, label, is_admin));
        self.store.put_settings(&next).await?;

        if let Err(e) = self.store.create_board(username).await {
            warn!(%username, "board creation failed, rolling back member: {e}");
            let rollback = self.store.put_settings(&current).await;
            self.invalidate().await;
            rollback?;
            return Err(e);
        }

        self.invalidate().await;
        info!(%username, %label, %is_admin, "member added");
        Ok(())
    }

    /// Deletes a member (by label or username) together with its board.
    /// Removing a non-member is a no-op: delete is idempotent.
    pub async fn remove_member(&self, label_or_username: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let current = self.load().await;
        let Some(username) = current
            .resolve(label_or_username)
            .map(|m| m.username.clone())
        else {
            return Ok(());
        };

        let mut next = (*current).clone();
        next.members.retain(|m| m.username != username);
        self.store.put_settings(&next).await?;
        self.invalidate().await;

        self.store.delete_board(&username).await?;
        info!(%username, "member removed");
        Ok(())
    }

    pub async fn set_admin_flag(&self, label_or_username: &str, is_admin: bool) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let current = self.load().await;
        let Some(username) = current
            .resolve(label_or_username)
            .map(|m| m.username.clone())
        else {
            return Err(Error::MemberNotFound(label_or_username.to_string()));
        };

        let mut next = (*current).clone();
        for m in &mut next.members {
            if m.username == username {
                m.is_admin = is_admin;
            }
        }
        self.store.put_settings(&next).await?;
        self.invalidate().await;
        info!(%username, %is_admin, "admin flag changed");
        Ok(())
    }

    /// Parses `raw` against the fixed pattern and stores it. Past-dated
    /// timestamps are allowed; the monitor treats them as already expired.
    pub async fn set_expiration(&self, raw: &str) -> Result<NaiveDateTime> {
        let parsed = NaiveDateTime::parse_from_str(raw.trim(), &self.datetime_pattern).map_err(
            |_| Error::InvalidTimestamp {
                input: raw.trim().to_string(),
                pattern: self.datetime_pattern.clone(),
            },
        )?;

        let _guard = self.write_lock.lock().await;
        let mut next = (*self.load().await).clone();
        next.expires_at = Some(parsed);
        self.store.put_settings(&next).await?;
        self.invalidate().await;
        info!(expires_at = %parsed, "expiration changed");
        Ok(parsed)
    }

    /// Records the delivery address a member was last seen on. Unchanged
    /// addresses are skipped without a store write.
    pub async fn update_delivery_address(&self, username: &str, chat: ChatId) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let current = self.load().await;
        match current.find_by_username(username) {
            None => return Err(Error::MemberNotFound(username.to_string())),
            Some(m) if m.chat_id == Some(chat.0) => return Ok(()),
            Some(_) => {}
        }

        let mut next = (*current).clone();
        for m in &mut next.members {
            if m.username == username {
                m.chat_id = Some(chat.0);
            }
        }
        self.store.put_settings(&next).await?;
        self.invalidate().await;
        Ok(())
    }

    /// The recipient's board; absent boards read as empty.
    pub async fn board_of(&self, username: &str) -> Result<Board> {
        Ok(self.store.get_board(username).await?.unwrap_or_default())
    }

    /// Commits a composed note: resolves the recipient label, enforces
    /// per-recipient alias uniqueness, appends the entry.
    pub async fn save_entry(
        &self,
        recipient_label: &str,
        alias: &str,
        parts: Vec<String>,
        sender: Option<&str>,
    ) -> Result<()> {
        let directory = self.load().await;
        let Some(username) = directory
            .find_by_label(recipient_label)
            .map(|m| m.username.clone())
        else {
            return Err(Error::MemberNotFound(recipient_label.to_string()));
        };

        let board = self.board_of(&username).await?;
        if board.has_alias(alias) {
            return Err(Error::DuplicateAlias(alias.to_string()));
        }

        let entry = Entry {
            alias: alias.to_string(),
            sender: sender.map(|s| s.to_string()),
            parts,
            created_at: now_seconds(),
        };
        self.store.append_entry(&username, entry).await?;
        info!(recipient = %username, %alias, "entry saved");
        Ok(())
    }
}

/// Current UTC time truncated to whole seconds, the granularity entries are
/// compared at by the store's dedup.
fn now_seconds() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}
