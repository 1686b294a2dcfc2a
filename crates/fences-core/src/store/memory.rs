use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{Board, Directory, Entry},
    errors::Error,
    store::{DirectoryStore, BOARDS_COLLECTION, SETTINGS_COLLECTION},
    Result,
};

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    settings: Option<Directory>,
    boards: HashMap<String, Board>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with the given directory and one empty board
    /// per member.
    pub fn with_settings(settings: Directory) -> Self {
        let mut inner = Inner::default();
        for m in &settings.members {
            inner.boards.insert(m.username.clone(), Board::default());
        }
        inner.settings = Some(settings);
        Self {
            inner: Mutex::new(inner),
        }
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn collections(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        let mut names = Vec::new();
        if inner.settings.is_some() {
            names.push(SETTINGS_COLLECTION.to_string());
        }
        if !inner.boards.is_empty() {
            names.push(BOARDS_COLLECTION.to_string());
        }
        Ok(names)
    }

    async fn get_settings(&self) -> Result<Option<Directory>> {
        Ok(self.inner.lock().await.settings.clone())
    }

    async fn put_settings(&self, settings: &Directory) -> Result<()> {
        self.inner.lock().await.settings = Some(settings.clone());
        Ok(())
    }

    async fn get_board(&self, username: &str) -> Result<Option<Board>> {
        Ok(self.inner.lock().await.boards.get(username).cloned())
    }

    async fn create_board(&self, username: &str) -> Result<()> {
        self.inner
            .lock()
            .await
            .boards
            .entry(username.to_string())
            .or_default();
        Ok(())
    }

    async fn delete_board(&self, username: &str) -> Result<()> {
        self.inner.lock().await.boards.remove(username);
        Ok(())
    }

    async fn append_entry(&self, username: &str, entry: Entry) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let board = inner
            .boards
            .get_mut(username)
            .ok_or_else(|| Error::Store(format!("no board for {username}")))?;
        if !board.entries.contains(&entry) {
            board.entries.push(entry);
        }
        Ok(())
    }
}
