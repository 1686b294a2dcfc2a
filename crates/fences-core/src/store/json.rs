use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::{
    domain::{Board, Directory, Entry},
    errors::Error,
    store::{DirectoryStore, BOARDS_COLLECTION, SETTINGS_COLLECTION},
    Result,
};

/// JSON-file store: the settings singleton in one file, one file per board.
///
/// Each mutation rewrites a whole document via write-to-temp-then-rename, so
/// a single document is always either the old or the new version on disk.
pub struct JsonStore {
    settings_path: PathBuf,
    boards_dir: PathBuf,
}

impl JsonStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            settings_path: data_dir.join("settings.json"),
            boards_dir: data_dir.join("boards"),
        }
    }

    fn board_path(&self, username: &str) -> Result<PathBuf> {
        // Usernames become file names; refuse anything that could escape the
        // boards directory.
        if username.is_empty()
            || username.contains(['/', '\\'])
            || username == "."
            || username == ".."
        {
            return Err(Error::Store(format!("unusable board key: {username:?}")));
        }
        Ok(self.boards_dir.join(format!("{username}.json")))
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Store(format!("read {}: {e}", path.display()))),
    };
    if txt.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&txt)
        .map(Some)
        .map_err(|e| Error::Store(format!("parse {}: {e}", path.display())))
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::Store(format!("mkdir {}: {e}", parent.display())))?;
    }
    let txt = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, txt)
        .await
        .map_err(|e| Error::Store(format!("write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::Store(format!("rename {}: {e}", path.display())))?;
    Ok(())
}

#[async_trait]
impl DirectoryStore for JsonStore {
    async fn collections(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        if self.settings_path.exists() {
            names.push(SETTINGS_COLLECTION.to_string());
        }
        if self.boards_dir.is_dir() {
            names.push(BOARDS_COLLECTION.to_string());
        }
        Ok(names)
    }

    async fn get_settings(&self) -> Result<Option<Directory>> {
        read_json(&self.settings_path).await
    }

    async fn put_settings(&self, settings: &Directory) -> Result<()> {
        write_json(&self.settings_path, settings).await
    }

    async fn get_board(&self, username: &str) -> Result<Option<Board>> {
        read_json(&self.board_path(username)?).await
    }

    async fn create_board(&self, username: &str) -> Result<()> {
        let path = self.board_path(username)?;
        if path.exists() {
            return Ok(());
        }
        write_json(&path, &Board::default()).await
    }

    async fn delete_board(&self, username: &str) -> Result<()> {
        let path = self.board_path(username)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Store(format!("remove {}: {e}", path.display()))),
        }
    }

    async fn append_entry(&self, username: &str, entry: Entry) -> Result<()> {
        let path = self.board_path(username)?;
        let mut board: Board = read_json(&path)
            .await?
            .ok_or_else(|| Error::Store(format!("no board for {username}")))?;
        if !board.entries.contains(&entry) {
            board.entries.push(entry);
        }
        write_json(&path, &board).await
    }
}
