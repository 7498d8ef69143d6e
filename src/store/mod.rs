/// Durable storage for users, chat rooms, and relayed messages.
/// Every table is an append-only file holding one JSON object per line.

pub mod accounts;

use crate::error::{Result, ServerError};
use crate::models::{ChatRoom, Message, User};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub use accounts::Accounts;

pub const USERS_FILE: &str = "user.dat";
pub const ROOMS_FILE: &str = "room.dat";
pub const MESSAGES_FILE: &str = "message.dat";

fn persistence_error(path: &Path, err: impl std::fmt::Display) -> ServerError {
    ServerError::Persistence(format!("{}: {}", path.display(), err))
}

/// Append-only JSON-lines log of records of type `T`.
pub struct LogStore<T> {
    path: PathBuf,
    file: Mutex<File>,
    _record: PhantomData<fn() -> T>,
}

impl<T> LogStore<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Open a log, creating the file and its parent directories if missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| persistence_error(parent, e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| persistence_error(&path, e))?;

        Ok(LogStore {
            path,
            file: Mutex::new(File::from_std(file)),
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and sync it to disk before returning.
    /// Concurrent callers are serialized.
    pub async fn append(&self, record: &T) -> Result<()> {
        let mut line =
            serde_json::to_string(record).map_err(|e| persistence_error(&self.path, e))?;
        line.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| persistence_error(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| persistence_error(&self.path, e))?;
        file.sync_data()
            .await
            .map_err(|e| persistence_error(&self.path, e))?;
        Ok(())
    }

    /// Read every record in write order.
    ///
    /// Lines that fail to parse are logged and skipped so a partially
    /// corrupted log still replays. Meant for startup, before any traffic.
    pub fn read_all(&self) -> Result<Vec<T>> {
        let file = std::fs::File::open(&self.path).map_err(|e| persistence_error(&self.path, e))?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (index, line) in reader.split(b'\n').enumerate() {
            let line = line.map_err(|e| persistence_error(&self.path, e))?;
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(text) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!(
                    "Skipping malformed record at {}:{}: {}",
                    self.path.display(),
                    index + 1,
                    e
                ),
            }
        }

        Ok(records)
    }
}

/// The three logs kept under the server's data directory.
pub struct Stores {
    pub users: LogStore<User>,
    pub rooms: LogStore<ChatRoom>,
    pub messages: LogStore<Message>,
}

impl Stores {
    pub fn open(data_dir: &Path) -> Result<Self> {
        Ok(Stores {
            users: LogStore::open(data_dir.join(USERS_FILE))?,
            rooms: LogStore::open(data_dir.join(ROOMS_FILE))?,
            messages: LogStore::open(data_dir.join(MESSAGES_FILE))?,
        })
    }
}
