use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::RwLock,
};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    fd_lock::RwLock as FileLock,
    tracing::{debug, warn},
};

use crate::{
    conversation::{ChatId, ChatSettings, Conversation},
    error::{Error, Result},
};

/// Keyed storage of conversations.
///
/// Implementations must be safe to call from many workers at once. Callers
/// serialize access to a single chat themselves; the store only guarantees
/// that a completed `set` is visible to every later `get`.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn get(&self, chat_id: ChatId) -> Result<Option<Conversation>>;

    async fn set(&self, chat_id: ChatId, conversation: &Conversation) -> Result<()>;

    /// Return the stored conversation, or create one stamped with `defaults`.
    /// The flag is `true` when the conversation was created by this call.
    async fn get_or_create(
        &self,
        chat_id: ChatId,
        defaults: &ChatSettings,
        now: DateTime<Utc>,
    ) -> Result<(Conversation, bool)> {
        if let Some(existing) = self.get(chat_id).await? {
            return Ok((existing, false));
        }
        let conversation = Conversation::new(chat_id, defaults.clone(), now);
        self.set(chat_id, &conversation).await?;
        Ok((conversation, true))
    }
}

/// One JSON document per chat under `<base_dir>/chats/`, fronted by an
/// in-process cache.
///
/// The cache is updated before the disk write, so a failed write still
/// leaves the in-memory value current for the rest of the process.
pub struct FileChatStore {
    dir: PathBuf,
    cache: RwLock<HashMap<ChatId, Conversation>>,
}

impl FileChatStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: base_dir.as_ref().join("chats"),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, chat_id: ChatId) -> PathBuf {
        self.dir.join(format!("{chat_id}.json"))
    }

    fn cached(&self, chat_id: ChatId) -> Option<Conversation> {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&chat_id)
            .cloned()
    }

    fn remember(&self, conversation: Conversation) {
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(conversation.chat_id, conversation);
    }
}

#[async_trait]
impl ChatStore for FileChatStore {
    async fn get(&self, chat_id: ChatId) -> Result<Option<Conversation>> {
        if let Some(hit) = self.cached(chat_id) {
            return Ok(Some(hit));
        }

        let path = self.path_for(chat_id);
        let loaded = tokio::task::spawn_blocking(move || read_document(&path, chat_id)).await??;

        if let Some(conversation) = &loaded {
            debug!(chat_id, entries = conversation.history.len(), "loaded chat from disk");
            self.remember(conversation.clone());
        }
        Ok(loaded)
    }

    async fn set(&self, chat_id: ChatId, conversation: &Conversation) -> Result<()> {
        self.remember(conversation.clone());

        let path = self.path_for(chat_id);
        let body = serde_json::to_vec_pretty(conversation)?;
        tokio::task::spawn_blocking(move || write_document(&path, &body)).await??;
        Ok(())
    }

    /// An unreadable document is moved aside and replaced by a fresh
    /// conversation, so one bad file cannot lock a chat out for good.
    async fn get_or_create(
        &self,
        chat_id: ChatId,
        defaults: &ChatSettings,
        now: DateTime<Utc>,
    ) -> Result<(Conversation, bool)> {
        match self.get(chat_id).await {
            Ok(Some(existing)) => return Ok((existing, false)),
            Ok(None) => {},
            Err(Error::Corrupt { chat_id, source }) => {
                let path = self.path_for(chat_id);
                let stamp = now.format("%Y%m%dT%H%M%S").to_string();
                let moved = tokio::task::spawn_blocking(move || set_aside(&path, &stamp)).await??;
                warn!(
                    chat_id,
                    error = %source,
                    moved_to = %moved.display(),
                    "chat state unreadable, starting a fresh conversation"
                );
            },
            Err(e) => return Err(e),
        }
        let conversation = Conversation::new(chat_id, defaults.clone(), now);
        self.set(chat_id, &conversation).await?;
        Ok((conversation, true))
    }
}

fn lock_path(path: &Path) -> PathBuf {
    path.with_extension("json.lock")
}

fn open_lock(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(lock_path(path))?)
}

fn read_document(path: &Path, chat_id: ChatId) -> Result<Option<Conversation>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut lock = FileLock::new(open_lock(path)?);
    let _guard = lock.read().map_err(Error::lock_failed)?;

    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|source| Error::Corrupt { chat_id, source })
}

/// Rename a document to `<id>.json.corrupt-<stamp>` and return the new path.
fn set_aside(path: &Path, stamp: &str) -> Result<PathBuf> {
    let mut lock = FileLock::new(open_lock(path)?);
    let _guard = lock.write().map_err(Error::lock_failed)?;

    let target = path.with_extension(format!("json.corrupt-{stamp}"));
    fs::rename(path, &target)?;
    Ok(target)
}

fn write_document(path: &Path, body: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut lock = FileLock::new(open_lock(path)?);
    let _guard = lock.write().map_err(Error::lock_failed)?;

    let tmp = path.with_extension("json.tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(body)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
