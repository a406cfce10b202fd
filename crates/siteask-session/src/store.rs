use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use siteask_core::{SiteaskError, SiteaskResult};

use crate::session::ConversationSession;

/// Pluggable persistence for conversation sessions.
///
/// Every mutation persists the entire typed session document —
/// participant set included — atomically. Providers must never offer
/// a path that writes the participant collection as anything but the
/// typed records (the serialization format is the session's own serde
/// impl, which rejects untyped members).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Persists a new session, returning its id.
    async fn create(&self, session: &ConversationSession) -> SiteaskResult<Uuid>;

    /// Loads a session, or `None` when unknown.
    async fn get(&self, id: Uuid) -> SiteaskResult<Option<ConversationSession>>;

    /// Replaces a persisted session with a newer revision.
    async fn update(&self, session: &ConversationSession) -> SiteaskResult<()>;

    /// Every session the given user participates in.
    async fn list_for_user(&self, user_id: &str) -> SiteaskResult<Vec<ConversationSession>>;
}

/// In-memory store. The baseline provider, also used throughout the
/// test suites.
#[derive(Default)]
pub struct InMemoryConversationStore {
    sessions: RwLock<HashMap<Uuid, ConversationSession>>,
}

impl InMemoryConversationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn create(&self, session: &ConversationSession) -> SiteaskResult<Uuid> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id, session.clone());
        Ok(session.id)
    }

    async fn get(&self, id: Uuid) -> SiteaskResult<Option<ConversationSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id).cloned())
    }

    async fn update(&self, session: &ConversationSession) -> SiteaskResult<()> {
        let mut sessions = self.sessions.write().await;
        if !sessions.contains_key(&session.id) {
            return Err(SiteaskError::Storage(format!(
                "session {} does not exist",
                session.id
            )));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: &str) -> SiteaskResult<Vec<ConversationSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter(|s| s.participants.contains(user_id))
            .cloned()
            .collect())
    }
}

/// Embedded file-backed store: one JSON document per session.
///
/// Writes go through a temp file and an atomic rename, so a crashed
/// or failed write can never leave a session document with a
/// half-written participant set on disk.
pub struct FileConversationStore {
    dir: PathBuf,
}

impl FileConversationStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub async fn new(dir: PathBuf) -> SiteaskResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn session_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn write_atomic(&self, session: &ConversationSession) -> SiteaskResult<()> {
        let path = self.session_path(session.id);
        let tmp = self.dir.join(format!("{}.json.tmp", session.id));
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| SiteaskError::Storage(format!("cannot write session: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| SiteaskError::Storage(format!("cannot commit session: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn create(&self, session: &ConversationSession) -> SiteaskResult<Uuid> {
        self.write_atomic(session).await?;
        Ok(session.id)
    }

    async fn get(&self, id: Uuid) -> SiteaskResult<Option<ConversationSession>> {
        let path = self.session_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SiteaskError::Storage(format!("cannot read session: {e}")))?;
        let session: ConversationSession = serde_json::from_str(&data)
            .map_err(|e| SiteaskError::Storage(format!("corrupt session document: {e}")))?;
        Ok(Some(session))
    }

    async fn update(&self, session: &ConversationSession) -> SiteaskResult<()> {
        if !self.session_path(session.id).exists() {
            return Err(SiteaskError::Storage(format!(
                "session {} does not exist",
                session.id
            )));
        }
        self.write_atomic(session).await
    }

    async fn list_for_user(&self, user_id: &str) -> SiteaskResult<Vec<ConversationSession>> {
        let mut sessions = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| SiteaskError::Storage(format!("cannot list sessions: {e}")))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SiteaskError::Storage(format!("cannot list sessions: {e}")))?
        {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            let Ok(id) = Uuid::parse_str(stem) else {
                continue;
            };
            if let Some(session) = self.get(id).await? {
                if session.participants.contains(user_id) {
                    sessions.push(session);
                }
            }
        }
        Ok(sessions)
    }
}
