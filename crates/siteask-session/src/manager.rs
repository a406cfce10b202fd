use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use siteask_core::{SiteaskError, SiteaskResult};

use crate::participant::ParticipantInfo;
use crate::session::ConversationSession;
use crate::store::ConversationStore;

/// Serializes mutations per conversation session.
///
/// Every mutation takes that session's exclusive guard, loads the
/// current revision, mutates a copy, and persists it — so two
/// concurrent appends to one session can never interleave and lose an
/// update, and a failed persist leaves the prior revision intact.
/// Different sessions proceed independently.
pub struct SessionManager {
    store: Arc<dyn ConversationStore>,
    guards: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionManager {
    /// Creates a manager over `store`.
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            store,
            guards: Mutex::new(HashMap::new()),
        }
    }

    /// The exclusive guard for one session id.
    async fn guard(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut guards = self.guards.lock().await;
        Arc::clone(guards.entry(id).or_default())
    }

    async fn load(&self, id: Uuid) -> SiteaskResult<ConversationSession> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| SiteaskError::Storage(format!("session {id} not found")))
    }

    /// Persists a new session.
    pub async fn create(&self, session: &ConversationSession) -> SiteaskResult<Uuid> {
        self.store.create(session).await
    }

    /// Loads a session, or `None` when unknown.
    pub async fn get(&self, id: Uuid) -> SiteaskResult<Option<ConversationSession>> {
        self.store.get(id).await
    }

    /// Every session the given user participates in.
    pub async fn list_for_user(&self, user_id: &str) -> SiteaskResult<Vec<ConversationSession>> {
        self.store.list_for_user(user_id).await
    }

    /// Adds a participant under the session's guard. Idempotent.
    pub async fn add_participant(
        &self,
        id: Uuid,
        participant: ParticipantInfo,
    ) -> SiteaskResult<()> {
        let guard = self.guard(id).await;
        let _held = guard.lock().await;

        let mut session = self.load(id).await?;
        if session.add_participant(participant) {
            self.store.update(&session).await?;
            debug!(session = %id, participants = session.participants.len(), "participant added");
        }
        Ok(())
    }

    /// Removes a participant under the session's guard. No-op if
    /// absent.
    pub async fn remove_participant(&self, id: Uuid, participant_id: &str) -> SiteaskResult<()> {
        let guard = self.guard(id).await;
        let _held = guard.lock().await;

        let mut session = self.load(id).await?;
        if session.remove_participant(participant_id) {
            self.store.update(&session).await?;
        }
        Ok(())
    }

    /// Appends one message under the session's guard, returning the
    /// new count. Surfaces the capacity error without persisting
    /// anything when the queue limit is hit.
    pub async fn append_message(&self, id: Uuid) -> SiteaskResult<u64> {
        let guard = self.guard(id).await;
        let _held = guard.lock().await;

        let mut session = self.load(id).await?;
        let count = session.append_message()?;
        self.store.update(&session).await?;
        Ok(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::InMemoryConversationStore;
    use async_trait::async_trait;

    async fn manager_with_session(limit: u64) -> (Arc<SessionManager>, Uuid) {
        let store = Arc::new(InMemoryConversationStore::new());
        let manager = Arc::new(SessionManager::new(store));
        let session = ConversationSession::new(limit);
        let id = manager.create(&session).await.unwrap();
        (manager, id)
    }

    #[tokio::test]
    async fn test_concurrent_appends_lose_nothing() {
        let (manager, id) = manager_with_session(1000).await;

        let mut handles = Vec::new();
        for _ in 0..50 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager.append_message(id).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let session = manager.get(id).await.unwrap().unwrap();
        assert_eq!(session.message_count, 50);
    }

    #[tokio::test]
    async fn test_capacity_rejection_persists_nothing() {
        let (manager, id) = manager_with_session(1).await;

        manager.append_message(id).await.unwrap();
        let err = manager.append_message(id).await.unwrap_err();
        assert!(matches!(err, SiteaskError::Capacity(_)));

        let session = manager.get(id).await.unwrap().unwrap();
        assert_eq!(session.message_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_participant_adds_stay_unique() {
        let (manager, id) = manager_with_session(10).await;

        let mut handles = Vec::new();
        for _ in 0..10 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                manager
                    .add_participant(id, ParticipantInfo::human("u1", "Alice"))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let session = manager.get(id).await.unwrap().unwrap();
        assert_eq!(session.participants.len(), 1);
    }

    /// Store whose updates always fail, for the failed-persist path.
    struct BrokenStore {
        inner: InMemoryConversationStore,
    }

    #[async_trait]
    impl ConversationStore for BrokenStore {
        async fn create(&self, session: &ConversationSession) -> SiteaskResult<Uuid> {
            self.inner.create(session).await
        }

        async fn get(&self, id: Uuid) -> SiteaskResult<Option<ConversationSession>> {
            self.inner.get(id).await
        }

        async fn update(&self, _session: &ConversationSession) -> SiteaskResult<()> {
            Err(SiteaskError::Storage("disk on fire".to_string()))
        }

        async fn list_for_user(&self, user_id: &str) -> SiteaskResult<Vec<ConversationSession>> {
            self.inner.list_for_user(user_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_prior_state() {
        let store = Arc::new(BrokenStore {
            inner: InMemoryConversationStore::new(),
        });
        let manager = SessionManager::new(store);
        let session = ConversationSession::new(10);
        let id = manager.create(&session).await.unwrap();

        let err = manager.append_message(id).await.unwrap_err();
        assert!(matches!(err, SiteaskError::Storage(_)));

        // The stored revision still has the pre-mutation count.
        let stored = manager.get(id).await.unwrap().unwrap();
        assert_eq!(stored.message_count, 0);
    }
}
