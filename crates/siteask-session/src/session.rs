use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use siteask_core::{SiteaskError, SiteaskResult};

use crate::participant::{ParticipantInfo, ParticipantSet};

/// A multi-participant conversation session.
///
/// Created on first join, mutated only through the explicit
/// participant and message operations here, and retired by an
/// external retention policy — never by this crate. `message_count`
/// is monotonic non-decreasing; the queue limit turns into
/// backpressure, not silent drops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    /// Session identifier.
    pub id: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// The typed participant set.
    pub participants: ParticipantSet,
    /// Number of messages appended so far.
    pub message_count: u64,
    /// Maximum messages this session accepts.
    pub queue_size_limit: u64,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ConversationSession {
    /// Creates an empty session with the given queue limit.
    pub fn new(queue_size_limit: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            participants: ParticipantSet::new(),
            message_count: 0,
            queue_size_limit,
            metadata: HashMap::new(),
        }
    }

    /// Adds a participant. Idempotent by participant identifier:
    /// returns false and changes nothing when already present.
    pub fn add_participant(&mut self, participant: ParticipantInfo) -> bool {
        self.participants.insert(participant)
    }

    /// Removes the participant with `id`. No-op (false) if absent.
    pub fn remove_participant(&mut self, id: &str) -> bool {
        self.participants.remove(id)
    }

    /// Accounts for one appended message.
    ///
    /// Rejects with a capacity error once the count would exceed the
    /// queue limit; on rejection the count is unchanged.
    pub fn append_message(&mut self) -> SiteaskResult<u64> {
        if self.message_count >= self.queue_size_limit {
            return Err(SiteaskError::Capacity(format!(
                "conversation {} is full ({} messages)",
                self.id, self.queue_size_limit
            )));
        }
        self.message_count += 1;
        Ok(self.message_count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_participant_idempotent() {
        let mut session = ConversationSession::new(100);
        assert!(session.add_participant(ParticipantInfo::human("u1", "Alice")));
        assert!(!session.add_participant(ParticipantInfo::human("u1", "Alice")));
        assert_eq!(session.participants.len(), 1);
    }

    #[test]
    fn test_append_until_capacity() {
        let mut session = ConversationSession::new(2);
        assert_eq!(session.append_message().unwrap(), 1);
        assert_eq!(session.append_message().unwrap(), 2);

        let err = session.append_message().unwrap_err();
        assert!(matches!(err, SiteaskError::Capacity(_)));
        // Rejected append does not bump the count.
        assert_eq!(session.message_count, 2);
    }

    #[test]
    fn test_session_roundtrip_keeps_typed_participants() {
        let mut session = ConversationSession::new(50);
        session.add_participant(ParticipantInfo::human("u1", "Alice"));
        session.add_participant(ParticipantInfo::agent("bot", "Helper"));
        session.metadata.insert("title".into(), serde_json::json!("Shoe hunt"));

        let json = serde_json::to_string(&session).unwrap();
        let back: ConversationSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back.participants.len(), 2);
        assert!(back.participants.contains("bot"));
        assert_eq!(back.metadata["title"], "Shoe hunt");
    }

    #[test]
    fn test_session_json_with_bare_participants_rejected() {
        let mut session = ConversationSession::new(10);
        session.add_participant(ParticipantInfo::human("u1", "Alice"));
        let mut value = serde_json::to_value(&session).unwrap();
        // Corrupt the document the way the known bug class did.
        value["participants"] = serde_json::json!(["u1", "u2"]);

        let result: Result<ConversationSession, _> = serde_json::from_value(value);
        assert!(result.is_err());
    }
}
