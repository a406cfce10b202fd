use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// What kind of actor a participant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantKind {
    /// A human end-user.
    Human,
    /// An automated agent.
    Agent,
}

/// One conversation participant.
///
/// Value equality and hashing use the identifier only: two records
/// with the same `id` are the same participant regardless of display
/// name or join time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantInfo {
    /// Unique participant identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Participant type.
    pub kind: ParticipantKind,
    /// When the participant joined.
    pub joined_at: DateTime<Utc>,
}

impl ParticipantInfo {
    /// Creates a human participant joining now.
    pub fn human(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ParticipantKind::Human,
            joined_at: Utc::now(),
        }
    }

    /// Creates an automated-agent participant joining now.
    pub fn agent(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: ParticipantKind::Agent,
            joined_at: Utc::now(),
        }
    }
}

impl PartialEq for ParticipantInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ParticipantInfo {}

impl std::hash::Hash for ParticipantInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// The set of participants in one conversation.
///
/// Uniqueness is by participant identifier, and the only insertion
/// path takes a constructed [`ParticipantInfo`]. Deserialization
/// routes through the same typed record, so a JSON array of bare
/// identifier strings is rejected outright and duplicate records are
/// normalized away instead of corrupting the set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ParticipantSet {
    members: Vec<ParticipantInfo>,
}

impl ParticipantSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a participant. Idempotent: returns false and leaves
    /// the set unchanged when the identifier is already present.
    pub fn insert(&mut self, participant: ParticipantInfo) -> bool {
        if self.contains(&participant.id) {
            return false;
        }
        self.members.push(participant);
        true
    }

    /// Removes the participant with `id`. Returns false if absent.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|p| p.id != id);
        self.members.len() < before
    }

    /// Whether a participant with `id` is in the set.
    pub fn contains(&self, id: &str) -> bool {
        self.members.iter().any(|p| p.id == id)
    }

    /// Number of participants.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterates participants in join order.
    pub fn iter(&self) -> impl Iterator<Item = &ParticipantInfo> {
        self.members.iter()
    }
}

impl<'de> Deserialize<'de> for ParticipantSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Each element must be a full typed record; duplicates by id
        // collapse through insert() rather than surviving as state.
        let members = Vec::<ParticipantInfo>::deserialize(deserializer)?;
        let mut set = Self::new();
        for participant in members {
            set.insert(participant);
        }
        Ok(set)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_idempotent_by_id() {
        let mut set = ParticipantSet::new();
        assert!(set.insert(ParticipantInfo::human("u1", "Alice")));
        assert!(!set.insert(ParticipantInfo::human("u1", "Alice Again")));
        assert_eq!(set.len(), 1);
        // The first record wins; the duplicate did not overwrite it.
        assert_eq!(set.iter().next().unwrap().name, "Alice");
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut set = ParticipantSet::new();
        set.insert(ParticipantInfo::agent("bot", "Helper"));
        assert!(!set.remove("ghost"));
        assert_eq!(set.len(), 1);
        assert!(set.remove("bot"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_equality_by_id_only() {
        let a = ParticipantInfo::human("u1", "Alice");
        let b = ParticipantInfo::agent("u1", "Totally Different");
        assert_eq!(a, b);
    }

    #[test]
    fn test_bare_identifier_array_rejected() {
        // The observed corruption bug: a set of raw id strings where
        // typed records belong. Deserialization must refuse it.
        let bare = json!(["alice", "bob"]);
        let result: Result<ParticipantSet, _> = serde_json::from_value(bare);
        assert!(result.is_err());
    }

    #[test]
    fn test_typed_roundtrip() {
        let mut set = ParticipantSet::new();
        set.insert(ParticipantInfo::human("u1", "Alice"));
        set.insert(ParticipantInfo::agent("bot", "Helper"));

        let json = serde_json::to_string(&set).unwrap();
        let back: ParticipantSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert!(back.contains("u1"));
        assert!(back.contains("bot"));
    }

    #[test]
    fn test_duplicate_records_normalized_on_deserialize() {
        let doubled = json!([
            {"id": "u1", "name": "Alice", "kind": "human", "joined_at": "2026-01-01T00:00:00Z"},
            {"id": "u1", "name": "Alias", "kind": "human", "joined_at": "2026-01-02T00:00:00Z"}
        ]);
        let set: ParticipantSet = serde_json::from_value(doubled).unwrap();
        assert_eq!(set.len(), 1);
    }
}
