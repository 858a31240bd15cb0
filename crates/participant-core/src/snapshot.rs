//! Host-side participants mirror

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::{ParticipantError, ParticipantResult};
use crate::participant::{Participant, LOCAL_KEY};

/// Participants keyed by session id, with the local one under `"local"`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParticipantsSnapshot {
    entries: HashMap<String, Participant>,
}

impl ParticipantsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a participants map as sent by the call machine
    pub fn from_value(value: Value) -> ParticipantResult<Self> {
        let Value::Object(map) = value else {
            return Err(ParticipantError::NotAMap);
        };

        let mut snapshot = Self::new();
        for (_, raw) in map {
            snapshot.upsert(Participant::from_value(raw)?);
        }
        Ok(snapshot)
    }

    pub fn get(&self, key: &str) -> Option<&Participant> {
        self.entries.get(key)
    }

    pub fn local(&self) -> Option<&Participant> {
        self.entries.get(LOCAL_KEY)
    }

    /// Look up by session id, including the local participant's real id
    pub fn find_session(&self, session_id: &str) -> Option<&Participant> {
        self.entries
            .get(session_id)
            .or_else(|| self.local().filter(|p| p.session_id == session_id))
    }

    /// Insert or replace, returning the previous entry
    pub fn upsert(&mut self, participant: Participant) -> Option<Participant> {
        self.entries.insert(participant.key().to_string(), participant)
    }

    pub fn remove(&mut self, key: &str) -> Option<Participant> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Participant)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &Participant> {
        self.entries.values()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_value_rekeys_local() {
        let snapshot = ParticipantsSnapshot::from_value(json!({
            "local": { "session_id": "me", "local": true },
            "them": { "session_id": "them" }
        }))
        .unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.local().unwrap().session_id, "me");
        assert_eq!(snapshot.find_session("me").unwrap().key(), LOCAL_KEY);
        assert!(snapshot.get("them").is_some());
    }

    #[test]
    fn test_from_value_rejects_non_map() {
        assert!(matches!(
            ParticipantsSnapshot::from_value(json!([1, 2])),
            Err(ParticipantError::NotAMap)
        ));
    }

    #[test]
    fn test_upsert_replaces() {
        let mut snapshot = ParticipantsSnapshot::new();
        assert!(snapshot.upsert(Participant::new("a")).is_none());
        let previous = snapshot.upsert(Participant::new("a").with_user_name("Ada"));
        assert_eq!(previous.unwrap().user_name, "");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("a").unwrap().user_name, "Ada");
    }
}
