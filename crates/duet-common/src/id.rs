use serde::{Deserialize, Serialize};
use std::fmt;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Opaque identifier the matcher assigns to one pairing of two participants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh random id (used by the loopback runner, which has no matcher).
    pub fn generate() -> Self {
        Self(new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MatchId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MatchId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_valid_uuid() {
        let id = new_id();
        let parsed = uuid::Uuid::parse_str(&id);
        assert!(parsed.is_ok());
        assert_eq!(parsed.unwrap().get_version_num(), 4);
    }

    #[test]
    fn generated_match_ids_are_unique() {
        assert_ne!(MatchId::generate(), MatchId::generate());
    }

    #[test]
    fn match_id_display() {
        let id = MatchId::new("m-42");
        assert_eq!(id.to_string(), "m-42");
        assert_eq!(id.as_str(), "m-42");
    }

    #[test]
    fn match_id_serializes_as_plain_string() {
        let id = MatchId::from("abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: MatchId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn match_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(MatchId::from("a"));
        set.insert(MatchId::from(String::from("a")));
        assert_eq!(set.len(), 1);
    }
}
