//! Room member model and its JSON wire form

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Whether a member hosts the room or joined it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MemberKind {
    #[serde(rename = "HOST")]
    Host,
    /// Peers that omit `kind` are guests
    #[default]
    #[serde(rename = "GUEST")]
    Guest,
}

impl MemberKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Host => "HOST",
            MemberKind::Guest => "GUEST",
        }
    }
}

impl std::fmt::Display for MemberKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant in a room, keyed by `machine_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Player name
    pub name: String,
    /// Stable install identity, the membership key
    pub machine_id: String,
    /// Launcher/client information
    pub vendor: String,
    #[serde(default)]
    pub kind: MemberKind,
}

impl Member {
    pub fn new(
        name: impl Into<String>,
        machine_id: impl Into<String>,
        vendor: impl Into<String>,
        kind: MemberKind,
    ) -> Self {
        Self {
            name: name.into(),
            machine_id: machine_id.into(),
            vendor: vendor.into(),
            kind,
        }
    }

    pub fn is_host(&self) -> bool {
        self.kind == MemberKind::Host
    }

    /// Serialize to the JSON body used by `c:player_ping`
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize a member list as returned by `c:player_profiles_list`
    pub fn list_to_bytes(members: &[Member]) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(members)?)
    }

    pub fn list_from_bytes(bytes: &[u8]) -> Result<Vec<Member>> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_wire_keys() {
        let member = Member::new("Alice", "abc", "v1", MemberKind::Host);
        let json: serde_json::Value = serde_json::from_slice(&member.to_bytes().unwrap()).unwrap();

        assert_eq!(json["name"], "Alice");
        assert_eq!(json["machine_id"], "abc");
        assert_eq!(json["vendor"], "v1");
        assert_eq!(json["kind"], "HOST");
    }

    #[test]
    fn test_missing_kind_is_guest() {
        let member =
            Member::from_bytes(br#"{"name":"Bob","machine_id":"def","vendor":"v2"}"#).unwrap();
        assert_eq!(member.kind, MemberKind::Guest);
        assert!(!member.is_host());
    }

    #[test]
    fn test_member_list_preserves_order() {
        let members = vec![
            Member::new("Alice", "abc", "v1", MemberKind::Host),
            Member::new("Bob", "def", "v2", MemberKind::Guest),
        ];
        let decoded = Member::list_from_bytes(&Member::list_to_bytes(&members).unwrap()).unwrap();
        assert_eq!(decoded, members);
    }

    #[test]
    fn test_malformed_member_rejected() {
        assert!(Member::from_bytes(b"not json").is_err());
        assert!(Member::from_bytes(br#"{"name":"Bob"}"#).is_err());
        assert!(Member::from_bytes(br#"{"name":"a","machine_id":"b","vendor":"c","kind":"OWNER"}"#).is_err());
    }
}
