use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chatpilot_core_types::ChatId;

use crate::raw;

/// Group membership / settings change subtype, keyed by the raw subtype
/// string. Matched exhaustively; anything unrecognised lands in `Other`
/// instead of being silently dropped.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum GroupUpdateKind {
    Add,
    Invite,
    Remove,
    Leave,
    Subject,
    Description,
    Picture,
    Announce,
    Restrict,
    Other(String),
}

impl GroupUpdateKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "add" => Self::Add,
            "invite" => Self::Invite,
            "remove" => Self::Remove,
            "leave" => Self::Leave,
            "subject" => Self::Subject,
            "description" => Self::Description,
            "picture" => Self::Picture,
            "announce" => Self::Announce,
            "restrict" => Self::Restrict,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A change to a group chat: membership, subject, settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupUpdate {
    pub chat_id: ChatId,
    pub kind: GroupUpdateKind,
    /// Peer that performed the change, when the store reports one.
    pub actor: Option<String>,
    /// Peers affected by the change (added, removed, ...).
    pub recipients: Vec<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl GroupUpdate {
    pub fn from_raw(value: &Value) -> Self {
        let kind = raw::str_field(value, "subtype")
            .map(|s| GroupUpdateKind::parse(&s))
            .unwrap_or(GroupUpdateKind::Other(String::new()));
        Self {
            chat_id: ChatId(raw::id_field(value, "chatId").unwrap_or_default()),
            kind,
            actor: raw::id_field(value, "actor"),
            recipients: raw::string_list_field(value, "recipients"),
            timestamp: raw::timestamp_field(value, "timestamp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_subtypes_map_to_variants() {
        for (raw, kind) in [
            ("add", GroupUpdateKind::Add),
            ("leave", GroupUpdateKind::Leave),
            ("subject", GroupUpdateKind::Subject),
            ("restrict", GroupUpdateKind::Restrict),
        ] {
            assert_eq!(GroupUpdateKind::parse(raw), kind);
        }
    }

    #[test]
    fn unknown_subtype_is_preserved() {
        let update = GroupUpdate::from_raw(&json!({
            "chatId": "g1@g",
            "subtype": "membership_approval",
            "recipients": ["u1@c"]
        }));
        assert_eq!(
            update.kind,
            GroupUpdateKind::Other("membership_approval".to_string())
        );
        assert_eq!(update.recipients, vec!["u1@c".to_string()]);
    }
}
