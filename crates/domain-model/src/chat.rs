use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chatpilot_core_types::{ChatId, MessageId};

use crate::raw;

/// One conversation, direct or group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub is_group: bool,
    pub unread_count: u32,
    pub timestamp: Option<DateTime<Utc>>,
    pub archived: bool,
    pub pinned: bool,
    /// Mute expiry; `None` when the chat is not muted.
    pub muted_until: Option<DateTime<Utc>>,
    pub last_message_id: Option<MessageId>,
}

impl Chat {
    pub fn from_raw(value: &Value) -> Self {
        Self {
            id: ChatId(raw::id_field(value, "id").unwrap_or_default()),
            name: raw::str_field(value, "name").unwrap_or_default(),
            is_group: raw::bool_field(value, "isGroup"),
            unread_count: raw::u32_field(value, "unreadCount"),
            timestamp: raw::timestamp_field(value, "timestamp"),
            archived: raw::bool_field(value, "archived"),
            pinned: raw::bool_field(value, "pinned"),
            muted_until: raw::timestamp_field(value, "muteExpiration"),
            last_message_id: raw::id_field(value, "lastMessageId").map(MessageId),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_group_chat() {
        let chat = Chat::from_raw(&json!({
            "id": "c1@g",
            "name": "team",
            "isGroup": true,
            "unreadCount": 3,
            "archived": false,
            "muteExpiration": 1_700_000_000
        }));
        assert!(chat.is_group);
        assert_eq!(chat.unread_count, 3);
        assert!(chat.muted_until.is_some());
    }

    #[test]
    fn missing_fields_default() {
        let chat = Chat::from_raw(&json!({ "id": "c2@c" }));
        assert_eq!(chat.name, "");
        assert!(!chat.archived);
        assert!(chat.muted_until.is_none());
    }
}
