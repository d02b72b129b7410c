use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chatpilot_core_types::{ChatId, MessageId};

use crate::raw;

/// Message payload kind, keyed by the raw type string the remote store uses.
/// Unrecognised kinds are preserved in `Other` so callers can still branch on
/// them; nothing is silently dropped at this level.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Voice,
    Document,
    Sticker,
    Location,
    ContactCard,
    /// Still encrypted; the real kind arrives with a later type change.
    Ciphertext,
    Revoked,
    GroupNotification,
    Other(String),
}

impl MessageKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "chat" | "text" => Self::Text,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "ptt" => Self::Voice,
            "document" => Self::Document,
            "sticker" => Self::Sticker,
            "location" => Self::Location,
            "vcard" | "multi_vcard" => Self::ContactCard,
            "ciphertext" => Self::Ciphertext,
            "revoked" => Self::Revoked,
            "notification" | "notification_template" | "gp2" => Self::GroupNotification,
            other => Self::Other(other.to_string()),
        }
    }

    /// Provisional kinds are withheld from the add path until the store
    /// resolves them (see the bridge's deduplication policy).
    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Ciphertext)
    }
}

/// Delivery acknowledgement level.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Ack {
    Failed,
    Pending,
    Sent,
    Received,
    Read,
    Played,
}

impl Ack {
    pub fn from_level(level: i64) -> Self {
        match level {
            i64::MIN..=-1 => Self::Failed,
            0 => Self::Pending,
            1 => Self::Sent,
            2 => Self::Received,
            3 => Self::Read,
            _ => Self::Played,
        }
    }
}

/// One message, mapped out of the page-side record. Construct with
/// [`Message::from_raw`]; a reload produces a fresh value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender: Option<String>,
    pub to: Option<String>,
    pub body: String,
    pub kind: MessageKind,
    pub ack: Ack,
    pub timestamp: Option<DateTime<Utc>>,
    pub from_me: bool,
    pub has_media: bool,
    pub is_forwarded: bool,
    pub is_starred: bool,
    /// Set when the message was created live in this session, as opposed to
    /// arriving through history sync.
    pub is_new: bool,
    pub mentioned_ids: Vec<String>,
    pub quoted_message_id: Option<MessageId>,
}

impl Message {
    pub fn from_raw(value: &Value) -> Self {
        let kind = raw::str_field(value, "kind")
            .map(|k| MessageKind::parse(&k))
            .unwrap_or(MessageKind::Other(String::new()));
        Self {
            id: MessageId(raw::id_field(value, "id").unwrap_or_default()),
            chat_id: ChatId(raw::id_field(value, "chatId").unwrap_or_default()),
            sender: raw::id_field(value, "sender"),
            to: raw::id_field(value, "to"),
            body: raw::str_field(value, "body").unwrap_or_default(),
            kind,
            ack: Ack::from_level(raw::i64_field(value, "ack").unwrap_or(0)),
            timestamp: raw::timestamp_field(value, "timestamp"),
            from_me: raw::bool_field(value, "fromMe"),
            has_media: raw::bool_field(value, "hasMedia"),
            is_forwarded: raw::bool_field(value, "isForwarded"),
            is_starred: raw::bool_field(value, "isStarred"),
            is_new: raw::bool_field(value, "isNew"),
            mentioned_ids: raw::string_list_field(value, "mentions"),
            quoted_message_id: raw::id_field(value, "quotedId").map(MessageId),
        }
    }

    pub fn is_revoked(&self) -> bool {
        matches!(self.kind, MessageKind::Revoked)
    }
}

/// A reaction applied to (or removed from) a message. An empty emoji means
/// the sender withdrew their reaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    pub sender: Option<String>,
    pub emoji: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Reaction {
    pub fn from_raw(value: &Value) -> Self {
        Self {
            message_id: MessageId(raw::id_field(value, "messageId").unwrap_or_default()),
            chat_id: ChatId(raw::id_field(value, "chatId").unwrap_or_default()),
            sender: raw::id_field(value, "sender"),
            emoji: raw::str_field(value, "emoji").unwrap_or_default(),
            timestamp: raw::timestamp_field(value, "timestamp"),
        }
    }

    pub fn is_removal(&self) -> bool {
        self.emoji.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_a_complete_record() {
        let value = json!({
            "id": "m1",
            "chatId": { "_serialized": "c1@g" },
            "sender": "u1@c",
            "body": "hello",
            "kind": "chat",
            "ack": 2,
            "timestamp": 1_700_000_000,
            "fromMe": false,
            "isNew": true,
            "mentions": ["u2@c"],
            "quotedId": "m0"
        });
        let message = Message::from_raw(&value);
        assert_eq!(message.id.0, "m1");
        assert_eq!(message.chat_id.0, "c1@g");
        assert_eq!(message.kind, MessageKind::Text);
        assert_eq!(message.ack, Ack::Received);
        assert!(message.is_new);
        assert_eq!(message.mentioned_ids, vec!["u2@c".to_string()]);
        assert_eq!(message.quoted_message_id, Some(MessageId("m0".to_string())));
    }

    #[test]
    fn empty_record_maps_to_defaults() {
        let message = Message::from_raw(&json!({}));
        assert_eq!(message.id.0, "");
        assert_eq!(message.ack, Ack::Pending);
        assert!(!message.from_me);
        assert!(message.mentioned_ids.is_empty());
    }

    #[test]
    fn ciphertext_is_provisional() {
        assert!(MessageKind::parse("ciphertext").is_provisional());
        assert!(!MessageKind::parse("image").is_provisional());
    }

    #[test]
    fn unknown_kind_is_preserved() {
        assert_eq!(
            MessageKind::parse("poll_creation"),
            MessageKind::Other("poll_creation".to_string())
        );
    }

    #[test]
    fn ack_levels_clamp_at_the_edges() {
        assert_eq!(Ack::from_level(-3), Ack::Failed);
        assert_eq!(Ack::from_level(0), Ack::Pending);
        assert_eq!(Ack::from_level(4), Ack::Played);
        assert_eq!(Ack::from_level(9), Ack::Played);
    }

    #[test]
    fn empty_emoji_is_a_removal() {
        let reaction = Reaction::from_raw(&json!({ "messageId": "m1", "emoji": "" }));
        assert!(reaction.is_removal());
    }
}
