use serde::{Deserialize, Serialize};
use serde_json::Value;

use chatpilot_core_types::{ConnectionState, DisconnectReason};

use crate::{Ack, Call, Chat, GroupUpdate, Message, Reaction};

/// The fixed catalog of domain events this client emits. Payloads are owned
/// by the emitting call; subscribers copy out anything they keep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// A QR login token was issued or rotated. Emitted on every change.
    Qr { token: String },
    /// A phone-pairing code was issued or regenerated.
    PairingCode { code: String },
    /// Credentials were accepted. The payload comes from the auth strategy.
    Authenticated { payload: Option<Value> },
    AuthenticationFailure { message: String },
    /// The event bridge is installed and the session is fully operational.
    Ready,
    MessageAdded(Message),
    MessageEdited {
        message: Message,
        prev_body: Option<String>,
    },
    MessageRevoked {
        message: Message,
        /// `true` when revoked for every participant, `false` for a
        /// this-device-only removal.
        everyone: bool,
    },
    MessageAckChanged { message: Message, ack: Ack },
    MessageReaction(Reaction),
    ChatRemoved(Chat),
    ChatArchived { chat: Chat, archived: bool },
    GroupUpdated(GroupUpdate),
    IncomingCall(Call),
    BatteryChanged { percentage: u8, plugged: bool },
    /// Always emitted on every connection-state change, before any
    /// disconnect decision.
    StateChanged(ConnectionState),
    Disconnected(DisconnectReason),
    /// A raw in-page event whose kind this build does not recognise.
    /// Surfaced rather than silently dropped.
    Unhandled { kind: String, payload: Value },
}

impl ClientEvent {
    /// Stable name used for logging and the CLI's JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Qr { .. } => "qr",
            Self::PairingCode { .. } => "pairing_code",
            Self::Authenticated { .. } => "authenticated",
            Self::AuthenticationFailure { .. } => "authentication_failure",
            Self::Ready => "ready",
            Self::MessageAdded(_) => "message_added",
            Self::MessageEdited { .. } => "message_edited",
            Self::MessageRevoked { .. } => "message_revoked",
            Self::MessageAckChanged { .. } => "message_ack_changed",
            Self::MessageReaction(_) => "message_reaction",
            Self::ChatRemoved(_) => "chat_removed",
            Self::ChatArchived { .. } => "chat_archived",
            Self::GroupUpdated(_) => "group_updated",
            Self::IncomingCall(_) => "incoming_call",
            Self::BatteryChanged { .. } => "battery_changed",
            Self::StateChanged(_) => "state_changed",
            Self::Disconnected(_) => "disconnected",
            Self::Unhandled { .. } => "unhandled",
        }
    }
}
