use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Minimal shared error carried across crate boundaries (bus publishing,
/// helper plumbing). Richer errors live in the crate that produces them.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("{message}")]
    Message { message: String },
}

impl CoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Caller-supplied identifier distinguishing browser profiles. Restricted to
/// `[A-Za-z0-9_-]` so it can be embedded in a directory name.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Locally generated identifier for one client instance, so concurrent
/// instances can be told apart in logs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serialized identifier of a chat as issued by the remote application.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialized identifier of a message as issued by the remote application.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialized identifier of a call as issued by the remote application.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection states reported by the remote session, normalised from the raw
/// in-page string. Unrecognised values are preserved in `Other` rather than
/// dropped.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    Opening,
    Pairing,
    Timeout,
    Conflict,
    Unpaired,
    UnpairedIdle,
    Deprecated,
    Other(String),
}

impl ConnectionState {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "CONNECTED" => Self::Connected,
            "OPENING" => Self::Opening,
            "PAIRING" => Self::Pairing,
            "TIMEOUT" => Self::Timeout,
            "CONFLICT" => Self::Conflict,
            "UNPAIRED" => Self::Unpaired,
            "UNPAIRED_IDLE" => Self::UnpairedIdle,
            "DEPRECATED_VERSION" => Self::Deprecated,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Connected => "CONNECTED",
            Self::Opening => "OPENING",
            Self::Pairing => "PAIRING",
            Self::Timeout => "TIMEOUT",
            Self::Conflict => "CONFLICT",
            Self::Unpaired => "UNPAIRED",
            Self::UnpairedIdle => "UNPAIRED_IDLE",
            Self::Deprecated => "DEPRECATED_VERSION",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session was disconnected. Carried on the disconnect domain event and
/// handed to the auth strategy before teardown.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// The connection state left the acceptable set.
    State(ConnectionState),
    /// The QR retry budget was exhausted during interactive login.
    QrRetriesExhausted,
    /// The page navigated to a new top-level document while pairing.
    Navigation,
    /// The caller invoked an explicit logout.
    LoggedOut,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(state) => write!(f, "state {state}"),
            Self::QrRetriesExhausted => f.write_str("max qr retries reached"),
            Self::Navigation => f.write_str("navigation"),
            Self::LoggedOut => f.write_str("logged out"),
        }
    }
}

/// Outcome of the page-state detection race. The error leg of the tri-state
/// travels through `Result` at the call site.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthState {
    Authenticated,
    NeedsInteractiveAuth,
}

impl AuthState {
    pub fn needs_interactive_auth(&self) -> bool {
        matches!(self, Self::NeedsInteractiveAuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_states_case_insensitively() {
        assert_eq!(ConnectionState::parse("connected"), ConnectionState::Connected);
        assert_eq!(ConnectionState::parse("CONFLICT"), ConnectionState::Conflict);
        assert_eq!(
            ConnectionState::parse("UNPAIRED_IDLE"),
            ConnectionState::UnpairedIdle
        );
    }

    #[test]
    fn preserves_unknown_states() {
        let state = ConnectionState::parse("PROXYBLOCK");
        assert_eq!(state, ConnectionState::Other("PROXYBLOCK".to_string()));
        assert_eq!(state.as_str(), "PROXYBLOCK");
    }

    #[test]
    fn validates_client_ids() {
        assert!(ClientId("bot-01".to_string()).is_valid());
        assert!(ClientId("a_b_c".to_string()).is_valid());
        assert!(!ClientId(String::new()).is_valid());
        assert!(!ClientId("../escape".to_string()).is_valid());
        assert!(!ClientId("white space".to_string()).is_valid());
    }
}
