use thiserror::Error;

use browser_session::SessionError;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Bridge installation failures are fatal to initialization.
    #[error("bridge install failed: {0}")]
    Install(String),

    /// An outbound command was rejected in-page. Affects only that call.
    #[error("command {op} failed: {message}")]
    Command { op: String, message: String },
}

impl BridgeError {
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Session(err) if err.is_abort())
    }
}
