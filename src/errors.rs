use thiserror::Error;

use auth_flow::AuthError;
use browser_session::SessionError;
use page_bridge::BridgeError;

/// Errors surfaced by [`crate::Client`] lifecycle and command calls.
/// Command failures never affect the session; lifecycle failures reject the
/// `initialize` call or arrive as disconnect/auth-failure events instead.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("config error: {0}")]
    Config(String),

    /// A command was issued before `initialize` completed or after teardown.
    #[error("client is not ready")]
    NotReady,
}
