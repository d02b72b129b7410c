use thiserror::Error;

use browser_session::SessionError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("auth strategy failure: {0}")]
    Strategy(String),

    #[error("login flow failure: {0}")]
    Flow(String),
}

impl AuthError {
    /// True when the underlying cause is session teardown, which login waits
    /// treat as a clean abort.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Session(err) if err.is_abort())
    }
}
