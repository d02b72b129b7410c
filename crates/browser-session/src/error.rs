use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the session layer. `TargetClosed` is deliberately its
/// own variant: indefinite waits treat it as a clean abort signal from a
/// teardown happening elsewhere, never as a failure to report.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Browser launch or remote attach failed; carries the underlying error
    /// text uninterpreted.
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("cdp failure: {0}")]
    Cdp(String),

    /// The page, session or browser went away underneath an operation.
    #[error("target closed")]
    TargetClosed,

    #[error("timed out after {timeout:?} waiting for selector {selector:?}")]
    SelectorTimeout { selector: String, timeout: Duration },

    #[error("invalid client id: {0:?}")]
    InvalidClientId(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Error-message fragments that indicate the automation target is gone
/// rather than an operation having failed. Matching on text keeps this
/// robust across chromiumoxide versions.
const CLOSED_MARKERS: &[&str] = &[
    "target closed",
    "session closed",
    "browser closed",
    "connection closed",
    "channel closed",
    "connection is closed",
    "websocket",
];

impl SessionError {
    pub fn from_cdp(err: chromiumoxide::error::CdpError) -> Self {
        let text = err.to_string();
        let lower = text.to_ascii_lowercase();
        if CLOSED_MARKERS.iter().any(|marker| lower.contains(marker)) {
            Self::TargetClosed
        } else {
            Self::Cdp(text)
        }
    }

    /// True when the error means "the session is being torn down elsewhere"
    /// and the caller should abort quietly.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::TargetClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_not_an_abort() {
        let err = SessionError::SelectorTimeout {
            selector: "[data-ref]".to_string(),
            timeout: Duration::from_secs(1),
        };
        assert!(!err.is_abort());
        assert!(SessionError::TargetClosed.is_abort());
    }
}
