use std::time::Duration;

use auth_flow::LoginSelectors;
use browser_session::{DetectorSelectors, SessionConfig};
use page_bridge::StoreBindings;

/// Everything one [`crate::Client`] needs. `web_url` is the only field
/// without a usable default.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub session: SessionConfig,
    /// URL of the remote messaging web client.
    pub web_url: String,
    pub referrer: Option<String>,
    /// Bound on the page-state detection race.
    pub auth_timeout: Duration,
    /// Distinct QR tokens allowed before the login flow gives up.
    /// 0 disables the cap.
    pub qr_max_retries: u32,
    /// Switches interactive login from QR capture to phone pairing.
    pub pairing_phone: Option<String>,
    /// Bound on the pairing-code container appearing.
    pub code_timeout: Duration,
    pub takeover_on_conflict: bool,
    pub takeover_delay: Duration,
    pub store_bindings: StoreBindings,
    pub detector: DetectorSelectors,
    pub login_selectors: LoginSelectors,
    /// Periodic profile cache purge. Off by default: clearing cache paths
    /// under a live session is a known hazard, so owners opt in.
    pub maintenance_interval: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            web_url: String::new(),
            referrer: None,
            auth_timeout: Duration::from_secs(45),
            qr_max_retries: 0,
            pairing_phone: None,
            code_timeout: Duration::from_secs(60),
            takeover_on_conflict: false,
            takeover_delay: Duration::from_secs(10),
            store_bindings: StoreBindings::default(),
            detector: DetectorSelectors::default(),
            login_selectors: LoginSelectors::default(),
            maintenance_interval: None,
        }
    }
}

impl ClientConfig {
    pub fn new(web_url: impl Into<String>) -> Self {
        Self {
            web_url: web_url.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = ClientConfig::default();
        assert_eq!(config.qr_max_retries, 0, "no retry cap by default");
        assert!(config.maintenance_interval.is_none(), "purge is opt-in");
        assert!(!config.takeover_on_conflict);
        assert_eq!(config.code_timeout, Duration::from_secs(60));
    }

    #[test]
    fn new_sets_the_target_url() {
        let config = ClientConfig::new("https://chat.example.net/");
        assert_eq!(config.web_url, "https://chat.example.net/");
    }
}
