use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use which::which;

/// Page viewport applied after the first page opens.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub mobile: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }
}

/// Proxy settings. The server goes into the launch arguments; basic
/// credentials are applied as a `Proxy-Authorization` header on the page.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Launch configuration for one browser session. Exactly one of
/// `browser_ws_url` (attach to a running browser) or a local launch
/// (optionally persistent via `data_dir`) is used.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Persistent profile directory. `None` lets the browser use an
    /// ephemeral profile.
    pub data_dir: Option<PathBuf>,
    /// DevTools websocket endpoint of an already-running browser.
    pub browser_ws_url: Option<String>,
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub extra_args: Vec<String>,
    pub user_agent: Option<String>,
    pub proxy: Option<ProxyConfig>,
    pub bypass_csp: bool,
    pub viewport: Viewport,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            browser_ws_url: None,
            executable: detect_browser_executable(),
            headless: resolve_headless_default(),
            extra_args: Vec::new(),
            user_agent: None,
            proxy: None,
            bypass_csp: false,
            viewport: Viewport::default(),
        }
    }
}

impl SessionConfig {
    /// Launch arguments with the user-agent override appended when it is not
    /// already present among the extra args.
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = self.extra_args.clone();
        if let Some(ua) = &self.user_agent {
            if !args.iter().any(|arg| arg.starts_with("--user-agent=")) {
                args.push(format!("--user-agent={ua}"));
            }
        }
        if let Some(proxy) = &self.proxy {
            if !args.iter().any(|arg| arg.starts_with("--proxy-server=")) {
                args.push(format!("--proxy-server={}", proxy.server));
            }
        }
        args
    }
}

/// CHATPILOT_HEADLESS: "0", "false", "no", "off" mean headful; anything else
/// (or unset) keeps the headless default.
fn resolve_headless_default() -> bool {
    match env::var("CHATPILOT_HEADLESS") {
        Ok(value) => !matches!(
            value.to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        Err(_) => true,
    }
}

/// Locate a Chromium-family executable: CHATPILOT_BROWSER override first,
/// then PATH lookup, then the usual install locations.
pub fn detect_browser_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("CHATPILOT_BROWSER") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in [
        "google-chrome-stable",
        "google-chrome",
        "chromium",
        "chromium-browser",
        "chrome",
    ] {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    let fallbacks = [
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];
    fallbacks
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_arg_is_appended_once() {
        let config = SessionConfig {
            user_agent: Some("Mozilla/5.0 test".to_string()),
            ..SessionConfig::default()
        };
        let args = config.launch_args();
        assert_eq!(
            args.iter()
                .filter(|arg| arg.starts_with("--user-agent="))
                .count(),
            1
        );
    }

    #[test]
    fn explicit_user_agent_arg_wins() {
        let config = SessionConfig {
            user_agent: Some("ignored".to_string()),
            extra_args: vec!["--user-agent=custom".to_string()],
            ..SessionConfig::default()
        };
        let args = config.launch_args();
        assert_eq!(
            args.iter()
                .filter(|arg| arg.starts_with("--user-agent="))
                .collect::<Vec<_>>(),
            vec![&"--user-agent=custom".to_string()]
        );
    }

    #[test]
    fn proxy_server_becomes_a_launch_arg() {
        let config = SessionConfig {
            proxy: Some(ProxyConfig {
                server: "http://127.0.0.1:8080".to_string(),
                username: None,
                password: None,
            }),
            ..SessionConfig::default()
        };
        assert!(config
            .launch_args()
            .contains(&"--proxy-server=http://127.0.0.1:8080".to_string()));
    }
}
