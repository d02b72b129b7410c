use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::Page;
use serde_json::Value;
use tracing::{debug, warn};

use browser_session::{
    install_binding, wait_for_selector, wait_for_selector_forever, BindingStream, SessionError,
};
use chatpilot_event_bus::InMemoryBus;
use domain_model::ClientEvent;

use crate::error::AuthError;

const QR_BINDING: &str = "__chatpilotQrChanged";
const PAIRING_BINDING: &str = "__chatpilotCodeChanged";

/// DOM anchors the login flows drive. Version-fragile by nature, so they are
/// configuration with defaults rather than constants.
#[derive(Clone, Debug)]
pub struct LoginSelectors {
    /// Node carrying the rotating QR token attribute.
    pub qr_node: String,
    pub qr_token_attr: String,
    /// Affordance the page shows when a stale QR wants a manual refresh.
    pub qr_retry_button: String,
    pub link_phone_button: String,
    pub phone_input: String,
    pub phone_submit_button: String,
    pub pairing_code_container: String,
    pub pairing_regenerate_button: String,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            qr_node: "div[data-ref]".to_string(),
            qr_token_attr: "data-ref".to_string(),
            qr_retry_button: "div[data-ref] button".to_string(),
            link_phone_button: "button[data-alt-login=\"phone\"]".to_string(),
            phone_input: "input[type=\"tel\"]".to_string(),
            phone_submit_button: "button[data-phone-submit]".to_string(),
            pairing_code_container: "[data-link-code]".to_string(),
            pairing_regenerate_button: "button[data-regenerate-code]".to_string(),
        }
    }
}

/// Retry budget over distinct QR tokens. `max == 0` disables the cap.
#[derive(Clone, Debug)]
pub struct QrGate {
    max: u32,
    emitted: u32,
    last: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QrVerdict {
    /// Emit this token and keep going.
    Fresh,
    /// Same token again; nothing to emit.
    Duplicate,
    /// Emit this token, then run the max-retries disconnect. Hard cap.
    Exhausted,
}

impl QrGate {
    pub fn new(max: u32) -> Self {
        Self {
            max,
            emitted: 0,
            last: None,
        }
    }

    pub fn register(&mut self, token: &str) -> QrVerdict {
        if self.last.as_deref() == Some(token) {
            return QrVerdict::Duplicate;
        }
        self.last = Some(token.to_string());
        self.emitted += 1;
        if self.max > 0 && self.emitted > self.max {
            QrVerdict::Exhausted
        } else {
            QrVerdict::Fresh
        }
    }

    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

/// Terminal states of one interactive login attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoginOutcome {
    /// The post-login marker appeared.
    Confirmed,
    /// The session was torn down elsewhere while waiting. Clean exit.
    Aborted,
    /// The QR retry budget ran out; caller runs the disconnect sequence.
    RetriesExhausted,
}

/// Drives either login path until the post-login marker appears, emitting
/// every token/code change to the bus along the way.
pub struct LoginFlow {
    page: Page,
    bus: Arc<InMemoryBus<ClientEvent>>,
    selectors: LoginSelectors,
    /// Post-login marker; the same selector the page-state detector races.
    confirm_selector: String,
    qr_max_retries: u32,
    auth_timeout: Duration,
    code_timeout: Duration,
}

impl LoginFlow {
    pub fn new(
        page: Page,
        bus: Arc<InMemoryBus<ClientEvent>>,
        selectors: LoginSelectors,
        confirm_selector: impl Into<String>,
        qr_max_retries: u32,
        auth_timeout: Duration,
        code_timeout: Duration,
    ) -> Self {
        Self {
            page,
            bus,
            selectors,
            confirm_selector: confirm_selector.into(),
            qr_max_retries,
            auth_timeout,
            code_timeout,
        }
    }

    /// QR path: emit the current token, then every rotation, until confirmed
    /// or the retry budget runs out.
    pub async fn run_qr(&self) -> Result<LoginOutcome, AuthError> {
        let node =
            wait_for_selector(&self.page, &self.selectors.qr_node, self.auth_timeout).await?;
        let mut gate = QrGate::new(self.qr_max_retries);

        let initial = node
            .attribute(&self.selectors.qr_token_attr)
            .await
            .map_err(SessionError::from_cdp)?
            .unwrap_or_default();
        if !initial.is_empty() && gate.register(&initial) == QrVerdict::Fresh {
            self.bus.emit(ClientEvent::Qr { token: initial });
        }

        let binding = install_binding(&self.page, QR_BINDING).await?;
        self.install_script(self.qr_observer_script(), "qr observer")
            .await?;

        self.watch_until_confirmed(binding, Some(gate)).await
    }

    /// Phone-pairing path: switch modes, submit the number, then emit the
    /// linking code and every regeneration of it.
    pub async fn run_pairing(&self, phone: &str) -> Result<LoginOutcome, AuthError> {
        let link = wait_for_selector(
            &self.page,
            &self.selectors.link_phone_button,
            self.auth_timeout,
        )
        .await?;
        link.click().await.map_err(SessionError::from_cdp)?;

        let input =
            wait_for_selector(&self.page, &self.selectors.phone_input, self.auth_timeout).await?;
        input.click().await.map_err(SessionError::from_cdp)?;
        self.install_script(self.clear_input_script(), "phone input reset")
            .await?;
        input.type_str(phone).await.map_err(SessionError::from_cdp)?;

        let submit = wait_for_selector(
            &self.page,
            &self.selectors.phone_submit_button,
            self.auth_timeout,
        )
        .await?;
        submit.click().await.map_err(SessionError::from_cdp)?;

        let container = wait_for_selector(
            &self.page,
            &self.selectors.pairing_code_container,
            self.code_timeout,
        )
        .await?;
        if let Some(code) = container
            .inner_text()
            .await
            .map_err(SessionError::from_cdp)?
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
        {
            self.bus.emit(ClientEvent::PairingCode { code });
        }

        let binding = install_binding(&self.page, PAIRING_BINDING).await?;
        self.install_script(self.pairing_observer_script(), "pairing observer")
            .await?;

        self.watch_until_confirmed(binding, None).await
    }

    /// Shared tail of both paths: forward token/code payloads off the binding
    /// while waiting, without a timeout, for the post-login marker.
    async fn watch_until_confirmed(
        &self,
        mut binding: BindingStream,
        mut gate: Option<QrGate>,
    ) -> Result<LoginOutcome, AuthError> {
        let confirm = wait_for_selector_forever(&self.page, &self.confirm_selector);
        tokio::pin!(confirm);
        loop {
            tokio::select! {
                confirmed = &mut confirm => {
                    return match confirmed {
                        Ok(_) => Ok(LoginOutcome::Confirmed),
                        Err(err) if err.is_abort() => {
                            debug!("login confirmation wait aborted by teardown");
                            Ok(LoginOutcome::Aborted)
                        }
                        Err(err) => Err(err.into()),
                    };
                }
                payload = binding.next_payload() => {
                    let Some(raw) = payload else {
                        debug!("login binding stream ended");
                        return Ok(LoginOutcome::Aborted);
                    };
                    match parse_login_payload(&raw) {
                        Some(LoginPayload::Token(token)) => {
                            let Some(gate) = gate.as_mut() else { continue };
                            match gate.register(&token) {
                                QrVerdict::Fresh => self.bus.emit(ClientEvent::Qr { token }),
                                QrVerdict::Duplicate => {}
                                QrVerdict::Exhausted => {
                                    self.bus.emit(ClientEvent::Qr { token });
                                    warn!(emitted = gate.emitted(), "qr retry budget exhausted");
                                    return Ok(LoginOutcome::RetriesExhausted);
                                }
                            }
                        }
                        Some(LoginPayload::Code(code)) => {
                            self.bus.emit(ClientEvent::PairingCode { code });
                        }
                        None => debug!(payload = %raw, "unparseable login payload dropped"),
                    }
                }
            }
        }
    }

    async fn install_script(&self, script: String, what: &str) -> Result<(), AuthError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(SessionError::from_cdp)?;
        let installed = result.value().and_then(Value::as_bool).unwrap_or(false);
        if installed {
            Ok(())
        } else {
            Err(AuthError::Flow(format!("{what} install failed")))
        }
    }

    fn qr_observer_script(&self) -> String {
        format!(
            r#"(() => {{
    const node = document.querySelector({node});
    if (!node || !node.parentElement) {{ return false; }}
    const attr = {attr};
    const observer = new MutationObserver((mutations) => {{
        for (const mutation of mutations) {{
            if (mutation.type === 'attributes') {{
                window[{binding}](JSON.stringify({{ kind: 'token', value: node.getAttribute(attr) || '' }}));
            }} else if (mutation.type === 'childList') {{
                const retry = document.querySelector({retry});
                if (retry) {{ retry.click(); }}
            }}
        }}
    }});
    observer.observe(node.parentElement, {{
        subtree: true,
        childList: true,
        attributes: true,
        attributeFilter: [attr],
    }});
    return true;
}})()"#,
            node = js_string(&self.selectors.qr_node),
            attr = js_string(&self.selectors.qr_token_attr),
            retry = js_string(&self.selectors.qr_retry_button),
            binding = js_string(QR_BINDING),
        )
    }

    fn pairing_observer_script(&self) -> String {
        format!(
            r#"(() => {{
    const container = document.querySelector({container});
    if (!container) {{ return false; }}
    const read = () => (container.textContent || '').trim();
    let last = read();
    const observer = new MutationObserver(() => {{
        const regen = document.querySelector({regen});
        if (regen) {{ regen.click(); }}
        const code = read();
        if (code && code !== last) {{
            last = code;
            window[{binding}](JSON.stringify({{ kind: 'code', value: code }}));
        }}
    }});
    observer.observe(container, {{ subtree: true, childList: true, characterData: true }});
    return true;
}})()"#,
            container = js_string(&self.selectors.pairing_code_container),
            regen = js_string(&self.selectors.pairing_regenerate_button),
            binding = js_string(PAIRING_BINDING),
        )
    }

    fn clear_input_script(&self) -> String {
        format!(
            r#"(() => {{
    const input = document.querySelector({input});
    if (!input) {{ return false; }}
    input.value = '';
    input.dispatchEvent(new Event('input', {{ bubbles: true }}));
    return true;
}})()"#,
            input = js_string(&self.selectors.phone_input),
        )
    }
}

enum LoginPayload {
    Token(String),
    Code(String),
}

fn parse_login_payload(raw: &str) -> Option<LoginPayload> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let kind = value.get("kind")?.as_str()?;
    let payload = value.get("value")?.as_str()?.to_string();
    if payload.is_empty() {
        return None;
    }
    match kind {
        "token" => Some(LoginPayload::Token(payload)),
        "code" => Some(LoginPayload::Code(payload)),
        _ => None,
    }
}

fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_allows_budget_then_caps() {
        let mut gate = QrGate::new(2);
        assert_eq!(gate.register("a"), QrVerdict::Fresh);
        assert_eq!(gate.register("b"), QrVerdict::Fresh);
        // third distinct token is the (N+1)-th emission: hard cap
        assert_eq!(gate.register("c"), QrVerdict::Exhausted);
    }

    #[test]
    fn gate_ignores_repeats_of_the_active_token() {
        let mut gate = QrGate::new(1);
        assert_eq!(gate.register("a"), QrVerdict::Fresh);
        assert_eq!(gate.register("a"), QrVerdict::Duplicate);
        assert_eq!(gate.emitted(), 1);
    }

    #[test]
    fn zero_budget_means_unlimited() {
        let mut gate = QrGate::new(0);
        for i in 0..50 {
            assert_eq!(gate.register(&format!("t{i}")), QrVerdict::Fresh);
        }
    }

    #[test]
    fn payloads_parse_by_kind() {
        assert!(matches!(
            parse_login_payload(r#"{"kind":"token","value":"abc"}"#),
            Some(LoginPayload::Token(t)) if t == "abc"
        ));
        assert!(matches!(
            parse_login_payload(r#"{"kind":"code","value":"ZXCV-1234"}"#),
            Some(LoginPayload::Code(c)) if c == "ZXCV-1234"
        ));
        assert!(parse_login_payload(r#"{"kind":"token","value":""}"#).is_none());
        assert!(parse_login_payload("not json").is_none());
    }

    #[test]
    fn selectors_are_json_escaped_before_embedding() {
        assert_eq!(
            js_string("div[data-ref=\"x\"]"),
            r#""div[data-ref=\"x\"]""#
        );
    }
}
