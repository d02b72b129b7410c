use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use browser_session::{BrowserSession, SessionConfig, SessionStore};
use chatpilot_core_types::{ClientId, DisconnectReason};

use crate::error::AuthError;

/// What the strategy wants done when the page demands interactive
/// authentication. The default lets the login flow proceed in-session.
#[derive(Clone, Debug, Default)]
pub struct AuthDecision {
    /// Abort the current initialize attempt and emit an
    /// authentication-failure event.
    pub failed: bool,
    /// After a failed attempt, re-run initialize exactly once with
    /// authentication state cleared.
    pub restart: bool,
    /// Message carried on the authentication-failure event.
    pub message: Option<String>,
}

/// Pluggable policy controlling how credentials are supplied around the
/// browser launch and how lifecycle transitions are observed. Every hook is
/// a no-op by default; the client calls them in the order they are declared.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    async fn before_launch(&self, _config: &mut SessionConfig) -> Result<(), AuthError> {
        Ok(())
    }

    async fn after_launch(&self, _session: &BrowserSession) -> Result<(), AuthError> {
        Ok(())
    }

    async fn on_interactive_auth_needed(&self) -> AuthDecision {
        AuthDecision::default()
    }

    /// Payload attached to the authenticated domain event.
    async fn auth_event_payload(&self) -> Option<Value> {
        None
    }

    async fn after_ready(&self) {}

    async fn on_disconnect(&self, _reason: &DisconnectReason) {}

    async fn on_destroy(&self) {}

    /// Clear whatever authentication state the strategy persists.
    async fn on_logout(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

/// No persistence: every restart goes through interactive login unless the
/// caller wires a persistent profile into the session config themselves.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAuth;

#[async_trait]
impl AuthStrategy for NoAuth {}

/// Persists credentials through the browser profile directory managed by a
/// [`SessionStore`]: ensured before launch, removed on logout.
#[derive(Clone, Debug)]
pub struct LocalAuth {
    store: SessionStore,
}

impl LocalAuth {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    pub fn with_defaults(client_id: Option<ClientId>) -> Result<Self, AuthError> {
        Ok(Self {
            store: SessionStore::with_defaults(client_id)?,
        })
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}

#[async_trait]
impl AuthStrategy for LocalAuth {
    async fn before_launch(&self, config: &mut SessionConfig) -> Result<(), AuthError> {
        let dir = self.store.ensure().await?;
        config.data_dir = Some(dir);
        Ok(())
    }

    async fn on_logout(&self) -> Result<(), AuthError> {
        info!("clearing persisted session profile");
        self.store.remove().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn local_auth_points_the_session_at_its_profile() {
        let base = tempdir().unwrap();
        let store = SessionStore::new(base.path(), Some(ClientId("acct".to_string()))).unwrap();
        let auth = LocalAuth::new(store);

        let mut config = SessionConfig::default();
        auth.before_launch(&mut config).await.unwrap();

        let dir = config.data_dir.expect("profile dir set");
        assert!(dir.is_dir());
        assert!(dir.ends_with("session-acct"));

        auth.on_logout().await.unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn default_decision_lets_login_proceed() {
        let decision = NoAuth.on_interactive_auth_needed().await;
        assert!(!decision.failed);
        assert!(!decision.restart);
    }
}
