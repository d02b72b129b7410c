use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};

use auth_flow::{AuthStrategy, LoginFlow, LoginOutcome};
use browser_session::{detect_auth_state, BrowserSession, ProfileMaintenance};
use chatpilot_core_types::{ChatId, ConnectionState, DisconnectReason, InstanceId, MessageId};
use chatpilot_event_bus::InMemoryBus;
use domain_model::{Chat, ClientEvent, Contact, Message};
use page_bridge::{
    CommandDispatcher, EventBridge, EventBridgeConfig, SendOptions, StatePolicy,
};

use crate::config::ClientConfig;
use crate::errors::ClientError;

const EVENT_BUS_CAPACITY: usize = 256;

struct RuntimeParts {
    bridge: EventBridge,
    commands: CommandDispatcher,
    maintenance: Option<ProfileMaintenance>,
}

/// One logical session against the remote messaging web client: a browser
/// profile, a page, an event bridge and a command dispatcher, glued to a
/// pluggable auth strategy.
///
/// All page interactions funnel through the single page handle without an
/// added lock; callers issuing concurrent commands accept arbitrary
/// interleaving or serialize themselves.
pub struct Client {
    config: ClientConfig,
    strategy: Arc<dyn AuthStrategy>,
    bus: Arc<InMemoryBus<ClientEvent>>,
    instance: InstanceId,
    /// Set as soon as a launch succeeds so `destroy` can reach a session
    /// even while `initialize` is still mid-flight.
    session_slot: Mutex<Option<Arc<BrowserSession>>>,
    runtime: Mutex<Option<RuntimeParts>>,
}

impl Client {
    pub fn new(config: ClientConfig, strategy: Arc<dyn AuthStrategy>) -> Arc<Self> {
        Arc::new(Self {
            config,
            strategy,
            bus: InMemoryBus::new(EVENT_BUS_CAPACITY),
            instance: InstanceId::new(),
            session_slot: Mutex::new(None),
            runtime: Mutex::new(None),
        })
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance
    }

    /// Subscribe to the domain-event stream. Any number of passive
    /// subscribers; slow ones lose the oldest events.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> Arc<InMemoryBus<ClientEvent>> {
        Arc::clone(&self.bus)
    }

    /// Bring the session up: launch, detect page state, run interactive
    /// login if demanded, install the event bridge, emit `Ready`.
    ///
    /// Fatal-at-launch failures reject this call; auth refusal emits an
    /// authentication-failure event (with at most one automatic restart when
    /// the strategy asks for it); a teardown racing this call makes it
    /// return cleanly.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), ClientError> {
        self.initialize_attempt(true).await
    }

    async fn initialize_attempt(self: &Arc<Self>, allow_restart: bool) -> Result<(), ClientError> {
        if self.config.web_url.is_empty() {
            return Err(ClientError::Config("web_url is not set".to_string()));
        }

        let mut session_config = self.config.session.clone();
        self.strategy.before_launch(&mut session_config).await?;

        let session = Arc::new(BrowserSession::launch(&session_config).await?);
        *self.session_slot.lock().await = Some(Arc::clone(&session));
        self.strategy.after_launch(&session).await?;

        session
            .navigate(&self.config.web_url, self.config.referrer.as_deref())
            .await?;
        let page = session.page().await?;

        let state =
            detect_auth_state(&page, &self.config.detector, self.config.auth_timeout).await?;
        info!(instance = %self.instance, ?state, "page state detected");

        if state.needs_interactive_auth() {
            let decision = self.strategy.on_interactive_auth_needed().await;
            if decision.failed {
                let message = decision
                    .message
                    .unwrap_or_else(|| "interactive authentication refused".to_string());
                self.bus.emit(ClientEvent::AuthenticationFailure {
                    message: message.clone(),
                });
                self.teardown().await;
                if decision.restart && allow_restart {
                    info!("restarting initialize once with cleared auth state");
                    self.strategy.on_logout().await?;
                    return Box::pin(self.initialize_attempt(false)).await;
                }
                return Err(ClientError::AuthenticationFailed(message));
            }

            let flow = LoginFlow::new(
                page.clone(),
                Arc::clone(&self.bus),
                self.config.login_selectors.clone(),
                self.config.detector.authenticated_marker.clone(),
                self.config.qr_max_retries,
                self.config.auth_timeout,
                self.config.code_timeout,
            );
            let outcome = match &self.config.pairing_phone {
                Some(phone) => flow.run_pairing(phone).await,
                None => flow.run_qr().await,
            };
            match outcome {
                Ok(LoginOutcome::Confirmed) => {}
                Ok(LoginOutcome::Aborted) => {
                    debug!("initialize aborted by concurrent teardown");
                    return Ok(());
                }
                Ok(LoginOutcome::RetriesExhausted) => {
                    self.run_disconnect(DisconnectReason::QrRetriesExhausted)
                        .await;
                    return Ok(());
                }
                Err(err) if err.is_abort() => {
                    debug!("login flow aborted by concurrent teardown");
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            }
        }

        let payload = self.strategy.auth_event_payload().await;
        self.bus.emit(ClientEvent::Authenticated { payload });

        let (disconnect_tx, disconnect_rx) = mpsc::channel(4);
        let bridge_config = EventBridgeConfig {
            store_bindings: self.config.store_bindings.clone(),
            policy: StatePolicy {
                takeover_on_conflict: self.config.takeover_on_conflict,
            },
            takeover_delay: self.config.takeover_delay,
        };
        let bridge = match EventBridge::install(
            page.clone(),
            Arc::clone(&self.bus),
            bridge_config,
            disconnect_tx,
        )
        .await
        {
            Ok(bridge) => bridge,
            Err(err) => {
                // bridge installation failure is fatal to initialization
                self.teardown().await;
                return Err(err.into());
            }
        };
        self.spawn_disconnect_consumer(disconnect_rx);

        let commands =
            CommandDispatcher::new(page.clone(), self.config.store_bindings.clone());
        let maintenance = match (&self.config.maintenance_interval, &session_config.data_dir) {
            (Some(interval), Some(dir)) => {
                Some(ProfileMaintenance::with_defaults(dir.clone(), *interval))
            }
            _ => None,
        };

        *self.runtime.lock().await = Some(RuntimeParts {
            bridge,
            commands,
            maintenance,
        });

        self.strategy.after_ready().await;
        self.bus.emit(ClientEvent::Ready);
        info!(instance = %self.instance, "client ready");
        Ok(())
    }

    fn spawn_disconnect_consumer(
        self: &Arc<Self>,
        mut rx: mpsc::Receiver<DisconnectReason>,
    ) {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(reason) = rx.recv().await {
                warn!(%reason, "disconnect requested by bridge");
                client.run_disconnect(reason).await;
            }
        });
    }

    /// The orderly disconnect sequence: strategy notify, disconnect event,
    /// teardown. Runs exactly once per cause; a second request finds the
    /// runtime already gone.
    async fn run_disconnect(&self, reason: DisconnectReason) {
        self.strategy.on_disconnect(&reason).await;
        self.bus.emit(ClientEvent::Disconnected(reason));
        self.teardown().await;
    }

    async fn teardown(&self) {
        let runtime = self.runtime.lock().await.take();
        if let Some(parts) = runtime {
            parts.bridge.shutdown().await;
            if let Some(maintenance) = parts.maintenance {
                maintenance.shutdown().await;
            }
        }
        let session = self.session_slot.lock().await.take();
        if let Some(session) = session {
            session.close().await;
        }
    }

    /// Full teardown. Safe to call at any time, any number of times,
    /// including while `initialize` is in flight.
    pub async fn destroy(&self) {
        self.teardown().await;
        self.strategy.on_destroy().await;
    }

    /// Best-effort in-page logout, then teardown, then clearing of persisted
    /// credentials via the strategy.
    pub async fn logout(&self) -> Result<(), ClientError> {
        if let Ok(commands) = self.commands().await {
            if let Err(err) = commands.logout_in_page().await {
                debug!(error = %err, "in-page logout failed; continuing teardown");
            }
        }
        self.teardown().await;
        self.strategy.on_logout().await?;
        self.bus
            .emit(ClientEvent::Disconnected(DisconnectReason::LoggedOut));
        Ok(())
    }

    async fn commands(&self) -> Result<CommandDispatcher, ClientError> {
        self.runtime
            .lock()
            .await
            .as_ref()
            .map(|parts| parts.commands.clone())
            .ok_or(ClientError::NotReady)
    }

    /// Send a message. Not idempotent: calling twice sends twice.
    pub async fn send_message(
        &self,
        chat: &ChatId,
        body: &str,
        options: &SendOptions,
    ) -> Result<Message, ClientError> {
        Ok(self.commands().await?.send_message(chat, body, options).await?)
    }

    pub async fn mark_seen(&self, chat: &ChatId) -> Result<(), ClientError> {
        Ok(self.commands().await?.mark_seen(chat).await?)
    }

    pub async fn archive_chat(&self, chat: &ChatId, archived: bool) -> Result<(), ClientError> {
        Ok(self.commands().await?.archive_chat(chat, archived).await?)
    }

    pub async fn pin_chat(&self, chat: &ChatId, pinned: bool) -> Result<(), ClientError> {
        Ok(self.commands().await?.pin_chat(chat, pinned).await?)
    }

    pub async fn mute_chat(&self, chat: &ChatId, until: Option<i64>) -> Result<(), ClientError> {
        Ok(self.commands().await?.mute_chat(chat, until).await?)
    }

    pub async fn delete_chat(&self, chat: &ChatId) -> Result<(), ClientError> {
        Ok(self.commands().await?.delete_chat(chat).await?)
    }

    pub async fn get_chats(&self) -> Result<Vec<Chat>, ClientError> {
        Ok(self.commands().await?.get_chats().await?)
    }

    pub async fn get_chat(&self, chat: &ChatId) -> Result<Option<Chat>, ClientError> {
        Ok(self.commands().await?.get_chat(chat).await?)
    }

    pub async fn get_contacts(&self) -> Result<Vec<Contact>, ClientError> {
        Ok(self.commands().await?.get_contacts().await?)
    }

    pub async fn get_contact(&self, id: &ChatId) -> Result<Option<Contact>, ClientError> {
        Ok(self.commands().await?.get_contact(id).await?)
    }

    pub async fn get_state(&self) -> Result<ConnectionState, ClientError> {
        Ok(self.commands().await?.get_state().await?)
    }

    pub async fn set_status_message(&self, text: &str) -> Result<(), ClientError> {
        Ok(self.commands().await?.set_status_message(text).await?)
    }

    pub async fn send_presence_available(&self) -> Result<(), ClientError> {
        Ok(self.commands().await?.send_presence_available().await?)
    }

    /// Force this session to become the active one after the remote service
    /// reported a conflicting concurrent session.
    pub async fn take_over(&self) -> Result<(), ClientError> {
        Ok(self.commands().await?.take_over().await?)
    }

    pub async fn reply_to(
        &self,
        chat: &ChatId,
        quoted: &MessageId,
        body: &str,
    ) -> Result<Message, ClientError> {
        let options = SendOptions {
            quoted_message_id: Some(quoted.clone()),
            mentions: Vec::new(),
        };
        self.send_message(chat, body, &options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_flow::NoAuth;

    fn test_client() -> Arc<Client> {
        Client::new(
            ClientConfig::new("https://chat.example.net/"),
            Arc::new(NoAuth),
        )
    }

    #[tokio::test]
    async fn destroy_is_idempotent_before_initialize() {
        let client = test_client();
        client.destroy().await;
        client.destroy().await;
    }

    #[tokio::test]
    async fn commands_require_a_ready_runtime() {
        let client = test_client();
        let err = client.get_chats().await.unwrap_err();
        assert!(matches!(err, ClientError::NotReady));
    }

    #[tokio::test]
    async fn initialize_rejects_missing_web_url() {
        let client = Client::new(ClientConfig::default(), Arc::new(NoAuth));
        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[tokio::test]
    async fn events_fan_out_to_every_subscriber() {
        let client = test_client();
        let mut rx = client.events();
        client.bus().emit(ClientEvent::Ready);
        assert_eq!(rx.recv().await.unwrap(), ClientEvent::Ready);
    }
}
