use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::page::{
    EnableParams as PageEnableParams, EventFrameNavigated,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use browser_session::{install_binding, BindingStream, SessionError};
use chatpilot_core_types::DisconnectReason;
use chatpilot_event_bus::InMemoryBus;
use domain_model::ClientEvent;

use crate::dispatch::{BridgeCore, BridgeEffect, RawPageEvent, StatePolicy};
use crate::error::BridgeError;
use crate::inject::StoreBindings;
use crate::metrics;

const EVENT_BINDING: &str = "__chatpilotEvent";

#[derive(Clone, Debug)]
pub struct EventBridgeConfig {
    pub store_bindings: StoreBindings,
    pub policy: StatePolicy,
    pub takeover_delay: Duration,
}

impl Default for EventBridgeConfig {
    fn default() -> Self {
        Self {
            store_bindings: StoreBindings::default(),
            policy: StatePolicy::default(),
            takeover_delay: Duration::from_secs(10),
        }
    }
}

/// Installed bridge between the page's stores and the host bus. Owns the
/// dispatcher task; holds only a page reference, never the session.
pub struct EventBridge {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EventBridge {
    /// Install order is fixed: host binding first, then main-frame
    /// navigation tracking, then the single page-context call attaching
    /// every in-page listener. Any failure here is fatal to initialization.
    pub async fn install(
        page: Page,
        bus: Arc<InMemoryBus<ClientEvent>>,
        config: EventBridgeConfig,
        disconnects: mpsc::Sender<DisconnectReason>,
    ) -> Result<Self, BridgeError> {
        let binding = install_binding(&page, EVENT_BINDING).await?;

        page.execute(PageEnableParams::default())
            .await
            .map_err(SessionError::from_cdp)?;
        let navigations = page
            .event_listener::<EventFrameNavigated>()
            .await
            .map_err(SessionError::from_cdp)?;

        let script = config.store_bindings.install_script(EVENT_BINDING);
        let result = page
            .evaluate(script)
            .await
            .map_err(SessionError::from_cdp)?;
        let installed = result.value().and_then(Value::as_bool).unwrap_or(false);
        if !installed {
            return Err(BridgeError::Install(
                "page store shape not found; check store bindings".to_string(),
            ));
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(dispatcher_loop(
            page,
            bus,
            config,
            binding,
            Box::pin(navigations),
            disconnects,
            cancel.clone(),
        ));
        info!("event bridge installed");
        Ok(Self { cancel, task })
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Steady state: consume binding payloads and navigation events, map them
/// through the core, carry out the effects. Dispatch problems are swallowed
/// at this boundary — logged and counted, never propagated.
async fn dispatcher_loop(
    page: Page,
    bus: Arc<InMemoryBus<ClientEvent>>,
    config: EventBridgeConfig,
    mut binding: BindingStream,
    mut navigations: std::pin::Pin<
        Box<dyn futures::Stream<Item = Arc<EventFrameNavigated>> + Send>,
    >,
    disconnects: mpsc::Sender<DisconnectReason>,
    cancel: CancellationToken,
) {
    let mut core = BridgeCore::new(config.policy.clone());
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            payload = binding.next_payload() => {
                let Some(raw) = payload else {
                    debug!("event binding stream ended");
                    break;
                };
                match RawPageEvent::parse(&raw) {
                    Some(event) => {
                        metrics::record_event(&event.kind);
                        let effects = core.handle(event);
                        if effects.is_empty() {
                            metrics::record_dropped();
                        }
                        apply_effects(effects, &page, &bus, &config, &disconnects).await;
                    }
                    None => {
                        metrics::record_dispatch_error();
                        warn!(payload = %raw, "unparseable page payload swallowed");
                    }
                }
            }
            navigated = navigations.next() => {
                let Some(event) = navigated else {
                    debug!("navigation stream ended");
                    break;
                };
                // only a new top-level document counts
                if event.frame.parent_id.is_none() {
                    if let Some(effect) = core.handle_navigation() {
                        apply_effects(vec![effect], &page, &bus, &config, &disconnects).await;
                    }
                }
            }
        }
    }
}

async fn apply_effects(
    effects: Vec<BridgeEffect>,
    page: &Page,
    bus: &Arc<InMemoryBus<ClientEvent>>,
    config: &EventBridgeConfig,
    disconnects: &mpsc::Sender<DisconnectReason>,
) {
    for effect in effects {
        match effect {
            BridgeEffect::Emit(event) => bus.emit(event),
            BridgeEffect::Disconnect(reason) => {
                if disconnects.send(reason).await.is_err() {
                    debug!("disconnect channel closed; owner already tearing down");
                }
            }
            BridgeEffect::ScheduleTakeover => {
                schedule_takeover(page.clone(), config.clone());
            }
        }
    }
}

/// Conflict with takeover configured: after the configured delay, tell the
/// underlying session to become the active one instead of disconnecting. If
/// the session is gone by then the evaluation fails quietly.
fn schedule_takeover(page: Page, config: EventBridgeConfig) {
    let delay = config.takeover_delay;
    tokio::spawn(async move {
        sleep(delay).await;
        let script = config.store_bindings.command_script("takeOver", &json!({}));
        match page.evaluate(script).await {
            Ok(_) => info!("session takeover issued"),
            Err(err) => debug!(error = %err, "takeover dropped"),
        }
    });
}
