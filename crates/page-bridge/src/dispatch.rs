use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use chatpilot_core_types::{ConnectionState, DisconnectReason};
use domain_model::{Call, Chat, ClientEvent, GroupUpdate, Message, Reaction};

/// Connection states that do not trigger a disconnect.
#[derive(Clone, Debug, Default)]
pub struct StatePolicy {
    /// Treat a reported conflict as "take the session over" instead of
    /// disconnecting.
    pub takeover_on_conflict: bool,
}

/// What a state change asks the owner to do, beyond the always-emitted
/// state-changed event.
#[derive(Clone, Debug, PartialEq)]
pub enum StateAction {
    None,
    ScheduleTakeover,
    Disconnect(DisconnectReason),
}

impl StatePolicy {
    pub fn acceptable(&self, state: &ConnectionState) -> bool {
        matches!(
            state,
            ConnectionState::Connected
                | ConnectionState::Opening
                | ConnectionState::Pairing
                | ConnectionState::Timeout
        ) || (self.takeover_on_conflict && matches!(state, ConnectionState::Conflict))
    }

    pub fn decide(&self, state: &ConnectionState) -> StateAction {
        if matches!(state, ConnectionState::Conflict) && self.takeover_on_conflict {
            StateAction::ScheduleTakeover
        } else if self.acceptable(state) {
            StateAction::None
        } else {
            StateAction::Disconnect(DisconnectReason::State(state.clone()))
        }
    }
}

/// One event as marshalled out of the page: a kind tag plus a plain payload.
#[derive(Clone, Debug)]
pub struct RawPageEvent {
    pub kind: String,
    pub payload: Value,
}

impl RawPageEvent {
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let kind = value.get("kind")?.as_str()?.to_string();
        let payload = value.get("payload").cloned().unwrap_or(Value::Null);
        Some(Self { kind, payload })
    }
}

/// Instructions the dispatcher carries out after mapping one raw event.
#[derive(Clone, Debug, PartialEq)]
pub enum BridgeEffect {
    Emit(ClientEvent),
    Disconnect(DisconnectReason),
    ScheduleTakeover,
}

/// The raw-to-domain mapping state machine. Pure apart from its own pending
/// set and last-seen state, so every policy is testable without a browser.
pub struct BridgeCore {
    policy: StatePolicy,
    /// Message ids whose add was deferred pending type resolution.
    pending_adds: HashSet<String>,
    last_state: Option<ConnectionState>,
}

impl BridgeCore {
    pub fn new(policy: StatePolicy) -> Self {
        Self {
            policy,
            pending_adds: HashSet::new(),
            last_state: None,
        }
    }

    pub fn last_state(&self) -> Option<&ConnectionState> {
        self.last_state.as_ref()
    }

    /// Map one raw in-page event. Every payload produces its effects exactly
    /// once; intentional drops return an empty vec.
    pub fn handle(&mut self, event: RawPageEvent) -> Vec<BridgeEffect> {
        match event.kind.as_str() {
            "message_add" => {
                let message = Message::from_raw(&event.payload);
                if message.kind.is_provisional() {
                    // withheld until the matching type change resolves it
                    self.pending_adds.insert(message.id.0.clone());
                    debug!(id = %message.id, "provisional add deferred");
                    Vec::new()
                } else {
                    vec![BridgeEffect::Emit(ClientEvent::MessageAdded(message))]
                }
            }
            "message_type_change" => {
                let message = Message::from_raw(&event.payload);
                let was_pending = self.pending_adds.remove(&message.id.0);
                if message.is_revoked() {
                    vec![BridgeEffect::Emit(ClientEvent::MessageRevoked {
                        message,
                        everyone: true,
                    })]
                } else if was_pending {
                    vec![BridgeEffect::Emit(ClientEvent::MessageAdded(message))]
                } else {
                    Vec::new()
                }
            }
            "message_edit" => {
                let message = Message::from_raw(&event.payload);
                if message.is_revoked() {
                    // an edit arriving on a revoked message is never an edit
                    Vec::new()
                } else {
                    let prev_body = event
                        .payload
                        .get("prevBody")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    vec![BridgeEffect::Emit(ClientEvent::MessageEdited {
                        message,
                        prev_body,
                    })]
                }
            }
            "message_ack" => {
                let message = Message::from_raw(&event.payload);
                let ack = message.ack;
                vec![BridgeEffect::Emit(ClientEvent::MessageAckChanged {
                    message,
                    ack,
                })]
            }
            "message_remove" => {
                let message = Message::from_raw(&event.payload);
                self.pending_adds.remove(&message.id.0);
                if message.is_new {
                    vec![BridgeEffect::Emit(ClientEvent::MessageRevoked {
                        message,
                        everyone: false,
                    })]
                } else {
                    // historical sync removal, not a live user action
                    Vec::new()
                }
            }
            "message_reaction" => {
                vec![BridgeEffect::Emit(ClientEvent::MessageReaction(
                    Reaction::from_raw(&event.payload),
                ))]
            }
            "chat_remove" => {
                vec![BridgeEffect::Emit(ClientEvent::ChatRemoved(
                    Chat::from_raw(&event.payload),
                ))]
            }
            "chat_archive" => {
                let chat = Chat::from_raw(&event.payload);
                let archived = event
                    .payload
                    .get("archived")
                    .and_then(Value::as_bool)
                    .unwrap_or(chat.archived);
                vec![BridgeEffect::Emit(ClientEvent::ChatArchived {
                    chat,
                    archived,
                })]
            }
            "group_update" => {
                vec![BridgeEffect::Emit(ClientEvent::GroupUpdated(
                    GroupUpdate::from_raw(&event.payload),
                ))]
            }
            "call_add" => {
                vec![BridgeEffect::Emit(ClientEvent::IncomingCall(
                    Call::from_raw(&event.payload),
                ))]
            }
            "battery" => {
                let percentage = event
                    .payload
                    .get("percentage")
                    .and_then(Value::as_u64)
                    .unwrap_or(0)
                    .min(100) as u8;
                let plugged = event
                    .payload
                    .get("plugged")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                vec![BridgeEffect::Emit(ClientEvent::BatteryChanged {
                    percentage,
                    plugged,
                })]
            }
            "state_change" => {
                let state = event
                    .payload
                    .get("state")
                    .and_then(Value::as_str)
                    .map(ConnectionState::parse)
                    .unwrap_or(ConnectionState::Other(String::new()));
                self.last_state = Some(state.clone());
                let mut effects =
                    vec![BridgeEffect::Emit(ClientEvent::StateChanged(state.clone()))];
                match self.policy.decide(&state) {
                    StateAction::None => {}
                    StateAction::ScheduleTakeover => effects.push(BridgeEffect::ScheduleTakeover),
                    StateAction::Disconnect(reason) => {
                        effects.push(BridgeEffect::Disconnect(reason))
                    }
                }
                effects
            }
            _ => vec![BridgeEffect::Emit(ClientEvent::Unhandled {
                kind: event.kind,
                payload: event.payload,
            })],
        }
    }

    /// A new top-level document while pairing (or before any state arrived)
    /// is an implicit logout.
    pub fn handle_navigation(&self) -> Option<BridgeEffect> {
        match self.last_state {
            None | Some(ConnectionState::Pairing) => {
                Some(BridgeEffect::Disconnect(DisconnectReason::Navigation))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_model::Ack;
    use serde_json::json;

    fn core() -> BridgeCore {
        BridgeCore::new(StatePolicy::default())
    }

    fn event(kind: &str, payload: Value) -> RawPageEvent {
        RawPageEvent {
            kind: kind.to_string(),
            payload,
        }
    }

    fn emitted(effects: &[BridgeEffect]) -> Vec<&ClientEvent> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                BridgeEffect::Emit(ev) => Some(ev),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn plain_add_emits_once() {
        let mut core = core();
        let effects = core.handle(event("message_add", json!({ "id": "m1", "kind": "chat" })));
        assert_eq!(effects.len(), 1);
        assert!(matches!(
            &effects[0],
            BridgeEffect::Emit(ClientEvent::MessageAdded(m)) if m.id.0 == "m1"
        ));
    }

    #[test]
    fn provisional_add_is_deferred_until_type_resolves() {
        let mut core = core();
        let first = core.handle(event(
            "message_add",
            json!({ "id": "m1", "kind": "ciphertext" }),
        ));
        assert!(first.is_empty());

        let second = core.handle(event(
            "message_type_change",
            json!({ "id": "m1", "kind": "chat", "body": "decrypted" }),
        ));
        assert_eq!(second.len(), 1, "exactly one add, never two, never zero");
        assert!(matches!(
            &second[0],
            BridgeEffect::Emit(ClientEvent::MessageAdded(m)) if m.body == "decrypted"
        ));

        // a later type change for the same id is no longer an add
        let third = core.handle(event(
            "message_type_change",
            json!({ "id": "m1", "kind": "chat" }),
        ));
        assert!(third.is_empty());
    }

    #[test]
    fn type_change_to_revoked_is_a_revoke_for_everyone() {
        let mut core = core();
        let effects = core.handle(event(
            "message_type_change",
            json!({ "id": "m2", "kind": "revoked" }),
        ));
        assert!(matches!(
            &effects[0],
            BridgeEffect::Emit(ClientEvent::MessageRevoked { everyone: true, .. })
        ));
    }

    #[test]
    fn edit_on_revoked_message_is_suppressed() {
        let mut core = core();
        let effects = core.handle(event(
            "message_edit",
            json!({ "id": "m3", "kind": "revoked", "body": "edited", "prevBody": "old" }),
        ));
        assert!(effects.is_empty());
    }

    #[test]
    fn edit_carries_previous_body() {
        let mut core = core();
        let effects = core.handle(event(
            "message_edit",
            json!({ "id": "m4", "kind": "chat", "body": "new", "prevBody": "old" }),
        ));
        assert!(matches!(
            &effects[0],
            BridgeEffect::Emit(ClientEvent::MessageEdited { prev_body: Some(p), .. }) if p == "old"
        ));
    }

    #[test]
    fn remove_surfaces_only_session_local_messages() {
        let mut core = core();
        let live = core.handle(event(
            "message_remove",
            json!({ "id": "m5", "kind": "chat", "isNew": true }),
        ));
        assert!(matches!(
            &live[0],
            BridgeEffect::Emit(ClientEvent::MessageRevoked { everyone: false, .. })
        ));

        let historical = core.handle(event(
            "message_remove",
            json!({ "id": "m6", "kind": "chat", "isNew": false }),
        ));
        assert!(historical.is_empty());
    }

    #[test]
    fn ack_change_carries_the_parsed_level() {
        let mut core = core();
        let effects = core.handle(event(
            "message_ack",
            json!({ "id": "m7", "kind": "chat", "ack": 3 }),
        ));
        assert!(matches!(
            &effects[0],
            BridgeEffect::Emit(ClientEvent::MessageAckChanged { ack: Ack::Read, .. })
        ));
    }

    #[test]
    fn acceptable_states_emit_state_change_only() {
        let mut core = core();
        for state in ["CONNECTED", "OPENING", "PAIRING", "TIMEOUT"] {
            let effects = core.handle(event("state_change", json!({ "state": state })));
            assert_eq!(effects.len(), 1, "state {state} must not disconnect");
            assert!(matches!(
                &effects[0],
                BridgeEffect::Emit(ClientEvent::StateChanged(_))
            ));
        }
    }

    #[test]
    fn unacceptable_state_emits_then_disconnects_once() {
        let mut core = core();
        let effects = core.handle(event("state_change", json!({ "state": "UNPAIRED" })));
        assert_eq!(effects.len(), 2);
        assert!(matches!(
            &effects[0],
            BridgeEffect::Emit(ClientEvent::StateChanged(ConnectionState::Unpaired))
        ));
        assert_eq!(
            effects[1],
            BridgeEffect::Disconnect(DisconnectReason::State(ConnectionState::Unpaired))
        );
    }

    #[test]
    fn conflict_without_takeover_disconnects() {
        let mut core = core();
        let effects = core.handle(event("state_change", json!({ "state": "CONFLICT" })));
        assert_eq!(
            effects[1],
            BridgeEffect::Disconnect(DisconnectReason::State(ConnectionState::Conflict))
        );
    }

    #[test]
    fn conflict_with_takeover_schedules_instead() {
        let mut core = BridgeCore::new(StatePolicy {
            takeover_on_conflict: true,
        });
        let effects = core.handle(event("state_change", json!({ "state": "CONFLICT" })));
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[1], BridgeEffect::ScheduleTakeover);
    }

    #[test]
    fn navigation_disconnects_while_pairing_or_unknown() {
        let mut core = core();
        assert_eq!(
            core.handle_navigation(),
            Some(BridgeEffect::Disconnect(DisconnectReason::Navigation)),
            "no state seen yet"
        );

        core.handle(event("state_change", json!({ "state": "PAIRING" })));
        assert!(core.handle_navigation().is_some());

        core.handle(event("state_change", json!({ "state": "CONNECTED" })));
        assert_eq!(core.handle_navigation(), None);
    }

    #[test]
    fn unknown_kind_surfaces_as_unhandled() {
        let mut core = core();
        let effects = core.handle(event("presence_update", json!({ "who": "u1@c" })));
        let events = emitted(&effects);
        assert!(matches!(
            events[0],
            ClientEvent::Unhandled { kind, .. } if kind == "presence_update"
        ));
    }

    #[test]
    fn raw_payloads_parse_and_reject_garbage() {
        assert!(RawPageEvent::parse(r#"{"kind":"battery","payload":{}}"#).is_some());
        assert!(RawPageEvent::parse(r#"{"payload":{}}"#).is_none());
        assert!(RawPageEvent::parse("nonsense").is_none());
    }
}
