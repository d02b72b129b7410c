//! chatpilot: a browser-automation client for a web messaging application.
//!
//! The [`Client`] drives one persistent Chromium session against the remote
//! web client, bridges its in-page store events onto a typed domain-event
//! stream, and dispatches outbound commands through single page evaluations.

pub mod client;
pub mod config;
pub mod errors;

pub use client::Client;
pub use config::ClientConfig;
pub use errors::ClientError;

pub use auth_flow::{AuthDecision, AuthStrategy, LocalAuth, NoAuth};
pub use browser_session::{
    DetectorSelectors, ProxyConfig, SessionConfig, SessionStore, Viewport,
};
pub use chatpilot_core_types::{
    AuthState, CallId, ChatId, ClientId, ConnectionState, DisconnectReason, InstanceId, MessageId,
};
pub use domain_model::{
    Ack, Call, Chat, ClientEvent, Contact, GroupUpdate, GroupUpdateKind, Message, MessageKind,
    Reaction,
};
pub use page_bridge::{SendOptions, StoreBindings};
