//! The bridge between the remote application's in-page stores and the host:
//! binding registration, one-shot listener installation, the dispatcher that
//! maps raw page events onto the stable domain-event catalog, the
//! connection-state disconnect policy, and evaluate-based command dispatch.

pub mod bridge;
pub mod commands;
pub mod dispatch;
pub mod error;
pub mod inject;
pub mod metrics;

pub use bridge::{EventBridge, EventBridgeConfig};
pub use commands::{CommandDispatcher, SendOptions};
pub use dispatch::{BridgeCore, BridgeEffect, RawPageEvent, StateAction, StatePolicy};
pub use error::BridgeError;
pub use inject::StoreBindings;
