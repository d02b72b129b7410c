//! Typed object model for the remote messaging application.
//!
//! Every type here is an immutable value constructed once from the plain
//! serializable record the page-side marshaller produces. Refreshing an
//! entity means mapping a new record into a new value; nothing in this crate
//! mutates a previously returned object.

mod call;
mod chat;
mod contact;
mod event;
mod group;
mod message;
pub(crate) mod raw;

pub use call::Call;
pub use chat::Chat;
pub use contact::Contact;
pub use event::ClientEvent;
pub use group::{GroupUpdate, GroupUpdateKind};
pub use message::{Ack, Message, MessageKind, Reaction};
