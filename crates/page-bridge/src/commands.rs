use chromiumoxide::Page;
use serde_json::{json, Value};
use tracing::debug;

use browser_session::SessionError;
use chatpilot_core_types::{ChatId, ConnectionState, MessageId};
use domain_model::{Chat, Contact, Message};

use crate::error::BridgeError;
use crate::inject::StoreBindings;
use crate::metrics;

/// Extra knobs for an outbound message.
#[derive(Clone, Debug, Default)]
pub struct SendOptions {
    pub quoted_message_id: Option<MessageId>,
    pub mentions: Vec<String>,
}

/// Outbound direction of the bridge. Every operation is one page
/// evaluation: marshal plain args in, unmarshal a plain result out. No
/// retries, no added timeouts; idempotence mirrors the underlying action.
#[derive(Clone)]
pub struct CommandDispatcher {
    page: Page,
    bindings: StoreBindings,
}

impl CommandDispatcher {
    pub fn new(page: Page, bindings: StoreBindings) -> Self {
        Self { page, bindings }
    }

    async fn run(&self, op: &str, args: Value) -> Result<Value, BridgeError> {
        metrics::record_command(op);
        debug!(op, "dispatching command");
        let script = self.bindings.command_script(op, &args);
        let result = match self.page.evaluate(script).await {
            Ok(result) => result,
            Err(err) => {
                metrics::record_command_failure(op);
                return Err(SessionError::from_cdp(err).into());
            }
        };
        let envelope = result.value().cloned().unwrap_or(Value::Null);

        let ok = envelope
            .get("ok")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if ok {
            Ok(envelope.get("value").cloned().unwrap_or(Value::Null))
        } else {
            metrics::record_command_failure(op);
            let message = envelope
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("malformed command envelope")
                .to_string();
            Err(BridgeError::Command {
                op: op.to_string(),
                message,
            })
        }
    }

    /// Not idempotent: sending twice sends twice.
    pub async fn send_message(
        &self,
        chat: &ChatId,
        body: &str,
        options: &SendOptions,
    ) -> Result<Message, BridgeError> {
        let value = self
            .run(
                "sendMessage",
                json!({
                    "chatId": chat.0,
                    "body": body,
                    "quotedId": options.quoted_message_id.as_ref().map(|id| id.0.clone()),
                    "mentions": options.mentions,
                }),
            )
            .await?;
        Ok(Message::from_raw(&value))
    }

    pub async fn mark_seen(&self, chat: &ChatId) -> Result<(), BridgeError> {
        self.run("markSeen", json!({ "chatId": chat.0 })).await?;
        Ok(())
    }

    /// Idempotent: archiving an archived chat is a no-op in the page.
    pub async fn archive_chat(&self, chat: &ChatId, archived: bool) -> Result<(), BridgeError> {
        self.run(
            "archiveChat",
            json!({ "chatId": chat.0, "archived": archived }),
        )
        .await?;
        Ok(())
    }

    pub async fn pin_chat(&self, chat: &ChatId, pinned: bool) -> Result<(), BridgeError> {
        self.run("pinChat", json!({ "chatId": chat.0, "pinned": pinned }))
            .await?;
        Ok(())
    }

    /// `until` is a unix timestamp; `None` mutes indefinitely.
    pub async fn mute_chat(&self, chat: &ChatId, until: Option<i64>) -> Result<(), BridgeError> {
        self.run("muteChat", json!({ "chatId": chat.0, "until": until }))
            .await?;
        Ok(())
    }

    pub async fn delete_chat(&self, chat: &ChatId) -> Result<(), BridgeError> {
        self.run("deleteChat", json!({ "chatId": chat.0 })).await?;
        Ok(())
    }

    pub async fn get_chats(&self) -> Result<Vec<Chat>, BridgeError> {
        let value = self.run("listChats", json!({})).await?;
        Ok(map_list(&value, Chat::from_raw))
    }

    pub async fn get_chat(&self, chat: &ChatId) -> Result<Option<Chat>, BridgeError> {
        let value = self.run("getChat", json!({ "chatId": chat.0 })).await?;
        Ok((!value.is_null()).then(|| Chat::from_raw(&value)))
    }

    pub async fn get_contacts(&self) -> Result<Vec<Contact>, BridgeError> {
        let value = self.run("listContacts", json!({})).await?;
        Ok(map_list(&value, Contact::from_raw))
    }

    pub async fn get_contact(&self, id: &ChatId) -> Result<Option<Contact>, BridgeError> {
        let value = self.run("getContact", json!({ "contactId": id.0 })).await?;
        Ok((!value.is_null()).then(|| Contact::from_raw(&value)))
    }

    pub async fn get_state(&self) -> Result<ConnectionState, BridgeError> {
        let value = self.run("getState", json!({})).await?;
        let raw = value.as_str().unwrap_or_default();
        Ok(ConnectionState::parse(raw))
    }

    pub async fn set_status_message(&self, text: &str) -> Result<(), BridgeError> {
        self.run("setStatusMessage", json!({ "text": text })).await?;
        Ok(())
    }

    pub async fn send_presence_available(&self) -> Result<(), BridgeError> {
        self.run("sendPresenceAvailable", json!({})).await?;
        Ok(())
    }

    pub async fn take_over(&self) -> Result<(), BridgeError> {
        self.run("takeOver", json!({})).await?;
        Ok(())
    }

    /// Best-effort in-page logout, used before the profile is cleared.
    pub async fn logout_in_page(&self) -> Result<(), BridgeError> {
        self.run("logout", json!({})).await?;
        Ok(())
    }
}

fn map_list<T>(value: &Value, map: impl Fn(&Value) -> T) -> Vec<T> {
    value
        .as_array()
        .map(|items| items.iter().map(&map).collect())
        .unwrap_or_default()
}
