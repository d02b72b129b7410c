//! The one seam touching the remote application's undocumented internals.
//! Everything version-fragile — where the store lives, what its collections
//! are called, how a live model becomes a plain record — is a configurable
//! expression here, so upstream churn never reaches the rest of the system.

use serde_json::Value;

/// Default page-side serializer for message models. Custom serializers may
/// use the `__sid` helper (serialized-id extraction) defined by the
/// installer script.
const DEFAULT_SERIALIZE_MESSAGE: &str = r#"(msg) => ({
    id: __sid(msg.id),
    chatId: __sid(msg.chatId || (msg.chat && msg.chat.id)),
    sender: __sid(msg.senderId || msg.author || msg.from),
    to: __sid(msg.to),
    body: msg.body || '',
    kind: String(msg.type || ''),
    ack: (typeof msg.ack === 'number') ? msg.ack : 0,
    timestamp: Number(msg.t || msg.timestamp) || 0,
    fromMe: !!msg.fromMe || !!(msg.id && msg.id.fromMe),
    hasMedia: !!msg.hasMedia,
    isForwarded: !!msg.isForwarded,
    isStarred: !!msg.star,
    isNew: !!msg.isNewMsg,
    mentions: (msg.mentionedIds || []).map(__sid).filter(Boolean),
    quotedId: __sid(msg.quotedMsgId || msg.quotedStanzaId),
    subtype: msg.subtype ? String(msg.subtype) : null
})"#;

const DEFAULT_SERIALIZE_CHAT: &str = r#"(chat) => ({
    id: __sid(chat.id),
    name: chat.name || chat.formattedTitle || '',
    isGroup: !!chat.isGroup,
    unreadCount: Number(chat.unreadCount) || 0,
    timestamp: Number(chat.t || chat.timestamp) || 0,
    archived: !!chat.archive,
    pinned: !!chat.pin,
    muteExpiration: Number(chat.muteExpiration) || 0,
    lastMessageId: __sid(chat.lastMsgId)
})"#;

const DEFAULT_SERIALIZE_CALL: &str = r#"(call) => ({
    id: __sid(call.id),
    peer: __sid(call.peerId || call.from),
    isVideo: !!call.isVideo,
    isGroup: !!call.isGroup,
    timestamp: Number(call.offerTime || call.t) || 0
})"#;

/// Where the bridge reaches into the page. The `root` expression must
/// evaluate to an object exposing the named collections, each supporting
/// `.on(event, callback)` subscription; `command_root` must expose the
/// outbound operations as async functions.
#[derive(Clone, Debug)]
pub struct StoreBindings {
    pub root: String,
    pub message_collection: String,
    pub chat_collection: String,
    pub call_collection: String,
    pub connection: String,
    pub command_root: String,
    pub serialize_message: String,
    pub serialize_chat: String,
    pub serialize_call: String,
}

impl Default for StoreBindings {
    fn default() -> Self {
        Self {
            root: "window.Store".to_string(),
            message_collection: "Msg".to_string(),
            chat_collection: "Chat".to_string(),
            call_collection: "Call".to_string(),
            connection: "Conn".to_string(),
            command_root: "window.Store && window.Store.Cmd".to_string(),
            serialize_message: DEFAULT_SERIALIZE_MESSAGE.to_string(),
            serialize_chat: DEFAULT_SERIALIZE_CHAT.to_string(),
            serialize_call: DEFAULT_SERIALIZE_CALL.to_string(),
        }
    }
}

impl StoreBindings {
    /// One page-context call attaching every in-page listener. Returns a JS
    /// boolean: `false` means the store shape was not found, which the
    /// installer treats as fatal.
    pub fn install_script(&self, binding: &str) -> String {
        format!(
            r#"(() => {{
    const root = ({root});
    if (!root) {{ return false; }}
    const msgColl = root[{msg}];
    const chatColl = root[{chat}];
    const callColl = root[{call}];
    const conn = root[{conn}];
    if (!msgColl || !chatColl || !conn) {{ return false; }}
    const __sid = (v) => (v && v._serialized) ? v._serialized : (v == null ? null : String(v));
    const emit = (kind, payload) => {{
        try {{ window[{binding}](JSON.stringify({{ kind, payload }})); }} catch (err) {{}}
    }};
    const serializeMessage = ({ser_msg});
    const serializeChat = ({ser_chat});
    const serializeCall = ({ser_call});
    msgColl.on('add', (msg) => emit('message_add', serializeMessage(msg)));
    msgColl.on('change:type', (msg) => emit('message_type_change', serializeMessage(msg)));
    msgColl.on('change:ack', (msg) => emit('message_ack', serializeMessage(msg)));
    msgColl.on('change:body', (msg, prev) => {{
        const payload = serializeMessage(msg);
        payload.prevBody = (prev == null ? null : String(prev));
        emit('message_edit', payload);
    }});
    msgColl.on('remove', (msg) => emit('message_remove', serializeMessage(msg)));
    msgColl.on('reaction', (reaction) => emit('message_reaction', {{
        messageId: __sid(reaction.parentMsgId || reaction.msgId),
        chatId: __sid(reaction.chatId),
        sender: __sid(reaction.senderId || reaction.from),
        emoji: reaction.reactionText || reaction.text || '',
        timestamp: Number(reaction.timestamp || reaction.t) || 0
    }}));
    chatColl.on('remove', (chat) => emit('chat_remove', serializeChat(chat)));
    chatColl.on('change:archive', (chat, archived) => {{
        const payload = serializeChat(chat);
        payload.archived = !!archived;
        emit('chat_archive', payload);
    }});
    chatColl.on('group_update', (update) => emit('group_update', {{
        chatId: __sid(update.chatId || update.id),
        subtype: String(update.subtype || ''),
        actor: __sid(update.author || update.actor),
        recipients: (update.recipients || []).map(__sid).filter(Boolean),
        timestamp: Number(update.t || update.timestamp) || 0
    }}));
    if (callColl) {{
        callColl.on('add', (call) => emit('call_add', serializeCall(call)));
    }}
    conn.on('change:state', (state) => emit('state_change', {{ state: String(state) }}));
    conn.on('change:battery', () => emit('battery', {{
        percentage: Number(conn.battery) || 0,
        plugged: !!conn.plugged
    }}));
    return true;
}})()"#,
            root = self.root,
            msg = js_string(&self.message_collection),
            chat = js_string(&self.chat_collection),
            call = js_string(&self.call_collection),
            conn = js_string(&self.connection),
            binding = js_string(binding),
            ser_msg = self.serialize_message,
            ser_chat = self.serialize_chat,
            ser_call = self.serialize_call,
        )
    }

    /// One evaluate call for one outbound operation: look the op up on the
    /// command root, invoke it with the marshalled args, wrap the result in
    /// an `{ ok, value, error }` envelope.
    pub fn command_script(&self, op: &str, args: &Value) -> String {
        format!(
            r#"(async () => {{
    try {{
        const api = ({root});
        const fn = api && api[{op}];
        if (typeof fn !== 'function') {{
            return {{ ok: false, error: 'unknown command: ' + {op} }};
        }}
        const value = await fn.call(api, {args});
        return {{ ok: true, value: (value === undefined ? null : value) }};
    }} catch (err) {{
        return {{ ok: false, error: String(err) }};
    }}
}})()"#,
            root = self.command_root,
            op = js_string(op),
            args = args,
        )
    }
}

fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn install_script_references_configured_collections() {
        let bindings = StoreBindings {
            message_collection: "MsgStore".to_string(),
            ..StoreBindings::default()
        };
        let script = bindings.install_script("__cb");
        assert!(script.contains("root[\"MsgStore\"]"));
        assert!(script.contains("window[\"__cb\"]"));
        assert!(script.contains("'change:state'"));
    }

    #[test]
    fn command_script_embeds_op_and_args() {
        let bindings = StoreBindings::default();
        let script = bindings.command_script("sendMessage", &json!({ "chatId": "c1@c" }));
        assert!(script.contains("\"sendMessage\""));
        assert!(script.contains("\"chatId\":\"c1@c\""));
        assert!(script.contains("ok: false"));
    }
}
