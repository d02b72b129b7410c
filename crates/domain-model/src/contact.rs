use serde::{Deserialize, Serialize};
use serde_json::Value;

use chatpilot_core_types::ChatId;

use crate::raw;

/// One address-book or conversation peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ChatId,
    pub number: Option<String>,
    /// Self-assigned display name broadcast by the peer.
    pub pushname: Option<String>,
    /// Name from the local address book, when present.
    pub name: Option<String>,
    pub is_me: bool,
    pub is_business: bool,
    pub is_blocked: bool,
}

impl Contact {
    pub fn from_raw(value: &Value) -> Self {
        Self {
            id: ChatId(raw::id_field(value, "id").unwrap_or_default()),
            number: raw::str_field(value, "number"),
            pushname: raw::str_field(value, "pushname"),
            name: raw::str_field(value, "name"),
            is_me: raw::bool_field(value, "isMe"),
            is_business: raw::bool_field(value, "isBusiness"),
            is_blocked: raw::bool_field(value, "isBlocked"),
        }
    }

    /// Best available display name: address book, then pushname, then number.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.pushname.as_deref())
            .or(self.number.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_name_prefers_address_book() {
        let contact = Contact::from_raw(&json!({
            "id": "u1@c",
            "number": "15550100",
            "pushname": "zed",
            "name": "Zed K"
        }));
        assert_eq!(contact.display_name(), Some("Zed K"));
    }

    #[test]
    fn display_name_falls_back() {
        let contact = Contact::from_raw(&json!({ "id": "u1@c", "number": "15550100" }));
        assert_eq!(contact.display_name(), Some("15550100"));
        let anonymous = Contact::from_raw(&json!({ "id": "u2@c" }));
        assert_eq!(anonymous.display_name(), None);
    }
}
