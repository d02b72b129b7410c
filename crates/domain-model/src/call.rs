use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chatpilot_core_types::CallId;

use crate::raw;

/// An incoming voice or video call offer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: CallId,
    pub peer: Option<String>,
    pub is_video: bool,
    pub is_group: bool,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Call {
    pub fn from_raw(value: &Value) -> Self {
        Self {
            id: CallId(raw::id_field(value, "id").unwrap_or_default()),
            peer: raw::id_field(value, "peer"),
            is_video: raw::bool_field(value, "isVideo"),
            is_group: raw::bool_field(value, "isGroup"),
            timestamp: raw::timestamp_field(value, "timestamp"),
        }
    }
}
