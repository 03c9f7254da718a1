//! Webhook envelope as delivered by the Messenger Platform.
//!
//! Facebook pages arrive with `object = "page"`, Instagram accounts with
//! `object = "instagram"`. Both use the same `entry[].messaging[]` shape.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Page (or Instagram account) id the entry belongs to.
    pub id: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub messaging: Vec<Messaging>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Messaging {
    pub sender: Participant,
    pub recipient: Participant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_echo: bool,
    /// Sending application, present on Facebook echoes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    #[serde(default)]
    pub mids: Vec<String>,
    #[serde(default)]
    pub watermark: i64,
}
