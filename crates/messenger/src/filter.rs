//! Envelope normalization. Pure, no I/O.

use handoff_common::{ConversationKey, Platform};

use crate::event::{Entry, Messaging, WebhookEvent};

/// Sender id prefixes used by synthetic page and bot senders.
const INTERNAL_SENDER_PREFIXES: &[&str] = &["page-", "bot-"];

/// Why a messaging record was dropped before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    UnsupportedObject,
    Delivery,
    Empty,
    InternalSender,
}

impl FilterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedObject => "unsupported_object",
            Self::Delivery => "delivery",
            Self::Empty => "empty",
            Self::InternalSender => "internal_sender",
        }
    }
}

/// A record that survived filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRecord {
    pub platform: Platform,
    /// Id of the page (entry) the record was delivered for.
    pub page_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub mid: String,
    pub text: String,
    pub is_echo: bool,
    pub app_id: Option<u64>,
}

impl InboundRecord {
    /// Thread user id: the sender of inbound messages, the recipient of echoes.
    pub fn user_id(&self) -> &str {
        if self.is_echo {
            &self.recipient_id
        } else {
            &self.sender_id
        }
    }

    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::new(self.platform, &self.page_id, self.user_id())
    }
}

#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub records: Vec<InboundRecord>,
    pub filtered: Vec<FilterReason>,
}

/// Flatten an envelope into the records worth classifying, in delivery order.
pub fn normalize(event: &WebhookEvent) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    let Some(platform) = Platform::from_object(&event.object) else {
        batch.filtered.extend(
            event
                .entry
                .iter()
                .flat_map(|e| &e.messaging)
                .map(|_| FilterReason::UnsupportedObject),
        );
        return batch;
    };

    for entry in &event.entry {
        for record in &entry.messaging {
            match filter_record(platform, entry, record) {
                Ok(inbound) => batch.records.push(inbound),
                Err(reason) => batch.filtered.push(reason),
            }
        }
    }
    batch
}

fn filter_record(
    platform: Platform,
    entry: &Entry,
    record: &Messaging,
) -> Result<InboundRecord, FilterReason> {
    if record.delivery.is_some() {
        return Err(FilterReason::Delivery);
    }
    let message = match &record.message {
        Some(m) if !m.text.is_empty() => m,
        _ => return Err(FilterReason::Empty),
    };
    if !message.is_echo
        && INTERNAL_SENDER_PREFIXES
            .iter()
            .any(|p| record.sender.id.starts_with(p))
    {
        return Err(FilterReason::InternalSender);
    }

    Ok(InboundRecord {
        platform,
        page_id: entry.id.clone(),
        sender_id: record.sender.id.clone(),
        recipient_id: record.recipient.id.clone(),
        mid: message.mid.clone(),
        text: message.text.clone(),
        is_echo: message.is_echo,
        app_id: message.app_id,
    })
}
