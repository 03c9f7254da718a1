//! Message intent classification through an external chat-completion model.

pub mod error;
pub mod fireworks;
pub mod label;

use async_trait::async_trait;

pub use {
    error::{Error, Result},
    fireworks::{FireworksClassifier, SYSTEM_PROMPT},
    label::{Sentiment, normalize_label},
};

/// A classifier verdict with the model's raw reply kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub sentiment: Sentiment,
    pub raw: String,
    pub total_tokens: u32,
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// Classify one inbound message. Errors cover transport failures,
    /// non-success responses and replies that map to no known label.
    async fn classify(&self, text: &str) -> Result<Classification>;
}
