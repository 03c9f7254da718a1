//! Client for the conversational AI backend.
//!
//! One call per inbound message in blocking mode. Transport failures are
//! retried with linear backoff; an error answered by the backend is final.

pub mod dify;
pub mod error;
pub mod retry;

use {async_trait::async_trait, secrecy::Secret};

pub use {
    dify::DifyClient,
    error::{Error, Result},
    retry::RetryPolicy,
};

/// One question for the backend.
pub struct ChatRequest<'a> {
    /// Tenant credential for the page the message arrived on.
    pub api_key: &'a Secret<String>,
    /// Stable per-thread user id, `<pageID>-<threadID>`.
    pub user: String,
    pub query: &'a str,
    /// Backend session handle; empty on first contact.
    pub conversation_id: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub answer: String,
    /// Session handle to reuse on the next turn, when the backend sent one.
    pub conversation_id: Option<String>,
}

#[async_trait]
pub trait Assistant: Send + Sync {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatReply>;
}
