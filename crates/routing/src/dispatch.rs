//! Hand a general message to the AI backend and deliver its answer.

use std::sync::Arc;

use {
    handoff_assistant::{Assistant, ChatRequest},
    handoff_common::{ConversationKey, PageInfo},
    handoff_messenger::PlatformSender,
    handoff_metrics::{assistant as assistant_metrics, counter, labels},
    handoff_store::{Conversation, ConversationStore, PageRegistry},
    tracing::{error, info, warn},
};

use crate::{echo::BotEchoFlags, error::Result};

/// Reason recorded when the backend fails and a human takes over.
pub const AI_FAILURE_REASON: &str = "AI backend error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The backend answered and the answer was delivered.
    Answered,
    /// The backend failed; the fallback text was sent and the bot disabled.
    FellBack,
}

pub struct AiDispatcher {
    assistant: Arc<dyn Assistant>,
    pages: Arc<dyn PageRegistry>,
    store: Arc<dyn ConversationStore>,
    sender: Arc<dyn PlatformSender>,
    echo_flags: BotEchoFlags,
    fallback_text: String,
}

impl AiDispatcher {
    pub fn new(
        assistant: Arc<dyn Assistant>,
        pages: Arc<dyn PageRegistry>,
        store: Arc<dyn ConversationStore>,
        sender: Arc<dyn PlatformSender>,
        echo_flags: BotEchoFlags,
        fallback_text: impl Into<String>,
    ) -> Self {
        Self {
            assistant,
            pages,
            store,
            sender,
            echo_flags,
            fallback_text: fallback_text.into(),
        }
    }

    /// Forward `text` for `conversation` and reply on `page`.
    ///
    /// Backend failures end in the fallback handoff, not an error. Errors
    /// are store failures during the handoff and a failed answer delivery.
    pub async fn forward(
        &self,
        conversation: &Conversation,
        page: &PageInfo,
        text: &str,
    ) -> Result<DispatchOutcome> {
        let key = &conversation.key;
        let reply = match self
            .pages
            .assistant_api_key(&key.page_id, key.platform)
            .await
        {
            Ok(api_key) => self
                .assistant
                .chat(ChatRequest {
                    api_key: &api_key,
                    user: key.joined(),
                    query: text,
                    conversation_id: &conversation.external_conversation_id,
                })
                .await
                .map_err(|e| (e.kind(), e.to_string())),
            Err(e) => Err(("credentials", e.to_string())),
        };

        let reply = match reply {
            Ok(reply) => reply,
            Err((kind, message)) => {
                counter!(assistant_metrics::FAILURES_TOTAL, labels::ERROR_TYPE => kind).increment(1);
                error!(%key, error = %message, "assistant dispatch failed, handing off");
                self.send_logged(page, &key.thread_id, &self.fallback_text)
                    .await;
                self.store
                    .update_state(conversation, false, AI_FAILURE_REASON)
                    .await?;
                return Ok(DispatchOutcome::FellBack);
            },
        };

        if let Some(external_id) = &reply.conversation_id
            && *external_id != conversation.external_conversation_id
            && let Err(e) = self
                .store
                .set_external_conversation_id(key, external_id)
                .await
        {
            warn!(%key, error = %e, "failed to persist assistant conversation id");
        }

        self.sender
            .send(page, &key.thread_id, &reply.answer)
            .await?;
        self.echo_flags.mark_sent(key).await;
        if let Err(e) = self.store.record_bot_reply(key).await {
            warn!(%key, error = %e, "failed to record bot reply");
        }
        info!(%key, "assistant answer delivered");
        Ok(DispatchOutcome::Answered)
    }

    /// Fire-and-log send used for handoff and fallback copy.
    pub(crate) async fn send_logged(&self, page: &PageInfo, recipient_id: &str, text: &str) {
        match self.sender.send(page, recipient_id, text).await {
            Ok(()) => {
                let key = ConversationKey::new(page.platform, &page.page_id, recipient_id);
                self.echo_flags.mark_sent(&key).await;
            },
            Err(e) => warn!(page_id = %page.page_id, recipient_id, error = %e, "failed to send reply"),
        }
    }
}
