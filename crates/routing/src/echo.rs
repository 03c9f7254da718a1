//! Echo classification.
//!
//! An echo is a message sent *from* the page. It is either the router's own
//! reply coming back, or a human agent answering from the platform inbox.
//! Facebook tags our replies with the sending app id. Instagram does not,
//! so every reply we send there bumps a short-lived pending count that its
//! echo consumes.

use std::{sync::Arc, time::Duration};

use {
    handoff_common::{ConversationKey, Platform, TtlStore},
    handoff_messenger::InboundRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoAction {
    /// Our own reply. Nothing to do.
    SkipOwnEcho,
    /// A human agent replied; they now own the conversation.
    HumanTakeover,
    /// Neither ours nor the page's. Logged and skipped.
    Unrecognized,
}

impl EchoAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkipOwnEcho => "bot",
            Self::HumanTakeover => "human",
            Self::Unrecognized => "unknown",
        }
    }
}

/// Replies the router sent on platforms without an app-id echo signal,
/// counted per conversation until their echoes arrive.
#[derive(Clone)]
pub struct BotEchoFlags {
    store: Arc<dyn TtlStore<ConversationKey, u32>>,
    ttl: Duration,
}

impl BotEchoFlags {
    pub fn new(store: Arc<dyn TtlStore<ConversationKey, u32>>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Mark one more upcoming echo on `key` as ours.
    pub async fn mark(&self, key: &ConversationKey) {
        let pending = self.store.get(key).await.unwrap_or(0);
        self.store
            .insert(key.clone(), pending.saturating_add(1), self.ttl)
            .await;
    }

    /// Record that the router just sent on `key`. Only Instagram needs it.
    pub async fn mark_sent(&self, key: &ConversationKey) {
        if key.platform == Platform::Instagram {
            self.mark(key).await;
        }
    }

    /// Use up one pending mark, returning whether there was one.
    pub async fn consume(&self, key: &ConversationKey) -> bool {
        match self.store.take(key).await {
            Some(pending) if pending > 1 => {
                self.store.insert(key.clone(), pending - 1, self.ttl).await;
                true
            },
            Some(pending) => pending > 0,
            None => false,
        }
    }

    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired().await
    }
}

/// Decide what an echo record means. Consumes the Instagram flag when present.
pub async fn classify_echo(
    record: &InboundRecord,
    own_app_id: &str,
    flags: &BotEchoFlags,
) -> EchoAction {
    match record.platform {
        Platform::Facebook => {
            if record
                .app_id
                .is_some_and(|id| id.to_string() == own_app_id)
            {
                EchoAction::SkipOwnEcho
            } else if record.sender_id == record.page_id {
                EchoAction::HumanTakeover
            } else {
                EchoAction::Unrecognized
            }
        },
        Platform::Instagram => {
            if flags.consume(&record.conversation_key()).await {
                EchoAction::SkipOwnEcho
            } else {
                EchoAction::HumanTakeover
            }
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, handoff_common::MemoryTtlStore};

    const APP_ID: &str = "1195277397801905";

    fn flags() -> BotEchoFlags {
        BotEchoFlags::new(
            Arc::new(MemoryTtlStore::<ConversationKey, u32>::new()),
            Duration::from_secs(600),
        )
    }

    fn echo(platform: Platform, sender: &str, app_id: Option<u64>) -> InboundRecord {
        InboundRecord {
            platform,
            page_id: "111".into(),
            sender_id: sender.into(),
            recipient_id: "u1".into(),
            mid: "m".into(),
            text: "reply".into(),
            is_echo: true,
            app_id,
        }
    }

    #[tokio::test]
    async fn facebook_own_app_id_is_skipped() {
        let record = echo(Platform::Facebook, "111", Some(1195277397801905));
        assert_eq!(
            classify_echo(&record, APP_ID, &flags()).await,
            EchoAction::SkipOwnEcho
        );
    }

    #[tokio::test]
    async fn facebook_page_sender_is_human() {
        let record = echo(Platform::Facebook, "111", Some(263902037430900));
        assert_eq!(
            classify_echo(&record, APP_ID, &flags()).await,
            EchoAction::HumanTakeover
        );
    }

    #[tokio::test]
    async fn facebook_other_sender_is_unrecognized() {
        let record = echo(Platform::Facebook, "999", None);
        assert_eq!(
            classify_echo(&record, APP_ID, &flags()).await,
            EchoAction::Unrecognized
        );
    }

    #[tokio::test]
    async fn instagram_flag_is_consumed_once() {
        let flags = flags();
        let record = echo(Platform::Instagram, "111", None);
        flags.mark(&record.conversation_key()).await;

        assert_eq!(
            classify_echo(&record, APP_ID, &flags).await,
            EchoAction::SkipOwnEcho
        );
        assert_eq!(
            classify_echo(&record, APP_ID, &flags).await,
            EchoAction::HumanTakeover
        );
    }

    #[tokio::test]
    async fn each_mark_covers_one_echo() {
        let flags = flags();
        let record = echo(Platform::Instagram, "111", None);
        flags.mark(&record.conversation_key()).await;
        flags.mark(&record.conversation_key()).await;

        for _ in 0..2 {
            assert_eq!(
                classify_echo(&record, APP_ID, &flags).await,
                EchoAction::SkipOwnEcho
            );
        }
        assert_eq!(
            classify_echo(&record, APP_ID, &flags).await,
            EchoAction::HumanTakeover
        );
    }

    #[tokio::test]
    async fn instagram_ignores_app_id() {
        let record = echo(Platform::Instagram, "111", Some(1195277397801905));
        assert_eq!(
            classify_echo(&record, APP_ID, &flags()).await,
            EchoAction::HumanTakeover
        );
    }

    #[tokio::test]
    async fn facebook_sends_leave_no_flag() {
        let flags = flags();
        let fb = ConversationKey::new(Platform::Facebook, "111", "u1");
        flags.mark_sent(&fb).await;
        assert!(!flags.consume(&fb).await);

        let ig = ConversationKey::new(Platform::Instagram, "111", "u1");
        flags.mark_sent(&ig).await;
        assert!(flags.consume(&ig).await);
    }

    #[tokio::test]
    async fn expired_flag_reads_as_human() {
        let flags = BotEchoFlags::new(
            Arc::new(MemoryTtlStore::<ConversationKey, u32>::new()),
            Duration::ZERO,
        );
        let record = echo(Platform::Instagram, "111", None);
        flags.mark(&record.conversation_key()).await;
        assert_eq!(
            classify_echo(&record, APP_ID, &flags).await,
            EchoAction::HumanTakeover
        );
    }
}
