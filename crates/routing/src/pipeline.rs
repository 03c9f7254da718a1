//! Per-batch processing: sweep, normalize, then route each record.

use std::sync::Arc;

use {
    handoff_assistant::Assistant,
    handoff_common::{ConversationKey, PageInfo, unix_now},
    handoff_config::RepliesConfig,
    handoff_messenger::{InboundRecord, PlatformSender, ProfileCache, WebhookEvent, normalize},
    handoff_metrics::{counter, labels, routing as routing_metrics, webhook as webhook_metrics},
    handoff_sentiment::{Sentiment, SentimentClassifier},
    handoff_store::{ConversationStore, PageRegistry},
    tracing::{Instrument, debug, error, info, info_span, warn},
};

use crate::{
    dispatch::{AiDispatcher, DispatchOutcome},
    echo::{BotEchoFlags, EchoAction, classify_echo},
    error::Result,
    locks::ThreadLocks,
};

pub const NEED_HUMAN_REASON: &str = "user requested human";
pub const FRUSTRATED_REASON: &str = "user appears frustrated";

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    OwnEcho,
    /// A human agent replied. `flipped` is false when they already held it.
    HumanTakeover { flipped: bool },
    UnrecognizedEcho,
    /// A human holds the conversation; the message was left for them.
    BotDisabled,
    HandedOff(Sentiment),
    Answered,
    FellBack,
    /// Processing aborted; state is left at its last durable value.
    Failed(String),
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub reactivated: usize,
    pub filtered: usize,
    pub outcomes: Vec<RecordOutcome>,
}

/// Everything the pipeline talks to.
pub struct PipelineDeps {
    pub store: Arc<dyn ConversationStore>,
    pub pages: Arc<dyn PageRegistry>,
    pub sender: Arc<dyn PlatformSender>,
    pub classifier: Arc<dyn SentimentClassifier>,
    pub assistant: Arc<dyn Assistant>,
    pub profiles: Arc<ProfileCache>,
    pub echo_flags: BotEchoFlags,
    /// Application id Facebook stamps on our own replies.
    pub own_app_id: String,
    pub replies: RepliesConfig,
}

pub struct Pipeline {
    store: Arc<dyn ConversationStore>,
    pages: Arc<dyn PageRegistry>,
    classifier: Arc<dyn SentimentClassifier>,
    dispatcher: AiDispatcher,
    profiles: Arc<ProfileCache>,
    echo_flags: BotEchoFlags,
    locks: ThreadLocks,
    own_app_id: String,
    replies: RepliesConfig,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps) -> Self {
        let dispatcher = AiDispatcher::new(
            deps.assistant,
            Arc::clone(&deps.pages),
            Arc::clone(&deps.store),
            deps.sender,
            deps.echo_flags.clone(),
            deps.replies.fallback.clone(),
        );
        Self {
            store: deps.store,
            pages: deps.pages,
            classifier: deps.classifier,
            dispatcher,
            profiles: deps.profiles,
            echo_flags: deps.echo_flags,
            locks: ThreadLocks::new(),
            own_app_id: deps.own_app_id,
            replies: deps.replies,
        }
    }

    pub fn echo_flags(&self) -> &BotEchoFlags {
        &self.echo_flags
    }

    /// Process one webhook call end to end. Never fails; per-record errors
    /// are logged and reported as [`RecordOutcome::Failed`].
    pub async fn process_batch(&self, event: &WebhookEvent) -> BatchReport {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!("batch", %request_id, object = %event.object);
        self.run_batch(event).instrument(span).await
    }

    async fn run_batch(&self, event: &WebhookEvent) -> BatchReport {
        let mut report = BatchReport {
            reactivated: self.sweep().await,
            ..Default::default()
        };

        let batch = normalize(event);
        report.filtered = batch.filtered.len();
        for reason in &batch.filtered {
            counter!(webhook_metrics::RECORDS_FILTERED_TOTAL, labels::REASON => reason.as_str())
                .increment(1);
        }
        debug!(
            records = batch.records.len(),
            filtered = report.filtered,
            "batch normalized"
        );

        for record in &batch.records {
            let outcome = match self.process_record(record).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        page_id = %record.page_id,
                        thread_id = record.user_id(),
                        platform = %record.platform,
                        mid = %record.mid,
                        error = %e,
                        "record processing aborted"
                    );
                    RecordOutcome::Failed(e.to_string())
                },
            };
            report.outcomes.push(outcome);
        }
        report
    }

    async fn sweep(&self) -> usize {
        let names = self.profiles.purge_expired().await;
        let flags = self.echo_flags.purge_expired().await;
        if names + flags > 0 {
            debug!(names, flags, "expired cache entries purged");
        }

        match self.store.reactivation_sweep(unix_now()).await {
            Ok(keys) => {
                for key in &keys {
                    info!(%key, "bot reactivated after human inactivity");
                }
                keys.len()
            },
            Err(e) => {
                warn!(error = %e, "reactivation sweep failed");
                0
            },
        }
    }

    async fn process_record(&self, record: &InboundRecord) -> Result<RecordOutcome> {
        let key = record.conversation_key();
        let _guard = self.locks.lock(&key).await;
        if record.is_echo {
            self.handle_echo(record, &key).await
        } else {
            self.handle_message(record, &key).await
        }
    }

    async fn handle_echo(&self, record: &InboundRecord, key: &ConversationKey) -> Result<RecordOutcome> {
        let action = classify_echo(record, &self.own_app_id, &self.echo_flags).await;
        counter!(routing_metrics::ECHOES_TOTAL, labels::OUTCOME => action.as_str()).increment(1);
        match action {
            EchoAction::SkipOwnEcho => {
                debug!(%key, mid = %record.mid, "own echo skipped");
                Ok(RecordOutcome::OwnEcho)
            },
            EchoAction::HumanTakeover => {
                let transition = self.store.record_human_takeover(key).await?;
                Ok(RecordOutcome::HumanTakeover {
                    flipped: transition.flipped(),
                })
            },
            EchoAction::Unrecognized => {
                warn!(
                    %key,
                    sender_id = %record.sender_id,
                    app_id = ?record.app_id,
                    "unrecognized echo skipped"
                );
                Ok(RecordOutcome::UnrecognizedEcho)
            },
        }
    }

    async fn handle_message(
        &self,
        record: &InboundRecord,
        key: &ConversationKey,
    ) -> Result<RecordOutcome> {
        let page = self.pages.page_info(&key.page_id, key.platform).await?;
        let conversation = self.store.get_or_create(key).await?;
        self.store.record_user_message(key).await?;
        self.remember_name(key, &page).await;

        if !conversation.bot_enabled {
            counter!(routing_metrics::BOT_DISABLED_SKIPS_TOTAL).increment(1);
            info!(%key, "human agent holds conversation, message left for them");
            return Ok(RecordOutcome::BotDisabled);
        }

        let sentiment = match self.classifier.classify(&record.text).await {
            Ok(verdict) => verdict.sentiment,
            Err(e) => {
                warn!(%key, error = %e, "classifier failed, routing as general");
                Sentiment::General
            },
        };
        debug!(%key, %sentiment, "message classified");

        let (copy, reason) = match sentiment {
            Sentiment::General => {
                return Ok(
                    match self
                        .dispatcher
                        .forward(&conversation, &page, &record.text)
                        .await?
                    {
                        DispatchOutcome::Answered => RecordOutcome::Answered,
                        DispatchOutcome::FellBack => RecordOutcome::FellBack,
                    },
                );
            },
            Sentiment::NeedHuman => (&self.replies.need_human, NEED_HUMAN_REASON),
            Sentiment::Frustrated => (&self.replies.frustrated, FRUSTRATED_REASON),
        };

        self.dispatcher
            .send_logged(&page, &key.thread_id, copy)
            .await;
        self.store.update_state(&conversation, false, reason).await?;
        info!(%key, reason, "conversation handed to a human");
        Ok(RecordOutcome::HandedOff(sentiment))
    }

    /// Resolve the sender's name; persist it off the hot path when new.
    async fn remember_name(&self, key: &ConversationKey, page: &PageInfo) {
        let resolved = self
            .profiles
            .resolve(key.platform, &key.thread_id, &page.access_token)
            .await;
        if !resolved.fresh {
            return;
        }
        let store = Arc::clone(&self.store);
        let key = key.clone();
        tokio::spawn(async move {
            if let Err(e) = store.set_display_name(&key, &resolved.name).await {
                warn!(%key, error = %e, "failed to persist display name");
            }
        });
    }
}
