//! Bounded batch queue feeding a fixed number of concurrent workers.
//!
//! The webhook handler only enqueues. A full queue is reported back so the
//! platform redelivers instead of the process buffering without limit.

use std::{sync::Arc, time::Instant};

use {
    handoff_messenger::WebhookEvent,
    handoff_metrics::{counter, gauge, histogram, queue as queue_metrics},
    tokio::{
        sync::{Semaphore, mpsc},
        task::{JoinHandle, JoinSet},
    },
    tracing::{debug, error, info},
};

use crate::{
    error::{Error, Result},
    pipeline::Pipeline,
};

/// Producer side of the queue. Clones share the same channel.
#[derive(Clone)]
pub struct BatchQueue {
    tx: mpsc::Sender<WebhookEvent>,
}

impl BatchQueue {
    /// A queue and its raw consumer end, for callers that drain it themselves.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<WebhookEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Spawn the worker loop. It runs until every `BatchQueue` clone is
    /// dropped, then drains what is queued and waits for running batches.
    pub fn start(
        pipeline: Arc<Pipeline>,
        capacity: usize,
        max_in_flight: usize,
    ) -> (Self, JoinHandle<()>) {
        let (queue, rx) = Self::channel(capacity);
        let worker = tokio::spawn(run_worker_loop(rx, pipeline, max_in_flight.max(1)));
        (queue, worker)
    }

    /// Enqueue without waiting.
    pub fn try_submit(&self, event: WebhookEvent) -> Result<()> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                counter!(queue_metrics::REJECTED_TOTAL).increment(1);
                Error::QueueFull
            },
            mpsc::error::TrySendError::Closed(_) => Error::QueueClosed,
        })
    }
}

async fn run_worker_loop(
    mut rx: mpsc::Receiver<WebhookEvent>,
    pipeline: Arc<Pipeline>,
    max_in_flight: usize,
) {
    let semaphore = Arc::new(Semaphore::new(max_in_flight));
    let mut workers = JoinSet::new();

    while let Some(event) = rx.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let pipeline = Arc::clone(&pipeline);
        workers.spawn(async move {
            let _permit = permit;
            gauge!(queue_metrics::IN_FLIGHT).increment(1.0);
            let start = Instant::now();
            let report = pipeline.process_batch(&event).await;
            histogram!(queue_metrics::BATCH_DURATION_SECONDS).record(start.elapsed().as_secs_f64());
            gauge!(queue_metrics::IN_FLIGHT).decrement(1.0);
            debug!(
                records = report.outcomes.len(),
                filtered = report.filtered,
                reactivated = report.reactivated,
                "batch processed"
            );
        });

        while let Some(result) = workers.try_join_next() {
            log_worker_result(result);
        }
    }

    info!(in_flight = workers.len(), "batch queue closed, draining");
    while let Some(result) = workers.join_next().await {
        log_worker_result(result);
    }
}

fn log_worker_result(result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "batch worker panicked");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{echo::BotEchoFlags, pipeline::PipelineDeps},
        async_trait::async_trait,
        handoff_assistant::{Assistant, ChatReply, ChatRequest},
        handoff_common::{ConversationKey, MemoryTtlStore, PageInfo, Platform},
        handoff_config::RepliesConfig,
        handoff_messenger::{PlatformSender, ProfileCache, ProfileKey, ProfileLookup},
        handoff_sentiment::{Classification, Sentiment, SentimentClassifier},
        handoff_store::{NewPage, SqliteConversationStore, SqlitePageRegistry, connect_in_memory},
        secrecy::Secret,
        serde_json::json,
        std::{
            sync::atomic::{AtomicUsize, Ordering},
            time::Duration,
        },
    };

    #[derive(Default)]
    struct CountingSender {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl PlatformSender for CountingSender {
        async fn send(&self, _: &PageInfo, _: &str, _: &str) -> handoff_messenger::Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct General;

    #[async_trait]
    impl SentimentClassifier for General {
        async fn classify(&self, _: &str) -> handoff_sentiment::Result<Classification> {
            Ok(Classification {
                sentiment: Sentiment::General,
                raw: "general".into(),
                total_tokens: 1,
            })
        }
    }

    struct Echoing;

    #[async_trait]
    impl Assistant for Echoing {
        async fn chat(&self, request: ChatRequest<'_>) -> handoff_assistant::Result<ChatReply> {
            Ok(ChatReply {
                answer: request.query.to_string(),
                conversation_id: None,
            })
        }
    }

    struct NoName;

    #[async_trait]
    impl ProfileLookup for NoName {
        async fn display_name(
            &self,
            _: Platform,
            _: &str,
            _: &Secret<String>,
        ) -> handoff_messenger::Result<String> {
            Err(handoff_messenger::Error::profile("no profile"))
        }
    }

    async fn pipeline(sender: Arc<CountingSender>) -> Arc<Pipeline> {
        let pool = connect_in_memory().await.unwrap();
        let pages = SqlitePageRegistry::new(pool.clone());
        pages
            .upsert(&NewPage {
                page_id: "111".into(),
                platform: Platform::Facebook,
                client_id: None,
                access_token: Secret::new("t".into()),
                ai_api_key: Some(Secret::new("k".into())),
            })
            .await
            .unwrap();

        Arc::new(Pipeline::new(PipelineDeps {
            store: Arc::new(SqliteConversationStore::new(pool)),
            pages: Arc::new(pages),
            sender,
            classifier: Arc::new(General),
            assistant: Arc::new(Echoing),
            profiles: Arc::new(ProfileCache::new(
                Arc::new(NoName),
                Arc::new(MemoryTtlStore::<ProfileKey, String>::new()),
                Duration::from_secs(60),
            )),
            echo_flags: BotEchoFlags::new(
                Arc::new(MemoryTtlStore::<ConversationKey, u32>::new()),
                Duration::from_secs(60),
            ),
            own_app_id: "1".into(),
            replies: RepliesConfig::default(),
        }))
    }

    fn message(user: &str) -> WebhookEvent {
        serde_json::from_value(json!({
            "object": "page",
            "entry": [{"id": "111", "messaging": [{
                "sender": {"id": user},
                "recipient": {"id": "111"},
                "message": {"mid": format!("m-{user}"), "text": "hola"}
            }]}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn queued_batches_are_drained_on_close() {
        let sender = Arc::new(CountingSender::default());
        let (queue, worker) = BatchQueue::start(pipeline(sender.clone()).await, 16, 2);

        for user in ["u1", "u2", "u3", "u4"] {
            queue.try_submit(message(user)).unwrap();
        }
        drop(queue);
        worker.await.unwrap();

        assert_eq!(sender.sent.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn full_queue_is_rejected() {
        // Nothing consumes this channel.
        let (queue, _rx) = BatchQueue::channel(1);

        queue.try_submit(message("u1")).unwrap();
        let err = queue.try_submit(message("u2")).unwrap_err();
        assert!(matches!(err, Error::QueueFull));
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (queue, rx) = BatchQueue::channel(1);
        drop(rx);

        let err = queue.try_submit(message("u1")).unwrap_err();
        assert!(matches!(err, Error::QueueClosed));
    }
}
