//! Dify `chat-messages` API in blocking mode.

use std::time::{Duration, Instant};

use {
    async_trait::async_trait,
    handoff_config::AssistantConfig,
    handoff_metrics::{assistant as assistant_metrics, counter, histogram},
    secrecy::ExposeSecret,
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
};

use crate::{
    Assistant, ChatReply, ChatRequest,
    error::{Error, Result},
    retry::RetryPolicy,
};

#[derive(Serialize)]
struct ChatMessagesBody<'a> {
    inputs: serde_json::Map<String, serde_json::Value>,
    query: &'a str,
    response_mode: &'static str,
    user: &'a str,
    conversation_id: &'a str,
    files: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatMessagesResponse {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

pub struct DifyClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl DifyClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                backoff_unit: Duration::from_millis(config.backoff_unit_ms),
            },
        )
    }

    async fn attempt(&self, request: &ChatRequest<'_>) -> Result<ChatReply> {
        counter!(assistant_metrics::ATTEMPTS_TOTAL).increment(1);
        let body = ChatMessagesBody {
            inputs: serde_json::Map::new(),
            query: request.query,
            response_mode: "blocking",
            user: &request.user,
            conversation_id: request.conversation_id,
            files: Vec::new(),
        };
        let resp = self
            .client
            .post(format!("{}/chat-messages", self.base_url))
            .bearer_auth(request.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorBody>(&text) {
                Ok(err) if !err.message.is_empty() => Error::backend(status, err.code, err.message),
                _ => Error::backend(status, "unknown", text),
            });
        }

        let parsed: ChatMessagesResponse = resp.json().await?;
        if parsed.answer.trim().is_empty() {
            return Err(Error::EmptyAnswer);
        }
        Ok(ChatReply {
            answer: parsed.answer,
            conversation_id: parsed.conversation_id.filter(|id| !id.is_empty()),
        })
    }
}

#[async_trait]
impl Assistant for DifyClient {
    async fn chat(&self, request: ChatRequest<'_>) -> Result<ChatReply> {
        let start = Instant::now();
        if request.conversation_id.is_empty() {
            info!(user = %request.user, "starting new assistant conversation");
        } else {
            debug!(user = %request.user, conversation_id = request.conversation_id, "continuing assistant conversation");
        }

        let mut attempt = 1;
        let result = loop {
            match self.attempt(&request).await {
                Ok(reply) => break Ok(reply),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(attempt, error = %e, ?delay, "assistant attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(Error::Transport(source)) if source.is_connect() || source.is_timeout() => {
                    break Err(Error::Exhausted {
                        attempts: attempt,
                        source,
                    });
                },
                Err(e) => break Err(e),
            }
        };

        histogram!(assistant_metrics::DURATION_SECONDS).record(start.elapsed().as_secs_f64());
        result
    }
}
