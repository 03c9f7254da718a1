//! OpenAI-compatible chat-completion classifier (Fireworks by default).

use std::time::{Duration, Instant};

use {
    async_trait::async_trait,
    handoff_config::SentimentConfig,
    handoff_metrics::{counter, histogram, labels, sentiment as sentiment_metrics},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::{debug, warn},
};

use crate::{
    Classification, SentimentClassifier,
    error::{Error, Result},
    label::normalize_label,
};

pub const SYSTEM_PROMPT: &str = r#"You're a sentiment analysis agent. Respond with exactly one word:

"general" - for normal questions, requests, complaints, or any messages that don't EXPLICITLY ask for human help

"need_human" - ONLY if they EXPLICITLY and DIRECTLY ask to speak to a human, agent, representative, or person. Examples: "I want to talk to a human", "Can I speak to a person?", "Transfer me to an agent", "I need human help"

"frustrated" - ONLY if they explicitly express anger, frustration, or complaints

IMPORTANT: Be very conservative with "need_human". Most complaints, problems, or even expressions of frustration should be "general" or "frustrated", NOT "need_human" unless they specifically ask to talk to a person.

Most of the time, the message will be "general". If you are not sure, respond with "general".

Remember, only respond with one of these three words: general, need_human, frustrated

Message to analyse:"#;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

pub struct FireworksClassifier {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<Secret<String>>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl FireworksClassifier {
    pub fn from_config(config: &SentimentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn request(&self, text: &str) -> Result<Classification> {
        let api_key = self.api_key.as_ref().ok_or(Error::NotConfigured)?;
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: 1.0,
            top_k: 40,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::api(status, body));
        }

        let parsed: ChatResponse = resp.json().await?;
        let raw = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(Error::NoChoices)?;
        debug!(
            raw = %raw.trim(),
            prompt_tokens = parsed.usage.prompt_tokens,
            completion_tokens = parsed.usage.completion_tokens,
            total_tokens = parsed.usage.total_tokens,
            "classifier replied"
        );

        let sentiment = normalize_label(&raw)?;
        Ok(Classification {
            sentiment,
            raw: raw.trim().to_string(),
            total_tokens: parsed.usage.total_tokens,
        })
    }
}

#[async_trait]
impl SentimentClassifier for FireworksClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let start = Instant::now();
        let result = self.request(text).await;
        histogram!(sentiment_metrics::DURATION_SECONDS).record(start.elapsed().as_secs_f64());
        match &result {
            Ok(c) => {
                counter!(sentiment_metrics::CLASSIFICATIONS_TOTAL, labels::LABEL => c.sentiment.as_str())
                    .increment(1);
            },
            Err(e) => {
                counter!(sentiment_metrics::ERRORS_TOTAL, labels::ERROR_TYPE => e.kind()).increment(1);
                warn!(error = %e, "sentiment classification failed");
            },
        }
        result
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::label::Sentiment,
        mockito::Matcher,
        serde_json::json,
    };

    fn classifier(server: &mockito::Server) -> FireworksClassifier {
        FireworksClassifier::from_config(&SentimentConfig {
            api_key: Some(Secret::new("fw-key".into())),
            base_url: server.url(),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    fn completion(content: &str) -> String {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 210, "completion_tokens": 2, "total_tokens": 212}
        })
        .to_string()
    }

    #[tokio::test]
    async fn sends_fixed_prompt_and_parses_label() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer fw-key")
            .match_header("accept", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "model": "accounts/fireworks/models/llama4-maverick-instruct-basic",
                "max_tokens": 10,
                "top_k": 40,
                "messages": [
                    {"role": "system", "content": SYSTEM_PROMPT},
                    {"role": "user", "content": "necesito hablar con una persona"}
                ]
            })))
            .with_status(200)
            .with_body(completion("need_human"))
            .create_async()
            .await;

        let verdict = classifier(&server)
            .classify("necesito hablar con una persona")
            .await
            .unwrap();
        assert_eq!(verdict.sentiment, Sentiment::NeedHuman);
        assert_eq!(verdict.total_tokens, 212);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn noisy_reply_is_normalized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(completion("\"Frustrated.\""))
            .create_async()
            .await;

        let verdict = classifier(&server).classify("esto es inaceptable").await.unwrap();
        assert_eq!(verdict.sentiment, Sentiment::Frustrated);
    }

    #[tokio::test]
    async fn unknown_label_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(completion("positive"))
            .create_async()
            .await;

        let err = classifier(&server).classify("hola").await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedLabel { .. }));
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = classifier(&server).classify("hola").await.unwrap_err();
        assert!(matches!(err, Error::NoChoices));
    }

    #[tokio::test]
    async fn api_error_carries_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let err = classifier(&server).classify("hola").await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 429, .. }));
    }

    #[tokio::test]
    async fn missing_key_skips_the_request() {
        let classifier = FireworksClassifier::from_config(&SentimentConfig::default()).unwrap();
        let err = classifier.classify("hola").await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured));
    }
}
