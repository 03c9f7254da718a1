use std::time::Duration;

use {
    async_trait::async_trait,
    handoff_common::{PageInfo, Platform},
    handoff_metrics::{counter, labels, platform as platform_metrics},
    secrecy::ExposeSecret,
    serde_json::json,
    tracing::{debug, warn},
};

use crate::error::{Error, Result};

/// Delivers text to a platform user on behalf of a page.
///
/// Implementations never retry; callers decide.
#[async_trait]
pub trait PlatformSender: Send + Sync {
    async fn send(&self, page: &PageInfo, recipient_id: &str, text: &str) -> Result<()>;
}

/// Send API client for Facebook pages and Instagram accounts.
pub struct GraphSender {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
}

impl GraphSender {
    pub fn new(base_url: &str, api_version: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, api_version))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, api_version: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
        }
    }

    fn endpoint(&self, page: &PageInfo) -> String {
        let node = match page.platform {
            Platform::Facebook => urlencoding::encode(&page.page_id).into_owned(),
            Platform::Instagram => "me".to_string(),
        };
        format!("{}/{}/{node}/messages", self.base_url, self.api_version)
    }

    fn payload(platform: Platform, recipient_id: &str, text: &str) -> serde_json::Value {
        match platform {
            Platform::Facebook => json!({
                "recipient": { "id": recipient_id },
                "message": { "text": text },
            }),
            Platform::Instagram => json!({
                "recipient": { "id": recipient_id },
                "message": { "text": text },
                "messaging_type": "RESPONSE",
            }),
        }
    }

    async fn post(&self, page: &PageInfo, recipient_id: &str, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.endpoint(page))
            .query(&[("access_token", page.access_token.expose_secret().as_str())])
            .json(&Self::payload(page.platform, recipient_id, text))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::send(status, body));
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformSender for GraphSender {
    async fn send(&self, page: &PageInfo, recipient_id: &str, text: &str) -> Result<()> {
        let result = self.post(page, recipient_id, text).await;
        counter!(
            platform_metrics::SENDS_TOTAL,
            labels::PLATFORM => page.platform.as_str(),
            labels::SUCCESS => result.is_ok().to_string()
        )
        .increment(1);
        match &result {
            Ok(()) => debug!(page_id = %page.page_id, platform = %page.platform, recipient_id, "message sent"),
            Err(e) => warn!(page_id = %page.page_id, platform = %page.platform, recipient_id, error = %e, "send failed"),
        }
        result
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, mockito::Matcher, secrecy::Secret};

    fn page(platform: Platform) -> PageInfo {
        PageInfo {
            platform,
            page_id: "111".into(),
            access_token: Secret::new("page-token".into()),
        }
    }

    fn sender(server: &mockito::Server) -> GraphSender {
        GraphSender::new(&server.url(), "v19.0", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn facebook_posts_to_page_node() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v19.0/111/messages")
            .match_query(Matcher::UrlEncoded("access_token".into(), "page-token".into()))
            .match_body(Matcher::Json(json!({
                "recipient": {"id": "u1"},
                "message": {"text": "hola"},
            })))
            .with_status(200)
            .with_body(r#"{"recipient_id":"u1","message_id":"m1"}"#)
            .create_async()
            .await;

        sender(&server)
            .send(&page(Platform::Facebook), "u1", "hola")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn instagram_posts_to_me_with_messaging_type() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v19.0/me/messages")
            .match_query(Matcher::UrlEncoded("access_token".into(), "page-token".into()))
            .match_body(Matcher::Json(json!({
                "recipient": {"id": "u1"},
                "message": {"text": "hi"},
                "messaging_type": "RESPONSE",
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        sender(&server)
            .send(&page(Platform::Instagram), "u1", "hi")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v19.0/111/messages")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"message":"Invalid OAuth access token"}}"#)
            .expect(1)
            .create_async()
            .await;

        let err = sender(&server)
            .send(&page(Platform::Facebook), "u1", "x")
            .await
            .unwrap_err();
        match err {
            Error::Send { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("Invalid OAuth"));
            },
            other => panic!("unexpected error: {other}"),
        }
        mock.assert_async().await;
    }
}
