//! User display names, read through a TTL cache.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    handoff_common::{Platform, TtlStore},
    handoff_metrics::{counter, labels, platform as platform_metrics},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::{debug, warn},
};

use crate::error::{Error, Result};

/// Name used when the platform will not tell us who the user is.
pub const PLACEHOLDER_NAME: &str = "user";

#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn display_name(
        &self,
        platform: Platform,
        user_id: &str,
        page_token: &Secret<String>,
    ) -> Result<String>;
}

/// Graph API profile endpoint. Facebook exposes `name`, Instagram `username`.
pub struct GraphProfileLookup {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
}

#[derive(Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl GraphProfileLookup {
    pub fn new(base_url: &str, api_version: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
        })
    }
}

#[async_trait]
impl ProfileLookup for GraphProfileLookup {
    async fn display_name(
        &self,
        platform: Platform,
        user_id: &str,
        page_token: &Secret<String>,
    ) -> Result<String> {
        let field = match platform {
            Platform::Facebook => "name",
            Platform::Instagram => "username",
        };
        let url = format!(
            "{}/{}/{}",
            self.base_url,
            self.api_version,
            urlencoding::encode(user_id)
        );
        let resp = self
            .client
            .get(url)
            .query(&[
                ("fields", field),
                ("access_token", page_token.expose_secret().as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::profile(format!("{status}: {body}")));
        }

        let profile: ProfileResponse = resp.json().await?;
        let name = match platform {
            Platform::Facebook => profile.name,
            Platform::Instagram => profile.username,
        };
        name.filter(|n| !n.trim().is_empty())
            .ok_or_else(|| Error::profile(format!("response has no {field}")))
    }
}

/// Outcome of [`ProfileCache::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub name: String,
    /// True when the name came from the platform just now.
    pub fresh: bool,
}

pub type ProfileKey = (Platform, String);

pub struct ProfileCache {
    lookup: Arc<dyn ProfileLookup>,
    store: Arc<dyn TtlStore<ProfileKey, String>>,
    ttl: Duration,
}

impl ProfileCache {
    pub fn new(
        lookup: Arc<dyn ProfileLookup>,
        store: Arc<dyn TtlStore<ProfileKey, String>>,
        ttl: Duration,
    ) -> Self {
        Self { lookup, store, ttl }
    }

    /// Cached name if live, else one lookup. Failures yield
    /// [`PLACEHOLDER_NAME`] and are not cached.
    pub async fn resolve(
        &self,
        platform: Platform,
        user_id: &str,
        page_token: &Secret<String>,
    ) -> Resolved {
        let key = (platform, user_id.to_string());
        if let Some(name) = self.store.get(&key).await {
            counter!(platform_metrics::PROFILE_LOOKUPS_TOTAL, labels::OUTCOME => "hit").increment(1);
            return Resolved { name, fresh: false };
        }

        match self.lookup.display_name(platform, user_id, page_token).await {
            Ok(name) => {
                counter!(platform_metrics::PROFILE_LOOKUPS_TOTAL, labels::OUTCOME => "miss")
                    .increment(1);
                debug!(%platform, user_id, "profile name resolved");
                self.store.insert(key, name.clone(), self.ttl).await;
                Resolved { name, fresh: true }
            },
            Err(e) => {
                counter!(platform_metrics::PROFILE_LOOKUPS_TOTAL, labels::OUTCOME => "error")
                    .increment(1);
                warn!(%platform, user_id, error = %e, "profile lookup failed");
                Resolved {
                    name: PLACEHOLDER_NAME.to_string(),
                    fresh: false,
                }
            },
        }
    }

    /// Drop names whose TTL ran out for users who never came back.
    pub async fn purge_expired(&self) -> usize {
        self.store.purge_expired().await
    }
}
