//! Page registry: per-page platform tokens and assistant credentials.

use std::time::Duration;

use {
    async_trait::async_trait,
    handoff_common::{PageInfo, Platform, unix_now},
    secrecy::{ExposeSecret, Secret},
    sqlx::SqlitePool,
    tracing::debug,
};

use crate::{
    error::{Context, Error, Result},
    timed,
};

/// Read side of the page registry used while routing.
#[async_trait]
pub trait PageRegistry: Send + Sync {
    /// Platform credentials for an active page.
    async fn page_info(&self, page_id: &str, platform: Platform) -> Result<PageInfo>;

    /// The AI backend key configured for an active page.
    async fn assistant_api_key(&self, page_id: &str, platform: Platform)
    -> Result<Secret<String>>;
}

/// A page to register or refresh.
#[derive(Clone)]
pub struct NewPage {
    pub page_id: String,
    pub platform: Platform,
    pub client_id: Option<String>,
    pub access_token: Secret<String>,
    pub ai_api_key: Option<Secret<String>>,
}

/// Registry listing entry. Secrets are reduced to presence flags.
#[derive(Debug, Clone)]
pub struct PageSummary {
    pub id: String,
    pub page_id: String,
    pub platform: Platform,
    pub client_id: Option<String>,
    pub status: String,
    pub has_api_key: bool,
}

#[derive(sqlx::FromRow)]
struct PageSummaryRow {
    id: String,
    page_id: String,
    platform: String,
    client_id: Option<String>,
    status: String,
    has_api_key: i64,
}

impl TryFrom<PageSummaryRow> for PageSummary {
    type Error = Error;

    fn try_from(r: PageSummaryRow) -> Result<Self> {
        let platform = r
            .platform
            .parse::<Platform>()
            .with_context(|| format!("page {} has an unreadable platform", r.id))?;
        Ok(Self {
            id: r.id,
            page_id: r.page_id,
            platform,
            client_id: r.client_id,
            status: r.status,
            has_api_key: r.has_api_key != 0,
        })
    }
}

/// SQLite-backed page registry.
pub struct SqlitePageRegistry {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl SqlitePageRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            query_timeout: crate::DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Insert a page or refresh its credentials. Returns the row id.
    pub async fn upsert(&self, page: &NewPage) -> Result<String> {
        let now = unix_now();
        let id = sqlx::query_scalar::<_, String>(
            r#"INSERT INTO social_pages
                 (id, page_id, platform, client_id, access_token, ai_api_key, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, 'active', ?, ?)
               ON CONFLICT(page_id, platform) DO UPDATE SET
                 client_id = excluded.client_id,
                 access_token = excluded.access_token,
                 ai_api_key = excluded.ai_api_key,
                 status = 'active',
                 updated_at = excluded.updated_at
               RETURNING id"#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(&page.page_id)
        .bind(page.platform.as_str())
        .bind(&page.client_id)
        .bind(page.access_token.expose_secret())
        .bind(page.ai_api_key.as_ref().map(|k| k.expose_secret().clone()))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        debug!(page_id = %page.page_id, platform = %page.platform, "page registered");
        Ok(id)
    }

    /// Mark a page inactive; routing stops resolving it.
    pub async fn deactivate(&self, page_id: &str, platform: Platform) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE social_pages SET status = 'inactive', updated_at = ? \
             WHERE page_id = ? AND platform = ?",
        )
        .bind(unix_now())
        .bind(page_id)
        .bind(platform.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list(&self) -> Result<Vec<PageSummary>> {
        let rows = sqlx::query_as::<_, PageSummaryRow>(
            "SELECT id, page_id, platform, client_id, status, \
             (ai_api_key IS NOT NULL AND ai_api_key != '') AS has_api_key \
             FROM social_pages ORDER BY platform, page_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl PageRegistry for SqlitePageRegistry {
    async fn page_info(&self, page_id: &str, platform: Platform) -> Result<PageInfo> {
        let token = timed(
            self.query_timeout,
            sqlx::query_scalar::<_, String>(
                "SELECT access_token FROM social_pages \
                 WHERE page_id = ? AND platform = ? AND status = 'active'",
            )
            .bind(page_id)
            .bind(platform.as_str())
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or_else(|| Error::page_not_found(page_id, platform))?;

        Ok(PageInfo {
            platform,
            page_id: page_id.to_string(),
            access_token: Secret::new(token),
        })
    }

    async fn assistant_api_key(
        &self,
        page_id: &str,
        platform: Platform,
    ) -> Result<Secret<String>> {
        let key = timed(
            self.query_timeout,
            sqlx::query_scalar::<_, Option<String>>(
                "SELECT ai_api_key FROM social_pages \
                 WHERE page_id = ? AND platform = ? AND status = 'active'",
            )
            .bind(page_id)
            .bind(platform.as_str())
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or_else(|| Error::page_not_found(page_id, platform))?;

        match key {
            Some(k) if !k.trim().is_empty() => Ok(Secret::new(k)),
            _ => Err(Error::MissingApiKey {
                page_id: page_id.to_string(),
                platform,
            }),
        }
    }
}
