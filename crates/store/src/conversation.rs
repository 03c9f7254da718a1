//! Per-thread routing state and its audit trail.
//!
//! `bot_enabled` decides who answers a thread: the AI backend when true, a
//! human agent when false. Every change of that flag appends exactly one
//! audit row to `messages`, inside the same transaction as the flag write.

use std::time::Duration;

use {
    async_trait::async_trait,
    handoff_common::{ConversationKey, Platform, unix_now},
    handoff_metrics::{counter, labels, routing as routing_metrics},
    sqlx::{SqliteConnection, SqlitePool},
    tracing::{debug, info, warn},
};

use crate::{
    error::{Context, Error, Result},
    timed,
};

/// Reason recorded when the sweep hands a conversation back to the bot.
pub const REACTIVATION_REASON: &str = "bot reactivated after human inactivity";

/// Reason recorded when a human agent's reply takes a conversation over.
pub const HUMAN_TAKEOVER_REASON: &str = "human agent replied";

const DEFAULT_REACTIVATE_AFTER: Duration = Duration::from_secs(12 * 3600);

/// Snapshot of one conversation's routing state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: i64,
    pub key: ConversationKey,
    pub bot_enabled: bool,
    pub last_bot_message_at: Option<i64>,
    pub last_human_message_at: Option<i64>,
    pub last_user_message_at: Option<i64>,
    pub bot_disabled_at: Option<i64>,
    pub message_count: i64,
    /// Session handle issued by the AI backend; empty until the first answer.
    pub external_conversation_id: String,
    pub social_user_name: Option<String>,
    pub first_message_at: i64,
    pub latest_message_at: i64,
}

/// Effect of a state write on `bot_enabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Enabled,
    Disabled,
}

impl Transition {
    fn to(bot_enabled: bool) -> Self {
        if bot_enabled {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }

    /// Whether the flag flipped (and an audit row was written).
    pub fn flipped(self) -> bool {
        self != Self::Unchanged
    }
}

/// One audit row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditMessage {
    pub id: String,
    pub client_id: Option<String>,
    pub from_user: String,
    pub content: String,
    pub source: String,
    pub requires_attention: bool,
    pub read: bool,
    pub timestamp: i64,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Look up the conversation, creating it bot-enabled on first contact.
    async fn get_or_create(&self, key: &ConversationKey) -> Result<Conversation>;

    async fn find(&self, key: &ConversationKey) -> Result<Option<Conversation>>;

    /// Refresh activity and write `bot_enabled`.
    ///
    /// Activity timestamp and message count are always updated. When the
    /// stored flag differs from `bot_enabled`, the page's tenant is resolved,
    /// one audit row is inserted and the flag is written; a missing page
    /// rolls the whole write back.
    async fn update_state(
        &self,
        conversation: &Conversation,
        bot_enabled: bool,
        reason: &str,
    ) -> Result<Transition>;

    /// A human agent replied through the platform inbox: refresh
    /// `last_human_message_at` and disable the bot.
    async fn record_human_takeover(&self, key: &ConversationKey) -> Result<Transition>;

    async fn record_user_message(&self, key: &ConversationKey) -> Result<()>;

    async fn record_bot_reply(&self, key: &ConversationKey) -> Result<()>;

    async fn set_external_conversation_id(
        &self,
        key: &ConversationKey,
        external_id: &str,
    ) -> Result<()>;

    async fn set_display_name(&self, key: &ConversationKey, name: &str) -> Result<()>;

    /// Re-enable every human-held conversation idle past the reactivation
    /// window as of `now`. Returns the conversations that flipped back.
    async fn reactivation_sweep(&self, now: i64) -> Result<Vec<ConversationKey>>;
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: i64,
    page_id: String,
    platform: String,
    thread_id: String,
    bot_enabled: bool,
    last_bot_message_at: Option<i64>,
    last_human_message_at: Option<i64>,
    last_user_message_at: Option<i64>,
    bot_disabled_at: Option<i64>,
    message_count: i64,
    external_conversation_id: String,
    social_user_name: Option<String>,
    first_message_at: i64,
    latest_message_at: i64,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = Error;

    fn try_from(r: ConversationRow) -> Result<Self> {
        let platform = r
            .platform
            .parse::<Platform>()
            .with_context(|| format!("conversation {} has an unreadable platform", r.id))?;
        Ok(Self {
            id: r.id,
            key: ConversationKey::new(platform, r.page_id, r.thread_id),
            bot_enabled: r.bot_enabled,
            last_bot_message_at: r.last_bot_message_at,
            last_human_message_at: r.last_human_message_at,
            last_user_message_at: r.last_user_message_at,
            bot_disabled_at: r.bot_disabled_at,
            message_count: r.message_count,
            external_conversation_id: r.external_conversation_id,
            social_user_name: r.social_user_name,
            first_message_at: r.first_message_at,
            latest_message_at: r.latest_message_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct KeyRow {
    page_id: String,
    platform: String,
    thread_id: String,
}

#[derive(sqlx::FromRow)]
struct PageRef {
    id: String,
    client_id: Option<String>,
}

const SELECT_CONVERSATION: &str = "SELECT id, page_id, platform, thread_id, bot_enabled, \
     last_bot_message_at, last_human_message_at, last_user_message_at, bot_disabled_at, \
     message_count, external_conversation_id, social_user_name, first_message_at, \
     latest_message_at \
     FROM conversations WHERE page_id = ? AND platform = ? AND thread_id = ?";

/// SQLite-backed conversation store.
pub struct SqliteConversationStore {
    pool: SqlitePool,
    query_timeout: Duration,
    reactivate_after: Duration,
}

impl SqliteConversationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            query_timeout: crate::DEFAULT_QUERY_TIMEOUT,
            reactivate_after: DEFAULT_REACTIVATE_AFTER,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Idle time after which a human-held conversation returns to the bot.
    pub fn with_reactivation_after(mut self, idle: Duration) -> Self {
        self.reactivate_after = idle;
        self
    }

    /// Audit rows for a conversation, oldest first.
    pub async fn audit_trail(&self, key: &ConversationKey) -> Result<Vec<AuditMessage>> {
        let rows = sqlx::query_as::<_, AuditMessage>(
            "SELECT m.id, m.client_id, m.from_user, m.content, m.source, \
             m.requires_attention, m.read, m.timestamp \
             FROM messages m JOIN social_pages p ON p.id = m.page_id \
             WHERE p.page_id = ? AND m.platform = ? AND m.thread_id = ? \
             ORDER BY m.timestamp, m.rowid",
        )
        .bind(&key.page_id)
        .bind(key.platform.as_str())
        .bind(&key.thread_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn apply_state(
        &self,
        key: &ConversationKey,
        bot_enabled: bool,
        reason: &str,
        now: i64,
    ) -> Result<Transition> {
        let mut tx = self.pool.begin().await?;

        let current = current_flag(&mut tx, key).await?;
        sqlx::query(
            "UPDATE conversations SET latest_message_at = ?, message_count = message_count + 1, \
             updated_at = ? WHERE page_id = ? AND platform = ? AND thread_id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(&key.page_id)
        .bind(key.platform.as_str())
        .bind(&key.thread_id)
        .execute(&mut *tx)
        .await?;

        if current == bot_enabled {
            tx.commit().await?;
            debug!(%key, bot_enabled, "conversation state unchanged");
            return Ok(Transition::Unchanged);
        }

        let page = lookup_page(&mut tx, key).await?;
        sqlx::query(
            "UPDATE conversations SET bot_enabled = ?, bot_disabled_at = ? \
             WHERE page_id = ? AND platform = ? AND thread_id = ?",
        )
        .bind(bot_enabled)
        .bind((!bot_enabled).then_some(now))
        .bind(&key.page_id)
        .bind(key.platform.as_str())
        .bind(&key.thread_id)
        .execute(&mut *tx)
        .await?;
        insert_audit(&mut tx, &page, key, bot_enabled, reason, now).await?;
        tx.commit().await?;

        info!(%key, bot_enabled, reason, "conversation ownership changed");
        Ok(Transition::to(bot_enabled))
    }

    async fn takeover(&self, key: &ConversationKey, now: i64) -> Result<Transition> {
        let mut tx = self.pool.begin().await?;

        ensure_conversation(&mut tx, key, now).await?;
        let was_enabled = current_flag(&mut tx, key).await?;
        // Every human reply restarts the reactivation clock.
        sqlx::query(
            "UPDATE conversations SET last_human_message_at = ?, latest_message_at = ?, \
             message_count = message_count + 1, updated_at = ?, bot_enabled = 0, \
             bot_disabled_at = CASE WHEN bot_enabled = 1 THEN ? ELSE bot_disabled_at END \
             WHERE page_id = ? AND platform = ? AND thread_id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(&key.page_id)
        .bind(key.platform.as_str())
        .bind(&key.thread_id)
        .execute(&mut *tx)
        .await?;

        if !was_enabled {
            tx.commit().await?;
            debug!(%key, "human agent still holds conversation");
            return Ok(Transition::Unchanged);
        }

        let page = lookup_page(&mut tx, key).await?;
        insert_audit(&mut tx, &page, key, false, HUMAN_TAKEOVER_REASON, now).await?;
        tx.commit().await?;

        info!(%key, "human agent took over conversation");
        Ok(Transition::Disabled)
    }

    async fn touch(&self, key: &ConversationKey, column: &'static str) -> Result<()> {
        let now = unix_now();
        let sql = format!(
            "UPDATE conversations SET {column} = ?, latest_message_at = ?, updated_at = ? \
             WHERE page_id = ? AND platform = ? AND thread_id = ?"
        );
        let result = timed(
            self.query_timeout,
            sqlx::query(&sql)
                .bind(now)
                .bind(now)
                .bind(now)
                .bind(&key.page_id)
                .bind(key.platform.as_str())
                .bind(&key.thread_id)
                .execute(&self.pool),
        )
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::conversation_not_found(key));
        }
        Ok(())
    }

    async fn set_column(&self, key: &ConversationKey, column: &'static str, value: &str) -> Result<()> {
        let sql = format!(
            "UPDATE conversations SET {column} = ?, updated_at = ? \
             WHERE page_id = ? AND platform = ? AND thread_id = ?"
        );
        let result = timed(
            self.query_timeout,
            sqlx::query(&sql)
                .bind(value)
                .bind(unix_now())
                .bind(&key.page_id)
                .bind(key.platform.as_str())
                .bind(&key.thread_id)
                .execute(&self.pool),
        )
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::conversation_not_found(key));
        }
        Ok(())
    }
}

async fn ensure_conversation(
    conn: &mut SqliteConnection,
    key: &ConversationKey,
    now: i64,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO conversations \
         (page_id, platform, thread_id, bot_enabled, message_count, \
          first_message_at, latest_message_at, updated_at) \
         VALUES (?, ?, ?, 1, 0, ?, ?, ?) \
         ON CONFLICT(page_id, platform, thread_id) DO NOTHING",
    )
    .bind(&key.page_id)
    .bind(key.platform.as_str())
    .bind(&key.thread_id)
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn current_flag(conn: &mut SqliteConnection, key: &ConversationKey) -> Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT bot_enabled FROM conversations WHERE page_id = ? AND platform = ? AND thread_id = ?",
    )
    .bind(&key.page_id)
    .bind(key.platform.as_str())
    .bind(&key.thread_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::conversation_not_found(key))
}

async fn lookup_page(conn: &mut SqliteConnection, key: &ConversationKey) -> Result<PageRef> {
    let page = sqlx::query_as::<_, PageRef>(
        "SELECT id, client_id FROM social_pages WHERE page_id = ? AND platform = ?",
    )
    .bind(&key.page_id)
    .bind(key.platform.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    match page {
        Some(page) => Ok(page),
        None => {
            warn!(page_id = %key.page_id, platform = %key.platform, "no page row for audit entry");
            Err(Error::page_not_found(&key.page_id, key.platform))
        },
    }
}

async fn insert_audit(
    conn: &mut SqliteConnection,
    page: &PageRef,
    key: &ConversationKey,
    bot_enabled: bool,
    reason: &str,
    now: i64,
) -> Result<()> {
    let state = if bot_enabled { "enabled" } else { "disabled" };
    sqlx::query(
        "INSERT INTO messages \
         (id, client_id, page_id, platform, thread_id, from_user, content, source, \
          requires_attention, read, timestamp) \
         VALUES (?, ?, ?, ?, ?, 'system', ?, 'system', ?, 0, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(&page.client_id)
    .bind(&page.id)
    .bind(key.platform.as_str())
    .bind(&key.thread_id)
    .bind(format!("Bot {state}: {reason}"))
    .bind(!bot_enabled)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn get_or_create(&self, key: &ConversationKey) -> Result<Conversation> {
        timed(self.query_timeout, async {
            let mut conn = self.pool.acquire().await?;
            if ensure_conversation(&mut conn, key, unix_now()).await? {
                info!(%key, "created conversation");
            }
            let row = sqlx::query_as::<_, ConversationRow>(SELECT_CONVERSATION)
                .bind(&key.page_id)
                .bind(key.platform.as_str())
                .bind(&key.thread_id)
                .fetch_one(&mut *conn)
                .await?;
            Ok::<_, Error>(Conversation::try_from(row)?)
        })
        .await
    }

    async fn find(&self, key: &ConversationKey) -> Result<Option<Conversation>> {
        let row = timed(
            self.query_timeout,
            sqlx::query_as::<_, ConversationRow>(SELECT_CONVERSATION)
                .bind(&key.page_id)
                .bind(key.platform.as_str())
                .bind(&key.thread_id)
                .fetch_optional(&self.pool),
        )
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn update_state(
        &self,
        conversation: &Conversation,
        bot_enabled: bool,
        reason: &str,
    ) -> Result<Transition> {
        let transition = timed(
            self.query_timeout,
            self.apply_state(&conversation.key, bot_enabled, reason, unix_now()),
        )
        .await?;
        if transition == Transition::Disabled {
            counter!(routing_metrics::HANDOFFS_TOTAL, labels::REASON => reason.to_string())
                .increment(1);
        }
        Ok(transition)
    }

    async fn record_human_takeover(&self, key: &ConversationKey) -> Result<Transition> {
        let transition = timed(self.query_timeout, self.takeover(key, unix_now())).await?;
        if transition.flipped() {
            counter!(routing_metrics::HANDOFFS_TOTAL, labels::REASON => HUMAN_TAKEOVER_REASON)
                .increment(1);
        }
        Ok(transition)
    }

    async fn record_user_message(&self, key: &ConversationKey) -> Result<()> {
        self.touch(key, "last_user_message_at").await
    }

    async fn record_bot_reply(&self, key: &ConversationKey) -> Result<()> {
        self.touch(key, "last_bot_message_at").await
    }

    async fn set_external_conversation_id(
        &self,
        key: &ConversationKey,
        external_id: &str,
    ) -> Result<()> {
        self.set_column(key, "external_conversation_id", external_id)
            .await
    }

    async fn set_display_name(&self, key: &ConversationKey, name: &str) -> Result<()> {
        self.set_column(key, "social_user_name", name).await
    }

    async fn reactivation_sweep(&self, now: i64) -> Result<Vec<ConversationKey>> {
        let cutoff = now - self.reactivate_after.as_secs() as i64;
        // Idle since the later of the last human reply and the last handoff.
        let rows = timed(
            self.query_timeout,
            sqlx::query_as::<_, KeyRow>(
                "SELECT page_id, platform, thread_id FROM conversations \
                 WHERE bot_enabled = 0 \
                   AND MAX(COALESCE(last_human_message_at, 0), COALESCE(bot_disabled_at, 0)) <= ? \
                 ORDER BY id",
            )
            .bind(cutoff)
            .fetch_all(&self.pool),
        )
        .await?;

        let mut reactivated = Vec::new();
        for row in rows {
            let platform = match row.platform.parse::<Platform>() {
                Ok(p) => p,
                Err(e) => {
                    warn!(page_id = %row.page_id, error = %e, "skipping unreadable conversation");
                    continue;
                },
            };
            let key = ConversationKey::new(platform, row.page_id, row.thread_id);
            match timed(
                self.query_timeout,
                self.apply_state(&key, true, REACTIVATION_REASON, now),
            )
            .await
            {
                Ok(Transition::Enabled) => reactivated.push(key),
                Ok(_) => {},
                Err(e) => warn!(%key, error = %e, "reactivation failed"),
            }
        }

        if !reactivated.is_empty() {
            counter!(routing_metrics::REACTIVATIONS_TOTAL).increment(reactivated.len() as u64);
        }
        Ok(reactivated)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::pages::{NewPage, SqlitePageRegistry},
        secrecy::Secret,
    };

    const HOUR: i64 = 3600;

    async fn setup() -> (SqlitePool, SqliteConversationStore) {
        let pool = crate::connect_in_memory().await.unwrap();
        let registry = SqlitePageRegistry::new(pool.clone());
        for platform in [Platform::Facebook, Platform::Instagram] {
            registry
                .upsert(&NewPage {
                    page_id: "page-1".into(),
                    platform,
                    client_id: Some("client-1".into()),
                    access_token: Secret::new("token".into()),
                    ai_api_key: None,
                })
                .await
                .unwrap();
        }
        let store = SqliteConversationStore::new(pool.clone());
        (pool, store)
    }

    fn key(thread: &str) -> ConversationKey {
        ConversationKey::new(Platform::Facebook, "page-1", thread)
    }

    #[tokio::test]
    async fn get_or_create_starts_bot_enabled() {
        let (_pool, store) = setup().await;
        let conv = store.get_or_create(&key("u1")).await.unwrap();
        assert!(conv.bot_enabled);
        assert_eq!(conv.message_count, 0);
        assert!(conv.external_conversation_id.is_empty());
        assert_eq!(conv.first_message_at, conv.latest_message_at);

        let again = store.get_or_create(&key("u1")).await.unwrap();
        assert_eq!(conv.id, again.id);
    }

    #[tokio::test]
    async fn threads_are_scoped_by_platform() {
        let (_pool, store) = setup().await;
        let fb = store.get_or_create(&key("u1")).await.unwrap();
        let ig = store
            .get_or_create(&ConversationKey::new(Platform::Instagram, "page-1", "u1"))
            .await
            .unwrap();
        assert_ne!(fb.id, ig.id);
    }

    #[tokio::test]
    async fn disabling_writes_one_audit_row() {
        let (_pool, store) = setup().await;
        let conv = store.get_or_create(&key("u1")).await.unwrap();

        let t = store
            .update_state(&conv, false, "user requested human")
            .await
            .unwrap();
        assert_eq!(t, Transition::Disabled);

        let after = store.find(&key("u1")).await.unwrap().unwrap();
        assert!(!after.bot_enabled);
        assert!(after.bot_disabled_at.is_some());
        assert_eq!(after.message_count, 1);

        let audit = store.audit_trail(&key("u1")).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].content, "Bot disabled: user requested human");
        assert_eq!(audit[0].from_user, "system");
        assert_eq!(audit[0].source, "system");
        assert_eq!(audit[0].client_id.as_deref(), Some("client-1"));
        assert!(audit[0].requires_attention);
        assert!(!audit[0].read);
    }

    #[tokio::test]
    async fn same_value_updates_counters_without_audit() {
        let (_pool, store) = setup().await;
        let conv = store.get_or_create(&key("u1")).await.unwrap();

        let t = store.update_state(&conv, true, "noop").await.unwrap();
        assert_eq!(t, Transition::Unchanged);
        let t = store.update_state(&conv, true, "noop").await.unwrap();
        assert_eq!(t, Transition::Unchanged);

        let after = store.find(&key("u1")).await.unwrap().unwrap();
        assert_eq!(after.message_count, 2);
        assert!(store.audit_trail(&key("u1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_snapshot_does_not_duplicate_audit() {
        let (_pool, store) = setup().await;
        let conv = store.get_or_create(&key("u1")).await.unwrap();
        store.update_state(&conv, false, "first").await.unwrap();
        // `conv` still says bot_enabled = true.
        let t = store.update_state(&conv, false, "second").await.unwrap();
        assert_eq!(t, Transition::Unchanged);
        assert_eq!(store.audit_trail(&key("u1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn enabling_clears_disable_time_and_audits() {
        let (_pool, store) = setup().await;
        let conv = store.get_or_create(&key("u1")).await.unwrap();
        store.update_state(&conv, false, "frustrated").await.unwrap();
        let disabled = store.find(&key("u1")).await.unwrap().unwrap();

        let t = store.update_state(&disabled, true, "manual").await.unwrap();
        assert_eq!(t, Transition::Enabled);
        let after = store.find(&key("u1")).await.unwrap().unwrap();
        assert!(after.bot_enabled);
        assert_eq!(after.bot_disabled_at, None);

        let audit = store.audit_trail(&key("u1")).await.unwrap();
        assert_eq!(audit.len(), 2);
        assert_eq!(audit[1].content, "Bot enabled: manual");
        assert!(!audit[1].requires_attention);
    }

    #[tokio::test]
    async fn missing_page_rolls_back_the_flip() {
        let (_pool, store) = setup().await;
        let orphan = ConversationKey::new(Platform::Facebook, "unknown-page", "u1");
        let conv = store.get_or_create(&orphan).await.unwrap();

        let err = store.update_state(&conv, false, "x").await.unwrap_err();
        assert!(matches!(err, Error::PageNotFound { .. }));

        let after = store.find(&orphan).await.unwrap().unwrap();
        assert!(after.bot_enabled);
        assert_eq!(after.message_count, 0, "counter write must roll back too");
    }

    #[tokio::test]
    async fn update_on_unknown_conversation_fails() {
        let (_pool, store) = setup().await;
        let mut ghost = store.get_or_create(&key("u1")).await.unwrap();
        ghost.key = key("never-seen");
        let err = store.update_state(&ghost, false, "x").await.unwrap_err();
        assert!(matches!(err, Error::ConversationNotFound { .. }));
    }

    #[tokio::test]
    async fn human_takeover_disables_once() {
        let (_pool, store) = setup().await;
        store.get_or_create(&key("u1")).await.unwrap();

        assert_eq!(
            store.record_human_takeover(&key("u1")).await.unwrap(),
            Transition::Disabled
        );
        assert_eq!(
            store.record_human_takeover(&key("u1")).await.unwrap(),
            Transition::Unchanged
        );

        let conv = store.find(&key("u1")).await.unwrap().unwrap();
        assert!(!conv.bot_enabled);
        assert!(conv.last_human_message_at.is_some());
        assert_eq!(conv.message_count, 2);

        let audit = store.audit_trail(&key("u1")).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].content, "Bot disabled: human agent replied");
    }

    #[tokio::test]
    async fn human_takeover_creates_unknown_thread() {
        let (_pool, store) = setup().await;
        let t = store.record_human_takeover(&key("fresh")).await.unwrap();
        assert_eq!(t, Transition::Disabled);
        assert!(!store.find(&key("fresh")).await.unwrap().unwrap().bot_enabled);
    }

    #[tokio::test]
    async fn sweep_reactivates_idle_human_threads() {
        let (pool, store) = setup().await;
        let now = unix_now();
        for thread in ["idle", "recent"] {
            store.get_or_create(&key(thread)).await.unwrap();
            store.record_human_takeover(&key(thread)).await.unwrap();
        }
        sqlx::query("UPDATE conversations SET last_human_message_at = ? WHERE thread_id = 'idle'")
            .bind(now - 12 * HOUR)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE conversations SET last_human_message_at = ? WHERE thread_id = 'recent'")
            .bind(now - 11 * HOUR)
            .execute(&pool)
            .await
            .unwrap();

        let reactivated = store.reactivation_sweep(now).await.unwrap();
        assert_eq!(reactivated, vec![key("idle")]);

        assert!(store.find(&key("idle")).await.unwrap().unwrap().bot_enabled);
        assert!(!store.find(&key("recent")).await.unwrap().unwrap().bot_enabled);

        let audit = store.audit_trail(&key("idle")).await.unwrap();
        assert_eq!(
            audit.last().unwrap().content,
            "Bot enabled: bot reactivated after human inactivity"
        );

        // A second pass finds nothing.
        assert!(store.reactivation_sweep(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_uses_disable_time_without_human_reply() {
        let (pool, store) = setup().await;
        let now = unix_now();
        let conv = store.get_or_create(&key("asked")).await.unwrap();
        store
            .update_state(&conv, false, "user requested human")
            .await
            .unwrap();
        sqlx::query("UPDATE conversations SET bot_disabled_at = ? WHERE thread_id = 'asked'")
            .bind(now - 13 * HOUR)
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(store.reactivation_sweep(now).await.unwrap(), vec![key("asked")]);
    }

    #[tokio::test]
    async fn fresh_handoff_outlives_an_old_human_reply() {
        let (pool, store) = setup().await;
        let now = unix_now();
        store.record_human_takeover(&key("u1")).await.unwrap();
        sqlx::query("UPDATE conversations SET last_human_message_at = ?, bot_disabled_at = ?")
            .bind(now - 13 * HOUR)
            .bind(now - 13 * HOUR)
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(store.reactivation_sweep(now).await.unwrap(), vec![key("u1")]);

        let conv = store.find(&key("u1")).await.unwrap().unwrap();
        store
            .update_state(&conv, false, "user requested human")
            .await
            .unwrap();

        assert!(store.reactivation_sweep(now + 5).await.unwrap().is_empty());
        assert!(!store.find(&key("u1")).await.unwrap().unwrap().bot_enabled);
        assert_eq!(
            store.reactivation_sweep(now + 13 * HOUR).await.unwrap(),
            vec![key("u1")]
        );
    }

    #[tokio::test]
    async fn sweep_window_is_configurable() {
        let (pool, store) = setup().await;
        let store = SqliteConversationStore::new(pool.clone())
            .with_reactivation_after(Duration::from_secs(60));
        let now = unix_now();
        store.get_or_create(&key("u1")).await.unwrap();
        store.record_human_takeover(&key("u1")).await.unwrap();
        assert!(store.reactivation_sweep(now).await.unwrap().is_empty());
        assert_eq!(
            store.reactivation_sweep(now + 120).await.unwrap(),
            vec![key("u1")]
        );
    }

    #[tokio::test]
    async fn external_id_and_display_name_persist() {
        let (_pool, store) = setup().await;
        store.get_or_create(&key("u1")).await.unwrap();
        store
            .set_external_conversation_id(&key("u1"), "conv-abc")
            .await
            .unwrap();
        store.set_display_name(&key("u1"), "Ana").await.unwrap();
        store.record_user_message(&key("u1")).await.unwrap();
        store.record_bot_reply(&key("u1")).await.unwrap();

        let conv = store.find(&key("u1")).await.unwrap().unwrap();
        assert_eq!(conv.external_conversation_id, "conv-abc");
        assert_eq!(conv.social_user_name.as_deref(), Some("Ana"));
        assert!(conv.last_user_message_at.is_some());
        assert!(conv.last_bot_message_at.is_some());
    }

    #[tokio::test]
    async fn setters_report_unknown_conversation() {
        let (_pool, store) = setup().await;
        let err = store
            .set_external_conversation_id(&key("nobody"), "c")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConversationNotFound { .. }));
    }
}
