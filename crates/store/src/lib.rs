//! Relational persistence for conversation routing state.
//!
//! Three tables: `social_pages` (tenant page registry), `conversations`
//! (who currently answers each thread), and `messages` (audit trail of
//! ownership changes). Every lookup is keyed by page id *and* platform.

pub mod conversation;
pub mod error;
pub mod pages;

use std::{future::Future, str::FromStr, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

pub use {
    conversation::{
        AuditMessage, Conversation, ConversationStore, HUMAN_TAKEOVER_REASON,
        REACTIVATION_REASON, SqliteConversationStore, Transition,
    },
    error::{Error, Result},
    pages::{NewPage, PageRegistry, PageSummary, SqlitePageRegistry},
};

pub(crate) const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Run database migrations for the store.
///
/// Creates the `social_pages`, `conversations` and `messages` tables.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Open a pool for `url`, creating the database file if needed.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Single-connection in-memory database with migrations applied.
#[doc(hidden)]
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Bound a store call by `timeout`.
pub(crate) async fn timed<T, E>(
    timeout: Duration,
    fut: impl Future<Output = std::result::Result<T, E>>,
) -> Result<T>
where
    Error: From<E>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(Error::from),
        Err(_) => Err(Error::Timeout(timeout)),
    }
}
