use std::time::Duration;

use {
    clap::Subcommand,
    handoff_common::unix_now,
    handoff_config::HandoffConfig,
    handoff_store::{ConversationStore, SqliteConversationStore, run_migrations},
    sqlx::SqlitePool,
};

#[derive(Subcommand)]
pub enum DbAction {
    /// Run all pending database migrations.
    Migrate,
}

pub async fn handle_db(action: DbAction, config: &HandoffConfig) -> anyhow::Result<()> {
    match action {
        DbAction::Migrate => {
            open(config).await?;
            println!("Migrations applied to {}", config.database.url);
            Ok(())
        },
    }
}

/// Connect and bring the schema up to date.
pub async fn open(config: &HandoffConfig) -> anyhow::Result<SqlitePool> {
    let pool = handoff_store::connect(&config.database.url, config.database.max_connections).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Same sweep the gateway runs per batch, on demand.
pub async fn sweep(config: &HandoffConfig) -> anyhow::Result<()> {
    let pool = open(config).await?;
    let store = SqliteConversationStore::new(pool)
        .with_query_timeout(Duration::from_secs(config.database.query_timeout_secs))
        .with_reactivation_after(Duration::from_secs(
            config.routing.reactivation_after_hours * 3600,
        ));
    let restored = store.reactivation_sweep(unix_now()).await?;
    for key in &restored {
        println!("  {key}");
    }
    println!("Reactivated {} conversation(s).", restored.len());
    Ok(())
}
