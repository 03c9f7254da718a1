use {
    clap::Subcommand,
    handoff_common::Platform,
    handoff_config::HandoffConfig,
    handoff_store::{NewPage, SqlitePageRegistry},
    secrecy::Secret,
};

use crate::db_commands;

#[derive(Subcommand)]
pub enum PagesAction {
    /// Register a page, or refresh its credentials.
    Add {
        /// Facebook page id or Instagram account id.
        page_id: String,
        /// facebook or instagram.
        #[arg(long)]
        platform: Platform,
        /// Page access token used for sends and profile lookups.
        #[arg(long, env = "HANDOFF_PAGE_TOKEN")]
        access_token: String,
        /// AI backend key for this page.
        #[arg(long, env = "HANDOFF_AI_API_KEY")]
        ai_api_key: Option<String>,
        /// Tenant the page belongs to.
        #[arg(long)]
        client_id: Option<String>,
    },
    /// List registered pages.
    List,
    /// Stop routing a page.
    Remove {
        page_id: String,
        #[arg(long)]
        platform: Platform,
    },
}

pub async fn handle_pages(action: PagesAction, config: &HandoffConfig) -> anyhow::Result<()> {
    let registry = SqlitePageRegistry::new(db_commands::open(config).await?);

    match action {
        PagesAction::Add {
            page_id,
            platform,
            access_token,
            ai_api_key,
            client_id,
        } => {
            let id = registry
                .upsert(&NewPage {
                    page_id: page_id.clone(),
                    platform,
                    client_id,
                    access_token: Secret::new(access_token),
                    ai_api_key: ai_api_key.map(Secret::new),
                })
                .await?;
            println!("Registered {platform} page {page_id} ({id})");
        },
        PagesAction::List => {
            let pages = registry.list().await?;
            if pages.is_empty() {
                println!("No pages registered.");
            }
            for page in &pages {
                println!(
                    "  {:<10} {:<20} {:<8} client={} ai_key={}",
                    page.platform,
                    page.page_id,
                    page.status,
                    page.client_id.as_deref().unwrap_or("-"),
                    if page.has_api_key { "yes" } else { "no" },
                );
            }
        },
        PagesAction::Remove { page_id, platform } => {
            if registry.deactivate(&page_id, platform).await? {
                println!("Deactivated {platform} page {page_id}");
            } else {
                println!("No {platform} page {page_id} registered.");
            }
        },
    }
    Ok(())
}
