mod db_commands;
mod doctor_commands;
mod pages_commands;

use {
    clap::{Parser, Subcommand},
    handoff_config::HandoffConfig,
    handoff_metrics::MetricsRecorderConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "handoff", about = "handoff, Messenger and Instagram DM router")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Custom config directory (overrides the per-user default).
    #[arg(long, global = true, env = "HANDOFF_CONFIG_DIR")]
    config_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway,
    /// Run one reactivation sweep and print how many conversations it restored.
    Sweep,
    /// Database management.
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
    /// Config validation and environment checks.
    Doctor,
    /// Page registry management.
    Pages {
        #[command(subcommand)]
        action: pages_commands::PagesAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load config once, with CLI overrides applied.
fn load_config(cli: &Cli) -> HandoffConfig {
    if let Some(ref dir) = cli.config_dir {
        handoff_config::set_config_dir(dir.clone());
    }
    let mut config = handoff_config::discover_and_load();
    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "handoff starting");
    let config = load_config(&cli);

    match cli.command {
        None | Some(Commands::Gateway) => {
            let metrics_handle = handoff_metrics::init_metrics(MetricsRecorderConfig {
                enabled: config.metrics.enabled,
                global_labels: config
                    .metrics
                    .labels
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            })?;
            handoff_gateway::start_gateway(&config, metrics_handle).await
        },
        Some(Commands::Sweep) => db_commands::sweep(&config).await,
        Some(Commands::Db { action }) => db_commands::handle_db(action, &config).await,
        Some(Commands::Doctor) => doctor_commands::handle_doctor(&config).await,
        Some(Commands::Pages { action }) => pages_commands::handle_pages(action, &config).await,
    }
}
