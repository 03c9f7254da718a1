use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    axum::{
        Router,
        extract::State,
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    handoff_assistant::DifyClient,
    handoff_common::{ConversationKey, MemoryTtlStore},
    handoff_config::HandoffConfig,
    handoff_messenger::{GraphProfileLookup, GraphSender, PlatformSender, ProfileCache, ProfileKey},
    handoff_metrics::MetricsHandle,
    handoff_routing::{BatchQueue, BotEchoFlags, Pipeline, PipelineDeps},
    handoff_sentiment::FireworksClassifier,
    handoff_store::{PageRegistry, SqliteConversationStore, SqlitePageRegistry},
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{info, warn},
};

use crate::{
    admin::{mark_bot_response_handler, send_message_handler},
    metrics_routes::prometheus_metrics_handler,
    shutdown::install_signal_handler,
    state::{AppState, GatewayState},
    webhook::{event_handler, verify_handler},
};

const HOURS: u64 = 3600;

/// Build the router (shared between production startup and tests).
pub fn build_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/webhook", get(verify_handler).post(event_handler))
        .route("/api/mark-bot-response", post(mark_bot_response_handler))
        .route("/send-message", post(send_message_handler))
        .route("/metrics", get(prometheus_metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { gateway: state })
}

/// Wire every component from `config`, serve until a shutdown signal, then
/// let queued batches finish.
pub async fn start_gateway(
    config: &HandoffConfig,
    metrics_handle: Option<MetricsHandle>,
) -> anyhow::Result<()> {
    let query_timeout = Duration::from_secs(config.database.query_timeout_secs);
    let pool = handoff_store::connect(&config.database.url, config.database.max_connections).await?;
    handoff_store::run_migrations(&pool).await?;

    let store = Arc::new(
        SqliteConversationStore::new(pool.clone())
            .with_query_timeout(query_timeout)
            .with_reactivation_after(Duration::from_secs(
                config.routing.reactivation_after_hours * HOURS,
            )),
    );
    let pages: Arc<dyn PageRegistry> =
        Arc::new(SqlitePageRegistry::new(pool).with_query_timeout(query_timeout));

    let meta = &config.meta;
    let http_timeout = Duration::from_secs(meta.http_timeout_secs);
    let sender: Arc<dyn PlatformSender> = Arc::new(GraphSender::new(
        &meta.graph_base_url,
        &meta.send_api_version,
        http_timeout,
    )?);
    let profiles = Arc::new(ProfileCache::new(
        Arc::new(GraphProfileLookup::new(
            &meta.graph_base_url,
            &meta.profile_api_version,
            http_timeout,
        )?),
        Arc::new(MemoryTtlStore::<ProfileKey, String>::new()),
        Duration::from_secs(config.routing.profile_ttl_hours * HOURS),
    ));
    let echo_flags = BotEchoFlags::new(
        Arc::new(MemoryTtlStore::<ConversationKey, u32>::new()),
        Duration::from_secs(config.routing.echo_flag_ttl_secs),
    );

    if config.sentiment.api_key.is_none() {
        warn!("sentiment api key not set, every message will route as general");
    }
    if meta.app_secret.is_none() {
        warn!("meta.app_secret not set, webhook events will be refused");
    }

    let pipeline = Arc::new(Pipeline::new(PipelineDeps {
        store,
        pages: Arc::clone(&pages),
        sender: Arc::clone(&sender),
        classifier: Arc::new(FireworksClassifier::from_config(&config.sentiment)?),
        assistant: Arc::new(DifyClient::from_config(&config.assistant)?),
        profiles,
        echo_flags: echo_flags.clone(),
        own_app_id: meta.app_id.clone(),
        replies: config.replies.clone(),
    }));
    let (queue, worker) = BatchQueue::start(
        pipeline,
        config.routing.queue_capacity,
        config.routing.max_in_flight,
    );

    let state = Arc::new(GatewayState {
        queue,
        echo_flags,
        pages,
        sender,
        app_secret: meta.app_secret.clone(),
        verify_token: meta.verify_token.clone(),
        admin_token: config.admin.api_token.clone(),
        metrics_handle,
        version: env!("CARGO_PKG_VERSION"),
    });
    let app = build_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "handoff gateway listening");

    let shutdown = install_signal_handler();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    // The router owned the last queue sender; the worker now drains and exits.
    info!("http server stopped, waiting for queued batches");
    worker.await?;
    info!("shutdown complete");
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "message": "handoff message router is running",
        "version": state.gateway.version,
    }))
}
