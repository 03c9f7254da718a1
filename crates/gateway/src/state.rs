use std::sync::Arc;

use {
    handoff_messenger::PlatformSender,
    handoff_metrics::MetricsHandle,
    handoff_routing::{BatchQueue, BotEchoFlags},
    handoff_store::PageRegistry,
    secrecy::Secret,
};

/// Long-lived handles shared by every request.
pub struct GatewayState {
    pub queue: BatchQueue,
    pub echo_flags: BotEchoFlags,
    pub pages: Arc<dyn PageRegistry>,
    pub sender: Arc<dyn PlatformSender>,
    /// Signs webhook bodies. Without it every POST is refused.
    pub app_secret: Option<Secret<String>>,
    pub verify_token: Option<Secret<String>>,
    /// Bearer token for `/send-message`; open when unset.
    pub admin_token: Option<Secret<String>>,
    pub metrics_handle: Option<MetricsHandle>,
    pub version: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayState>,
}
