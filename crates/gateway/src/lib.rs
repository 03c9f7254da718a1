//! HTTP gateway: Messenger Platform webhook, backend and dashboard hooks,
//! health and Prometheus metrics.
//!
//! Lifecycle:
//! 1. Connect the store and run migrations
//! 2. Build clients, the routing pipeline and the worker queue
//! 3. Serve until SIGINT/SIGTERM, then drain queued batches

pub mod admin;
pub mod metrics_routes;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod webhook;

pub use {
    server::{build_app, start_gateway},
    state::{AppState, GatewayState},
};
