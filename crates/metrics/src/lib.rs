//! Metrics collection and export for handoff.
//!
//! Code records through the `metrics` facade; with the `prometheus` feature
//! the gateway renders everything on `/metrics`.
//!
//! ```rust,ignore
//! use handoff_metrics::{counter, labels, routing};
//!
//! counter!(routing::HANDOFFS_TOTAL, labels::REASON => "frustrated").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
