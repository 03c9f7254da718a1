//! Metric name and label definitions.
//!
//! Every metric the router emits is named here so dashboards and the code
//! agree on spelling.

/// Webhook intake metrics
pub mod webhook {
    /// Webhook POSTs accepted and queued
    pub const ACCEPTED_TOTAL: &str = "handoff_webhook_accepted_total";
    /// Webhook POSTs rejected at the boundary (label `reason`)
    pub const REJECTED_TOTAL: &str = "handoff_webhook_rejected_total";
    /// Subscription handshakes (label `success`)
    pub const VERIFICATIONS_TOTAL: &str = "handoff_webhook_verifications_total";
    /// Messaging records dropped by the filter (label `reason`)
    pub const RECORDS_FILTERED_TOTAL: &str = "handoff_webhook_records_filtered_total";
}

/// Worker queue metrics
pub mod queue {
    /// Batches refused because the queue was full
    pub const REJECTED_TOTAL: &str = "handoff_queue_rejected_total";
    /// Batches currently being processed
    pub const IN_FLIGHT: &str = "handoff_queue_in_flight";
    /// Wall time to process one batch, in seconds
    pub const BATCH_DURATION_SECONDS: &str = "handoff_queue_batch_duration_seconds";
}

/// Echo classification and conversation ownership
pub mod routing {
    /// Echo outcomes (label `outcome`: bot, human, unknown)
    pub const ECHOES_TOTAL: &str = "handoff_routing_echoes_total";
    /// Conversations handed to a human (label `reason`)
    pub const HANDOFFS_TOTAL: &str = "handoff_routing_handoffs_total";
    /// Conversations handed back to the bot by the sweep
    pub const REACTIVATIONS_TOTAL: &str = "handoff_routing_reactivations_total";
    /// Messages skipped because a human holds the conversation
    pub const BOT_DISABLED_SKIPS_TOTAL: &str = "handoff_routing_bot_disabled_skips_total";
}

/// Intent classifier metrics
pub mod sentiment {
    /// Classifications by label (label `label`)
    pub const CLASSIFICATIONS_TOTAL: &str = "handoff_sentiment_classifications_total";
    /// Classifier failures that fell back to general
    pub const ERRORS_TOTAL: &str = "handoff_sentiment_errors_total";
    /// Classifier latency in seconds
    pub const DURATION_SECONDS: &str = "handoff_sentiment_duration_seconds";
}

/// AI backend metrics
pub mod assistant {
    /// HTTP attempts made, retries included
    pub const ATTEMPTS_TOTAL: &str = "handoff_assistant_attempts_total";
    /// Dispatches that ended in the fallback handoff (label `error_type`)
    pub const FAILURES_TOTAL: &str = "handoff_assistant_failures_total";
    /// End-to-end dispatch latency in seconds
    pub const DURATION_SECONDS: &str = "handoff_assistant_duration_seconds";
}

/// Outbound platform metrics
pub mod platform {
    /// Messages sent (labels `platform`, `success`)
    pub const SENDS_TOTAL: &str = "handoff_platform_sends_total";
    /// Profile lookups (label `outcome`: hit, miss, error)
    pub const PROFILE_LOOKUPS_TOTAL: &str = "handoff_platform_profile_lookups_total";
}

/// Common label keys used across metrics
pub mod labels {
    pub const REASON: &str = "reason";
    pub const SUCCESS: &str = "success";
    pub const OUTCOME: &str = "outcome";
    pub const LABEL: &str = "label";
    pub const PLATFORM: &str = "platform";
    pub const ERROR_TYPE: &str = "error_type";
}

/// Histogram buckets
pub mod buckets {
    /// External API latency, 10ms to 60s
    pub const EXTERNAL_DURATION: &[f64] = &[
        0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0,
    ];

    /// Whole-batch processing time, 10ms to 2 minutes
    pub const BATCH_DURATION: &[f64] = &[
        0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
    ];
}
