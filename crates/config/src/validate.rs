//! Semantic checks on a loaded configuration.
//!
//! Parsing already rejects type errors; this pass reports settings that
//! parse fine but leave the router unable to verify, classify, or answer.

use secrecy::ExposeSecret;

use crate::schema::HandoffConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "missing-secret", "range", "url", "security"
    pub category: &'static str,
    /// Dotted path, e.g. "meta.app_secret"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

fn secret_is_blank(secret: Option<&secrecy::Secret<String>>) -> bool {
    secret.is_none_or(|s| s.expose_secret().trim().is_empty())
}

/// Validate a loaded config.
pub fn validate(config: &HandoffConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if secret_is_blank(config.meta.app_secret.as_ref()) {
        result.push(
            Severity::Error,
            "missing-secret",
            "meta.app_secret",
            "webhook signatures cannot be verified; every delivery will be rejected",
        );
    }
    if secret_is_blank(config.meta.verify_token.as_ref()) {
        result.push(
            Severity::Error,
            "missing-secret",
            "meta.verify_token",
            "the subscription handshake will always be refused",
        );
    }
    if secret_is_blank(config.sentiment.api_key.as_ref()) {
        result.push(
            Severity::Warning,
            "missing-secret",
            "sentiment.api_key",
            "classifier calls will fail and every message routes as general",
        );
    }
    if config.meta.app_id.trim().is_empty() {
        result.push(
            Severity::Error,
            "range",
            "meta.app_id",
            "own echoes cannot be recognised without the application id",
        );
    }

    for (path, url) in [
        ("meta.graph_base_url", &config.meta.graph_base_url),
        ("assistant.base_url", &config.assistant.base_url),
        ("sentiment.base_url", &config.sentiment.base_url),
    ] {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            result.push(
                Severity::Error,
                "url",
                path,
                format!("'{url}' is not an http(s) URL"),
            );
        } else if url.starts_with("http://") {
            result.push(
                Severity::Warning,
                "security",
                path,
                "plain http sends tokens unencrypted",
            );
        }
    }

    for (path, value) in [
        ("routing.queue_capacity", config.routing.queue_capacity),
        ("routing.max_in_flight", config.routing.max_in_flight),
    ] {
        if value == 0 {
            result.push(Severity::Error, "range", path, "must be at least 1");
        }
    }
    if config.assistant.max_attempts == 0 {
        result.push(
            Severity::Error,
            "range",
            "assistant.max_attempts",
            "must be at least 1",
        );
    }
    if config.database.max_connections == 0 {
        result.push(
            Severity::Error,
            "range",
            "database.max_connections",
            "must be at least 1",
        );
    }
    if config.routing.reactivation_after_hours == 0 {
        result.push(
            Severity::Warning,
            "range",
            "routing.reactivation_after_hours",
            "human-held conversations are handed back on the next webhook",
        );
    }
    if secret_is_blank(config.admin.api_token.as_ref()) {
        result.push(
            Severity::Info,
            "security",
            "admin.api_token",
            "/send-message accepts unauthenticated requests",
        );
    }

    result
}
