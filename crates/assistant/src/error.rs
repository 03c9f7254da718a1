use {handoff_common::FromMessage, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// Structured error answered by the backend. Never retried.
    #[error("assistant backend returned {status}: {message} (code: {code})")]
    Backend {
        status: u16,
        code: String,
        message: String,
    },

    #[error("assistant backend returned an empty answer")]
    EmptyAnswer,

    #[error("assistant unreachable after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn backend(
        status: reqwest::StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            status: status.as_u16(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// Connection failures and timeouts are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connect() || e.is_timeout())
    }

    /// Metric label for the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Backend { .. } => "backend",
            Self::EmptyAnswer => "empty_answer",
            Self::Exhausted { .. } => "exhausted",
            Self::Message { .. } => "other",
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

handoff_common::impl_context!();
