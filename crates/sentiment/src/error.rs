use {handoff_common::FromMessage, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("classifier api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("classifier response has no choices")]
    NoChoices,

    #[error("classifier replied with unexpected label {raw:?}")]
    UnexpectedLabel { raw: String },

    #[error("classifier api key is not configured")]
    NotConfigured,

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn api(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        Self::Api {
            status: status.as_u16(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn unexpected_label(raw: impl Into<String>) -> Self {
        Self::UnexpectedLabel { raw: raw.into() }
    }

    /// Metric label for the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(e) if e.is_timeout() => "timeout",
            Self::Transport(_) => "transport",
            Self::Api { .. } => "api",
            Self::NoChoices => "no_choices",
            Self::UnexpectedLabel { .. } => "unexpected_label",
            Self::NotConfigured => "not_configured",
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
