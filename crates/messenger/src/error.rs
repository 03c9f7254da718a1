use {handoff_common::FromMessage, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The Graph API answered with a non-success status.
    #[error("graph api returned {status}: {body}")]
    Send { status: u16, body: String },

    #[error("profile lookup failed: {message}")]
    Profile { message: String },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn send(status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        Self::Send {
            status: status.as_u16(),
            body: body.into(),
        }
    }

    #[must_use]
    pub fn profile(message: impl Into<String>) -> Self {
        Self::Profile {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
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
