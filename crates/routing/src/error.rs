use {handoff_common::FromMessage, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] handoff_store::Error),

    #[error(transparent)]
    Messenger(#[from] handoff_messenger::Error),

    /// Every queue slot is taken; the webhook should be redelivered later.
    #[error("processing queue is full")]
    QueueFull,

    #[error("processing queue is shut down")]
    QueueClosed,

    #[error("{message}")]
    Message { message: String },
}

impl Error {
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
