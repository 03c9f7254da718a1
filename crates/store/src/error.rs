use std::time::Duration;

use {
    handoff_common::{ConversationKey, FromMessage, Platform},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Common(#[from] handoff_common::Error),

    /// Page lookups always go by `(page_id, platform)`; a page id alone is not unique.
    #[error("no active page {page_id} on {platform}")]
    PageNotFound { page_id: String, platform: Platform },

    #[error("conversation {key} does not exist")]
    ConversationNotFound { key: ConversationKey },

    #[error("page {page_id} on {platform} has no assistant api key")]
    MissingApiKey { page_id: String, platform: Platform },

    #[error("store call exceeded {0:?}")]
    Timeout(Duration),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn page_not_found(page_id: impl Into<String>, platform: Platform) -> Self {
        Self::PageNotFound {
            page_id: page_id.into(),
            platform,
        }
    }

    #[must_use]
    pub fn conversation_not_found(key: &ConversationKey) -> Self {
        Self::ConversationNotFound { key: key.clone() }
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
