//! Identity types shared by every stage of the pipeline.

use std::time::{SystemTime, UNIX_EPOCH};

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

use crate::error::{Error, Result};

/// Messaging platform a page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
        }
    }

    /// Map a webhook envelope `object` to a platform.
    ///
    /// Facebook pages arrive with object type `page`.
    pub fn from_object(object: &str) -> Option<Self> {
        match object {
            "page" | "facebook" => Some(Self::Facebook),
            "instagram" => Some(Self::Instagram),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_object(&s.to_lowercase()).ok_or_else(|| Error::unsupported_platform(s))
    }
}

/// Identity of one end-user thread on one page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub platform: Platform,
    pub page_id: String,
    pub thread_id: String,
}

impl ConversationKey {
    pub fn new(platform: Platform, page_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            platform,
            page_id: page_id.into(),
            thread_id: thread_id.into(),
        }
    }

    /// Parse the `<pageID>-<userID>` form the AI backend uses in callbacks.
    ///
    /// Platform ids are numeric, so the first `-` is the separator.
    pub fn parse_joined(platform: Platform, joined: &str) -> Result<Self> {
        match joined.split_once('-') {
            Some((page_id, thread_id))
                if !page_id.is_empty() && !thread_id.is_empty() && !thread_id.contains('-') =>
            {
                Ok(Self::new(platform, page_id, thread_id))
            },
            _ => Err(Error::malformed_conversation_id(joined)),
        }
    }

    /// `<pageID>-<threadID>`, the stable user identifier sent to the AI backend.
    pub fn joined(&self) -> String {
        format!("{}-{}", self.page_id, self.thread_id)
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.platform, self.page_id, self.thread_id)
    }
}

/// Credentials for one page, fetched from the registry per dispatch.
#[derive(Clone)]
pub struct PageInfo {
    pub platform: Platform,
    pub page_id: String,
    pub access_token: Secret<String>,
}

impl std::fmt::Debug for PageInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageInfo")
            .field("platform", &self.platform)
            .field("page_id", &self.page_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_object_is_facebook() {
        assert_eq!(Platform::from_object("page"), Some(Platform::Facebook));
        assert_eq!(Platform::from_object("instagram"), Some(Platform::Instagram));
        assert_eq!(Platform::from_object("whatsapp_business_account"), None);
    }

    #[test]
    fn platform_from_str_is_case_insensitive() {
        assert_eq!("Instagram".parse::<Platform>().unwrap(), Platform::Instagram);
        assert_eq!("PAGE".parse::<Platform>().unwrap(), Platform::Facebook);
        assert!("telegram".parse::<Platform>().is_err());
    }

    #[test]
    fn parse_joined_splits_on_first_dash() {
        let key = ConversationKey::parse_joined(Platform::Instagram, "1784-9921").unwrap();
        assert_eq!(key.page_id, "1784");
        assert_eq!(key.thread_id, "9921");
        assert_eq!(key.joined(), "1784-9921");
    }

    #[test]
    fn parse_joined_rejects_ambiguous_ids() {
        for bad in ["", "1784", "-9921", "1784-", "1-2-3"] {
            assert!(
                ConversationKey::parse_joined(Platform::Instagram, bad).is_err(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn keys_differ_by_platform() {
        let fb = ConversationKey::new(Platform::Facebook, "1", "2");
        let ig = ConversationKey::new(Platform::Instagram, "1", "2");
        assert_ne!(fb, ig);
        assert_eq!(fb.to_string(), "facebook:1:2");
    }
}
