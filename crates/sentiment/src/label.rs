use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    General,
    NeedHuman,
    Frustrated,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::NeedHuman => "need_human",
            Self::Frustrated => "frustrated",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduce a free-form model reply to one of the three labels.
///
/// The reply is lower-cased, stripped of quotes and periods, and cut to its
/// first word, then matched against the known spellings of each label.
pub fn normalize_label(raw: &str) -> Result<Sentiment> {
    let cleaned: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '"' | '\'' | '.'))
        .collect();
    let word = cleaned
        .split(' ')
        .next()
        .and_then(|w| w.split('\n').next())
        .unwrap_or_default();

    match word {
        "general" | "normal" | "neutral" | "regular" => Ok(Sentiment::General),
        "need_human" | "needhuman" | "human" | "agent" | "need-human" | "need_human_help" => {
            Ok(Sentiment::NeedHuman)
        },
        "frustrated" | "angry" | "upset" | "mad" | "annoyed" | "irritated" => {
            Ok(Sentiment::Frustrated)
        },
        _ => Err(Error::unexpected_label(raw.trim())),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("general", Sentiment::General)]
    #[case("General.", Sentiment::General)]
    #[case("\"neutral\"", Sentiment::General)]
    #[case("  regular  ", Sentiment::General)]
    #[case("need_human", Sentiment::NeedHuman)]
    #[case("'Need-Human'", Sentiment::NeedHuman)]
    #[case("AGENT please", Sentiment::NeedHuman)]
    #[case("need_human_help", Sentiment::NeedHuman)]
    #[case("frustrated\nthe user is angry", Sentiment::Frustrated)]
    #[case("Annoyed.", Sentiment::Frustrated)]
    fn maps_known_spellings(#[case] raw: &str, #[case] expected: Sentiment) {
        assert_eq!(normalize_label(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("happy")]
    #[case("I think general")]
    fn rejects_unknown_replies(#[case] raw: &str) {
        assert!(matches!(
            normalize_label(raw),
            Err(Error::UnexpectedLabel { .. })
        ));
    }
}
