//! Support buckets with fixed thresholds
//!
//! Two derivations feed the same five buckets:
//! - averaged interaction scores (`from_score`)
//! - categorical contact tags (`from_tag`), a fixed English keyword heuristic

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{StoreError, ValidationCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportCategory {
    StrongSupport,
    LikelySupport,
    Undecided,
    LikelyOppose,
    StrongOppose,
    Unknown,
}

/// Keyword groups checked in order. Oppose groups come first so affiliation
/// tags like "Non-Supporter" never land in a support bucket.
const STRONG_OPPOSE_KEYWORDS: &[&str] = &["strong_oppose", "strongoppose", "opposed", "oppose"];
const LIKELY_OPPOSE_KEYWORDS: &[&str] = &[
    "likely_oppose",
    "likelyoppose",
    "non_supporter",
    "nonsupporter",
    "non-supporter",
    "liberal",
    "ndp",
    "green",
];
const STRONG_SUPPORT_KEYWORDS: &[&str] = &["strong_support", "strongsupport"];
const LIKELY_SUPPORT_KEYWORDS: &[&str] = &[
    "likely_support",
    "likelysupport",
    "supporter",
    "member",
    "donor",
    "volunteer",
    "board",
    "lapsed",
];

impl SupportCategory {
    /// The five scored buckets, strongest support first
    pub const SCORED: [SupportCategory; 5] = [
        SupportCategory::StrongSupport,
        SupportCategory::LikelySupport,
        SupportCategory::Undecided,
        SupportCategory::LikelyOppose,
        SupportCategory::StrongOppose,
    ];

    /// Bucket for a rounded average support score
    pub fn from_score(score: i64) -> Self {
        if score >= 80 {
            SupportCategory::StrongSupport
        } else if score >= 60 {
            SupportCategory::LikelySupport
        } else if score >= 40 {
            SupportCategory::Undecided
        } else if score >= 20 {
            SupportCategory::LikelyOppose
        } else {
            SupportCategory::StrongOppose
        }
    }

    pub fn from_optional_score(score: Option<i64>) -> Self {
        score.map_or(SupportCategory::Unknown, Self::from_score)
    }

    /// Inclusive score range; `None` for `Unknown`
    pub fn score_range(&self) -> Option<(i64, i64)> {
        match self {
            SupportCategory::StrongSupport => Some((80, 100)),
            SupportCategory::LikelySupport => Some((60, 79)),
            SupportCategory::Undecided => Some((40, 59)),
            SupportCategory::LikelyOppose => Some((20, 39)),
            SupportCategory::StrongOppose => Some((0, 19)),
            SupportCategory::Unknown => None,
        }
    }

    /// Map one contact tag to a bucket. `None` means "try the next tag".
    pub fn from_tag(tag: &str) -> Option<Self> {
        let raw = tag.to_lowercase();
        let normalized = raw.split_whitespace().collect::<Vec<_>>().join("_");
        let hit = |keywords: &[&str]| {
            keywords
                .iter()
                .any(|k| normalized.contains(k) || raw.contains(k))
        };

        if hit(STRONG_OPPOSE_KEYWORDS) {
            return Some(SupportCategory::StrongOppose);
        }
        if hit(LIKELY_OPPOSE_KEYWORDS) {
            return Some(SupportCategory::LikelyOppose);
        }
        if hit(STRONG_SUPPORT_KEYWORDS) {
            return Some(SupportCategory::StrongSupport);
        }
        if hit(LIKELY_SUPPORT_KEYWORDS) {
            return Some(SupportCategory::LikelySupport);
        }
        if raw.trim() == "undecided" {
            return Some(SupportCategory::Undecided);
        }
        None
    }

    /// First tag that maps to a bucket wins
    pub fn from_tags<'a>(tags: impl IntoIterator<Item = &'a String>) -> Option<Self> {
        tags.into_iter().find_map(|tag| Self::from_tag(tag))
    }

    pub fn is_support(&self) -> bool {
        matches!(self, SupportCategory::StrongSupport | SupportCategory::LikelySupport)
    }

    pub fn is_oppose(&self) -> bool {
        matches!(self, SupportCategory::StrongOppose | SupportCategory::LikelyOppose)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SupportCategory::StrongSupport => "strong_support",
            SupportCategory::LikelySupport => "likely_support",
            SupportCategory::Undecided => "undecided",
            SupportCategory::LikelyOppose => "likely_oppose",
            SupportCategory::StrongOppose => "strong_oppose",
            SupportCategory::Unknown => "unknown",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SupportCategory::StrongSupport => "Strong Support",
            SupportCategory::LikelySupport => "Likely Support",
            SupportCategory::Undecided => "Undecided",
            SupportCategory::LikelyOppose => "Likely Oppose",
            SupportCategory::StrongOppose => "Strong Oppose",
            SupportCategory::Unknown => "Unknown",
        }
    }
}

impl FromStr for SupportCategory {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strong_support" => Ok(SupportCategory::StrongSupport),
            "likely_support" => Ok(SupportCategory::LikelySupport),
            "undecided" => Ok(SupportCategory::Undecided),
            "likely_oppose" => Ok(SupportCategory::LikelyOppose),
            "strong_oppose" => Ok(SupportCategory::StrongOppose),
            "unknown" => Ok(SupportCategory::Unknown),
            other => Err(StoreError::validation(
                ValidationCode::InvalidSupportCategory,
                format!("unknown support category '{}'", other),
            )),
        }
    }
}

impl std::fmt::Display for SupportCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_boundaries() {
        assert_eq!(SupportCategory::from_score(100), SupportCategory::StrongSupport);
        assert_eq!(SupportCategory::from_score(80), SupportCategory::StrongSupport);
        assert_eq!(SupportCategory::from_score(79), SupportCategory::LikelySupport);
        assert_eq!(SupportCategory::from_score(60), SupportCategory::LikelySupport);
        assert_eq!(SupportCategory::from_score(59), SupportCategory::Undecided);
        assert_eq!(SupportCategory::from_score(40), SupportCategory::Undecided);
        assert_eq!(SupportCategory::from_score(39), SupportCategory::LikelyOppose);
        assert_eq!(SupportCategory::from_score(20), SupportCategory::LikelyOppose);
        assert_eq!(SupportCategory::from_score(19), SupportCategory::StrongOppose);
        assert_eq!(SupportCategory::from_score(0), SupportCategory::StrongOppose);
    }

    #[test]
    fn test_ranges_agree_with_thresholds() {
        for category in SupportCategory::SCORED {
            let (lo, hi) = category.score_range().unwrap();
            assert_eq!(SupportCategory::from_score(lo), category);
            assert_eq!(SupportCategory::from_score(hi), category);
        }
        assert_eq!(SupportCategory::Unknown.score_range(), None);
    }

    #[test]
    fn test_oppose_checked_before_support() {
        assert_eq!(SupportCategory::from_tag("Non-Supporter"), Some(SupportCategory::LikelyOppose));
        assert_eq!(SupportCategory::from_tag("Opposed"), Some(SupportCategory::StrongOppose));
        assert_eq!(SupportCategory::from_tag("Liberal Member"), Some(SupportCategory::LikelyOppose));
        assert_eq!(SupportCategory::from_tag("Supporter"), Some(SupportCategory::LikelySupport));
        assert_eq!(SupportCategory::from_tag("Strong Support"), Some(SupportCategory::StrongSupport));
        assert_eq!(SupportCategory::from_tag("Board"), Some(SupportCategory::LikelySupport));
    }

    #[test]
    fn test_undecided_is_exact_match_only() {
        assert_eq!(SupportCategory::from_tag("Undecided"), Some(SupportCategory::Undecided));
        assert_eq!(SupportCategory::from_tag("undecided voter"), None);
        assert_eq!(SupportCategory::from_tag("Newsletter"), None);
    }

    #[test]
    fn test_first_matching_tag_wins() {
        let tags = vec!["Newsletter".to_string(), "Donor".to_string(), "Opposed".to_string()];
        assert_eq!(SupportCategory::from_tags(&tags), Some(SupportCategory::LikelySupport));
        let none = vec!["Newsletter".to_string()];
        assert_eq!(SupportCategory::from_tags(&none), None);
    }

    #[test]
    fn test_parse_rejects_unknown_names() {
        assert_eq!("likely_oppose".parse::<SupportCategory>().unwrap(), SupportCategory::LikelyOppose);
        let err = "maybe".parse::<SupportCategory>().unwrap_err();
        assert_eq!(err.code(), Some("INVALID_SUPPORT_CATEGORY"));
    }
}
