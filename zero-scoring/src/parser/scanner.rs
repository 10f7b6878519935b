//! Score mentions in free-form rationale text.
//!
//! The pattern table is ordered: each pattern contributes at most one
//! candidate (its first match), and candidates keep table order. The first
//! candidate is the primary one; later candidates only matter when the
//! primary value is implausible.
//!
//! | # | pattern | example |
//! |---|---------|---------|
//! | 1 | `评分[:：]?\s*(n)` | `综合评分：0.75` |
//! | 2 | `score"?\s*[:：]?\s*(n)` (case-insensitive) | `Score: 0.7`, `"score": 72` |
//! | 3 | `评分是(n)` | `评分是85` |
//! | 4 | `评分为?(n)` | `评分为0.8` |
//! | 5 | `得分为?(n)` | `得分为85` |
//! | 6 | `(n)分` | `85分` |

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Which scanner pattern produced a mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MentionPattern {
    /// `评分: n`
    RatingLabel,
    /// `score: n`
    ScoreLabel,
    /// `评分是n`
    RatingIs,
    /// `评分为n`
    RatingAs,
    /// `得分为n`
    PointsAs,
    /// `n分`
    PointsSuffix,
}

impl MentionPattern {
    /// Patterns in priority order.
    pub const ORDERED: [MentionPattern; 6] = [
        Self::RatingLabel,
        Self::ScoreLabel,
        Self::RatingIs,
        Self::RatingAs,
        Self::PointsAs,
        Self::PointsSuffix,
    ];

    fn regex_source(self) -> &'static str {
        match self {
            Self::RatingLabel => r"评分[:：]?\s*(\d+(?:\.\d+)?)",
            Self::ScoreLabel => r#"(?i)score"?\s*[:：]?\s*(\d+(?:\.\d+)?)"#,
            Self::RatingIs => r"评分是\s*(\d+(?:\.\d+)?)",
            Self::RatingAs => r"评分为?\s*(\d+(?:\.\d+)?)",
            Self::PointsAs => r"得分为?\s*(\d+(?:\.\d+)?)",
            Self::PointsSuffix => r"(\d+(?:\.\d+)?)\s*分",
        }
    }
}

static PATTERN_TABLE: Lazy<Vec<(MentionPattern, Regex)>> = Lazy::new(|| {
    MentionPattern::ORDERED
        .iter()
        .filter_map(|pattern| {
            Regex::new(pattern.regex_source())
                .ok()
                .map(|regex| (*pattern, regex))
        })
        .collect()
});

/// A numeric score found in text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreMention {
    /// Raw value as written (not normalized)
    pub value: f64,
    /// Pattern that matched
    pub pattern: MentionPattern,
}

impl ScoreMention {
    /// Whether the raw value can be a score on either supported scale.
    pub fn is_plausible(&self) -> bool {
        (0.0..=100.0).contains(&self.value)
    }
}

/// Scan text for score mentions, one candidate per matching pattern, in table order.
pub fn scan(text: &str) -> Vec<ScoreMention> {
    PATTERN_TABLE
        .iter()
        .filter_map(|(pattern, regex)| {
            regex
                .captures(text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .map(|value| ScoreMention {
                    value,
                    pattern: *pattern,
                })
        })
        .collect()
}

/// The primary candidate, falling through to later patterns while implausible.
pub fn primary(mentions: &[ScoreMention]) -> Option<ScoreMention> {
    mentions.iter().copied().find(ScoreMention::is_plausible)
}
