//! Reconciliation of a structured score against the score stated in text.
//!
//! | structured | mentioned | result |
//! |------------|-----------|--------|
//! | absent | absent | `0.0`, no signal |
//! | absent | present | normalized mention |
//! | `0.0` | present | normalized mention (zero is a placeholder) |
//! | present | absent | normalized structured |
//! | present | present | normalized structured, flagged when beyond tolerance |
//!
//! Both sides are normalized onto `[0, 1]` before comparing, so `0.85` and
//! `85` agree.

use tracing::{debug, warn};

use super::normalize::{normalize, Scale};

/// Absorbs float noise in the tolerance comparison.
const EPSILON: f64 = 1e-9;

/// How the final score was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Neither side carried a score
    NoSignal,
    /// Only the text mentioned a score
    MentionedOnly,
    /// Only the structured field carried a score
    StructuredOnly,
    /// Structured score was a zero placeholder; the mention was used instead
    ZeroPlaceholderOverridden,
    /// Both sides agree within tolerance
    Consistent,
    /// Both sides disagree; the structured score was kept
    Divergent,
}

/// Outcome of reconciling one structured/mentioned pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciliation {
    /// Final score in `[0, 1]`
    pub score: f64,
    pub verdict: Verdict,
    /// The two sides were written on different scales
    pub scale_mismatch: bool,
}

impl Reconciliation {
    /// Whether a reconciliation event happened (override, divergence or scale fix-up).
    pub fn was_reconciled(&self) -> bool {
        matches!(
            self.verdict,
            Verdict::ZeroPlaceholderOverridden | Verdict::Divergent
        ) || self.scale_mismatch
    }

    /// Whether the final score came from the text rather than a structured field.
    pub fn used_mention(&self) -> bool {
        matches!(
            self.verdict,
            Verdict::MentionedOnly | Verdict::ZeroPlaceholderOverridden
        )
    }
}

/// Applies the consistency rule with a fixed tolerance.
#[derive(Debug, Clone, Copy)]
pub struct ConsistencyValidator {
    tolerance: f64,
}

impl ConsistencyValidator {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: tolerance.max(0.0),
        }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Reconcile raw (un-normalized) structured and mentioned scores.
    pub fn reconcile(&self, structured: Option<f64>, mentioned: Option<f64>) -> Reconciliation {
        let (structured_raw, mentioned_raw) = match (structured, mentioned) {
            (None, None) => {
                return Reconciliation {
                    score: 0.0,
                    verdict: Verdict::NoSignal,
                    scale_mismatch: false,
                }
            }
            (None, Some(m)) => {
                return Reconciliation {
                    score: normalize(m),
                    verdict: Verdict::MentionedOnly,
                    scale_mismatch: false,
                }
            }
            (Some(s), None) => {
                return Reconciliation {
                    score: normalize(s),
                    verdict: Verdict::StructuredOnly,
                    scale_mismatch: false,
                }
            }
            (Some(s), Some(m)) => (s, m),
        };

        let structured_score = normalize(structured_raw);
        let mentioned_score = normalize(mentioned_raw);
        let scale_mismatch = Scale::of(structured_raw) != Scale::of(mentioned_raw);

        if structured_score == 0.0 && mentioned_score != 0.0 {
            debug!(
                mentioned = mentioned_raw,
                "Structured score is a zero placeholder, using mentioned score"
            );
            return Reconciliation {
                score: mentioned_score,
                verdict: Verdict::ZeroPlaceholderOverridden,
                scale_mismatch,
            };
        }

        let divergence = (structured_score - mentioned_score).abs();
        let verdict = if divergence > self.tolerance + EPSILON {
            warn!(
                structured = structured_raw,
                mentioned = mentioned_raw,
                divergence = divergence,
                tolerance = self.tolerance,
                "Structured score disagrees with rationale text, keeping structured score"
            );
            Verdict::Divergent
        } else {
            if scale_mismatch {
                debug!(
                    structured = structured_raw,
                    mentioned = mentioned_raw,
                    "Scores agree after scale normalization"
                );
            }
            Verdict::Consistent
        };

        Reconciliation {
            score: structured_score,
            verdict,
            scale_mismatch,
        }
    }
}

impl Default for ConsistencyValidator {
    fn default() -> Self {
        Self::new(0.01)
    }
}
