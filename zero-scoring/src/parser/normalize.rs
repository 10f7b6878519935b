//! Range normalization for LLM scores.
//!
//! Models are asked for a 0-1 score but regularly answer on a 0-100 scale.
//! Everything downstream requires a bounded value, so out-of-range input is
//! clamped rather than rejected.

/// Scale a raw score appears to be expressed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    /// `0 ≤ x ≤ 1`
    Unit,
    /// `1 < x ≤ 100`
    Percent,
    /// Negative, above 100, or not a number
    OutOfRange,
}

impl Scale {
    /// Classify a raw value.
    pub fn of(raw: f64) -> Self {
        if (0.0..=1.0).contains(&raw) {
            Self::Unit
        } else if raw > 1.0 && raw <= 100.0 {
            Self::Percent
        } else {
            Self::OutOfRange
        }
    }
}

/// Map a raw score onto `[0, 1]`.
///
/// - `[0, 1]` passes through unchanged
/// - `(1, 100]` is divided by 100
/// - anything else is clamped; NaN becomes `0.0`
pub fn normalize(raw: f64) -> f64 {
    match Scale::of(raw) {
        Scale::Unit => raw,
        Scale::Percent => raw / 100.0,
        Scale::OutOfRange if raw.is_nan() => 0.0,
        Scale::OutOfRange => raw.clamp(0.0, 1.0),
    }
}

/// Round a score to two decimals for persistence.
pub fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}
