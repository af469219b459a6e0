/*!
 * Token estimation.
 *
 * Budgets are enforced without a tokenizer: the estimator approximates the
 * token count of a piece of text, and the budget holds back a fraction of
 * every limit to absorb the approximation error.
 */

use serde::Serialize;

use crate::errors::TranslationError;

/// Tokens spent on the JSON framing of one cue (`{"id":12,"text":""},`)
pub const CUE_FRAMING_TOKENS: usize = 8;

/// Estimates the token cost of text.
///
/// Implementations must be deterministic and monotonic: appending text never
/// lowers the estimate.
pub trait TokenEstimator: Send + Sync {
    /// Estimated tokens for `text`
    fn estimate(&self, text: &str) -> usize;
}

/// Estimated tokens for the JSON form of `value`
pub fn estimate_json<T: Serialize + ?Sized>(estimator: &dyn TokenEstimator, value: &T) -> usize {
    serde_json::to_string(value).map_or(0, |json| estimator.estimate(&json))
}

/// Character-class heuristic.
///
/// ASCII averages about four characters per token, other alphabetic scripts
/// about two, and CJK ideographs, kana and hangul about one.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicEstimator {
    ascii_per_token: f64,
    alphabetic_per_token: f64,
    wide_per_token: f64,
}

impl Default for HeuristicEstimator {
    fn default() -> Self {
        HeuristicEstimator {
            ascii_per_token: 4.0,
            alphabetic_per_token: 2.0,
            wide_per_token: 1.0,
        }
    }
}

impl HeuristicEstimator {
    pub fn new(ascii_per_token: f64, alphabetic_per_token: f64, wide_per_token: f64) -> Self {
        HeuristicEstimator {
            ascii_per_token,
            alphabetic_per_token,
            wide_per_token,
        }
    }

    fn is_wide(c: char) -> bool {
        matches!(c as u32,
            0x1100..=0x11FF     // Hangul Jamo
            | 0x2E80..=0x9FFF   // CJK radicals through unified ideographs, kana
            | 0xAC00..=0xD7AF   // Hangul syllables
            | 0xF900..=0xFAFF   // CJK compatibility ideographs
            | 0xFF00..=0xFFEF   // Full-width forms
            | 0x20000..=0x2FFFF // CJK extensions
        )
    }

    fn weight(&self, c: char) -> f64 {
        if c.is_ascii() {
            1.0 / self.ascii_per_token
        } else if Self::is_wide(c) {
            1.0 / self.wide_per_token
        } else {
            1.0 / self.alphabetic_per_token
        }
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        let total: f64 = text.chars().map(|c| self.weight(c)).sum();
        total.ceil() as usize
    }
}

/// Input and output limits for one request, after the safety margin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    /// Usable input tokens
    pub input: usize,
    /// Usable output tokens
    pub output: usize,
}

impl TokenBudget {
    /// Apply `safety_margin` (a fraction in `[0, 1)`) to the configured limits
    pub fn new(max_input_tokens: usize, max_output_tokens: usize, safety_margin: f64) -> Result<Self, TranslationError> {
        if !(0.0..1.0).contains(&safety_margin) {
            return Err(TranslationError::Estimation(format!(
                "safety margin {} is outside [0, 1)",
                safety_margin
            )));
        }
        let keep = 1.0 - safety_margin;
        let input = (max_input_tokens as f64 * keep).floor() as usize;
        let output = (max_output_tokens as f64 * keep).floor() as usize;
        if input == 0 || output == 0 {
            return Err(TranslationError::Estimation(format!(
                "budget of {} input / {} output tokens leaves nothing after a {} margin",
                max_input_tokens, max_output_tokens, safety_margin
            )));
        }
        Ok(TokenBudget { input, output })
    }

    /// Budget that only bounds input
    pub fn input_only(max_input_tokens: usize, safety_margin: f64) -> Result<Self, TranslationError> {
        let budget = Self::new(max_input_tokens, usize::MAX / 2, safety_margin)?;
        Ok(TokenBudget { output: usize::MAX, ..budget })
    }
}
