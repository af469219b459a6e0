/*!
 * Token usage accounting across a run.
 */

use parking_lot::Mutex;
use std::fmt;

use crate::providers::Completion;

/// Totals reported by the collaborator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageStats {
    /// Successful collaborator calls
    pub requests: u64,
    /// Calls that failed or were rejected
    pub failed_attempts: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl UsageStats {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl fmt::Display for UsageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests ({} failed attempts), {} prompt + {} completion = {} tokens",
            self.requests,
            self.failed_attempts,
            self.prompt_tokens,
            self.completion_tokens,
            self.total_tokens()
        )
    }
}

/// Thread-safe accumulator shared by the stages of a run
#[derive(Debug, Default)]
pub struct UsageTracker {
    stats: Mutex<UsageStats>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, completion: &Completion) {
        let mut stats = self.stats.lock();
        stats.requests += 1;
        stats.prompt_tokens += completion.prompt_tokens.unwrap_or(0);
        stats.completion_tokens += completion.completion_tokens.unwrap_or(0);
    }

    pub fn record_failure(&self) {
        self.stats.lock().failed_attempts += 1;
    }

    pub fn snapshot(&self) -> UsageStats {
        *self.stats.lock()
    }
}
