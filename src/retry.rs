/// Maximum number of retry attempts before an event is considered
/// permanently failed.
///
/// `2` retries = `3` total execution attempts.
/// This is the single source of truth for the limit.
///
/// The broker-side delay between attempts is configured separately in the
/// queue topology (`x-message-ttl = 5 000 ms` in `messaging::rabbit`).
pub const MAX_RETRIES: i32 = 2;

// ── Decision ───────────────────────────────────────────────────────────────────

/// Outcome of a retry policy evaluation for a failed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// The event should be re-queued via the retry exchange. The broker
    /// will hold it for the retry TTL before routing it back to the
    /// events queue.
    Retry {
        /// The `x-retry-count` value to embed in the next attempt.
        next_attempt: i32,
    },

    /// All attempts exhausted. A final error result must be published.
    GiveUp,
}

// ── Policy ─────────────────────────────────────────────────────────────────────

/// Retry policy for transient stage failures.
///
/// Deterministic failures (bad docket under the fail policy, missing media
/// format, malformed transcript) never consult this policy — retrying
/// cannot change the input.
///
/// `Copy` so it can be passed freely to worker tasks without cloning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (not total attempts).
    /// A value of `2` allows up to 3 total executions: original + 2 retries.
    pub max_retries: i32,
}

impl Default for RetryPolicy {
    /// Returns a policy using the project-wide [`MAX_RETRIES`] constant.
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with a custom retry limit.
    pub fn new(max_retries: i32) -> Self {
        Self { max_retries }
    }

    /// Decide what to do with an event that has just failed transiently.
    ///
    /// `retry_count` is the number of times the event has **already been
    /// attempted** (0 = first attempt, never retried).
    pub fn decide(&self, retry_count: i32) -> RetryDecision {
        if retry_count < self.max_retries {
            RetryDecision::Retry {
                next_attempt: retry_count + 1,
            }
        } else {
            RetryDecision::GiveUp
        }
    }

    /// Convenience boolean wrapper over [`Self::decide`].
    #[inline]
    pub fn should_retry(&self, retry_count: i32) -> bool {
        retry_count < self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_below_the_limit() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(0), RetryDecision::Retry { next_attempt: 1 });
        assert_eq!(policy.decide(1), RetryDecision::Retry { next_attempt: 2 });
    }

    #[test]
    fn gives_up_at_the_limit() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(MAX_RETRIES), RetryDecision::GiveUp);
        assert!(!policy.should_retry(MAX_RETRIES));
    }
}
