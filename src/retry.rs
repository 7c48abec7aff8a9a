//! Bounded retry loop for pushes that race other writers.
//!
//! The remote notes ref only accepts fast-forward updates, so two CI runs
//! recording at the same time conflict. Each attempt is expected to
//! force-fetch, re-apply its writes and push; only conflict-class failures
//! are retried.

use crate::git::GitError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Result of a push that did not fail fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The remote accepted the update on attempt `attempts`.
    Pushed { attempts: u32 },
    /// Every attempt was rejected as a conflict.
    Exhausted { attempts: u32 },
}

impl PushOutcome {
    #[must_use]
    pub fn is_pushed(&self) -> bool {
        matches!(self, PushOutcome::Pushed { .. })
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        match *self {
            PushOutcome::Pushed { attempts } | PushOutcome::Exhausted { attempts } => attempts,
        }
    }
}

/// Run `attempt` (numbered from 1) until it succeeds, fails with a
/// non-conflict error, or `max_retries` attempts were rejected.
///
/// A `max_retries` of 0 still makes one attempt.
pub fn retry_on_conflict<F>(max_retries: u32, mut attempt: F) -> Result<PushOutcome, GitError>
where
    F: FnMut(u32) -> Result<(), GitError>,
{
    let max_attempts = max_retries.max(1);

    for n in 1..=max_attempts {
        match attempt(n) {
            Ok(()) => return Ok(PushOutcome::Pushed { attempts: n }),
            Err(e) if e.is_conflict() => {
                if n < max_attempts {
                    tracing::warn!(attempt = n, max_attempts, "push rejected, retrying: {e}");
                } else {
                    tracing::warn!(attempts = n, "push still rejected, giving up: {e}");
                }
            }
            Err(e) => return Err(e),
        }
    }

    Ok(PushOutcome::Exhausted {
        attempts: max_attempts,
    })
}
