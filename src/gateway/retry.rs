//! Bounded retry combinator
//!
//! Runs an async operation until its successful output no longer matches a
//! retry predicate, or until the attempt budget is used up. Errors are not
//! retried: they end the loop immediately.

use std::future::Future;
use tracing::debug;

/// Outcome of [`attempt`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempted<T> {
    /// The predicate accepted a value
    Accepted {
        /// Accepted value
        value: T,
        /// Attempts made, including the accepted one
        attempts: u32,
    },
    /// Every attempt produced a value the predicate wanted retried
    Exhausted {
        /// Value produced by the final attempt
        last: T,
        /// Attempts made
        attempts: u32,
    },
}

impl<T> Attempted<T> {
    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Accepted { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Run `op` at most `max_attempts` times (at least once)
///
/// `op` receives the 1-based attempt number. A value for which `retry_if`
/// returns `true` triggers another attempt while budget remains.
pub async fn attempt<T, E, F, Fut, P>(max_attempts: u32, mut op: F, retry_if: P) -> Result<Attempted<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt_no = 1;

    loop {
        let value = op(attempt_no).await?;

        if !retry_if(&value) {
            return Ok(Attempted::Accepted {
                value,
                attempts: attempt_no,
            });
        }
        if attempt_no >= max_attempts {
            return Ok(Attempted::Exhausted {
                last: value,
                attempts: attempt_no,
            });
        }

        debug!(attempt = attempt_no, max_attempts, "Retrying");
        attempt_no += 1;
    }
}
