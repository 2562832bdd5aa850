//! Bounded retry for transient surface failures.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::driver::HResult;

/// What the caller wants done with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Wait out the backoff and try again.
    Retry,
    /// Give up and report the code.
    Fail,
}

/// Maximum attempts and the pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,
    #[serde(rename = "backoffMs", with = "millis")]
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Budget for the verification lock after creation. Some cards report "still
    /// drawing" or a lost surface for a few milliseconds after creation.
    pub const fn surface_settle() -> Self {
        Self::new(2000, Duration::from_millis(1))
    }

    /// A first attempt plus exactly one retry, no pause.
    pub const fn single_retry() -> Self {
        Self::new(2, Duration::ZERO)
    }

    /// Run `op` until it succeeds, `recover` says [`Recovery::Fail`], or the
    /// attempt budget is spent. The last failing code is returned.
    ///
    /// `recover` only sees failures that still have an attempt left after
    /// them, so a budget of `n` runs it at most `n - 1` times.
    ///
    /// `ctx` is handed to both closures so recovery can touch the same driver
    /// the operation uses.
    pub fn run<C: ?Sized, T>(
        &self,
        ctx: &mut C,
        mut op: impl FnMut(&mut C) -> Result<T, HResult>,
        mut recover: impl FnMut(&mut C, HResult) -> Recovery,
    ) -> Result<T, HResult> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let code = match op(ctx) {
                Ok(value) => return Ok(value),
                Err(code) => code,
            };

            // No recovery after the last attempt: it would have nothing to retry.
            if attempt >= max_attempts {
                if max_attempts > 1 {
                    warn!(attempts = attempt, %code, "Retry budget exhausted");
                }
                return Err(code);
            }

            if recover(ctx, code) == Recovery::Fail {
                return Err(code);
            }

            trace!(attempt, %code, "Transient failure, retrying");
            self.pause();
            attempt += 1;
        }
    }

    fn pause(&self) {
        if self.backoff.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.backoff);
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::surface_settle()
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0;
        let result = instant(10).run(
            &mut calls,
            |calls| {
                *calls += 1;
                if *calls < 4 {
                    Err(HResult::WAS_STILL_DRAWING)
                } else {
                    Ok(*calls)
                }
            },
            |_, _| Recovery::Retry,
        );
        assert_eq!(result, Ok(4));
        assert_eq!(calls, 4);
    }

    #[test]
    fn stops_at_budget_with_last_code() {
        let mut calls = 0;
        let result: Result<(), HResult> = instant(5).run(
            &mut calls,
            |calls| {
                *calls += 1;
                Err(HResult::SURFACE_LOST)
            },
            |_, _| Recovery::Retry,
        );
        assert_eq!(result, Err(HResult::SURFACE_LOST));
        assert_eq!(calls, 5);
    }

    #[test]
    fn fatal_code_is_not_retried() {
        let mut counts = (0, 0);
        let result: Result<(), HResult> = instant(100).run(
            &mut counts,
            |counts| {
                counts.0 += 1;
                Err(HResult::GENERIC)
            },
            |counts, code| {
                counts.1 += 1;
                if code.is_surface_lost() {
                    Recovery::Retry
                } else {
                    Recovery::Fail
                }
            },
        );
        assert_eq!(result, Err(HResult::GENERIC));
        assert_eq!(counts, (1, 1));
    }

    #[test]
    fn recovery_sees_every_failure() {
        let mut log = Vec::new();
        let mut attempts = 0;
        let result = instant(10).run(
            &mut log,
            |_| {
                attempts += 1;
                match attempts {
                    1 => Err(HResult::SURFACE_LOST),
                    2 => Err(HResult::WAS_STILL_DRAWING),
                    _ => Ok(()),
                }
            },
            |log, code| {
                log.push(code);
                Recovery::Retry
            },
        );
        assert_eq!(result, Ok(()));
        assert_eq!(log, vec![HResult::SURFACE_LOST, HResult::WAS_STILL_DRAWING]);
    }

    #[test]
    fn recovery_skipped_after_last_attempt() {
        let mut counts = (0, 0);
        let result: Result<(), HResult> = RetryPolicy::single_retry().run(
            &mut counts,
            |counts| {
                counts.0 += 1;
                Err(HResult::SURFACE_LOST)
            },
            |counts, _| {
                counts.1 += 1;
                Recovery::Retry
            },
        );
        assert_eq!(result, Err(HResult::SURFACE_LOST));
        assert_eq!(counts, (2, 1));
    }

    #[test]
    fn single_retry_makes_two_attempts() {
        let mut calls = 0;
        let _ = RetryPolicy::single_retry().run(
            &mut calls,
            |calls| -> Result<(), HResult> {
                *calls += 1;
                Err(HResult::SURFACE_LOST)
            },
            |_, _| Recovery::Retry,
        );
        assert_eq!(calls, 2);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let mut calls = 0;
        let _ = instant(0).run(
            &mut calls,
            |calls| -> Result<(), HResult> {
                *calls += 1;
                Err(HResult::SURFACE_LOST)
            },
            |_, _| Recovery::Retry,
        );
        assert_eq!(calls, 1);
    }

    #[test]
    fn settle_budget_matches_driver_workaround() {
        let policy = RetryPolicy::surface_settle();
        assert_eq!(policy.max_attempts, 2000);
        assert_eq!(policy.backoff, Duration::from_millis(1));
    }

    #[test]
    fn serializes_backoff_in_millis() {
        let json = serde_json::to_string(&RetryPolicy::new(3, Duration::from_millis(7))).unwrap();
        assert_eq!(json, r#"{"maxAttempts":3,"backoffMs":7}"#);

        let policy: RetryPolicy = serde_json::from_str(r#"{"maxAttempts":9,"backoffMs":2}"#).unwrap();
        assert_eq!(policy, RetryPolicy::new(9, Duration::from_millis(2)));
    }
}
