use std::thread;
use std::time::{Duration, Instant};

use log::warn;
use serde::{Deserialize, Serialize};

/// Bounded exponential backoff for transient warehouse failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Growth factor applied to the delay after every failed attempt.
    pub backoff_multiplier: f64,
    /// Upper bound for a single delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// The last error of a retried operation plus how many attempts were made.
#[derive(Debug)]
pub(crate) struct Exhausted<E> {
    pub(crate) error: E,
    pub(crate) attempts: u32,
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(30) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.max(1.0).powi(exp);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails permanently, runs out of attempts, or the next
    /// backoff would cross `deadline`.
    ///
    /// `op` receives the 1-based attempt number.
    pub(crate) fn run<T, E, F, P>(&self, label: &str, deadline: Option<Instant>, mut op: F, is_transient: P) -> Result<T, Exhausted<E>>
    where
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            if attempt >= max_attempts || !is_transient(&error) {
                return Err(Exhausted { error, attempts: attempt });
            }

            let delay = self.backoff_after(attempt);
            if deadline.is_some_and(|d| Instant::now() + delay >= d) {
                warn!("{label}: deadline reached after {attempt} attempt(s): {error}");
                return Err(Exhausted { error, attempts: attempt });
            }

            warn!("{label}: attempt {attempt}/{max_attempts} failed, retrying in {delay:?}: {error}");
            thread::sleep(delay);
            attempt += 1;
        }
    }
}
