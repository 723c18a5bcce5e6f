// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Backoff policies for operations against the coordination store that can lose a race against
//! a concurrent writer (counter increments, schema id registration).

use std::cmp;
use std::num::NonZeroUsize;
use std::time::Duration;

use rand::Rng;
use serde_with::serde_as;

use crate::serde_util::DurationString;

const JITTER_MULTIPLIER: f32 = 0.3;
const MIN_JITTER: Duration = Duration::from_millis(3);

/// How often and after which pause a lost race is retried.
///
/// ```rust
/// use std::time::Duration;
/// use tidewater_types::retries::RetryPolicy;
///
/// let policy = RetryPolicy::fixed_delay(Duration::from_millis(100), Some(3));
/// let mut backoff = policy.iter();
/// while let Some(pause) = backoff.next() {
///     // attempt the operation, sleep for `pause` if it lost the race
/// #   let _ = pause;
/// }
/// ```
#[serde_as]
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "kebab-case"
)]
pub enum RetryPolicy {
    /// Give up after the first lost race.
    #[default]
    None,
    /// Pause for the same interval before every retry.
    FixedDelay {
        /// Pause between retries, for example `10ms`.
        #[serde_as(as = "DurationString")]
        interval: Duration,
        /// Retries before giving up. Unset means retrying forever.
        max_attempts: Option<NonZeroUsize>,
    },
    /// Multiply the pause by `factor` after every retry, capped at `max-interval`.
    Exponential {
        /// Pause before the first retry.
        #[serde_as(as = "DurationString")]
        initial_interval: Duration,
        factor: f32,
        /// Retries before giving up. Unset means retrying forever.
        max_attempts: Option<NonZeroUsize>,
        /// Upper bound of the pause.
        #[serde_as(as = "Option<DurationString>")]
        max_interval: Option<Duration>,
    },
}

impl RetryPolicy {
    pub fn fixed_delay(interval: Duration, max_attempts: Option<usize>) -> Self {
        Self::FixedDelay {
            interval,
            max_attempts: max_attempts.and_then(NonZeroUsize::new),
        }
    }

    pub fn exponential(
        initial_interval: Duration,
        factor: f32,
        max_attempts: Option<usize>,
        max_interval: Option<Duration>,
    ) -> Self {
        Self::Exponential {
            initial_interval,
            factor,
            max_attempts: max_attempts.and_then(NonZeroUsize::new),
            max_interval,
        }
    }

    /// Pauses to wait before each retry. The iterator ends once the retries are used up.
    pub fn iter(&self) -> RetryIter<'_> {
        RetryIter {
            policy: self,
            attempts: 0,
            last_pause: None,
        }
    }
}

#[derive(Debug)]
pub struct RetryIter<'a> {
    policy: &'a RetryPolicy,
    attempts: usize,
    last_pause: Option<Duration>,
}

impl Iterator for RetryIter<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        self.attempts += 1;
        let pause = match self.policy {
            RetryPolicy::None => return None,
            RetryPolicy::FixedDelay {
                interval,
                max_attempts,
            } => {
                if exhausted(*max_attempts, self.attempts) {
                    return None;
                }
                *interval
            }
            RetryPolicy::Exponential {
                initial_interval,
                factor,
                max_attempts,
                max_interval,
            } => {
                if exhausted(*max_attempts, self.attempts) {
                    return None;
                }
                let pause = self.last_pause.map_or(*initial_interval, |last| {
                    cmp::min(last.mul_f32(*factor), max_interval.unwrap_or(Duration::MAX))
                });
                self.last_pause = Some(pause);
                pause
            }
        };
        Some(with_jitter(pause))
    }
}

fn exhausted(max_attempts: Option<NonZeroUsize>, attempts: usize) -> bool {
    max_attempts.is_some_and(|limit| attempts > limit.get())
}

/// Adds between 3ms and 30% of `pause` so that racing writers do not retry in lockstep.
fn with_jitter(pause: Duration) -> Duration {
    let max_jitter = pause.mul_f32(JITTER_MULTIPLIER);
    if max_jitter <= MIN_JITTER {
        pause + MIN_JITTER
    } else {
        pause + rand::rng().random_range(MIN_JITTER..max_jitter)
    }
}
