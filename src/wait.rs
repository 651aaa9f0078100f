// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bounded polling on tokio's clock.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// How a bounded wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ready { attempts: u32, elapsed: Duration },
    TimedOut { attempts: u32, elapsed: Duration },
}

impl WaitOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, WaitOutcome::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Ready { attempts, .. } | WaitOutcome::TimedOut { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Poll `probe` every `interval` until it reports ready or `timeout` elapses.
///
/// The first probe runs immediately and the final sleep is clipped to the
/// deadline, so at most `ceil(timeout / interval) + 1` probes are made.
/// A probe error counts as "not ready". Cancel by dropping the future.
pub async fn poll_until<F, Fut, E>(
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> WaitOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let deadline = start + timeout;
    let mut attempts = 0;

    loop {
        attempts += 1;
        match probe().await {
            Ok(true) => {
                return WaitOutcome::Ready {
                    attempts,
                    elapsed: start.elapsed(),
                }
            }
            Ok(false) => debug!("Not ready after attempt {}", attempts),
            Err(e) => warn!("Readiness probe failed on attempt {}: {}", attempts, e),
        }

        let now = Instant::now();
        if now >= deadline {
            return WaitOutcome::TimedOut {
                attempts,
                elapsed: now - start,
            };
        }
        sleep(interval.min(deadline - now)).await;
    }
}
