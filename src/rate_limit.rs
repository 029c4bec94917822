//! Sliding-window rate limiter shared by all workers calling one external
//! service.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Bounds outbound calls to at most `budget` in any trailing `window`.
///
/// [`acquire`](RateLimiter::acquire) never fails; callers over budget are
/// slept until the oldest recorded call leaves the window. The lock is
/// only held to inspect and update the call log, never across a sleep, so
/// concurrent workers cannot starve each other. A bounded worker pool
/// should not call this from more tasks than its pool size, otherwise the
/// wait queue grows without limit.
#[derive(Debug)]
pub struct RateLimiter {
    budget: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// `budget` must be at least 1.
    pub fn new(budget: usize, window: Duration) -> Self {
        assert!(budget > 0, "rate limiter budget must be at least 1");
        Self {
            budget,
            window,
            calls: Mutex::new(VecDeque::with_capacity(budget)),
        }
    }

    /// Waits until a call slot is free in the trailing window, records the
    /// call, and returns.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                while calls
                    .front()
                    .is_some_and(|&at| now.duration_since(at) >= self.window)
                {
                    calls.pop_front();
                }
                if calls.len() < self.budget {
                    calls.push_back(now);
                    return;
                }
                // Full window: the oldest call frees a slot at `at + window`.
                let oldest = *calls.front().expect("non-empty at budget");
                self.window - now.duration_since(oldest)
            };
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn acquire_within_budget_does_not_wait() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn over_budget_call_waits_out_the_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn no_window_ever_exceeds_budget() {
        let limiter = RateLimiter::new(2, Duration::from_millis(500));
        let mut grants = Vec::new();
        for _ in 0..7 {
            limiter.acquire().await;
            grants.push(Instant::now());
        }
        // Any call and the one `budget` places later must be at least one
        // full window apart.
        for pair in grants.windows(3) {
            assert!(pair[2].duration_since(pair[0]) >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_respect_the_budget() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(1)));
        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..6 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
            }));
        }
        for handle in handles {
            handle.await.expect("worker panicked");
        }
        // 6 calls at 2 per second: the last pair is only granted after two
        // full windows have elapsed.
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
