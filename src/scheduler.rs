//! Twice-daily (by default) batch schedule. Each cycle runs a full batch
//! at the next configured fire hour, waits a grace period, then sweeps
//! expired cache entries. Shutdown is a broadcast signal checked at every
//! wait point.

use crate::cache::store::AnalysisCache;
use crate::clock::Clock;
use crate::orchestrator::{AnalysisOrchestrator, HumanRiskProvider, WeatherProvider};
use crate::types::area::AreaDescriptor;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;

/// Next instant at or after `now` whose hour is one of `fire_hours` with
/// minute and second zero, except that `now` itself is never returned;
/// an exact hit rolls to the following fire hour.
pub fn next_fire_time(now: DateTime<Utc>, fire_hours: &[u32]) -> DateTime<Utc> {
    let mut hours: Vec<u32> = fire_hours.to_vec();
    hours.sort_unstable();
    hours.dedup();
    assert!(!hours.is_empty(), "at least one fire hour is required");
    assert!(hours.iter().all(|&h| h < 24), "fire hours must be in 0..24");

    let today = now.date_naive();
    for &hour in &hours {
        let candidate = today
            .and_hms_opt(hour, 0, 0)
            .expect("hour validated above")
            .and_utc();
        if candidate > now {
            return candidate;
        }
    }
    // All of today's fire hours have passed; take tomorrow's earliest.
    (today + ChronoDuration::days(1))
        .and_hms_opt(hours[0], 0, 0)
        .expect("hour validated above")
        .and_utc()
}

/// Drives scheduled batch runs until shut down.
pub struct Scheduler<W, H> {
    orchestrator: Arc<AnalysisOrchestrator<W, H>>,
    areas: Vec<AreaDescriptor>,
    fire_hours: Vec<u32>,
    sweep_delay: Duration,
    clock: Arc<dyn Clock>,
}

impl<W: WeatherProvider, H: HumanRiskProvider> Scheduler<W, H> {
    pub fn new(
        orchestrator: Arc<AnalysisOrchestrator<W, H>>,
        areas: Vec<AreaDescriptor>,
        fire_hours: Vec<u32>,
        sweep_delay: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orchestrator,
            areas,
            fire_hours,
            sweep_delay,
            clock,
        }
    }

    fn cache(&self) -> &Arc<AnalysisCache> {
        self.orchestrator.cache()
    }

    /// Runs the schedule until the shutdown channel fires. Every batch is
    /// followed, after a grace period, by a cache sweep; neither a failed
    /// batch nor a failed sweep stops the loop.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let now = self.clock.now_utc();
            let fire_at = next_fire_time(now, &self.fire_hours);
            let wait = (fire_at - now)
                .to_std()
                .unwrap_or(Duration::ZERO);
            info!(
                "next scheduled analysis at {} ({}s from now)",
                fire_at.format("%Y-%m-%d %H:%M UTC"),
                wait.as_secs()
            );

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("scheduler shutting down");
                    return;
                }
                _ = sleep(wait) => {}
            }

            let outcome = self.orchestrator.run_batch(&self.areas).await;
            if !outcome.success {
                error!(
                    "scheduled batch failed entirely ({} areas, {} failed)",
                    self.areas.len(),
                    outcome.failed
                );
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("scheduler shutting down");
                    return;
                }
                _ = sleep(self.sweep_delay) => {}
            }

            match self.cache().sweep().await {
                Ok(removed) if removed > 0 => {
                    info!("post-batch sweep removed {removed} expired analyses")
                }
                Ok(_) => {}
                Err(e) => error!("post-batch cache sweep failed: {e}"),
            }
        }
    }
}
