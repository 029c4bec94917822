//! Batch analysis orchestration: cache-first per-area analysis fanned out
//! across a bounded worker pool, with a status snapshot for observers.

use crate::cache::store::{cache_key, AnalysisCache};
use crate::clock::SystemClock;
use crate::combine::RiskCombiner;
use crate::config::RiskConfig;
use crate::error::RiskError;
use crate::human::assessor::HumanRiskAssessor;
use crate::rate_limit::RateLimiter;
use crate::scorer::score_weather;
use crate::types::area::AreaDescriptor;
use crate::types::assessment::HumanRiskAssessment;
use crate::types::combined::{CombinedRiskResult, RiskTiers};
use crate::types::coordinate::LatLon;
use crate::types::weather::WeatherObservation;
use crate::weather::client::WeatherClient;
use crate::weather::error::WeatherError;
use async_trait::async_trait;
use bon::bon;
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::{stream, StreamExt};
use log::{info, warn};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Weather source seam. The production implementation is
/// [`WeatherClient`]; tests substitute canned observations.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch(&self, location: LatLon) -> Result<WeatherObservation, WeatherError>;
}

#[async_trait]
impl WeatherProvider for WeatherClient {
    async fn fetch(&self, location: LatLon) -> Result<WeatherObservation, WeatherError> {
        WeatherClient::fetch(self, location).await
    }
}

/// Human-risk source seam. Infallible: implementations fall back
/// internally rather than surface errors.
#[async_trait]
pub trait HumanRiskProvider: Send + Sync {
    async fn assess(&self, location: LatLon, area: &AreaDescriptor) -> HumanRiskAssessment;
}

#[async_trait]
impl HumanRiskProvider for HumanRiskAssessor {
    async fn assess(&self, location: LatLon, area: &AreaDescriptor) -> HumanRiskAssessment {
        HumanRiskAssessor::assess(self, location, area).await
    }
}

/// Outcome of analyzing one area within a batch.
#[derive(Debug, Clone)]
pub struct AreaAnalysis {
    pub area: String,
    pub from_cache: bool,
    pub result: CombinedRiskResult,
}

/// Aggregate outcome of one batch run. `success` is false only when every
/// area in a non-empty batch failed.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub success: bool,
    pub analyzed: usize,
    pub cached: usize,
    pub failed: usize,
    pub results: Vec<AreaAnalysis>,
}

/// Point-in-time view of a batch, for status endpoints and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchStatus {
    pub running: bool,
    pub total: usize,
    pub analyzed: usize,
    pub cached: usize,
    pub failed: usize,
}

#[derive(Default)]
struct StatusCells {
    running: AtomicBool,
    total: AtomicUsize,
    analyzed: AtomicUsize,
    cached: AtomicUsize,
    failed: AtomicUsize,
}

enum AreaOutcome {
    Analyzed(AreaAnalysis),
    Cached(AreaAnalysis),
    Failed,
}

/// Runs batches of area analyses: cache lookup first, then weather fetch,
/// scoring, human assessment, and combination, at most `workers` areas in
/// flight at once.
pub struct AnalysisOrchestrator<W, H> {
    weather: Arc<W>,
    human: Arc<H>,
    cache: Arc<AnalysisCache>,
    combiner: RiskCombiner,
    workers: usize,
    status: Arc<StatusCells>,
}

#[bon]
impl<W: WeatherProvider, H: HumanRiskProvider> AnalysisOrchestrator<W, H> {
    #[builder]
    pub fn new(
        weather: Arc<W>,
        human: Arc<H>,
        cache: Arc<AnalysisCache>,
        tiers: Option<RiskTiers>,
        #[builder(default = 3)] workers: usize,
    ) -> Self {
        Self {
            weather,
            human,
            cache,
            combiner: RiskCombiner::new(tiers.unwrap_or_default()),
            workers: workers.max(1),
            status: Arc::new(StatusCells::default()),
        }
    }

    /// Analyzes every area, reusing valid cached results. Failures are
    /// per-area: one bad area never aborts the rest of the batch.
    pub async fn run_batch(&self, areas: &[AreaDescriptor]) -> BatchOutcome {
        let _bulk = self.cache.begin_bulk_run();
        self.reset_status(areas.len());
        info!("starting batch analysis of {} areas", areas.len());

        // Boxed so the batch future stays spawnable from other tasks.
        let analyses: Vec<BoxFuture<'_, AreaOutcome>> = areas
            .iter()
            .map(|area| self.analyze_area(area).boxed())
            .collect();
        let outcomes: Vec<AreaOutcome> = stream::iter(analyses)
            .buffer_unordered(self.workers)
            .collect()
            .await;
        self.status.running.store(false, Ordering::Release);

        let mut outcome = BatchOutcome {
            success: true,
            analyzed: 0,
            cached: 0,
            failed: 0,
            results: Vec::with_capacity(outcomes.len()),
        };
        for area_outcome in outcomes {
            match area_outcome {
                AreaOutcome::Analyzed(analysis) => {
                    outcome.analyzed += 1;
                    outcome.results.push(analysis);
                }
                AreaOutcome::Cached(analysis) => {
                    outcome.cached += 1;
                    outcome.results.push(analysis);
                }
                AreaOutcome::Failed => outcome.failed += 1,
            }
        }
        outcome.success = areas.is_empty() || outcome.failed < areas.len();

        info!(
            "batch finished: {} analyzed, {} from cache, {} failed",
            outcome.analyzed, outcome.cached, outcome.failed
        );
        outcome
    }

    async fn analyze_area(&self, area: &AreaDescriptor) -> AreaOutcome {
        let Some(location) = area.centroid else {
            warn!("area '{}' has no centroid; skipping", area.name);
            self.status.failed.fetch_add(1, Ordering::Relaxed);
            return AreaOutcome::Failed;
        };

        let key = cache_key(location, area);
        if let Some(result) = self.cache.get(&key).await {
            self.status.cached.fetch_add(1, Ordering::Relaxed);
            return AreaOutcome::Cached(AreaAnalysis {
                area: area.name.clone(),
                from_cache: true,
                result,
            });
        }

        let observation = match self.weather.fetch(location).await {
            Ok(observation) => observation,
            Err(e) => {
                warn!("skipping area '{}': {e}", area.name);
                self.status.failed.fetch_add(1, Ordering::Relaxed);
                return AreaOutcome::Failed;
            }
        };

        let weather_score = score_weather(&observation);
        let human = self.human.assess(location, area).await;
        let result = self
            .combiner
            .combine(weather_score, &human, location, area, &observation);

        if let Err(e) = self.cache.put_bulk(key, result.clone()).await {
            warn!("failed to cache analysis for '{}': {e}", area.name);
        }

        self.status.analyzed.fetch_add(1, Ordering::Relaxed);
        AreaOutcome::Analyzed(AreaAnalysis {
            area: area.name.clone(),
            from_cache: false,
            result,
        })
    }

    fn reset_status(&self, total: usize) {
        self.status.running.store(true, Ordering::Release);
        self.status.total.store(total, Ordering::Relaxed);
        self.status.analyzed.store(0, Ordering::Relaxed);
        self.status.cached.store(0, Ordering::Relaxed);
        self.status.failed.store(0, Ordering::Relaxed);
    }

    /// Snapshot of the current (or most recent) batch.
    pub fn status(&self) -> BatchStatus {
        BatchStatus {
            running: self.status.running.load(Ordering::Acquire),
            total: self.status.total.load(Ordering::Relaxed),
            analyzed: self.status.analyzed.load(Ordering::Relaxed),
            cached: self.status.cached.load(Ordering::Relaxed),
            failed: self.status.failed.load(Ordering::Relaxed),
        }
    }

    pub fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }
}

/// Assembles the production orchestrator: rate limiters, both external
/// clients, and the persistent cache, all from one config.
pub async fn from_config(
    config: &RiskConfig,
) -> Result<AnalysisOrchestrator<WeatherClient, HumanRiskAssessor>, RiskError> {
    let clock = Arc::new(SystemClock);

    let weather_limiter = Arc::new(RateLimiter::new(config.weather_budget, config.weather_window));
    let llm_limiter = Arc::new(RateLimiter::new(config.llm_budget, config.llm_window));

    let weather = Arc::new(WeatherClient::new(config, weather_limiter, clock.clone()));
    let human = Arc::new(HumanRiskAssessor::new(config, llm_limiter));
    let cache = Arc::new(
        AnalysisCache::open(
            config.cache_file_path()?,
            crate::cache::policy::ValidityPolicy::new(config.refresh_hour),
            clock,
        )
        .await?,
    );

    Ok(AnalysisOrchestrator::builder()
        .weather(weather)
        .human(human)
        .cache(cache)
        .workers(config.workers)
        .build())
}
