//! Wildfire-risk analysis engine: fetches weather per area, scores it with
//! a fixed heuristic, asks a language model for the human-caused side,
//! combines the two under dynamic weights, and caches results until the
//! next refresh boundary. A scheduler re-runs the whole batch at fixed
//! hours of day.
//!
//! # Examples
//!
//! ```no_run
//! use pyrorisk::{orchestrator, AreaDescriptor, LandUse, LatLon, RiskConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RiskConfig::from_env()?;
//! let engine = orchestrator::from_config(&config).await?;
//!
//! let areas = vec![AreaDescriptor::new(
//!     "Belgrad Forest",
//!     LandUse::Forest,
//!     5500.0,
//!     Some(LatLon(41.1858, 28.9769)),
//! )];
//! let outcome = engine.run_batch(&areas).await;
//! println!("{} analyzed, {} cached", outcome.analyzed, outcome.cached);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod combine;
pub mod config;
mod error;
pub mod human;
pub mod orchestrator;
pub mod rate_limit;
pub mod scheduler;
pub mod scorer;
pub mod types;
pub mod weather;

pub use error::RiskError;

pub use cache::error::CacheError;
pub use cache::policy::ValidityPolicy;
pub use cache::store::{cache_key, AnalysisCache, CacheEntry, CacheStats};
pub use clock::{Clock, ManualClock, SystemClock};
pub use combine::{nearest_reference_city, ReferenceCity, RiskCombiner, REFERENCE_CITIES};
pub use config::RiskConfig;
pub use human::assessor::HumanRiskAssessor;
pub use human::error::AssessError;
pub use orchestrator::{
    AnalysisOrchestrator, AreaAnalysis, BatchOutcome, BatchStatus, HumanRiskProvider,
    WeatherProvider,
};
pub use rate_limit::RateLimiter;
pub use scheduler::{next_fire_time, Scheduler};
pub use scorer::score_weather;
pub use types::area::{AreaDescriptor, LandUse};
pub use types::assessment::{HumanRiskAssessment, RiskFactor};
pub use types::combined::{CombinedRiskResult, RiskLevel, RiskTier, RiskTiers};
pub use types::coordinate::LatLon;
pub use types::weather::WeatherObservation;
pub use weather::client::WeatherClient;
pub use weather::error::WeatherError;
