use crate::cache::error::CacheError;
use crate::weather::error::WeatherError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("missing required configuration value '{0}'")]
    MissingConfig(&'static str),

    #[error("could not determine a cache directory for the analysis store")]
    CacheDirResolution,
}
