//! Engine configuration. Every knob has a default except the two external
//! service credentials; absence of a credential at startup is the one
//! fatal, process-level condition in this crate.

use crate::error::RiskError;
use bon::Builder;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const CACHE_DIR_NAME: &str = "pyrorisk";
const CACHE_FILE_NAME: &str = "analysis_cache.json";

/// Configuration for the analysis engine and its external collaborators.
///
/// Build one with [`RiskConfig::builder()`] (credentials required, the
/// rest defaulted) or [`RiskConfig::from_env()`].
#[derive(Debug, Clone, Builder)]
pub struct RiskConfig {
    /// Weather service root, e.g. `https://api.weatherapi.com`.
    #[builder(into, default = "https://api.weatherapi.com".to_string())]
    pub weather_base_url: String,
    #[builder(into)]
    pub weather_api_key: String,

    /// OpenAI-compatible chat-completions root, e.g. `https://api.groq.com/openai`.
    #[builder(into, default = "https://api.groq.com/openai".to_string())]
    pub llm_base_url: String,
    #[builder(into)]
    pub llm_api_key: String,
    #[builder(into, default = "llama3-8b-8192".to_string())]
    pub llm_model: String,

    /// Hour of day whose archive observation is preferred over current
    /// conditions, so every area in a batch is scored at a comparable
    /// instant.
    #[builder(default = 12)]
    pub reference_hour: u32,

    /// Hour of day at which cached analyses expire (the validity boundary).
    #[builder(default = 12)]
    pub refresh_hour: u32,

    /// Daily wall-clock hours (UTC) at which the scheduler runs a full batch.
    #[builder(default = vec![0, 12])]
    pub fire_hours: Vec<u32>,

    /// Fixed worker-pool size for batch fan-out, independent of batch size.
    #[builder(default = 3)]
    pub workers: usize,

    /// Weather service rate budget: at most `weather_budget` calls per
    /// `weather_window`.
    #[builder(default = 60)]
    pub weather_budget: usize,
    #[builder(default = Duration::from_secs(60))]
    pub weather_window: Duration,

    /// Language-model service rate budget.
    #[builder(default = 30)]
    pub llm_budget: usize,
    #[builder(default = Duration::from_secs(60))]
    pub llm_window: Duration,

    /// Per-request timeout for both external services.
    #[builder(default = Duration::from_secs(10))]
    pub request_timeout: Duration,

    /// Lifetime of the weather client's short in-memory cache.
    #[builder(default = Duration::from_secs(3600))]
    pub weather_cache_ttl: Duration,

    /// Delay between a scheduled batch finishing and the cache sweep.
    #[builder(default = Duration::from_secs(60))]
    pub sweep_delay: Duration,

    /// Path of the persistent analysis cache file. Defaults to
    /// `analysis_cache.json` under the system cache directory.
    pub cache_file: Option<PathBuf>,
}

impl RiskConfig {
    /// Reads credentials from `WEATHER_API_KEY` and `LLM_API_KEY`, with
    /// optional base-URL overrides in `WEATHER_API_URL` and `LLM_API_URL`
    /// and a model override in `LLM_MODEL`. Everything else keeps its
    /// default.
    pub fn from_env() -> Result<Self, RiskError> {
        let weather_api_key =
            env::var("WEATHER_API_KEY").map_err(|_| RiskError::MissingConfig("WEATHER_API_KEY"))?;
        let llm_api_key =
            env::var("LLM_API_KEY").map_err(|_| RiskError::MissingConfig("LLM_API_KEY"))?;

        Ok(Self::builder()
            .weather_api_key(weather_api_key)
            .llm_api_key(llm_api_key)
            .maybe_weather_base_url(env::var("WEATHER_API_URL").ok())
            .maybe_llm_base_url(env::var("LLM_API_URL").ok())
            .maybe_llm_model(env::var("LLM_MODEL").ok())
            .build())
    }

    /// Resolves the cache file path, falling back to the system cache
    /// directory when none was configured.
    pub fn cache_file_path(&self) -> Result<PathBuf, RiskError> {
        match &self.cache_file {
            Some(path) => Ok(path.clone()),
            None => dirs::cache_dir()
                .map(|dir| dir.join(CACHE_DIR_NAME).join(CACHE_FILE_NAME))
                .ok_or(RiskError::CacheDirResolution),
        }
    }
}
