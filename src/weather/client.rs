//! Weather lookup for area centroids: a short-lived in-memory cache in
//! front of the weather service's archive endpoint, with the live
//! current-conditions endpoint as fallback.

use crate::clock::Clock;
use crate::config::RiskConfig;
use crate::rate_limit::RateLimiter;
use crate::types::coordinate::LatLon;
use crate::types::weather::WeatherObservation;
use crate::weather::error::WeatherError;
use chrono::{DateTime, Timelike};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Deserialize)]
struct HistoryResponse {
    forecast: HistoryForecast,
}

#[derive(Deserialize)]
struct HistoryForecast {
    forecastday: Vec<ForecastDay>,
}

#[derive(Deserialize)]
struct ForecastDay {
    hour: Vec<HourEntry>,
}

#[derive(Deserialize)]
struct HourEntry {
    time_epoch: i64,
    temp_c: f64,
    humidity: f64,
    wind_kph: f64,
    #[serde(default)]
    precip_mm: f64,
}

#[derive(Deserialize)]
struct CurrentResponse {
    current: CurrentEntry,
}

#[derive(Deserialize)]
struct CurrentEntry {
    last_updated_epoch: i64,
    temp_c: f64,
    humidity: f64,
    wind_kph: f64,
    #[serde(default)]
    precip_mm: f64,
}

#[derive(Deserialize)]
struct ServiceErrorBody {
    error: ServiceErrorMessage,
}

#[derive(Deserialize)]
struct ServiceErrorMessage {
    message: String,
}

/// Fetches one observation per coordinate, preferring the archive entry at
/// the configured reference hour so every area in a batch is scored
/// against a comparable instant. Results live in a short in-memory cache
/// keyed by quantized coordinate; neighbouring centroids that quantize
/// identically share one upstream call.
pub struct WeatherClient {
    http: Client,
    base_url: String,
    api_key: String,
    reference_hour: u32,
    timeout: Duration,
    cache_ttl: Duration,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    short_cache: Mutex<HashMap<String, (Instant, WeatherObservation)>>,
}

impl WeatherClient {
    pub fn new(config: &RiskConfig, limiter: Arc<RateLimiter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            http: Client::new(),
            base_url: config.weather_base_url.trim_end_matches('/').to_string(),
            api_key: config.weather_api_key.clone(),
            reference_hour: config.reference_hour,
            timeout: config.request_timeout,
            cache_ttl: config.weather_cache_ttl,
            limiter,
            clock,
            short_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns an observation for the coordinate, from the short cache if
    /// fresh. Fails with [`WeatherError::Unavailable`] only when both the
    /// archive and current-conditions requests fail.
    pub async fn fetch(&self, location: LatLon) -> Result<WeatherObservation, WeatherError> {
        let key = location.quantized();

        {
            let cache = self.short_cache.lock().await;
            if let Some((fetched_at, observation)) = cache.get(&key) {
                if fetched_at.elapsed() < self.cache_ttl {
                    debug!("weather cache hit for {key}");
                    return Ok(observation.clone());
                }
            }
            // Stale or missing: release the lock before any network I/O.
        }

        self.limiter.acquire().await;

        let observation = match self.fetch_reference_hour(location).await {
            Ok(observation) => observation,
            Err(primary) => {
                warn!("reference-hour weather request failed ({primary}); falling back to current conditions");
                self.fetch_current(location)
                    .await
                    .map_err(|fallback| WeatherError::Unavailable {
                        lat: location.0,
                        lon: location.1,
                        source: Box::new(fallback),
                    })?
            }
        };

        let mut cache = self.short_cache.lock().await;
        // Another task may have fetched the same key while this one was on
        // the network; a fresh entry wins over ours.
        if let Some((fetched_at, cached)) = cache.get(&key) {
            if fetched_at.elapsed() < self.cache_ttl {
                return Ok(cached.clone());
            }
        }
        cache.insert(key, (Instant::now(), observation.clone()));
        Ok(observation)
    }

    /// Archive request for today's hourly series, taking the entry at the
    /// reference hour.
    async fn fetch_reference_hour(
        &self,
        location: LatLon,
    ) -> Result<WeatherObservation, WeatherError> {
        let url = format!("{}/v1/history.json", self.base_url);
        let date = self.clock.now_utc().format("%Y-%m-%d").to_string();
        let coordinate = format!("{:.4},{:.4}", location.0, location.1);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", coordinate.as_str()),
                ("dt", date.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| WeatherError::NetworkRequest(url.clone(), e))?;

        let response = Self::check_status(response, &url).await?;
        let body: HistoryResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::MalformedResponse(url.clone(), e))?;

        body.forecast
            .forecastday
            .first()
            .into_iter()
            .flat_map(|day| day.hour.iter())
            .find_map(|entry| {
                let timestamp = DateTime::from_timestamp(entry.time_epoch, 0)?;
                (timestamp.hour() == self.reference_hour).then(|| WeatherObservation {
                    temperature_c: entry.temp_c,
                    humidity_pct: entry.humidity,
                    wind_speed_kmh: entry.wind_kph,
                    precip_mm: entry.precip_mm,
                    timestamp,
                })
            })
            .ok_or(WeatherError::MissingHour {
                url,
                hour: self.reference_hour,
            })
    }

    /// Fallback request for current conditions at the coordinate.
    async fn fetch_current(&self, location: LatLon) -> Result<WeatherObservation, WeatherError> {
        let url = format!("{}/v1/current.json", self.base_url);
        let coordinate = format!("{:.4},{:.4}", location.0, location.1);

        let response = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", coordinate.as_str()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| WeatherError::NetworkRequest(url.clone(), e))?;

        let response = Self::check_status(response, &url).await?;
        let body: CurrentResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::MalformedResponse(url.clone(), e))?;

        let timestamp = DateTime::from_timestamp(body.current.last_updated_epoch, 0)
            .unwrap_or_else(|| self.clock.now_utc());
        Ok(WeatherObservation {
            temperature_c: body.current.temp_c,
            humidity_pct: body.current.humidity,
            wind_speed_kmh: body.current.wind_kph,
            precip_mm: body.current.precip_mm,
            timestamp,
        })
    }

    /// Non-2xx responses carry a structured error message field; surface
    /// it in the error instead of the raw body.
    async fn check_status(
        response: reqwest::Response,
        url: &str,
    ) -> Result<reqwest::Response, WeatherError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ServiceErrorBody>()
            .await
            .map(|body| body.error.message)
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(WeatherError::ServiceStatus {
            url: url.to_string(),
            status,
            message,
        })
    }
}
