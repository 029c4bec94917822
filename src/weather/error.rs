use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("weather service returned {status} for {url}: {message}")]
    ServiceStatus {
        url: String,
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("malformed weather response from {0}")]
    MalformedResponse(String, #[source] reqwest::Error),

    #[error("no hourly entry at {hour:02}:00 in response from {url}")]
    MissingHour { url: String, hour: u32 },

    /// Both the reference-hour request and the current-conditions fallback
    /// failed. Callers treat this as "skip this area this run", not fatal.
    #[error("weather unavailable for ({lat:.4}, {lon:.4}); primary and fallback both failed")]
    Unavailable {
        lat: f64,
        lon: f64,
        #[source]
        source: Box<WeatherError>,
    },
}
