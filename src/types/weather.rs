use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single weather observation for an area centroid. Transient: consumed
/// by the scorer and embedded in the combined result, never persisted on
/// its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub wind_speed_kmh: f64,
    /// Recent precipitation total in millimetres. A dry run of days pushes
    /// the fire risk up, so low values score high.
    pub precip_mm: f64,
    pub timestamp: DateTime<Utc>,
}
