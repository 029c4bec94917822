//! Deterministic weather-risk scoring. Each observation field contributes
//! a banded sub-score; the sum is clamped to [0, 100]. This is a fixed
//! heuristic, not a fire-physics model, and must be reproducible
//! bit-for-bit for identical input.

use crate::types::weather::WeatherObservation;
use chrono::Datelike;

/// Scores never drop below this floor; a near-zero output would read as
/// "no risk", which the heuristic is not qualified to claim.
const MIN_SCORE: u8 = 5;

/// Bonus applied during the June–September high season.
const SEASON_BONUS: u32 = 5;

/// Maps an observation to a weather-risk score in [0, 100]. Hotter,
/// drier, and windier conditions all push the score up, as does a dry
/// trailing week; the observation month adds a fixed high-season bonus.
pub fn score_weather(observation: &WeatherObservation) -> u8 {
    let mut score = temperature_band(observation.temperature_c)
        + humidity_band(observation.humidity_pct)
        + wind_band(observation.wind_speed_kmh)
        + precipitation_band(observation.precip_mm);

    if is_high_season(observation.timestamp.month()) {
        score += SEASON_BONUS;
    }

    (score.min(100) as u8).max(MIN_SCORE)
}

/// Temperature factor, 5–30 points.
fn temperature_band(temperature_c: f64) -> u32 {
    if temperature_c >= 30.0 {
        30
    } else if temperature_c >= 25.0 {
        25
    } else if temperature_c >= 20.0 {
        20
    } else if temperature_c >= 15.0 {
        15
    } else if temperature_c >= 10.0 {
        10
    } else {
        5
    }
}

/// Humidity factor, 0–25 points; drier air scores higher.
fn humidity_band(humidity_pct: f64) -> u32 {
    if humidity_pct <= 30.0 {
        25
    } else if humidity_pct <= 40.0 {
        20
    } else if humidity_pct <= 50.0 {
        15
    } else if humidity_pct <= 60.0 {
        10
    } else if humidity_pct <= 70.0 {
        5
    } else {
        0
    }
}

/// Wind factor, 0–25 points.
fn wind_band(wind_speed_kmh: f64) -> u32 {
    if wind_speed_kmh >= 50.0 {
        25
    } else if wind_speed_kmh >= 40.0 {
        20
    } else if wind_speed_kmh >= 30.0 {
        15
    } else if wind_speed_kmh >= 20.0 {
        10
    } else if wind_speed_kmh >= 10.0 {
        5
    } else {
        0
    }
}

/// Precipitation factor, 0–20 points; a dry week scores highest.
fn precipitation_band(precip_mm: f64) -> u32 {
    if precip_mm <= 5.0 {
        20
    } else if precip_mm <= 10.0 {
        15
    } else if precip_mm <= 20.0 {
        10
    } else if precip_mm <= 30.0 {
        5
    } else {
        0
    }
}

fn is_high_season(month: u32) -> bool {
    (6..=9).contains(&month)
}
