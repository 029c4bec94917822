//! Combines the deterministic weather score and the human-caused score
//! into one weighted result. Weights are dynamic: they depend on land
//! use, distance from the nearest reference city, and area size.

use crate::types::area::{AreaDescriptor, LandUse};
use crate::types::assessment::HumanRiskAssessment;
use crate::types::combined::{CombinedRiskResult, RiskTiers};
use crate::types::coordinate::LatLon;
use crate::types::weather::WeatherObservation;
use haversine::{distance, Location, Units};

/// A population centre used to estimate how close an area is to dense
/// human activity.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceCity {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

/// The twenty reference cities. Distance to the nearest of these drives
/// the human-weight distance factor.
pub const REFERENCE_CITIES: [ReferenceCity; 20] = [
    ReferenceCity { name: "istanbul", lat: 41.0082, lon: 28.9784 },
    ReferenceCity { name: "ankara", lat: 39.9334, lon: 32.8597 },
    ReferenceCity { name: "izmir", lat: 38.4192, lon: 27.1287 },
    ReferenceCity { name: "bursa", lat: 40.1885, lon: 29.0610 },
    ReferenceCity { name: "antalya", lat: 36.8969, lon: 30.7133 },
    ReferenceCity { name: "adana", lat: 37.0000, lon: 35.3213 },
    ReferenceCity { name: "konya", lat: 37.8667, lon: 32.4833 },
    ReferenceCity { name: "gaziantep", lat: 37.0662, lon: 37.3833 },
    ReferenceCity { name: "kayseri", lat: 38.7205, lon: 35.4826 },
    ReferenceCity { name: "mersin", lat: 36.8000, lon: 34.6333 },
    ReferenceCity { name: "diyarbakir", lat: 37.9144, lon: 40.2306 },
    ReferenceCity { name: "samsun", lat: 41.2867, lon: 36.3300 },
    ReferenceCity { name: "denizli", lat: 37.7765, lon: 29.0864 },
    ReferenceCity { name: "eskisehir", lat: 39.7767, lon: 30.5206 },
    ReferenceCity { name: "urfa", lat: 37.1591, lon: 38.7969 },
    ReferenceCity { name: "malatya", lat: 38.3552, lon: 38.3095 },
    ReferenceCity { name: "erzurum", lat: 39.9000, lon: 41.2700 },
    ReferenceCity { name: "van", lat: 38.4891, lon: 43.4089 },
    ReferenceCity { name: "batman", lat: 37.8812, lon: 41.1351 },
    ReferenceCity { name: "elazig", lat: 38.6810, lon: 39.2264 },
];

/// Great-circle distance (km) to the closest reference city, plus its
/// name.
pub fn nearest_reference_city(location: LatLon) -> (f64, &'static str) {
    let mut nearest = (f64::INFINITY, "");
    for city in &REFERENCE_CITIES {
        // `distance` consumes its arguments, so build both per candidate.
        let here = Location {
            latitude: location.0,
            longitude: location.1,
        };
        let there = Location {
            latitude: city.lat,
            longitude: city.lon,
        };
        let km = distance(here, there, Units::Kilometers);
        if km < nearest.0 {
            nearest = (km, city.name);
        }
    }
    nearest
}

/// Combines weather and human risk scores under dynamic weights and
/// classifies the result against a tier table.
#[derive(Debug, Clone, Default)]
pub struct RiskCombiner {
    tiers: RiskTiers,
}

impl RiskCombiner {
    pub fn new(tiers: RiskTiers) -> Self {
        Self { tiers }
    }

    /// Produces the combined result for one area. `weather_score` comes
    /// from [`score_weather`](crate::scorer::score_weather); the human
    /// side carries its own factors and narrative through unchanged.
    pub fn combine(
        &self,
        weather_score: u8,
        human: &HumanRiskAssessment,
        location: LatLon,
        area: &AreaDescriptor,
        observation: &WeatherObservation,
    ) -> CombinedRiskResult {
        let (distance_km, city) = nearest_reference_city(location);
        let (weather_weight, human_weight) = dynamic_weights(area, distance_km);

        let weather_score = weather_score as f64;
        let combined = round1(weather_score * weather_weight + human.score * human_weight);
        let tier = self.tiers.classify(combined);

        CombinedRiskResult {
            combined_risk_score: combined,
            combined_risk_level: tier.level,
            combined_risk_color: tier.color.to_string(),
            weather_risk_score: weather_score,
            human_risk_score: human.score,
            weather_weight: round1(weather_weight * 100.0),
            human_weight: round1(human_weight * 100.0),
            weather_data: observation.clone(),
            human_risk_factors: human.factors.clone(),
            analysis: human.narrative.clone(),
            distance_from_city: round1(distance_km),
            nearest_city: city.to_string(),
            area_type: area.land_use,
            area_size: area.area_ha,
        }
    }
}

/// Weather and human weights as fractions summing to 1. The human share
/// starts from a land-use base, scales with proximity to a reference
/// city and with area size, and is clamped to [0.1, 0.8].
fn dynamic_weights(area: &AreaDescriptor, distance_km: f64) -> (f64, f64) {
    let base: f64 = match area.land_use {
        LandUse::Forest => 0.30,
        LandUse::Agricultural => 0.50,
        LandUse::Urban => 0.70,
        LandUse::Other => 0.40,
    };

    let distance_factor = if distance_km <= 5.0 {
        1.5
    } else if distance_km <= 15.0 {
        1.2
    } else if distance_km <= 30.0 {
        1.0
    } else if distance_km <= 50.0 {
        0.8
    } else if distance_km <= 100.0 {
        0.6
    } else {
        0.4
    };

    // Large areas are mostly empty of people; small ones concentrate them.
    let size_factor = if area.area_ha > 1000.0 {
        0.8
    } else if area.area_ha > 100.0 {
        1.0
    } else {
        1.2
    };

    let human = (base * distance_factor * size_factor).clamp(0.1, 0.8);
    (1.0 - human, human)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::combined::RiskLevel;
    use chrono::{TimeZone, Utc};

    fn area(land_use: LandUse, area_ha: f64) -> AreaDescriptor {
        AreaDescriptor::new("test area", land_use, area_ha, None)
    }

    fn observation() -> WeatherObservation {
        WeatherObservation {
            temperature_c: 31.0,
            humidity_pct: 28.0,
            wind_speed_kmh: 35.0,
            precip_mm: 0.0,
            timestamp: Utc.with_ymd_and_hms(2025, 7, 20, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn weights_always_sum_to_one() {
        for land_use in [
            LandUse::Forest,
            LandUse::Agricultural,
            LandUse::Urban,
            LandUse::Other,
        ] {
            for size in [10.0, 500.0, 5000.0] {
                for km in [1.0, 10.0, 25.0, 45.0, 80.0, 300.0] {
                    let (weather, human) = dynamic_weights(&area(land_use, size), km);
                    assert!((weather + human - 1.0).abs() < 1e-9);
                    assert!((0.1..=0.8).contains(&human));
                }
            }
        }
    }

    #[test]
    fn urban_near_city_weighs_human_heavier_than_remote_forest() {
        let (_, urban_close) = dynamic_weights(&area(LandUse::Urban, 50.0), 2.0);
        let (_, forest_remote) = dynamic_weights(&area(LandUse::Forest, 5000.0), 80.0);
        assert!(urban_close > forest_remote);
        // Urban, tiny, right next to a city hits the upper clamp.
        assert_eq!(urban_close, 0.8);
    }

    #[test]
    fn remote_forest_hits_the_lower_clamp() {
        let (_, human) = dynamic_weights(&area(LandUse::Forest, 5000.0), 300.0);
        assert!((human - 0.1).abs() < 1e-9);
    }

    #[test]
    fn nearest_city_for_central_ankara_is_ankara() {
        let (km, name) = nearest_reference_city(LatLon(39.93, 32.86));
        assert_eq!(name, "ankara");
        assert!(km < 5.0);
    }

    #[test]
    fn combined_score_stays_in_range_and_classifies() {
        let combiner = RiskCombiner::default();
        let human = HumanRiskAssessment {
            score: 85.0,
            factors: vec![],
            narrative: "dense settlement".to_string(),
        };
        let result = combiner.combine(
            95,
            &human,
            LatLon(36.90, 30.70),
            &area(LandUse::Urban, 40.0),
            &observation(),
        );
        assert!((0.0..=100.0).contains(&result.combined_risk_score));
        assert_eq!(result.combined_risk_level, RiskLevel::High);
        assert_eq!(result.combined_risk_color, "red");
        // Weights are reported as percentages.
        assert!((result.weather_weight + result.human_weight - 100.0).abs() < 0.2);
    }

    #[test]
    fn human_side_passes_through_unchanged() {
        let combiner = RiskCombiner::default();
        let human = HumanRiskAssessment::fallback();
        let result = combiner.combine(
            50,
            &human,
            LatLon(38.0, 35.0),
            &area(LandUse::Agricultural, 200.0),
            &observation(),
        );
        assert_eq!(result.human_risk_score, 50.0);
        assert_eq!(result.human_risk_factors.len(), 3);
        assert_eq!(result.analysis, human.narrative);
    }
}
