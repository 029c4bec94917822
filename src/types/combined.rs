use crate::types::area::LandUse;
use crate::types::assessment::RiskFactor;
use crate::types::weather::WeatherObservation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualitative risk tier assigned from the combined score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        };
        f.write_str(s)
    }
}

/// One row of the tiering table: scores at or above `threshold` (and below
/// any higher tier) map to `level`/`color`.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskTier {
    pub threshold: f64,
    pub level: RiskLevel,
    pub color: String,
}

/// Score-to-tier mapping, ordered by descending threshold. Thresholds are
/// a table rather than hard-coded comparisons so deployments can tune the
/// bands without touching every call site.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskTiers(Vec<RiskTier>);

impl Default for RiskTiers {
    fn default() -> Self {
        Self(vec![
            RiskTier {
                threshold: 70.0,
                level: RiskLevel::High,
                color: "red".to_string(),
            },
            RiskTier {
                threshold: 40.0,
                level: RiskLevel::Medium,
                color: "orange".to_string(),
            },
            RiskTier {
                threshold: 0.0,
                level: RiskLevel::Low,
                color: "green".to_string(),
            },
        ])
    }
}

impl RiskTiers {
    /// Builds a tier table from rows; they are sorted by descending
    /// threshold so classification is a first-match scan. At least one
    /// tier is required.
    pub fn new(mut tiers: Vec<RiskTier>) -> Self {
        assert!(!tiers.is_empty(), "tier table must have at least one tier");
        tiers.sort_by(|a, b| b.threshold.total_cmp(&a.threshold));
        Self(tiers)
    }

    pub fn classify(&self, score: f64) -> &RiskTier {
        self.0
            .iter()
            .find(|tier| score >= tier.threshold)
            .unwrap_or_else(|| &self.0[self.0.len() - 1])
    }
}

/// The final combined risk payload for one area: the unit of caching and
/// the flat object the map front end consumes. Field names are the wire
/// contract; renaming them breaks the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRiskResult {
    pub combined_risk_score: f64,
    pub combined_risk_level: RiskLevel,
    pub combined_risk_color: String,
    pub weather_risk_score: f64,
    pub human_risk_score: f64,
    /// Weather weight as a percentage, one decimal.
    pub weather_weight: f64,
    /// Human weight as a percentage, one decimal.
    pub human_weight: f64,
    pub weather_data: WeatherObservation,
    pub human_risk_factors: Vec<RiskFactor>,
    pub analysis: String,
    /// Distance to the nearest reference city, kilometres, one decimal.
    pub distance_from_city: f64,
    pub nearest_city: String,
    pub area_type: LandUse,
    pub area_size: f64,
}
