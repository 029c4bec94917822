use serde::{Deserialize, Serialize};

/// One named contributor to the human-caused risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor: String,
    pub score: f64,
    #[serde(default)]
    pub description: String,
}

impl RiskFactor {
    pub fn new(factor: impl Into<String>, score: f64, description: impl Into<String>) -> Self {
        Self {
            factor: factor.into(),
            score,
            description: description.into(),
        }
    }
}

/// Human-caused risk assessment as produced by the language-model service.
///
/// The [`fallback`](HumanRiskAssessment::fallback) value stands in whenever
/// the external call fails or its response cannot be parsed; downstream
/// combination must never fail because the model was unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanRiskAssessment {
    /// Overall human-caused risk, 0–100.
    pub score: f64,
    pub factors: Vec<RiskFactor>,
    pub narrative: String,
}

impl HumanRiskAssessment {
    /// The fixed default assessment: a neutral score with three canned
    /// factors. Part of the assessor's contract, not an afterthought.
    pub fn fallback() -> Self {
        Self {
            score: 50.0,
            factors: vec![
                RiskFactor::new("Settlement proximity", 50.0, "Moderate risk"),
                RiskFactor::new("Tourism activity", 40.0, "Low to moderate risk"),
                RiskFactor::new("Road network", 60.0, "Moderate to high risk"),
            ],
            narrative: "Human-caused risk factors could not be assessed; \
                        using the baseline assessment."
                .to_string(),
        }
    }
}
