use crate::types::coordinate::LatLon;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Land-use category of an analyzed area, as carried in the source
/// polygon data. The category drives the base human-risk weight: human
/// activity matters least in remote forest and most in urban areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandUse {
    Forest,
    Agricultural,
    Urban,
    Other,
}

impl LandUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            LandUse::Forest => "forest",
            LandUse::Agricultural => "agricultural",
            LandUse::Urban => "urban",
            LandUse::Other => "other",
        }
    }
}

impl fmt::Display for LandUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable descriptor of one analyzed area (a polygon's properties plus
/// its centroid). `centroid` is `None` when the source data carried no
/// usable geometry; such areas are tallied as failed and skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaDescriptor {
    pub name: String,
    #[serde(rename = "landuse")]
    pub land_use: LandUse,
    /// Area size in hectares.
    pub area_ha: f64,
    pub centroid: Option<LatLon>,
}

impl AreaDescriptor {
    pub fn new(
        name: impl Into<String>,
        land_use: LandUse,
        area_ha: f64,
        centroid: Option<LatLon>,
    ) -> Self {
        Self {
            name: name.into(),
            land_use,
            area_ha,
            centroid,
        }
    }
}
