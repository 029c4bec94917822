use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
/// Both values are represented as `f64`.
///
/// # Examples
///
/// ```
/// use pyrorisk::LatLon;
///
/// let antalya = LatLon(36.8969, 30.7133);
/// assert_eq!(antalya.0, 36.8969); // Latitude
/// assert_eq!(antalya.1, 30.7133); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    /// Renders the coordinate at four decimal places (roughly 11 m of
    /// latitude), the resolution used for cache keys. Two coordinates that
    /// quantize identically share cached results.
    ///
    /// ```
    /// use pyrorisk::LatLon;
    ///
    /// assert_eq!(LatLon(36.89691, 30.71329).quantized(), "36.8969,30.7133");
    /// ```
    pub fn quantized(&self) -> String {
        format!("{:.4},{:.4}", self.0, self.1)
    }
}
