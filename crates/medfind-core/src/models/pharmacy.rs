//! Pharmacy and inventory models.
//!
//! Pharmacies and their stock are owned by the pharmacy store; the resolver
//! only reads them.

use serde::{Deserialize, Serialize};

/// A point on the earth's surface, in degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check that both coordinates are finite and in range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Public profile of a pharmacy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pharmacy {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub location: GeoPoint,
}

impl Pharmacy {
    /// Create a pharmacy with a generated ID.
    pub fn new(name: String, location: GeoPoint) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            address: None,
            phone: None,
            location,
        }
    }
}

/// One line of a pharmacy's stock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryItem {
    /// Normalized medicine name
    pub medicine: String,
    pub quantity: u32,
    pub price: Option<f64>,
}

/// Which inventory lines a stock query selects. Either way only lines with
/// a positive quantity qualify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryFilter {
    /// Medicine name contains the text, case-insensitively
    Contains(String),
    /// Medicine name equals the normalized name
    Exact(String),
}

impl InventoryFilter {
    pub fn contains(text: &str) -> Self {
        InventoryFilter::Contains(super::normalize_name(text))
    }

    pub fn exact(name: &str) -> Self {
        InventoryFilter::Exact(super::normalize_name(name))
    }

    /// The normalized text the filter compares against.
    pub fn needle(&self) -> &str {
        match self {
            InventoryFilter::Contains(s) | InventoryFilter::Exact(s) => s,
        }
    }
}

/// A pharmacy that stocks something matching the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryMatch {
    pub pharmacy: Pharmacy,
    /// Great-circle distance from the search center in meters; absent when
    /// the search had no center.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// The matching, in-stock items only
    pub items: Vec<InventoryItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validity() {
        assert!(GeoPoint::new(28.6139, 77.2090).is_valid());
        assert!(GeoPoint::new(-90.0, 180.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_filter_normalizes_needle() {
        assert_eq!(InventoryFilter::exact(" PARACETAMOL ").needle(), "paracetamol");
        assert_eq!(
            InventoryFilter::contains("Dolo  650"),
            InventoryFilter::Contains("dolo 650".into())
        );
    }

    #[test]
    fn test_match_without_distance_omits_field() {
        let m = InventoryMatch {
            pharmacy: Pharmacy::new("Apollo".into(), GeoPoint::new(0.0, 0.0)),
            distance: None,
            items: vec![],
        };
        let json = serde_json::to_value(&m).unwrap();
        assert!(json.get("distance").is_none());
    }
}
