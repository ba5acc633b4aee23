//! Great-circle distance on a spherical earth.

use crate::models::GeoPoint;

/// Earth radius in meters, matching the spherical model used by 2dsphere indexes.
pub const EARTH_RADIUS_M: f64 = 6_378_100.0;

/// Haversine distance between two points in meters.
pub fn haversine_distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Latitude/longitude window that contains every point within a radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    /// `None` when the window wraps the antimeridian or covers a pole, in
    /// which case longitude can't be used to pre-filter.
    pub lng_range: Option<(f64, f64)>,
}

impl BoundingBox {
    /// Smallest window around `center` containing the circle of `radius_m`.
    pub fn around(center: GeoPoint, radius_m: f64) -> Self {
        let r = radius_m / EARTH_RADIUS_M;
        let dlat = r.to_degrees();
        let min_lat = center.lat - dlat;
        let max_lat = center.lat + dlat;

        let s = r.sin() / center.lat.to_radians().cos();
        let lng_range = if min_lat <= -90.0 || max_lat >= 90.0 || !(0.0..1.0).contains(&s) {
            None
        } else {
            let dlng = s.asin().to_degrees();
            let (lo, hi) = (center.lng - dlng, center.lng + dlng);
            (lo >= -180.0 && hi <= 180.0).then_some((lo, hi))
        };

        Self {
            min_lat: min_lat.max(-90.0),
            max_lat: max_lat.min(90.0),
            lng_range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = GeoPoint::new(28.6139, 77.2090);
        assert!(haversine_distance_m(p, p).abs() < 1e-6);
    }

    #[test]
    fn test_known_distance() {
        // Connaught Place to India Gate, roughly 2.4 km.
        let cp = GeoPoint::new(28.6315, 77.2167);
        let gate = GeoPoint::new(28.6129, 77.2295);
        let d = haversine_distance_m(cp, gate);
        assert!(d > 2_200.0 && d < 2_600.0, "got {}", d);
    }

    #[test]
    fn test_symmetric() {
        let a = GeoPoint::new(51.5, -0.12);
        let b = GeoPoint::new(48.85, 2.35);
        let ab = haversine_distance_m(a, b);
        let ba = haversine_distance_m(b, a);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_bounding_box_contains_radius() {
        let center = GeoPoint::new(28.6139, 77.2090);
        let bbox = BoundingBox::around(center, 50_000.0);
        let (lo, hi) = bbox.lng_range.unwrap();

        let north = GeoPoint::new(bbox.max_lat, center.lng);
        let east = GeoPoint::new(center.lat, hi);
        assert!(haversine_distance_m(center, north) >= 49_999.0);
        assert!(haversine_distance_m(center, east) >= 49_999.0);
        assert!(lo < center.lng);
        assert!(bbox.min_lat < center.lat && center.lat < bbox.max_lat);
        assert!(bbox.max_lat < 30.0);
    }

    #[test]
    fn test_bounding_box_near_antimeridian() {
        let bbox = BoundingBox::around(GeoPoint::new(0.0, 179.9), 50_000.0);
        assert!(bbox.lng_range.is_none());
        assert!(bbox.min_lat < 0.0 && bbox.max_lat > 0.0);
    }
}
