use serde::{Deserialize, Serialize};

/// Mean Earth radius (meters) used for great-circle distances.
///
/// The WGS84 semi-major axis overstates short distances by ~0.1%, which is
/// irrelevant at parcel scale, but the mean radius is what the listing
/// backend uses for its own radius queries.
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// Geographic point in degrees.
///
/// Field order matches the map engine convention (`[lng, lat]`).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// True when both components are finite and inside the valid ranges.
    ///
    /// `(0, 0)` is rejected as well: listings without geocoding come back from
    /// the backend as null island rather than as a missing point.
    pub fn is_located(&self) -> bool {
        self.lng.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lng)
            && (-90.0..=90.0).contains(&self.lat)
            && !(self.lng == 0.0 && self.lat == 0.0)
    }

    /// Great-circle distance to `other` in meters (haversine).
    pub fn distance_m(&self, other: LngLat) -> f64 {
        haversine_m(*self, other)
    }
}

pub fn haversine_m(a: LngLat, b: LngLat) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat * 0.5).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng * 0.5).sin().powi(2);
    let c = 2.0 * h.sqrt().clamp(0.0, 1.0).asin();
    EARTH_MEAN_RADIUS_M * c
}

/// Wrap a bearing in degrees into `[0, 360)`.
pub fn wrap_bearing(deg: f64) -> f64 {
    if !deg.is_finite() {
        return 0.0;
    }
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs due to rounding.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Clamp a pitch in degrees into the engine's supported `[0, 60]` range.
pub fn clamp_pitch(deg: f64) -> f64 {
    if deg.is_finite() { deg.clamp(0.0, 60.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::{LngLat, clamp_pitch, haversine_m, wrap_bearing};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = LngLat::new(55.27, 25.2);
        assert_close(haversine_m(p, p), 0.0, 1e-9);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let a = LngLat::new(10.0, 0.0);
        let b = LngLat::new(10.0, 1.0);
        assert_close(haversine_m(a, b), 111_195.0, 50.0);
    }

    #[test]
    fn short_parcel_scale_distance() {
        // ~0.0054° of latitude is roughly 600 m.
        let a = LngLat::new(55.1390, 25.0805);
        let b = LngLat::new(55.1390, 25.0859);
        assert_close(a.distance_m(b), 600.0, 5.0);
    }

    #[test]
    fn null_island_is_not_located() {
        assert!(!LngLat::new(0.0, 0.0).is_located());
        assert!(!LngLat::new(f64::NAN, 10.0).is_located());
        assert!(!LngLat::new(200.0, 10.0).is_located());
        assert!(LngLat::new(-73.98, 40.75).is_located());
    }

    #[test]
    fn bearing_wraps_both_directions() {
        assert_close(wrap_bearing(370.0), 10.0, 1e-9);
        assert_close(wrap_bearing(-10.0), 350.0, 1e-9);
        assert_close(wrap_bearing(360.0), 0.0, 1e-9);
        assert_eq!(wrap_bearing(f64::INFINITY), 0.0);
    }

    #[test]
    fn pitch_is_clamped() {
        assert_eq!(clamp_pitch(75.0), 60.0);
        assert_eq!(clamp_pitch(-5.0), 0.0);
        assert_eq!(clamp_pitch(f64::NAN), 0.0);
    }
}
