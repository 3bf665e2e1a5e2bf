use serde::{Deserialize, Serialize};

use crate::geo::LngLat;

/// Axis-aligned geographic bounds in degrees.
///
/// Bounds never cross the antimeridian: regions and viewports that would are
/// split by the caller.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        GeoBounds {
            west,
            south,
            east,
            north,
        }
    }

    /// The whole globe.
    pub const fn world() -> Self {
        GeoBounds::new(-180.0, -90.0, 180.0, 90.0)
    }

    pub fn contains(&self, p: LngLat) -> bool {
        p.lng >= self.west && p.lng <= self.east && p.lat >= self.south && p.lat <= self.north
    }

    pub fn center(&self) -> LngLat {
        LngLat::new((self.west + self.east) * 0.5, (self.south + self.north) * 0.5)
    }

    pub fn lat_span(&self) -> f64 {
        (self.north - self.south).max(0.0)
    }
}
