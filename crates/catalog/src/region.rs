use foundation::{GeoBounds, LngLat};

/// Region used when geolocation is unavailable, denied, or outside every
/// known region.
pub const FALLBACK_REGION_ID: &str = "gulf";

/// A named camera pose in a scripted itinerary.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Waypoint {
    pub name: &'static str,
    pub center: LngLat,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
}

const fn wp(name: &'static str, lng: f64, lat: f64, zoom: f64, pitch: f64, bearing: f64) -> Waypoint {
    Waypoint {
        name,
        center: LngLat::new(lng, lat),
        zoom,
        pitch,
        bearing,
    }
}

/// Market region with its scripted fly-over.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: &'static str,
    pub name: &'static str,
    pub bounds: GeoBounds,
    pub itinerary: &'static [Waypoint],
}

impl Region {
    pub fn contains(&self, p: LngLat) -> bool {
        self.bounds.contains(p)
    }
}

static REGIONS: &[Region] = &[
    Region {
        id: "gulf",
        name: "Gulf",
        bounds: GeoBounds::new(51.0, 22.5, 57.5, 27.0),
        itinerary: &[
            wp("Dubai Marina", 55.1403, 25.0805, 13.5, 58.0, -20.0),
            wp("Palm Jumeirah", 55.1386, 25.1124, 12.8, 50.0, 35.0),
            wp("Downtown Dubai", 55.2744, 25.1972, 14.0, 60.0, 160.0),
            wp("Dubai Creek Harbour", 55.3456, 25.2048, 13.2, 55.0, 250.0),
            wp("Saadiyat Island", 54.4334, 24.5440, 12.6, 45.0, 300.0),
        ],
    },
    Region {
        id: "europe",
        name: "Europe",
        bounds: GeoBounds::new(-11.0, 35.0, 30.0, 60.0),
        itinerary: &[
            wp("London, Canary Wharf", -0.0235, 51.5054, 13.8, 55.0, 20.0),
            wp("Paris, Le Marais", 2.3615, 48.8590, 14.0, 50.0, 110.0),
            wp("Barcelona, Eixample", 2.1620, 41.3930, 13.5, 55.0, 45.0),
            wp("Lisbon, Alfama", -9.1300, 38.7118, 14.2, 58.0, 200.0),
        ],
    },
    Region {
        id: "north_america",
        name: "North America",
        bounds: GeoBounds::new(-130.0, 24.0, -60.0, 50.0),
        itinerary: &[
            wp("Manhattan", -73.9857, 40.7484, 13.8, 60.0, 30.0),
            wp("Miami Beach", -80.1300, 25.7907, 13.2, 52.0, 95.0),
            wp("Austin", -97.7431, 30.2672, 13.0, 48.0, 180.0),
            wp("Santa Monica", -118.4912, 34.0195, 13.4, 55.0, 270.0),
        ],
    },
];

pub fn regions() -> &'static [Region] {
    REGIONS
}

pub fn fallback_region() -> &'static Region {
    REGIONS
        .iter()
        .find(|r| r.id == FALLBACK_REGION_ID)
        .unwrap_or(&REGIONS[0])
}

/// Region containing `position`, or the fallback region.
pub fn detect_region(position: Option<LngLat>) -> &'static Region {
    position
        .filter(LngLat::is_located)
        .and_then(|p| REGIONS.iter().find(|r| r.contains(p)))
        .unwrap_or_else(fallback_region)
}
