//! Built-in demo listings rendered when the listing service cannot be reached,
//! so the map never starts empty.

use foundation::LngLat;

use crate::memory::InMemoryTourService;
use crate::property::{ListingType, Property, PropertyId};

/// Ids of demo listings live far above real backend ids.
pub const DEMO_ID_BASE: u64 = 9_000_000;

struct DemoListing {
    name: &'static str,
    lng: f64,
    lat: f64,
    price: f64,
    size: f64,
    listing_type: ListingType,
    tour: Option<&'static str>,
}

const DEMO_LISTINGS: &[DemoListing] = &[
    DemoListing {
        name: "Marina Gate Residence",
        lng: 55.1403,
        lat: 25.0872,
        price: 2_350_000.0,
        size: 118.0,
        listing_type: ListingType::Sale,
        tour: Some("https://tours.example.com/demo/marina-gate"),
    },
    DemoListing {
        name: "Palm Frond Villa",
        lng: 55.1386,
        lat: 25.1124,
        price: 14_900_000.0,
        size: 540.0,
        listing_type: ListingType::Sale,
        tour: Some("https://tours.example.com/demo/palm-frond"),
    },
    DemoListing {
        name: "Downtown Boulevard Loft",
        lng: 55.2744,
        lat: 25.1972,
        price: 185_000.0,
        size: 96.0,
        listing_type: ListingType::Rent,
        tour: None,
    },
    DemoListing {
        name: "Business Bay Canal Suite",
        lng: 55.2654,
        lat: 25.1850,
        price: 1_480_000.0,
        size: 81.0,
        listing_type: ListingType::Sale,
        tour: Some("https://tours.example.com/demo/canal-suite"),
    },
    DemoListing {
        name: "Creek Harbour Tower",
        lng: 55.3456,
        lat: 25.2048,
        price: 1_950_000.0,
        size: 104.0,
        listing_type: ListingType::OffPlan,
        tour: None,
    },
    DemoListing {
        name: "Jumeirah Golf Townhouse",
        lng: 55.2013,
        lat: 25.0216,
        price: 4_200_000.0,
        size: 265.0,
        listing_type: ListingType::Sale,
        tour: Some("https://tours.example.com/demo/golf-townhouse"),
    },
    DemoListing {
        name: "Saadiyat Beach Apartment",
        lng: 54.4334,
        lat: 24.5440,
        price: 160_000.0,
        size: 132.0,
        listing_type: ListingType::Rent,
        tour: None,
    },
    DemoListing {
        name: "Al Reem Waterfront Flat",
        lng: 54.4040,
        lat: 24.4990,
        price: 1_250_000.0,
        size: 88.0,
        listing_type: ListingType::Sale,
        tour: None,
    },
];

/// Demo listing set.
pub fn demo_properties() -> Vec<Property> {
    DEMO_LISTINGS
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let mut p = Property::new(DEMO_ID_BASE + i as u64, d.name, LngLat::new(d.lng, d.lat))
                .with_listing_type(d.listing_type);
            match d.listing_type {
                ListingType::Rent => p.rent_price = Some(d.price),
                _ => p.price = Some(d.price),
            }
            p.size = Some(d.size);
            p.has_tour = d.tour.is_some();
            p.description = format!("{} (demo listing)", d.name);
            p
        })
        .collect()
}

/// Tour service answering for the demo listings.
pub fn demo_tours() -> InMemoryTourService {
    DEMO_LISTINGS
        .iter()
        .enumerate()
        .filter_map(|(i, d)| d.tour.map(|url| (PropertyId(DEMO_ID_BASE + i as u64), url)))
        .fold(InMemoryTourService::new(), |svc, (id, url)| svc.with_tour(id, url))
}

pub fn is_demo(id: PropertyId) -> bool {
    id.0 >= DEMO_ID_BASE
}
