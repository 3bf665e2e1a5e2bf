use foundation::LngLat;
use serde::{Deserialize, Deserializer, Serialize};

/// Backend identifier of a listing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(pub u64);

impl std::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    Sale,
    Rent,
    OffPlan,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ListingType {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingType::Sale => "sale",
            ListingType::Rent => "rent",
            ListingType::OffPlan => "off_plan",
            ListingType::Unknown => "unknown",
        }
    }
}

/// A listing as returned by the listing service.
///
/// Immutable once fetched; a newer page replaces records wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    #[serde(default, alias = "title")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub rent_price: Option<f64>,
    /// Built-up area in square meters.
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub size: Option<f64>,
    #[serde(default)]
    pub listing_type: ListingType,
    #[serde(default, alias = "has_virtual_tour")]
    pub has_tour: bool,
    /// Parcel outline as `[lng, lat]` vertices.
    #[serde(default)]
    pub boundary: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
}

impl Property {
    pub fn new(id: u64, name: impl Into<String>, at: LngLat) -> Self {
        Self {
            id: PropertyId(id),
            name: name.into(),
            latitude: Some(at.lat),
            longitude: Some(at.lng),
            price: None,
            rent_price: None,
            size: None,
            listing_type: ListingType::Sale,
            has_tour: false,
            boundary: None,
            description: String::new(),
            features: Vec::new(),
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_tour(mut self) -> Self {
        self.has_tour = true;
        self
    }

    pub fn with_listing_type(mut self, listing_type: ListingType) -> Self {
        self.listing_type = listing_type;
        self
    }

    pub fn with_boundary(mut self, ring: Vec<[f64; 2]>) -> Self {
        self.boundary = Some(ring);
        self
    }

    /// Map position, if the listing is geocoded.
    pub fn position(&self) -> Option<LngLat> {
        let p = LngLat::new(self.longitude?, self.latitude?);
        p.is_located().then_some(p)
    }

    /// Price shown on markers: rent price for rentals, sale price otherwise.
    pub fn display_price(&self) -> Option<f64> {
        match self.listing_type {
            ListingType::Rent => self.rent_price.or(self.price),
            _ => self.price.or(self.rent_price),
        }
    }
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertyPage {
    pub results: Vec<Property>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub next: Option<String>,
}

impl PropertyPage {
    pub fn has_next(&self) -> bool {
        self.next.as_deref().is_some_and(|n| !n.is_empty())
    }
}

// Decimal fields arrive either as JSON numbers or as strings ("1250000.00").
fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    Ok(match Option::<NumOrStr>::deserialize(deserializer)? {
        Some(NumOrStr::Num(v)) if v.is_finite() => Some(v),
        Some(NumOrStr::Str(s)) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    })
}
