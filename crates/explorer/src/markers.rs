use catalog::{Property, PropertyId};
use foundation::LngLat;

use crate::engine::{MapEngine, PointFeature, Popup, ScreenPoint};

/// Compact price label for a marker: `950`, `85K`, `1.2M`.
pub fn price_label(price: f64) -> String {
    if !price.is_finite() || price < 0.0 {
        return String::new();
    }
    if price >= 1_000_000.0 {
        let m = price / 1_000_000.0;
        if m >= 100.0 || (m * 10.0).round() % 10.0 == 0.0 {
            format!("{:.0}M", m)
        } else {
            format!("{:.1}M", m)
        }
    } else if price >= 1_000.0 {
        format!("{:.0}K", price / 1_000.0)
    } else {
        format!("{:.0}", price)
    }
}

/// Clean a parcel outline into a closed ring.
///
/// Invalid vertices are dropped and open rings are closed. Rings with fewer
/// than four vertices after that (a triangle plus its closing vertex) are
/// rejected.
pub fn normalize_boundary(ring: &[[f64; 2]]) -> Option<Vec<LngLat>> {
    let mut points: Vec<LngLat> = ring
        .iter()
        .map(|[lng, lat]| LngLat::new(*lng, *lat))
        .filter(LngLat::is_located)
        .collect();
    points.dedup();
    let first = *points.first()?;
    if points.last() != Some(&first) {
        points.push(first);
    }
    (points.len() >= 4).then_some(points)
}

/// Point features for every located property.
pub fn features(properties: &[Property]) -> Vec<PointFeature> {
    properties
        .iter()
        .filter_map(|p| {
            Some(PointFeature {
                id: p.id,
                position: p.position()?,
                label: p.display_price().map(price_label).unwrap_or_default(),
                has_tour: p.has_tour,
                boundary: p.boundary.as_deref().and_then(normalize_boundary),
            })
        })
        .collect()
}

pub fn popup_for(property: &Property) -> Option<Popup> {
    Some(Popup {
        property: property.id,
        position: property.position()?,
        title: property.name.clone(),
        price_label: property.display_price().map(price_label),
        has_tour: property.has_tour,
    })
}

/// Property whose marker is closest to `pointer`, within `radius_px`.
pub fn hit_test<'a>(
    engine: &dyn MapEngine,
    properties: &'a [Property],
    pointer: ScreenPoint,
    radius_px: f64,
) -> Option<&'a Property> {
    properties
        .iter()
        .filter_map(|p| {
            let screen = engine.project(p.position()?)?;
            let d = screen.distance(pointer);
            (d <= radius_px).then_some((p, d))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(p, _)| p)
}

/// What a click on a marker should do.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerAction {
    OpenTour(PropertyId),
    OpenPanel(PropertyId),
}

pub fn click_action(property: &Property) -> MarkerAction {
    if property.has_tour {
        MarkerAction::OpenTour(property.id)
    } else {
        MarkerAction::OpenPanel(property.id)
    }
}
