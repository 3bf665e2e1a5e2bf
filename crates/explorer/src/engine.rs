//! Seams to the host: the map rendering engine, the embedded tour surface,
//! and the UI presenter. The orchestrator only ever talks to these traits.

use catalog::{Property, PropertyId};
use foundation::{Easing, GeoBounds, LngLat, clamp_pitch, wrap_bearing};
use runtime::InputKind;
use tokio::time::Duration;

/// Camera pose as reported by the engine.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub center: LngLat,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
    /// Visible area.
    pub bounds: GeoBounds,
}

impl Viewport {
    /// Viewport of a `width_px` x `height_px` surface (web-mercator tiles of
    /// 256px, ignoring latitude distortion).
    pub fn around(center: LngLat, zoom: f64, width_px: f64, height_px: f64) -> Self {
        let deg_per_px = 360.0 / (256.0 * 2f64.powf(zoom.max(0.0)));
        let half_w = (width_px * 0.5 * deg_per_px).min(180.0);
        let half_h = (height_px * 0.5 * deg_per_px).min(90.0);
        Self {
            center,
            zoom: zoom.max(0.0),
            pitch: 0.0,
            bearing: 0.0,
            bounds: GeoBounds::new(
                (center.lng - half_w).max(-180.0),
                (center.lat - half_h).max(-90.0),
                (center.lng + half_w).min(180.0),
                (center.lat + half_h).min(90.0),
            ),
        }
    }
}

/// Partial camera pose; unset fields keep their current value.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct CameraTarget {
    pub center: Option<LngLat>,
    pub zoom: Option<f64>,
    pub pitch: Option<f64>,
    pub bearing: Option<f64>,
}

impl CameraTarget {
    pub fn at(center: LngLat) -> Self {
        Self {
            center: Some(center),
            ..Self::default()
        }
    }

    pub fn pose(center: LngLat, zoom: f64, pitch: f64, bearing: f64) -> Self {
        Self {
            center: Some(center),
            zoom: Some(zoom),
            pitch: Some(pitch),
            bearing: Some(bearing),
        }
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = Some(zoom);
        self
    }

    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = Some(pitch);
        self
    }

    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    /// The pose `current` would end at after flying to this target.
    pub fn resolve(&self, current: &Viewport) -> (LngLat, f64, f64, f64) {
        (
            self.center.unwrap_or(current.center),
            self.zoom.unwrap_or(current.zoom).max(0.0),
            clamp_pitch(self.pitch.unwrap_or(current.pitch)),
            wrap_bearing(self.bearing.unwrap_or(current.bearing)),
        )
    }
}

/// Move-start / move-end notification from the engine.
///
/// `origin` is set when the move was caused by a device event (drag, wheel,
/// key press). Moves issued through the engine API carry no origin.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct MoveEvent {
    pub origin: Option<InputKind>,
}

impl MoveEvent {
    pub fn programmatic() -> Self {
        Self { origin: None }
    }

    pub fn from_input(kind: InputKind) -> Self {
        Self { origin: Some(kind) }
    }

    pub fn is_genuine(&self) -> bool {
        self.origin.is_some()
    }
}

/// Point on the map surface in CSS pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Marker pushed to the engine's point layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    pub id: PropertyId,
    pub position: LngLat,
    pub label: String,
    pub has_tour: bool,
    /// Closed parcel outline, if the listing has a usable one.
    pub boundary: Option<Vec<LngLat>>,
}

/// Connection quality reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkHint {
    /// Effective connection type (`slow-2g`, `2g`, `3g`, `4g`).
    pub effective_type: Option<String>,
    pub save_data: bool,
}

impl NetworkHint {
    pub fn is_constrained(&self) -> bool {
        self.save_data
            || matches!(
                self.effective_type.as_deref().map(str::trim),
                Some("slow-2g") | Some("2g")
            )
    }
}

/// The external map rendering engine.
pub trait MapEngine: Send + Sync {
    fn is_ready(&self) -> bool;
    fn viewport(&self) -> Viewport;
    fn fly_to(&self, target: CameraTarget, duration: Duration, easing: Easing);
    fn set_bearing(&self, bearing: f64);
    fn set_pitch(&self, pitch: f64);
    /// Enable or disable the engine's own drag/zoom/rotate handlers.
    fn set_interactive(&self, enabled: bool);
    fn set_point_features(&self, features: Vec<PointFeature>);
    /// Screen position of `point`, if it is on screen.
    fn project(&self, point: LngLat) -> Option<ScreenPoint>;
}

/// The isolated document that renders a tour.
pub trait TourSurface: Send + Sync {
    fn mount(&self, property: PropertyId, url: &str);
    fn unmount(&self);
    /// Load `url` off-screen so a later mount is instant.
    fn warm(&self, url: &str);
}

/// Non-blocking notice shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub retryable: bool,
}

/// Hover card for a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub property: PropertyId,
    pub position: LngLat,
    pub title: String,
    pub price_label: Option<String>,
    pub has_tour: bool,
}

/// UI bits owned by the surrounding application. Every method defaults to
/// doing nothing.
pub trait Presenter: Send + Sync {
    fn set_loading(&self, _loading: bool) {}
    fn show_notice(&self, _notice: Notice) {}
    fn clear_notice(&self) {}
    fn show_popup(&self, _popup: Popup) {}
    fn hide_popup(&self) {}
    fn open_panel(&self, _property: &Property) {}
    fn set_intro_visible(&self, _visible: bool) {}
    fn set_navigating(&self, _navigating: bool) {}
}
