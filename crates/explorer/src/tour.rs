use std::sync::{Arc, Weak};

use catalog::{Property, PropertyId};
use foundation::{Easing, LngLat};
use parking_lot::{Mutex, MutexGuard};
use runtime::{CameraWriter, EventBus, EventKind, Session};
use streaming::{PropertySet, TourCache};
use tokio::time::{Duration, sleep};
use tracing::{debug, info};

use crate::config::TourConfig;
use crate::engine::{CameraTarget, MapEngine, Presenter, TourSurface, Viewport};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpenTrigger {
    /// Camera zoomed in close to the property.
    Zoom,
    /// Marker click or a host request.
    Explicit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TourState {
    Closed,
    Opening {
        property: PropertyId,
        trigger: OpenTrigger,
    },
    Open {
        property: PropertyId,
        url: String,
    },
    Closing {
        property: PropertyId,
    },
}

impl TourState {
    pub fn property(&self) -> Option<PropertyId> {
        match self {
            TourState::Closed => None,
            TourState::Opening { property, .. }
            | TourState::Open { property, .. }
            | TourState::Closing { property } => Some(*property),
        }
    }
}

/// What a close request found.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dismissal {
    /// Nothing was open or pending.
    Idle,
    /// A mounted tour was taken down.
    Closed,
    /// Only a pending open was dropped.
    Cancelled,
}

struct Inner {
    state: TourState,
    /// Tour left mounted while a replacement resolves.
    shown: Option<(PropertyId, String)>,
    /// Bumped by every open or close request; a resolution is applied only
    /// if it still carries the current value.
    generation: u64,
    navigating: bool,
}

/// Nearest located property to `center`, with its distance in meters.
///
/// Scans the whole loaded set.
pub fn nearest_property(center: LngLat, properties: &[Property]) -> Option<(&Property, f64)> {
    properties
        .iter()
        .filter_map(|p| p.position().map(|at| (p, center.distance_m(at))))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Nearest located property that advertises a tour.
pub fn nearest_tour(center: LngLat, properties: &[Property]) -> Option<(&Property, f64)> {
    properties
        .iter()
        .filter(|p| p.has_tour)
        .filter_map(|p| p.position().map(|at| (p, center.distance_m(at))))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Opens and closes the embedded tour surface.
///
/// At most one tour is mounted at any time. A mounted tour stays up until
/// its replacement has resolved a URL, then is swapped out.
pub struct TourOverlay {
    engine: Arc<dyn MapEngine>,
    surface: Arc<dyn TourSurface>,
    presenter: Arc<dyn Presenter>,
    tours: Arc<TourCache>,
    session: Session,
    bus: EventBus,
    config: TourConfig,
    inner: Mutex<Inner>,
    this: Weak<TourOverlay>,
}

impl TourOverlay {
    pub fn new(
        engine: Arc<dyn MapEngine>,
        surface: Arc<dyn TourSurface>,
        presenter: Arc<dyn Presenter>,
        tours: Arc<TourCache>,
        session: Session,
        bus: EventBus,
        config: TourConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            engine,
            surface,
            presenter,
            tours,
            session,
            bus,
            config,
            inner: Mutex::new(Inner {
                state: TourState::Closed,
                shown: None,
                generation: 0,
                navigating: false,
            }),
            this: this.clone(),
        })
    }

    pub fn state(&self) -> TourState {
        self.inner.lock().state.clone()
    }

    /// A tour is on screen, possibly with a replacement still resolving.
    pub fn is_open(&self) -> bool {
        let inner = self.inner.lock();
        matches!(inner.state, TourState::Open { .. }) || inner.shown.is_some()
    }

    pub fn is_navigating(&self) -> bool {
        self.inner.lock().navigating
    }

    /// React to a settled viewport: zoom-triggered close/open and prefetch.
    pub fn on_settle(&self, viewport: &Viewport, properties: &PropertySet) {
        let zoom = viewport.zoom;
        if zoom < self.config.close_zoom {
            match self.dismiss() {
                Dismissal::Closed => debug!(zoom, "tour closed by zooming out"),
                Dismissal::Cancelled => debug!(zoom, "pending tour cancelled by zooming out"),
                Dismissal::Idle => {}
            }
        } else if zoom >= self.config.open_zoom {
            self.consider_nearest(viewport.center, properties);
        }
        if zoom >= self.config.prefetch_zoom {
            self.prefetch(viewport, properties);
        }
    }

    fn consider_nearest(&self, center: LngLat, properties: &PropertySet) {
        if self.session.camera_writer() == Some(CameraWriter::AutoFlight) {
            debug!("intro flight owns the camera, no zoom-triggered tour");
            return;
        }
        let Some((property, distance)) = nearest_tour(center, &properties.properties) else {
            return;
        };
        if distance > self.config.radius_m {
            return;
        }
        {
            let inner = self.inner.lock();
            if inner.navigating || inner.state.property() == Some(property.id) {
                return;
            }
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };
        debug!(property = %property.id, distance_m = distance.round(), "nearest property in range");
        let property = property.clone();
        tokio::spawn(async move {
            this.open_by_zoom(property).await;
        });
    }

    /// Zoom-triggered open. The result is applied only if no newer request
    /// came in meanwhile and the camera is still in the open zoom band.
    pub async fn open_by_zoom(&self, property: Property) -> bool {
        let generation = self.begin(property.id, OpenTrigger::Zoom);
        let url = self.resolve(&property).await;
        self.complete(generation, property.id, url, OpenTrigger::Zoom)
    }

    /// Fly to `property` with an ease-out cubic curve over `duration`, then
    /// open its tour. Returns `false` (and ends `Closed`) if the property has
    /// no usable tour or the request was superseded.
    pub async fn open_explicit(&self, property: Property, duration: Duration) -> bool {
        let Some(at) = property.position() else {
            debug!(property = %property.id, "explicit tour for unlocated property ignored");
            return false;
        };
        let generation = self.begin(property.id, OpenTrigger::Explicit);
        self.inner.lock().navigating = true;
        self.presenter.set_navigating(true);
        self.engine.fly_to(
            CameraTarget::at(at)
                .with_zoom(self.config.explicit_zoom)
                .with_pitch(self.config.explicit_pitch),
            duration,
            Easing::EaseOutCubic,
        );

        let (url, ()) = tokio::join!(self.resolve(&property), sleep(duration));

        let still_current = {
            let mut inner = self.inner.lock();
            let current = inner.generation == generation;
            if current {
                inner.navigating = false;
            }
            current
        };
        if still_current {
            self.presenter.set_navigating(false);
        }
        self.complete(generation, property.id, url, OpenTrigger::Explicit)
    }

    /// Close whatever is open or opening. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        self.dismiss() != Dismissal::Idle
    }

    /// Close whatever is open or opening and report what that took down.
    pub fn dismiss(&self) -> Dismissal {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let was_navigating = std::mem::replace(&mut inner.navigating, false);
        let previous = std::mem::replace(&mut inner.state, TourState::Closed);
        let shown = inner.shown.take();
        let pending = match previous {
            TourState::Open { property, .. } => {
                return self.take_down(inner, property, was_navigating);
            }
            TourState::Opening { property, .. } | TourState::Closing { property } => property,
            TourState::Closed => return Dismissal::Idle,
        };
        debug!(property = %pending, "pending tour cancelled");
        self.bus.emit(EventKind::Tour, format!("cancelled {pending}"));
        if let Some((property, _)) = shown {
            return self.take_down(inner, property, was_navigating);
        }
        drop(inner);
        if was_navigating {
            self.presenter.set_navigating(false);
        }
        Dismissal::Cancelled
    }

    fn take_down(
        &self,
        mut inner: MutexGuard<'_, Inner>,
        property: PropertyId,
        was_navigating: bool,
    ) -> Dismissal {
        inner.state = TourState::Closing { property };
        self.surface.unmount();
        inner.state = TourState::Closed;
        self.session.set_tour_open(false);
        info!(property = %property, "tour closed");
        self.bus.emit(EventKind::Tour, format!("closed {property}"));
        drop(inner);
        if was_navigating {
            self.presenter.set_navigating(false);
        }
        Dismissal::Closed
    }

    /// Warm tours of visible properties so the next zoom-triggered open is
    /// instant. Returns how many lookups were started.
    pub fn prefetch(&self, viewport: &Viewport, properties: &PropertySet) -> usize {
        let picks: Vec<PropertyId> = properties
            .properties
            .iter()
            .filter(|p| p.has_tour)
            .filter(|p| p.position().is_some_and(|at| viewport.bounds.contains(at)))
            .filter(|p| !self.tours.is_cached(p.id) && !self.tours.is_resolving(p.id))
            .take(self.config.prefetch_limit)
            .map(|p| p.id)
            .collect();
        for &id in &picks {
            let tours = self.tours.clone();
            let surface = self.surface.clone();
            tokio::spawn(async move {
                if let Some(url) = tours.resolve(id).await {
                    surface.warm(&url);
                }
            });
        }
        if !picks.is_empty() {
            debug!(count = picks.len(), "prefetching tours");
        }
        picks.len()
    }

    fn begin(&self, property: PropertyId, trigger: OpenTrigger) -> u64 {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let previous = std::mem::replace(&mut inner.state, TourState::Opening { property, trigger });
        if let TourState::Open { property: open, url } = previous {
            inner.shown = Some((open, url));
        }
        self.bus
            .emit(EventKind::Tour, format!("opening {property} ({trigger:?})"));
        inner.generation
    }

    async fn resolve(&self, property: &Property) -> Option<String> {
        if !property.has_tour {
            return None;
        }
        self.tours.resolve(property.id).await
    }

    fn complete(
        &self,
        generation: u64,
        property: PropertyId,
        url: Option<String>,
        trigger: OpenTrigger,
    ) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!(property = %property, "tour request superseded");
            return false;
        }
        if trigger == OpenTrigger::Zoom && self.engine.viewport().zoom < self.config.open_zoom {
            debug!(property = %property, "zoomed out before the tour resolved");
            Self::restore(&mut inner);
            return false;
        }
        let Some(url) = url else {
            debug!(property = %property, "no tour available");
            Self::restore(&mut inner);
            self.bus.emit(EventKind::Tour, format!("unavailable {property}"));
            return false;
        };
        match inner.shown.take() {
            Some((shown, _)) if shown == property => {}
            Some((shown, _)) => {
                self.surface.unmount();
                info!(property = %shown, replacement = %property, "tour replaced");
                self.bus.emit(EventKind::Tour, format!("closed {shown}"));
                self.surface.mount(property, &url);
            }
            None => self.surface.mount(property, &url),
        }
        inner.state = TourState::Open { property, url };
        self.session.set_tour_open(true);
        info!(property = %property, ?trigger, "tour open");
        self.bus.emit(EventKind::Tour, format!("open {property}"));
        true
    }

    /// Put back the tour that was on screen before a failed open, if any.
    fn restore(inner: &mut Inner) {
        inner.state = match inner.shown.take() {
            Some((property, url)) => TourState::Open { property, url },
            None => TourState::Closed,
        };
    }
}
