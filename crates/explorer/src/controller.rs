use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use catalog::{
    GeolocationProvider, ListingFilter, ListingService, Property, PropertyId, PropertyPage,
    TourService, detect_region,
};
use foundation::Easing;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use runtime::{BrowseMode, CameraWriter, EventBus, EventKind, InputKind, InterruptCause, Session};
use streaming::{
    DataOrigin, LoadStatus, PageOutcome, PaginationController, PaginationState, PropertyCache,
    PropertySet, TourCache,
};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ExplorerConfig;
use crate::engine::{
    CameraTarget, MapEngine, MoveEvent, NetworkHint, Notice, Presenter, ScreenPoint, TourSurface,
};
use crate::flight::{AutoFlight, FlightEnd, FlightPhase, FlightPlan, locate};
use crate::markers::{self, MarkerAction};
use crate::rotation::IdleRotation;
use crate::tour::{TourOverlay, TourState};
use crate::viewport::{MoveKind, Settled, ViewportTracker};

/// Remote collaborators.
pub struct Services {
    pub listings: Arc<dyn ListingService>,
    pub tours: Arc<dyn TourService>,
    pub geolocation: Arc<dyn GeolocationProvider>,
}

/// Host-side surfaces.
pub struct Surfaces {
    pub engine: Arc<dyn MapEngine>,
    pub tour_surface: Arc<dyn TourSurface>,
    pub presenter: Arc<dyn Presenter>,
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct FlyToOptions {
    pub target: CameraTarget,
    /// Defaults to the explicit tour navigation duration.
    pub duration: Option<Duration>,
    pub easing: Easing,
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct TourOptions {
    pub duration: Option<Duration>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RecommendationTourOptions {
    /// Camera move between two recommendations.
    pub leg: Duration,
    /// Time spent at each recommendation after arriving.
    pub dwell: Duration,
    pub zoom: f64,
}

impl Default for RecommendationTourOptions {
    fn default() -> Self {
        Self {
            leg: Duration::from_millis(3000),
            dwell: Duration::from_millis(4000),
            zoom: 13.0,
        }
    }
}

/// The map exploration orchestrator.
///
/// Owns every component and exposes the imperative control surface used by
/// the surrounding application. Host events (engine move notifications and
/// raw input) are fed in through [`move_started`], [`move_ended`] and
/// [`input`]. Nothing here returns an error to the host: failures end up as
/// notices, fallbacks, or logged no-ops.
///
/// [`move_started`]: Explorer::move_started
/// [`move_ended`]: Explorer::move_ended
/// [`input`]: Explorer::input
pub struct Explorer {
    inner: Arc<Inner>,
}

struct Inner {
    config: ExplorerConfig,
    session: Session,
    bus: EventBus,
    engine: Arc<dyn MapEngine>,
    presenter: Arc<dyn Presenter>,
    geolocation: Arc<dyn GeolocationProvider>,
    tracker: ViewportTracker,
    rotation: Arc<IdleRotation>,
    flight: Arc<AutoFlight>,
    tours: Arc<TourOverlay>,
    pages: Arc<PaginationController>,
    started: AtomicBool,
    /// Cancels the running host camera script (recommendations tour).
    host_script: Mutex<Option<CancellationToken>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Explorer {
    pub fn new(config: ExplorerConfig, services: Services, surfaces: Surfaces) -> Self {
        let session = Session::new();
        let bus = EventBus::new();
        let Surfaces {
            engine,
            tour_surface,
            presenter,
        } = surfaces;

        let cache = Arc::new(PropertyCache::new(services.listings));
        let pages = Arc::new(
            PaginationController::new(cache, config.pagination.page_size, session.clone(), bus.clone())
                .with_prefetch(config.pagination.prefetch_next),
        );
        let rotation = IdleRotation::new(
            engine.clone(),
            session.clone(),
            bus.clone(),
            config.rotation.clone(),
        );
        let flight = AutoFlight::new(
            engine.clone(),
            presenter.clone(),
            rotation.clone(),
            session.clone(),
            bus.clone(),
            config.flight.clone(),
        );
        let tours = TourOverlay::new(
            engine.clone(),
            tour_surface,
            presenter.clone(),
            Arc::new(TourCache::new(services.tours)),
            session.clone(),
            bus.clone(),
            config.tour.clone(),
        );
        let tracker = ViewportTracker::new(engine.clone(), config.viewport.settle_delay());

        Self {
            inner: Arc::new(Inner {
                config,
                session,
                bus,
                engine,
                presenter,
                geolocation: services.geolocation,
                tracker,
                rotation,
                flight,
                tours,
                pages,
                started: AtomicBool::new(false),
                host_script: Mutex::new(None),
                background: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.inner.config
    }

    pub fn flight_phase(&self) -> FlightPhase {
        self.inner.flight.phase()
    }

    pub fn flight_end(&self) -> Option<FlightEnd> {
        self.inner.flight.end()
    }

    pub fn flight_plan(&self) -> Option<Arc<FlightPlan>> {
        self.inner.flight.plan()
    }

    pub fn tour_state(&self) -> TourState {
        self.inner.tours.state()
    }

    pub fn rotation_active(&self) -> bool {
        self.inner.rotation.is_active()
    }

    pub fn properties(&self) -> PropertySet {
        self.inner.pages.snapshot()
    }

    pub fn pagination(&self) -> PaginationState {
        self.inner.pages.state()
    }

    pub fn load_status(&self) -> LoadStatus {
        self.inner.pages.status()
    }

    /// Mount the property layer and play the intro.
    ///
    /// `seed` is an optional server-rendered first page. Page 1 (when needed)
    /// and the device position are fetched concurrently, each bounded by the
    /// geolocation timeout, before the flight plan is built. Returns `false`
    /// if the engine is not ready or the explorer was already started.
    pub async fn start(&self, seed: Option<PropertyPage>, hint: NetworkHint) -> bool {
        let inner = &self.inner;
        if !inner.ready("start") {
            return false;
        }
        if inner.started.swap(true, Ordering::SeqCst) {
            warn!("explorer already started");
            return false;
        }
        info!(
            page_size = inner.config.pagination.page_size,
            rotation = ?inner.config.rotation.profile,
            "explorer starting"
        );
        inner.bus.emit(EventKind::Session, "start");
        inner.spawn_presentation();

        let first_page = inner.pages.mount(seed).then(|| {
            let pages = inner.pages.clone();
            tokio::spawn(async move { pages.fetch_page(1).await })
        });

        if !inner.config.flight.enabled {
            inner.engine.set_interactive(true);
            inner.rotation.note_activity();
            return true;
        }

        let limit = inner.config.flight.geolocation_timeout();
        let wait_first_page = async {
            if let Some(mut handle) = first_page {
                match timeout(limit, &mut handle).await {
                    Ok(Ok(outcome)) => debug!(?outcome, "first page ready for the intro"),
                    Ok(Err(err)) => warn!(%err, "first page task failed"),
                    Err(_) => debug!("first page still loading, planning with rendered data"),
                }
            }
        };
        let (position, ()) = tokio::join!(locate(inner.geolocation.as_ref(), limit), wait_first_page);

        let region = detect_region(position);
        let set = inner.pages.snapshot();
        let flyable: &[Property] = match set.origin {
            DataOrigin::Demo => &[],
            DataOrigin::Live | DataOrigin::Seeded => set.properties.as_slice(),
        };
        let plan = FlightPlan::build(
            flyable,
            region,
            &inner.config.flight,
            &mut plan_rng(inner.config.flight.seed),
        );
        info!(region = region.id, located = position.is_some(), "intro planned");
        inner.flight.start(plan, &hint);
        true
    }

    /// The engine reported a move start.
    pub fn move_started(&self, event: MoveEvent) {
        if let MoveKind::Genuine(kind) = self.inner.tracker.move_started(&event) {
            self.inner.user_input(kind);
        }
    }

    /// The engine reported a move end; a settle follows once the camera is
    /// still.
    pub fn move_ended(&self, event: MoveEvent) {
        if let MoveKind::Genuine(kind) = ViewportTracker::classify(&event) {
            self.inner.user_input(kind);
        }
        let weak = Arc::downgrade(&self.inner);
        self.inner.tracker.move_ended(&event, move |settled| async move {
            if let Some(inner) = weak.upgrade() {
                inner.on_settle(settled);
            }
        });
    }

    /// Raw pointer, touch, wheel or keyboard input on the map.
    pub fn input(&self, kind: InputKind) {
        self.inner.user_input(kind);
    }

    /// Hover: show the popup of the marker under the pointer.
    pub fn pointer_moved(&self, pointer: ScreenPoint) -> Option<PropertyId> {
        let inner = &self.inner;
        let set = inner.pages.snapshot();
        let hit = markers::hit_test(
            inner.engine.as_ref(),
            &set.properties,
            pointer,
            inner.config.markers.hit_radius_px,
        );
        match hit.and_then(markers::popup_for) {
            Some(popup) => {
                let id = popup.property;
                inner.presenter.show_popup(popup);
                Some(id)
            }
            None => {
                inner.presenter.hide_popup();
                None
            }
        }
    }

    /// Click: open the tour of the marker under the pointer, or its panel
    /// when it has no tour.
    pub fn clicked(&self, pointer: ScreenPoint) -> Option<MarkerAction> {
        let set = self.inner.pages.snapshot();
        let property = markers::hit_test(
            self.inner.engine.as_ref(),
            &set.properties,
            pointer,
            self.inner.config.markers.hit_radius_px,
        )?;
        let action = markers::click_action(property);
        match action {
            MarkerAction::OpenTour(_) => self.open_property_tour(property, TourOptions::default()),
            MarkerAction::OpenPanel(_) => self.open_property_panel(property),
        };
        Some(action)
    }

    pub fn fly_to(&self, options: FlyToOptions) -> bool {
        let inner = &self.inner;
        if !inner.ready("fly_to") {
            return false;
        }
        inner.take_camera();
        let duration = options
            .duration
            .unwrap_or_else(|| inner.config.tour.explicit_duration());
        inner.engine.fly_to(options.target, duration, options.easing);
        inner.bus.emit(EventKind::Camera, "host fly_to");
        true
    }

    /// Navigate to `property` and open its tour. Returns `true` once the
    /// navigation has started; a property without a usable tour ends with
    /// the overlay closed.
    pub fn open_property_tour(&self, property: &Property, options: TourOptions) -> bool {
        let inner = &self.inner;
        if !inner.ready("open_property_tour") {
            return false;
        }
        if property.position().is_none() {
            warn!(property = %property.id, "cannot open tour of an unlocated property");
            return false;
        }
        inner.take_camera();
        let duration = options
            .duration
            .unwrap_or_else(|| inner.config.tour.explicit_duration());
        let overlay = inner.tours.clone();
        let property = property.clone();
        tokio::spawn(async move {
            overlay.open_explicit(property, duration).await;
        });
        true
    }

    pub fn open_property_panel(&self, property: &Property) -> bool {
        let inner = &self.inner;
        if !inner.ready("open_property_panel") {
            return false;
        }
        inner.presenter.open_panel(property);
        if let Some(at) = property.position() {
            inner.take_camera();
            inner.engine.fly_to(
                CameraTarget::at(at).with_zoom(inner.config.flight.property_zoom),
                inner.config.tour.explicit_duration(),
                Easing::EaseOutCubic,
            );
        }
        inner
            .bus
            .emit(EventKind::Camera, format!("panel {}", property.id));
        true
    }

    /// Fly through `list` in order, showing each recommendation's popup.
    /// Genuine input or another control-surface camera call stops it.
    pub fn show_recommendations_tour(
        &self,
        list: &[Property],
        options: RecommendationTourOptions,
    ) -> bool {
        let inner = &self.inner;
        if !inner.ready("show_recommendations_tour") {
            return false;
        }
        let stops: Vec<Property> = list
            .iter()
            .filter(|p| p.position().is_some())
            .cloned()
            .collect();
        if stops.is_empty() {
            debug!("no located recommendations to show");
            return false;
        }
        inner.take_camera();
        let cancel = CancellationToken::new();
        *inner.host_script.lock() = Some(cancel.clone());

        let engine = inner.engine.clone();
        let presenter = inner.presenter.clone();
        let rotation = inner.rotation.clone();
        let bus = inner.bus.clone();
        info!(stops = stops.len(), "recommendations tour started");
        tokio::spawn(async move {
            for property in &stops {
                if cancel.is_cancelled() {
                    break;
                }
                let Some(popup) = markers::popup_for(property) else {
                    continue;
                };
                rotation.note_activity();
                engine.fly_to(
                    CameraTarget::at(popup.position).with_zoom(options.zoom),
                    options.leg,
                    Easing::EaseOutCubic,
                );
                presenter.show_popup(popup);
                bus.emit(EventKind::Camera, format!("recommendation {}", property.id));
                tokio::select! {
                    _ = cancel.cancelled() => {
                        presenter.hide_popup();
                        break;
                    }
                    _ = sleep(options.leg + options.dwell) => {}
                }
            }
            debug!("recommendations tour finished");
        });
        true
    }

    /// Same as the skip affordance.
    pub fn hide_intro_overlay(&self) -> bool {
        self.skip_intro()
    }

    /// End the intro as if the user had interacted. After the intro has
    /// ended this only hides the overlay. Returns whether the intro was
    /// cancelled.
    pub fn skip_intro(&self) -> bool {
        let inner = &self.inner;
        if inner.flight.phase() == FlightPhase::Complete {
            inner.presenter.set_intro_visible(false);
            return false;
        }
        inner.interrupt(InterruptCause::Skip);
        true
    }

    /// Close the tour overlay (its close button).
    pub fn close_tour(&self) -> bool {
        let closed = self.inner.tours.close();
        if closed {
            self.inner.rotation.note_activity();
        }
        closed
    }

    pub async fn set_filter(&self, filter: ListingFilter) -> PageOutcome {
        self.inner.pages.set_filter(filter).await
    }

    pub fn set_browse_mode(&self, mode: BrowseMode) {
        debug!(?mode, "browse mode");
        self.inner.session.set_browse_mode(mode);
    }

    pub async fn retry_load_more(&self) -> PageOutcome {
        self.inner.pages.retry_load_more().await
    }
}

impl Inner {
    fn ready(&self, operation: &'static str) -> bool {
        if self.engine.is_ready() {
            return true;
        }
        warn!(operation, "map engine not ready, call ignored");
        false
    }

    fn user_input(&self, kind: InputKind) {
        self.cancel_host_script();
        self.interrupt(InterruptCause::Input(kind));
    }

    fn interrupt(&self, cause: InterruptCause) {
        if !self.session.interrupt(cause) {
            return;
        }
        self.flight.abort(FlightEnd::Interrupted);
        self.rotation.stop();
        self.engine.set_interactive(true);
        self.presenter.set_intro_visible(false);
        self.bus.emit(EventKind::Session, format!("interrupted: {cause:?}"));
    }

    /// A control-surface call is about to move the camera.
    fn take_camera(&self) {
        if self.flight.abort(FlightEnd::TakenOver) {
            info!("host took the camera from the intro");
        }
        self.cancel_host_script();
        self.rotation.hand_over();
    }

    fn cancel_host_script(&self) {
        if let Some(cancel) = self.host_script.lock().take() {
            cancel.cancel();
        }
    }

    fn on_settle(self: &Arc<Self>, settled: Settled) {
        // Rotation's own bearing writes also produce programmatic settles.
        if settled.genuine || self.session.camera_writer() != Some(CameraWriter::IdleRotation) {
            self.rotation.note_activity();
        }

        let set = self.pages.snapshot();
        self.tours.on_settle(&settled.viewport, &set);

        if self.pages.state().has_next {
            let pages = self.pages.clone();
            tokio::spawn(async move {
                pages.load_more().await;
            });
        }
    }

    fn spawn_presentation(&self) {
        let engine = self.engine.clone();
        let mut sets = self.pages.subscribe();
        let markers_task = tokio::spawn(async move {
            while sets.changed().await.is_ok() {
                let set = sets.borrow_and_update().clone();
                engine.set_point_features(markers::features(&set.properties));
            }
        });

        let presenter = self.presenter.clone();
        let mut statuses = self.pages.subscribe_status();
        let status_task = tokio::spawn(async move {
            let mut last = LoadStatus::default();
            while statuses.changed().await.is_ok() {
                let status = statuses.borrow_and_update().clone();
                if status.loading != last.loading {
                    presenter.set_loading(status.loading);
                }
                if status.error != last.error {
                    match &status.error {
                        Some(err) => presenter.show_notice(Notice {
                            message: err.message.clone(),
                            retryable: true,
                        }),
                        None => presenter.clear_notice(),
                    }
                }
                last = status;
            }
        });

        self.background.lock().extend([markers_task, status_task]);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in self.background.get_mut().drain(..) {
            task.abort();
        }
        if let Some(cancel) = self.host_script.get_mut().take() {
            cancel.cancel();
        }
    }
}

fn plan_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Explorer, FlyToOptions, Services, Surfaces, TourOptions};
    use crate::config::{ExplorerConfig, RotationProfile};
    use crate::engine::{CameraTarget, MapEngine, MoveEvent, NetworkHint};
    use crate::flight::{FlightEnd, FlightPhase};
    use crate::headless::{HeadlessEngine, HeadlessPresenter, HeadlessTourSurface, PresenterCall};
    use crate::tour::TourState;
    use catalog::memory::{InMemoryListingService, InMemoryTourService, StaticGeolocation};
    use catalog::{Property, PropertyId};
    use foundation::LngLat;
    use runtime::InputKind;
    use streaming::DataOrigin;
    use tokio::time::{Duration, sleep};

    struct Rig {
        engine: Arc<HeadlessEngine>,
        surface: Arc<HeadlessTourSurface>,
        presenter: Arc<HeadlessPresenter>,
        explorer: Explorer,
    }

    fn config() -> ExplorerConfig {
        let mut config = ExplorerConfig::default();
        config.flight.seed = Some(9);
        config.pagination.page_size = 4;
        config
    }

    fn setup(properties: Vec<Property>, tours: InMemoryTourService) -> Rig {
        setup_with(config(), properties, tours)
    }

    fn setup_with(config: ExplorerConfig, properties: Vec<Property>, tours: InMemoryTourService) -> Rig {
        let engine = Arc::new(HeadlessEngine::new());
        let surface = Arc::new(HeadlessTourSurface::new());
        let presenter = Arc::new(HeadlessPresenter::new());
        let explorer = Explorer::new(
            config,
            Services {
                listings: Arc::new(InMemoryListingService::new(properties)),
                tours: Arc::new(tours),
                geolocation: Arc::new(StaticGeolocation::denied()),
            },
            Surfaces {
                engine: engine.clone(),
                tour_surface: surface.clone(),
                presenter: presenter.clone(),
            },
        );
        Rig {
            engine,
            surface,
            presenter,
            explorer,
        }
    }

    fn dubai(id: u64, dlat: f64) -> Property {
        Property::new(id, format!("Listing {id}"), LngLat::new(55.27, 25.2 + dlat))
    }

    #[tokio::test(start_paused = true)]
    async fn calls_before_the_engine_is_ready_are_ignored() {
        let rig = setup(Vec::new(), InMemoryTourService::new());
        rig.engine.set_ready(false);
        assert!(!rig.explorer.start(None, NetworkHint::default()).await);
        assert!(!rig.explorer.fly_to(FlyToOptions::default()));
        assert!(!rig.explorer.open_property_tour(&dubai(1, 0.0), TourOptions::default()));
        assert!(!rig.explorer.open_property_panel(&dubai(1, 0.0)));
        assert_eq!(rig.engine.command_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn live_listings_drive_the_intro_and_markers() {
        let props: Vec<Property> = (0..6).map(|i| dubai(i + 1, i as f64 * 0.2)).collect();
        let rig = setup(props, InMemoryTourService::new());
        assert!(rig.explorer.start(None, NetworkHint::default()).await);
        sleep(Duration::from_millis(10)).await;

        assert_eq!(rig.explorer.properties().origin, DataOrigin::Live);
        assert_eq!(rig.engine.features().len(), 4);
        let plan = rig.explorer.flight_plan().unwrap();
        assert_eq!(plan.source, crate::flight::FlightSource::Properties);
        assert!(matches!(rig.explorer.flight_phase(), FlightPhase::Flying(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn genuine_move_ends_the_intro() {
        let rig = setup(Vec::new(), InMemoryTourService::new());
        rig.explorer.start(None, NetworkHint::default()).await;
        sleep(Duration::from_secs(3)).await;

        rig.explorer.move_started(MoveEvent::from_input(InputKind::Touch));
        assert_eq!(rig.explorer.flight_end(), Some(FlightEnd::Interrupted));
        assert!(rig.explorer.session().is_interrupted());
        assert!(!rig.presenter.intro_visible());

        // Programmatic moves never interrupt.
        let other = setup(Vec::new(), InMemoryTourService::new());
        other.explorer.start(None, NetworkHint::default()).await;
        other.explorer.move_started(MoveEvent::programmatic());
        other.explorer.move_ended(MoveEvent::programmatic());
        sleep(Duration::from_secs(1)).await;
        assert!(!other.explorer.session().is_interrupted());
        assert!(matches!(other.explorer.flight_phase(), FlightPhase::Flying(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn host_fly_to_takes_over_without_interrupting() {
        let rig = setup(Vec::new(), InMemoryTourService::new());
        rig.explorer.start(None, NetworkHint::default()).await;
        sleep(Duration::from_secs(1)).await;

        let target = CameraTarget::at(LngLat::new(10.0, 20.0)).with_zoom(2.0);
        assert!(rig.explorer.fly_to(FlyToOptions {
            target,
            ..FlyToOptions::default()
        }));
        assert_eq!(rig.explorer.flight_end(), Some(FlightEnd::TakenOver));
        assert!(!rig.explorer.session().is_interrupted());

        // Zoomed out and idle: rotation resumes after the quiescence period.
        sleep(Duration::from_millis(7100)).await;
        assert!(rig.explorer.rotation_active());
    }

    fn showcase() -> ExplorerConfig {
        let mut config = config();
        config.rotation.profile = RotationProfile::Showcase;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn showcase_spins_without_an_intro() {
        let mut config = showcase();
        config.flight.enabled = false;
        let rig = setup_with(config, Vec::new(), InMemoryTourService::new());
        assert!(rig.explorer.start(None, NetworkHint::default()).await);
        assert!(rig.explorer.rotation_active());

        let writes = rig.engine.bearing_writes();
        sleep(Duration::from_secs(1)).await;
        assert!(rig.engine.bearing_writes() > writes);
    }

    #[tokio::test(start_paused = true)]
    async fn showcase_spins_on_a_constrained_network() {
        let rig = setup_with(showcase(), Vec::new(), InMemoryTourService::new());
        let hint = NetworkHint {
            effective_type: Some("2g".to_string()),
            save_data: false,
        };
        rig.explorer.start(None, hint).await;
        assert_eq!(rig.explorer.flight_end(), Some(FlightEnd::LowBandwidth));
        assert!(rig.explorer.rotation_active());

        let writes = rig.engine.bearing_writes();
        sleep(Duration::from_secs(1)).await;
        assert!(rig.engine.bearing_writes() > writes);
    }

    #[tokio::test(start_paused = true)]
    async fn showcase_resumes_once_a_host_takeover_settles() {
        let rig = setup_with(showcase(), Vec::new(), InMemoryTourService::new());
        rig.explorer.start(None, NetworkHint::default()).await;
        sleep(Duration::from_secs(1)).await;

        let target = CameraTarget::at(LngLat::new(10.0, 20.0)).with_zoom(12.0);
        assert!(rig.explorer.fly_to(FlyToOptions {
            target,
            ..FlyToOptions::default()
        }));
        assert_eq!(rig.explorer.flight_end(), Some(FlightEnd::TakenOver));
        assert!(!rig.explorer.rotation_active());

        rig.explorer.move_ended(MoveEvent::programmatic());
        sleep(Duration::from_millis(600)).await;
        assert!(rig.explorer.rotation_active());
        let writes = rig.engine.bearing_writes();
        sleep(Duration::from_secs(1)).await;
        assert!(rig.engine.bearing_writes() > writes);
    }

    #[tokio::test(start_paused = true)]
    async fn marker_click_opens_the_tour() {
        let tours = InMemoryTourService::new().with_tour(PropertyId(1), "https://tours.example/t/1");
        let rig = setup(vec![dubai(1, 0.0).with_tour()], tours);
        rig.explorer.start(None, NetworkHint::default()).await;
        rig.explorer.skip_intro();

        rig.engine.jump_to(LngLat::new(55.27, 25.2), 15.0);
        let at = rig.engine.project(LngLat::new(55.27, 25.2)).unwrap();
        assert_eq!(rig.explorer.pointer_moved(at), Some(PropertyId(1)));
        assert!(rig.explorer.clicked(at).is_some());

        sleep(Duration::from_millis(3100)).await;
        assert!(matches!(rig.explorer.tour_state(), TourState::Open { property: PropertyId(1), .. }));
        assert_eq!(rig.surface.max_mounted(), 1);

        assert!(rig.explorer.close_tour());
        assert_eq!(rig.explorer.tour_state(), TourState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn recommendations_tour_visits_each_stop_until_interrupted() {
        let rig = setup(Vec::new(), InMemoryTourService::new());
        rig.explorer.start(None, NetworkHint::default()).await;
        rig.explorer.skip_intro();
        let before = rig.engine.fly_targets().len();

        let list = vec![dubai(1, 0.0), dubai(2, 0.1), dubai(3, 0.2)];
        assert!(rig.explorer.show_recommendations_tour(&list, Default::default()));
        sleep(Duration::from_millis(7500)).await;
        assert_eq!(rig.engine.fly_targets().len(), before + 2);

        rig.explorer.input(InputKind::Pointer);
        sleep(Duration::from_secs(30)).await;
        assert_eq!(rig.engine.fly_targets().len(), before + 2);
        assert!(rig.presenter.calls().contains(&PresenterCall::HidePopup));
    }
}
