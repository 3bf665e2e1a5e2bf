//! Whole-session runs against the headless engine.

use std::collections::HashSet;
use std::sync::Arc;

use catalog::memory::{InMemoryListingService, InMemoryTourService, StaticGeolocation};
use catalog::{Property, PropertyId};
use foundation::LngLat;
use runtime::{BrowseMode, InputKind};
use tokio::time::{Duration, sleep};

use crate::config::ExplorerConfig;
use crate::controller::{Explorer, Services, Surfaces};
use crate::engine::{MoveEvent, NetworkHint};
use crate::flight::{FlightEnd, FlightPhase, FlightSource};
use crate::headless::{HeadlessEngine, HeadlessPresenter, HeadlessTourSurface, PresenterCall};
use crate::tour::TourState;
use streaming::PageOutcome;

struct Run {
    engine: Arc<HeadlessEngine>,
    surface: Arc<HeadlessTourSurface>,
    presenter: Arc<HeadlessPresenter>,
    listings: Arc<InMemoryListingService>,
    explorer: Explorer,
}

fn run(config: ExplorerConfig, properties: Vec<Property>, tours: InMemoryTourService) -> Run {
    let engine = Arc::new(HeadlessEngine::new());
    let surface = Arc::new(HeadlessTourSurface::new());
    let presenter = Arc::new(HeadlessPresenter::new());
    let listings = Arc::new(InMemoryListingService::new(properties));
    let explorer = Explorer::new(
        config,
        Services {
            listings: listings.clone(),
            tours: Arc::new(tours),
            geolocation: Arc::new(StaticGeolocation::denied()),
        },
        Surfaces {
            engine: engine.clone(),
            tour_surface: surface.clone(),
            presenter: presenter.clone(),
        },
    );
    Run {
        engine,
        surface,
        presenter,
        listings,
        explorer,
    }
}

fn seeded() -> ExplorerConfig {
    let mut config = ExplorerConfig::default();
    config.flight.seed = Some(7);
    config
}

fn without_intro(page_size: u32) -> ExplorerConfig {
    let mut config = seeded();
    config.flight.enabled = false;
    config.pagination.page_size = page_size;
    config
}

fn listing(id: u64, lng: f64, lat: f64) -> Property {
    Property::new(id, format!("Listing {id}"), LngLat::new(lng, lat))
}

/// Simulate a wheel zoom that ends at `center`/`zoom`, and let it settle.
async fn wheel_to(s: &Run, center: LngLat, zoom: f64) {
    s.explorer.move_started(MoveEvent::from_input(InputKind::Wheel));
    s.engine.jump_to(center, zoom);
    s.explorer.move_ended(MoveEvent::from_input(InputKind::Wheel));
    sleep(Duration::from_millis(600)).await;
}

#[tokio::test(start_paused = true)]
async fn denied_location_and_empty_listings_fly_the_fallback_itinerary() {
    let s = run(seeded(), Vec::new(), InMemoryTourService::new());
    assert!(s.explorer.start(None, NetworkHint::default()).await);

    let plan = s.explorer.flight_plan().unwrap();
    assert_eq!(plan.region, "gulf");
    assert_eq!(plan.source, FlightSource::Itinerary);
    let total = plan.total_duration(s.explorer.config().flight.finale_settle());

    sleep(total + Duration::from_millis(100)).await;
    assert_eq!(s.explorer.flight_phase(), FlightPhase::Complete);
    assert_eq!(s.explorer.flight_end(), Some(FlightEnd::Finished));
    assert!(s.explorer.rotation_active());
    assert!(s.engine.is_interactive());

    let writes = s.engine.bearing_writes();
    sleep(Duration::from_secs(1)).await;
    assert!(s.engine.bearing_writes() > writes);

    assert_eq!(s.surface.mount_count(), 0);
    assert!(s.presenter.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn input_freezes_every_automated_camera_writer() {
    let s = run(seeded(), Vec::new(), InMemoryTourService::new());
    s.explorer.start(None, NetworkHint::default()).await;
    sleep(Duration::from_secs(2)).await;

    s.explorer.input(InputKind::Keyboard);
    assert_eq!(s.explorer.flight_end(), Some(FlightEnd::Interrupted));
    let frozen = s.engine.command_count();

    sleep(Duration::from_secs(60)).await;
    assert_eq!(s.engine.command_count(), frozen);
    assert!(!s.explorer.rotation_active());
    assert!(s.engine.is_interactive());
}

#[tokio::test(start_paused = true)]
async fn rotation_stops_for_good_on_the_first_gesture() {
    let s = run(seeded(), Vec::new(), InMemoryTourService::new());
    s.explorer.start(None, NetworkHint::default()).await;
    let plan = s.explorer.flight_plan().unwrap();
    sleep(plan.total_duration(s.explorer.config().flight.finale_settle()) + Duration::from_millis(500)).await;
    assert!(s.explorer.rotation_active());

    s.explorer.move_started(MoveEvent::from_input(InputKind::Pointer));
    let writes = s.engine.bearing_writes();
    sleep(Duration::from_secs(30)).await;
    assert_eq!(s.engine.bearing_writes(), writes);
    assert!(!s.explorer.rotation_active());
}

#[tokio::test(start_paused = true)]
async fn constrained_network_skips_straight_to_idle_rotation() {
    let s = run(seeded(), Vec::new(), InMemoryTourService::new());
    let hint = NetworkHint {
        effective_type: Some("2g".to_string()),
        save_data: false,
    };
    s.explorer.start(None, hint).await;
    assert_eq!(s.explorer.flight_end(), Some(FlightEnd::LowBandwidth));
    assert!(s.engine.is_interactive());
    assert!(!s.presenter.calls().contains(&PresenterCall::Intro(true)));

    sleep(Duration::from_millis(7100)).await;
    assert!(s.explorer.rotation_active());
}

#[tokio::test(start_paused = true)]
async fn zooming_in_opens_one_tour_at_a_time() {
    let a = LngLat::new(55.27, 25.20);
    let b = LngLat::new(55.30, 25.20);
    let tours = InMemoryTourService::new()
        .with_tour(PropertyId(1), "https://tours.example/t/1")
        .with_tour(PropertyId(2), "https://tours.example/t/2");
    let props = vec![
        listing(1, a.lng, a.lat).with_tour(),
        listing(2, b.lng, b.lat).with_tour(),
    ];
    let s = run(seeded(), props, tours);
    s.explorer.start(None, NetworkHint::default()).await;
    s.explorer.skip_intro();

    wheel_to(&s, a, 15.0).await;
    assert!(matches!(s.explorer.tour_state(), TourState::Open { property: PropertyId(1), .. }));
    assert_eq!(s.surface.mounted().map(|(id, _)| id), Some(PropertyId(1)));

    wheel_to(&s, b, 15.0).await;
    assert!(matches!(s.explorer.tour_state(), TourState::Open { property: PropertyId(2), .. }));
    assert_eq!(s.surface.max_mounted(), 1);

    // Between the close and open thresholds nothing changes.
    wheel_to(&s, b, 14.0).await;
    assert!(s.explorer.tour_state().property() == Some(PropertyId(2)));

    wheel_to(&s, b, 12.0).await;
    assert_eq!(s.explorer.tour_state(), TourState::Closed);
    assert_eq!(s.surface.mounted(), None);
}

#[tokio::test(start_paused = true)]
async fn listings_without_tours_leave_the_open_tour_alone() {
    let a = LngLat::new(55.27, 25.20);
    // About 300 m east of `a`.
    let plain = LngLat::new(55.273, 25.20);
    let tours = InMemoryTourService::new().with_tour(PropertyId(1), "https://tours.example/t/1");
    let props = vec![listing(1, a.lng, a.lat).with_tour(), listing(2, plain.lng, plain.lat)];
    let s = run(seeded(), props, tours);
    s.explorer.start(None, NetworkHint::default()).await;
    s.explorer.skip_intro();

    wheel_to(&s, a, 15.0).await;
    assert!(matches!(s.explorer.tour_state(), TourState::Open { property: PropertyId(1), .. }));

    wheel_to(&s, plain, 15.5).await;
    assert!(matches!(s.explorer.tour_state(), TourState::Open { property: PropertyId(1), .. }));
    assert_eq!(s.surface.mounted().map(|(id, _)| id), Some(PropertyId(1)));
    assert_eq!(s.surface.mount_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn settles_page_through_listings_once_each() {
    let props: Vec<Property> = (1..=10).map(|i| listing(i, 55.0 + i as f64 * 0.01, 25.0)).collect();
    let s = run(without_intro(4), props, InMemoryTourService::new());
    s.explorer.start(None, NetworkHint::default()).await;
    sleep(Duration::from_millis(10)).await;
    assert_eq!(s.explorer.properties().len(), 4);

    s.explorer.set_browse_mode(BrowseMode::Editing);
    wheel_to(&s, LngLat::new(55.05, 25.0), 9.0).await;
    assert_eq!(s.explorer.properties().len(), 4);

    s.explorer.set_browse_mode(BrowseMode::Browsing);
    for _ in 0..4 {
        wheel_to(&s, LngLat::new(55.05, 25.0), 9.0).await;
    }

    let set = s.explorer.properties();
    assert_eq!(set.len(), 10);
    let ids: HashSet<PropertyId> = set.properties.iter().map(|p| p.id).collect();
    assert_eq!(ids.len(), 10);
    assert!(!s.explorer.pagination().has_next);
    assert_eq!(s.listings.request_count(), 3);
    assert_eq!(s.engine.features().len(), 10);
}

#[tokio::test(start_paused = true)]
async fn failed_page_surfaces_a_retryable_notice() {
    let props: Vec<Property> = (1..=6).map(|i| listing(i, 55.0 + i as f64 * 0.01, 25.0)).collect();
    let s = run(without_intro(4), props, InMemoryTourService::new());
    s.listings.fail_page(2);
    s.explorer.start(None, NetworkHint::default()).await;
    sleep(Duration::from_millis(10)).await;

    wheel_to(&s, LngLat::new(55.05, 25.0), 9.0).await;
    let notices = s.presenter.notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].retryable);
    assert_eq!(s.explorer.properties().len(), 4);

    s.listings.heal_page(2);
    assert!(matches!(
        s.explorer.retry_load_more().await,
        PageOutcome::Loaded { page: 2, .. }
    ));
    sleep(Duration::from_millis(10)).await;
    assert_eq!(s.explorer.properties().len(), 6);
    assert!(s.presenter.calls().contains(&PresenterCall::ClearNotice));
}
