use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use catalog::http::{HttpListingService, HttpTourService};
use catalog::memory::{InMemoryListingService, StaticGeolocation};
use catalog::{GeolocationProvider, ListingService, TourService};
use clap::{Parser, ValueEnum};
use explorer::headless::{HeadlessEngine, HeadlessPresenter, HeadlessTourSurface};
use explorer::{Explorer, ExplorerConfig, NetworkHint, RotationProfile, Services, Surfaces};
use foundation::LngLat;
use runtime::{EventKind, InputKind};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless run of the map explorer orchestrator")]
struct Args {
    /// JSON config file; missing fields take defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rotation profile override
    #[arg(long, value_enum)]
    profile: Option<Profile>,

    /// Listing/tour API base URL (default: empty in-memory catalog)
    #[arg(long)]
    listing_url: Option<String>,

    /// Device position as lng,lat (default: geolocation denied)
    #[arg(long)]
    at: Option<String>,

    /// Effective connection type reported by the host (e.g. 4g, 2g)
    #[arg(long)]
    network: Option<String>,

    #[arg(long, default_value_t = false)]
    save_data: bool,

    /// Simulate a pointer gesture after this many milliseconds
    #[arg(long)]
    interrupt_after_ms: Option<u64>,

    /// How long to run before printing the summary
    #[arg(long, default_value_t = 60_000)]
    run_for_ms: u64,

    /// Fixed seed for the intro plan
    #[arg(long)]
    seed: Option<u64>,

    /// Print the event trail as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Profile {
    Idle,
    Showcase,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ExplorerConfig::load(path)?,
        None => ExplorerConfig::default(),
    };
    if let Some(profile) = args.profile {
        config.rotation.profile = match profile {
            Profile::Idle => RotationProfile::Idle,
            Profile::Showcase => RotationProfile::Showcase,
        };
    }
    if args.seed.is_some() {
        config.flight.seed = args.seed;
    }
    config.validate()?;

    let listings: Arc<dyn ListingService>;
    let tours: Arc<dyn TourService>;
    match &args.listing_url {
        Some(url) => {
            info!(%url, "using remote listing API");
            listings = Arc::new(HttpListingService::new(url.as_str()));
            tours = Arc::new(HttpTourService::new(url.as_str()));
        }
        None => {
            listings = Arc::new(InMemoryListingService::new(Vec::new()));
            tours = Arc::new(catalog::demo::demo_tours());
        }
    }
    let geolocation: Arc<dyn GeolocationProvider> = match args.at.as_deref() {
        Some(at) => Arc::new(StaticGeolocation::at(parse_lng_lat(at)?)),
        None => Arc::new(StaticGeolocation::denied()),
    };

    let engine = Arc::new(HeadlessEngine::new().logging());
    let surface = Arc::new(HeadlessTourSurface::new());
    let explorer = Arc::new(Explorer::new(
        config,
        Services {
            listings,
            tours,
            geolocation,
        },
        Surfaces {
            engine: engine.clone(),
            tour_surface: surface.clone(),
            presenter: Arc::new(HeadlessPresenter::new()),
        },
    ));

    let hint = NetworkHint {
        effective_type: args.network.clone(),
        save_data: args.save_data,
    };
    let starter = explorer.clone();
    tokio::spawn(async move {
        if !starter.start(None, hint).await {
            warn!("explorer did not start");
        }
    });

    if let Some(ms) = args.interrupt_after_ms {
        let explorer = explorer.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            info!(after_ms = ms, "simulated pointer gesture");
            explorer.input(InputKind::Pointer);
        });
    }

    tokio::time::sleep(Duration::from_millis(args.run_for_ms)).await;

    let events = explorer.events().events();
    if args.json {
        let trail: Vec<_> = events
            .iter()
            .map(|e| json!({ "at_ms": e.at_ms, "kind": e.kind.as_str(), "message": e.message }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&trail)?);
    }

    let kinds = [
        EventKind::Session,
        EventKind::Camera,
        EventKind::Flight,
        EventKind::Rotation,
        EventKind::Tour,
        EventKind::Page,
        EventKind::Notice,
    ];
    for kind in kinds {
        let count = events.iter().filter(|e| e.kind == kind).count();
        println!("{:<9} {count}", kind.as_str());
    }
    println!(
        "flight    {:?} ({:?})",
        explorer.flight_phase(),
        explorer.flight_end()
    );
    println!("rotation  {}", if explorer.rotation_active() { "active" } else { "idle" });
    println!("tour      {:?}", explorer.tour_state());
    println!(
        "listings  {} ({:?})",
        explorer.properties().len(),
        explorer.properties().origin
    );
    println!(
        "camera    {} commands, {} bearing writes, {} tour mounts",
        engine.command_count(),
        engine.bearing_writes(),
        surface.mount_count()
    );
    Ok(())
}

fn parse_lng_lat(at: &str) -> Result<LngLat, Box<dyn std::error::Error>> {
    let parts: Vec<_> = at.split(',').collect();
    if parts.len() != 2 {
        return Err("position must be lng,lat".into());
    }
    let lng: f64 = parts[0].trim().parse()?;
    let lat: f64 = parts[1].trim().parse()?;
    Ok(LngLat::new(lng, lat))
}
