//! Scripted intro flight: plan construction and the sequencer that plays it.

pub mod plan;
pub mod sequencer;

pub use plan::*;
pub use sequencer::*;

use catalog::GeolocationProvider;
use foundation::LngLat;
use tokio::time::{Duration, timeout};
use tracing::{debug, info};

/// Best-effort device position, bounded by `limit`.
pub async fn locate(provider: &dyn GeolocationProvider, limit: Duration) -> Option<LngLat> {
    match timeout(limit, provider.current_position()).await {
        Ok(Ok(position)) if position.is_located() => {
            debug!(lng = position.lng, lat = position.lat, "device located");
            Some(position)
        }
        Ok(Ok(_)) => {
            info!("geolocation returned an unusable position");
            None
        }
        Ok(Err(err)) => {
            info!(%err, "geolocation unavailable, using fallback region");
            None
        }
        Err(_) => {
            info!(timeout_ms = limit.as_millis() as u64, "geolocation timed out, using fallback region");
            None
        }
    }
}
