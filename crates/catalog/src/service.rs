//! External collaborators consumed by the explorer.
//!
//! Methods return boxed futures for dyn-compatibility; implementations must be
//! `Send + Sync` so they can be shared between explorer tasks.

use std::future::Future;
use std::pin::Pin;

use foundation::LngLat;
use serde::{Deserialize, Serialize};

use crate::filter::ListingFilter;
use crate::property::{PropertyId, PropertyPage};

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Failure of an external service call.
///
/// `Clone` so one failed in-flight request can be reported to every caller
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Transport-level failure (DNS, connection reset, TLS).
    Network(String),
    /// Non-success HTTP status.
    Status(u16),
    /// Response body did not have the expected shape.
    Malformed(String),
    /// The user or platform refused (e.g. geolocation permission).
    Denied,
    /// The capability does not exist in this environment.
    Unavailable,
    Timeout,
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Network(msg) => write!(f, "network error: {msg}"),
            ServiceError::Status(code) => write!(f, "unexpected status {code}"),
            ServiceError::Malformed(msg) => write!(f, "malformed payload: {msg}"),
            ServiceError::Denied => write!(f, "permission denied"),
            ServiceError::Unavailable => write!(f, "service unavailable"),
            ServiceError::Timeout => write!(f, "request timed out"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// One entry of a property's tour list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TourLink {
    #[serde(default)]
    pub url: Option<String>,
}

impl TourLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    /// The URL, if it is non-blank.
    pub fn usable_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

/// Query flags appended to tour URLs before embedding: load the tour
/// immediately and keep the tour's own camera still.
pub const TOUR_PLAYBACK_FLAGS: [(&str, &str); 2] = [("autoload", "1"), ("autorotate", "0")];

/// Append the embed playback flags to a tour URL.
///
/// Flags already present are left alone. URLs that do not parse are
/// extended textually.
pub fn embed_tour_url(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) => {
            let present: Vec<String> = parsed.query_pairs().map(|(k, _)| k.into_owned()).collect();
            {
                let mut pairs = parsed.query_pairs_mut();
                for (k, v) in TOUR_PLAYBACK_FLAGS {
                    if !present.iter().any(|p| p == k) {
                        pairs.append_pair(k, v);
                    }
                }
            }
            parsed.into()
        }
        Err(_) => {
            let mut out = url.to_string();
            for (k, v) in TOUR_PLAYBACK_FLAGS {
                out.push(if out.contains('?') { '&' } else { '?' });
                out.push_str(k);
                out.push('=');
                out.push_str(v);
            }
            out
        }
    }
}

/// Paged listing search.
pub trait ListingService: Send + Sync {
    fn list_properties<'a>(
        &'a self,
        filter: &'a ListingFilter,
        page: u32,
        page_size: u32,
    ) -> BoxFuture<'a, Result<PropertyPage, ServiceError>>;
}

/// Virtual-tour lookup.
pub trait TourService: Send + Sync {
    fn property_tours(&self, id: PropertyId) -> BoxFuture<'_, Result<Vec<TourLink>, ServiceError>>;
}

/// Best-effort device position.
pub trait GeolocationProvider: Send + Sync {
    fn current_position(&self) -> BoxFuture<'_, Result<LngLat, ServiceError>>;
}
