use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use catalog::{PropertyId, TourService, embed_tour_url};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::request::Inflight;

/// Memoized tour URL per property.
///
/// An entry is written on the first successful lookup (a URL, or "no tour")
/// and never replaced for the rest of the session. Failed lookups leave no
/// entry so they are retried later.
pub struct TourCache {
    service: Arc<dyn TourService>,
    entries: Mutex<HashMap<PropertyId, Option<String>>>,
    inflight: Inflight<PropertyId, Option<String>>,
    lookups: AtomicUsize,
}

impl TourCache {
    pub fn new(service: Arc<dyn TourService>) -> Self {
        Self {
            service,
            entries: Mutex::new(HashMap::new()),
            inflight: Inflight::new(),
            lookups: AtomicUsize::new(0),
        }
    }

    /// `Some(entry)` when the property has been resolved before.
    pub fn cached(&self, id: PropertyId) -> Option<Option<String>> {
        self.entries.lock().get(&id).cloned()
    }

    pub fn is_cached(&self, id: PropertyId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub fn is_resolving(&self, id: PropertyId) -> bool {
        self.inflight.is_pending(&id)
    }

    /// Calls issued to the tour service so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Record a resolution unless one already exists.
    pub fn insert(&self, id: PropertyId, url: Option<String>) {
        self.entries.lock().entry(id).or_insert(url);
    }

    /// Embed-ready tour URL for `id`, cache first.
    ///
    /// `None` means there is no usable tour, or the lookup failed.
    pub async fn resolve(&self, id: PropertyId) -> Option<String> {
        if let Some(entry) = self.cached(id) {
            return entry;
        }

        let (fetch, started) = self.inflight.join_or_start(&id, || {
            let service = self.service.clone();
            Box::pin(async move {
                let links = service.property_tours(id).await?;
                Ok(links
                    .iter()
                    .find_map(|l| l.usable_url())
                    .map(embed_tour_url))
            })
        });
        if started {
            self.lookups.fetch_add(1, Ordering::SeqCst);
        }

        let result = fetch.clone().await;
        self.inflight.complete(&id, &fetch);
        match result {
            Ok(url) => {
                debug!(property = %id, found = url.is_some(), "tour resolved");
                self.insert(id, url);
                // Another caller may have recorded first; the stored entry wins.
                self.cached(id).flatten()
            }
            Err(err) => {
                warn!(property = %id, %err, "tour lookup failed");
                None
            }
        }
    }
}
