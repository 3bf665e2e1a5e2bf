//! In-memory service implementations for offline runs and tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use foundation::LngLat;
use parking_lot::Mutex;

use crate::filter::ListingFilter;
use crate::property::{Property, PropertyId, PropertyPage};
use crate::service::{
    BoxFuture, GeolocationProvider, ListingService, ServiceError, TourLink, TourService,
};

/// Serves a fixed property list, paginated, with optional latency and
/// per-page failure injection.
#[derive(Debug, Default)]
pub struct InMemoryListingService {
    properties: Vec<Property>,
    latency: Duration,
    failing_pages: Mutex<BTreeSet<u32>>,
    requests: AtomicUsize,
}

impl InMemoryListingService {
    pub fn new(properties: Vec<Property>) -> Self {
        Self {
            properties,
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every request for `page` fail until `heal_page` is called.
    pub fn fail_page(&self, page: u32) {
        self.failing_pages.lock().insert(page);
    }

    pub fn heal_page(&self, page: u32) {
        self.failing_pages.lock().remove(&page);
    }

    /// Number of `list_properties` calls served so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn matches(filter: &ListingFilter, p: &Property) -> bool {
        if let Some(q) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            if !p.name.to_lowercase().contains(&q) && !p.description.to_lowercase().contains(&q) {
                return false;
            }
        }
        if let Some(t) = filter.listing_type {
            if p.listing_type != t {
                return false;
            }
        }
        if let Some(min) = filter.min_price {
            if p.display_price().is_none_or(|v| v < min) {
                return false;
            }
        }
        if let Some(max) = filter.max_price {
            if p.display_price().is_none_or(|v| v > max) {
                return false;
            }
        }
        if let Some(has_tour) = filter.has_tour {
            if p.has_tour != has_tour {
                return false;
            }
        }
        true
    }
}

impl ListingService for InMemoryListingService {
    fn list_properties<'a>(
        &'a self,
        filter: &'a ListingFilter,
        page: u32,
        page_size: u32,
    ) -> BoxFuture<'a, Result<PropertyPage, ServiceError>> {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.failing_pages.lock().contains(&page) {
                return Err(ServiceError::Status(503));
            }

            let matching: Vec<&Property> = self
                .properties
                .iter()
                .filter(|p| Self::matches(filter, p))
                .collect();
            let size = page_size.max(1) as usize;
            let start = (page.max(1) as usize - 1) * size;
            let results: Vec<Property> =
                matching.iter().skip(start).take(size).map(|p| (*p).clone()).collect();
            let next = (start + size < matching.len()).then(|| format!("?page={}", page + 1));

            Ok(PropertyPage {
                results,
                count: matching.len() as u64,
                next,
            })
        })
    }
}

/// Tour lookup backed by a map of property id to tour links.
#[derive(Debug, Default)]
pub struct InMemoryTourService {
    tours: BTreeMap<PropertyId, Vec<TourLink>>,
    latency: Duration,
    requests: AtomicUsize,
}

impl InMemoryTourService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tour(mut self, id: PropertyId, url: impl Into<String>) -> Self {
        self.tours.entry(id).or_default().push(TourLink::new(url));
        self
    }

    pub fn with_links(mut self, id: PropertyId, links: Vec<TourLink>) -> Self {
        self.tours.insert(id, links);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl TourService for InMemoryTourService {
    fn property_tours(&self, id: PropertyId) -> BoxFuture<'_, Result<Vec<TourLink>, ServiceError>> {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            Ok(self.tours.get(&id).cloned().unwrap_or_default())
        })
    }
}

/// Geolocation that always answers with the same result.
#[derive(Debug, Clone, Copy)]
pub struct StaticGeolocation {
    position: Option<LngLat>,
}

impl StaticGeolocation {
    pub fn at(position: LngLat) -> Self {
        Self {
            position: Some(position),
        }
    }

    /// Behaves like a browser where the user denied the permission prompt.
    pub fn denied() -> Self {
        Self { position: None }
    }
}

impl GeolocationProvider for StaticGeolocation {
    fn current_position(&self) -> BoxFuture<'_, Result<LngLat, ServiceError>> {
        let position = self.position;
        Box::pin(async move { position.ok_or(ServiceError::Denied) })
    }
}

#[cfg(test)]
mod tests {
    use super::{InMemoryListingService, InMemoryTourService, StaticGeolocation};
    use crate::filter::ListingFilter;
    use crate::property::{Property, PropertyId};
    use crate::service::{GeolocationProvider, ListingService, ServiceError, TourService};
    use foundation::LngLat;

    fn listing(n: u64) -> InMemoryListingService {
        let props = (1..=n)
            .map(|i| Property::new(i, format!("p{i}"), LngLat::new(55.0 + i as f64 * 0.01, 25.0)))
            .collect();
        InMemoryListingService::new(props)
    }

    #[tokio::test]
    async fn paginates_and_reports_next() {
        let svc = listing(5);
        let filter = ListingFilter::default();

        let p1 = svc.list_properties(&filter, 1, 2).await.unwrap();
        assert_eq!(p1.results.len(), 2);
        assert_eq!(p1.count, 5);
        assert!(p1.has_next());

        let p3 = svc.list_properties(&filter, 3, 2).await.unwrap();
        assert_eq!(p3.results.len(), 1);
        assert!(!p3.has_next());
        assert_eq!(svc.request_count(), 2);
    }

    #[tokio::test]
    async fn failure_injection_is_per_page() {
        let svc = listing(5);
        let filter = ListingFilter::default();
        svc.fail_page(2);
        assert_eq!(
            svc.list_properties(&filter, 2, 2).await,
            Err(ServiceError::Status(503))
        );
        assert!(svc.list_properties(&filter, 1, 2).await.is_ok());
        svc.heal_page(2);
        assert!(svc.list_properties(&filter, 2, 2).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_property_has_no_tours() {
        let svc = InMemoryTourService::new().with_tour(PropertyId(1), "https://t/1");
        assert_eq!(svc.property_tours(PropertyId(1)).await.unwrap().len(), 1);
        assert!(svc.property_tours(PropertyId(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn denied_geolocation() {
        assert_eq!(
            StaticGeolocation::denied().current_position().await,
            Err(ServiceError::Denied)
        );
    }
}
