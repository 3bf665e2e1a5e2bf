use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use catalog::{ListingFilter, ListingService, PropertyPage, ServiceError};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::filter::FilterSignature;
use crate::request::Inflight;

/// Cached pages kept before the least recently used one is dropped.
pub const DEFAULT_MAX_PAGES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageKey {
    pub signature: FilterSignature,
    pub page: u32,
    pub page_size: u32,
}

impl PageKey {
    pub fn new(filter: &ListingFilter, page: u32, page_size: u32) -> Self {
        Self {
            signature: FilterSignature::of(filter),
            page,
            page_size,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    page: Arc<PropertyPage>,
    last_used_tick: u64,
}

#[derive(Debug, Default)]
struct Pages {
    tick: u64,
    entries: BTreeMap<PageKey, CacheEntry>,
}

/// Request-deduplicating, page-keyed cache in front of the listing service.
///
/// - Completed pages are memoized by `(filter signature, page, page size)`.
/// - Concurrent requests for the same key share one network call.
/// - Failures are never cached.
/// - Eviction is LRU by `last_used_tick`, with a tie-break by key ordering.
pub struct PropertyCache {
    service: Arc<dyn ListingService>,
    max_pages: usize,
    pages: Mutex<Pages>,
    inflight: Inflight<PageKey, Arc<PropertyPage>>,
    network_requests: AtomicUsize,
}

impl PropertyCache {
    pub fn new(service: Arc<dyn ListingService>) -> Self {
        Self::with_capacity(service, DEFAULT_MAX_PAGES)
    }

    pub fn with_capacity(service: Arc<dyn ListingService>, max_pages: usize) -> Self {
        Self {
            service,
            max_pages: max_pages.max(1),
            pages: Mutex::new(Pages::default()),
            inflight: Inflight::new(),
            network_requests: AtomicUsize::new(0),
        }
    }

    /// Number of calls actually issued to the listing service.
    pub fn network_requests(&self) -> usize {
        self.network_requests.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.pages.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.lock().entries.is_empty()
    }

    pub fn contains(&self, key: &PageKey) -> bool {
        self.pages.lock().entries.contains_key(key)
    }

    /// Cached page for `key`, refreshing its recency.
    pub fn cached(&self, key: &PageKey) -> Option<Arc<PropertyPage>> {
        let mut pages = self.pages.lock();
        pages.tick += 1;
        let tick = pages.tick;
        let entry = pages.entries.get_mut(key)?;
        entry.last_used_tick = tick;
        Some(entry.page.clone())
    }

    /// Store a page obtained elsewhere (e.g. a server-rendered first page).
    pub fn insert(&self, key: PageKey, page: Arc<PropertyPage>) {
        let mut pages = self.pages.lock();
        pages.tick += 1;
        let tick = pages.tick;
        pages.entries.insert(
            key,
            CacheEntry {
                page,
                last_used_tick: tick,
            },
        );
        Self::evict_as_needed(&mut pages, self.max_pages);
    }

    /// Cached page, or fetch it (joining an identical in-flight request).
    pub async fn get(
        &self,
        filter: &ListingFilter,
        page: u32,
        page_size: u32,
    ) -> Result<Arc<PropertyPage>, ServiceError> {
        let key = PageKey::new(filter, page, page_size);
        if let Some(hit) = self.cached(&key) {
            debug!(signature = %key.signature, page, "page cache hit");
            return Ok(hit);
        }

        let (fetch, started) = self.inflight.join_or_start(&key, || {
            let service = self.service.clone();
            let filter = filter.clone();
            Box::pin(async move {
                service
                    .list_properties(&filter, page, page_size)
                    .await
                    .map(Arc::new)
            })
        });
        if started {
            self.network_requests.fetch_add(1, Ordering::SeqCst);
            debug!(signature = %key.signature, page, page_size, "page fetch started");
        }

        let result = fetch.clone().await;
        self.inflight.complete(&key, &fetch);
        if let Ok(page) = &result {
            if !self.contains(&key) {
                self.insert(key, page.clone());
            }
        }
        result
    }

    /// Warm the cache for `page` in the background. Errors are only logged.
    pub fn prefetch(self: &Arc<Self>, filter: &ListingFilter, page: u32, page_size: u32) {
        let key = PageKey::new(filter, page, page_size);
        if self.contains(&key) || self.inflight.is_pending(&key) {
            return;
        }
        let cache = self.clone();
        let filter = filter.clone();
        tokio::spawn(async move {
            if let Err(err) = cache.get(&filter, page, page_size).await {
                warn!(page, %err, "prefetch failed");
            }
        });
    }

    fn evict_as_needed(pages: &mut Pages, max_pages: usize) {
        while pages.entries.len() > max_pages {
            let oldest = pages
                .entries
                .iter()
                .min_by(|(ka, ea), (kb, eb)| {
                    ea.last_used_tick
                        .cmp(&eb.last_used_tick)
                        .then_with(|| ka.cmp(kb))
                })
                .map(|(k, _)| k.clone());
            let Some(key) = oldest else {
                break;
            };
            pages.entries.remove(&key);
        }
    }
}
