use std::collections::HashSet;
use std::sync::Arc;

use catalog::demo::demo_properties;
use catalog::{ListingFilter, Property, PropertyId, PropertyPage, ServiceError};
use parking_lot::Mutex;
use runtime::{BrowseMode, EventBus, EventKind, Session};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::{PageKey, PropertyCache};
use crate::filter::FilterSignature;

/// Where the currently rendered properties came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataOrigin {
    /// Fetched from the listing service.
    Live,
    /// First page supplied by the host at mount time.
    Seeded,
    /// Built-in demo listings.
    Demo,
}

/// The merged list of loaded properties, as published to readers.
#[derive(Debug, Clone)]
pub struct PropertySet {
    pub properties: Arc<Vec<Property>>,
    pub origin: DataOrigin,
    pub signature: FilterSignature,
    /// Bumped on every publish.
    pub revision: u64,
}

impl PropertySet {
    fn empty() -> Self {
        Self {
            properties: Arc::new(Vec::new()),
            origin: DataOrigin::Demo,
            signature: FilterSignature::default(),
            revision: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn get(&self, id: PropertyId) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PaginationState {
    /// Last page merged; zero before the first load.
    pub current_page: u32,
    pub total_count: u64,
    pub has_next: bool,
    pub in_flight: bool,
}

/// Retryable failure of a page after the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageError {
    pub page: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadStatus {
    /// Nothing is rendered yet and a fetch is running.
    pub loading: bool,
    pub error: Option<PageError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Loaded { page: u32, added: usize, total: u64 },
    /// The filter changed while the request was running; the result was dropped.
    Stale,
    /// Page 1 failed and the demo listings are shown instead.
    FellBackToDemo(ServiceError),
    /// A later page failed; rendered markers are unchanged.
    Failed(ServiceError),
    /// Preconditions for the request were not met.
    Skipped,
}

struct Inner {
    filter: ListingFilter,
    signature: FilterSignature,
    state: PaginationState,
    /// Bumped whenever the filter changes; results from older epochs are stale.
    epoch: u64,
    /// Id of the latest request, so an older completion does not clear `in_flight`.
    ticket: u64,
    revision: u64,
}

struct Ticket {
    filter: ListingFilter,
    epoch: u64,
    id: u64,
}

/// Owns the loaded property list and feeds it page by page from the cache.
///
/// Nothing else merges pages; readers get snapshots through [`subscribe`].
///
/// [`subscribe`]: PaginationController::subscribe
pub struct PaginationController {
    cache: Arc<PropertyCache>,
    page_size: u32,
    prefetch_next: bool,
    session: Session,
    bus: EventBus,
    demo: Arc<Vec<Property>>,
    inner: Mutex<Inner>,
    set_tx: watch::Sender<PropertySet>,
    status_tx: watch::Sender<LoadStatus>,
}

impl PaginationController {
    pub fn new(cache: Arc<PropertyCache>, page_size: u32, session: Session, bus: EventBus) -> Self {
        let (set_tx, _) = watch::channel(PropertySet::empty());
        let (status_tx, _) = watch::channel(LoadStatus::default());
        let filter = ListingFilter::default();
        Self {
            cache,
            page_size: page_size.max(1),
            prefetch_next: true,
            session,
            bus,
            demo: Arc::new(demo_properties()),
            inner: Mutex::new(Inner {
                signature: FilterSignature::of(&filter),
                filter,
                state: PaginationState::default(),
                epoch: 0,
                ticket: 0,
                revision: 0,
            }),
            set_tx,
            status_tx,
        }
    }

    /// Replace the built-in demo listings.
    pub fn with_demo(mut self, demo: Vec<Property>) -> Self {
        self.demo = Arc::new(demo);
        self
    }

    pub fn with_prefetch(mut self, enabled: bool) -> Self {
        self.prefetch_next = enabled;
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn subscribe(&self) -> watch::Receiver<PropertySet> {
        self.set_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<LoadStatus> {
        self.status_tx.subscribe()
    }

    pub fn snapshot(&self) -> PropertySet {
        self.set_tx.borrow().clone()
    }

    pub fn state(&self) -> PaginationState {
        self.inner.lock().state
    }

    pub fn status(&self) -> LoadStatus {
        self.status_tx.borrow().clone()
    }

    pub fn filter(&self) -> ListingFilter {
        self.inner.lock().filter.clone()
    }

    /// Render the initial property set.
    ///
    /// A non-empty `seed` becomes page 1 of the current filter (and is cached
    /// under that key). Otherwise the demo listings are shown so the map is
    /// never empty. Returns `true` when page 1 still has to be fetched.
    pub fn mount(&self, seed: Option<PropertyPage>) -> bool {
        let seed = seed.filter(|page| !page.results.is_empty());
        let mut inner = self.inner.lock();
        match seed {
            Some(page) => {
                let page = Arc::new(page);
                self.cache.insert(
                    PageKey::new(&inner.filter, 1, self.page_size),
                    page.clone(),
                );
                inner.state = PaginationState {
                    current_page: 1,
                    total_count: page.count,
                    has_next: page.has_next(),
                    in_flight: false,
                };
                info!(count = page.results.len(), "mounted with seeded page");
                self.publish(&mut inner, Arc::new(page.results.clone()), DataOrigin::Seeded);
                false
            }
            None => {
                info!(count = self.demo.len(), "mounted with demo listings");
                self.publish(&mut inner, self.demo.clone(), DataOrigin::Demo);
                true
            }
        }
    }

    /// Fetch page `n` of the current filter and merge it.
    ///
    /// Page 1 replaces the rendered set, later pages append. Rendered markers
    /// stay in place until the new data arrives.
    pub async fn fetch_page(&self, n: u32) -> PageOutcome {
        let Some(ticket) = self.begin(n, false) else {
            return PageOutcome::Skipped;
        };
        self.run(n, ticket).await
    }

    /// Load the next page when more pages exist, nothing is in flight, the
    /// map is in browsing mode, and the rendered set is not the demo set.
    pub async fn load_more(&self) -> PageOutcome {
        let next = self.inner.lock().state.current_page + 1;
        let Some(ticket) = self.begin(next, true) else {
            return PageOutcome::Skipped;
        };
        self.run(next, ticket).await
    }

    /// Retry the page whose failure is currently surfaced.
    pub async fn retry_load_more(&self) -> PageOutcome {
        let failed = self.status_tx.borrow().error.as_ref().map(|e| e.page);
        match failed {
            Some(page) => {
                debug!(page, "retrying failed page");
                self.fetch_page(page).await
            }
            None => PageOutcome::Skipped,
        }
    }

    /// Switch to `filter` and load its first page.
    ///
    /// Filters with the current signature are a no-op. Requests still running
    /// for the previous filter are ignored when they complete.
    pub async fn set_filter(&self, filter: ListingFilter) -> PageOutcome {
        let signature = FilterSignature::of(&filter);
        {
            let mut inner = self.inner.lock();
            if inner.signature == signature {
                return PageOutcome::Skipped;
            }
            info!(from = %inner.signature, to = %signature, "filter changed");
            inner.filter = filter;
            inner.signature = signature;
            inner.epoch += 1;
            inner.state = PaginationState::default();
        }
        self.status_tx.send_modify(|s| s.error = None);
        self.fetch_page(1).await
    }

    fn begin(&self, page: u32, load_more: bool) -> Option<Ticket> {
        let mut inner = self.inner.lock();
        if load_more {
            let origin = self.set_tx.borrow().origin;
            let state = inner.state;
            if !state.has_next
                || state.in_flight
                || origin == DataOrigin::Demo
                || self.session.browse_mode() != BrowseMode::Browsing
            {
                debug!(?state, ?origin, "load more skipped");
                return None;
            }
        }
        inner.ticket += 1;
        inner.state.in_flight = true;
        let empty = self.set_tx.borrow().is_empty();
        if page == 1 && empty {
            self.status_tx.send_modify(|s| s.loading = true);
        }
        Some(Ticket {
            filter: inner.filter.clone(),
            epoch: inner.epoch,
            id: inner.ticket,
        })
    }

    async fn run(&self, n: u32, ticket: Ticket) -> PageOutcome {
        let result = self.cache.get(&ticket.filter, n, self.page_size).await;

        let mut inner = self.inner.lock();
        if inner.epoch != ticket.epoch {
            debug!(page = n, "discarding stale page");
            return PageOutcome::Stale;
        }
        if inner.ticket == ticket.id {
            inner.state.in_flight = false;
        }
        self.status_tx.send_modify(|s| s.loading = false);

        match result {
            Ok(page) => {
                let outcome = self.merge(&mut inner, n, &page);
                self.status_tx.send_modify(|s| {
                    if s.error.as_ref().is_some_and(|e| e.page <= n) {
                        s.error = None;
                    }
                });
                if page.has_next() && self.prefetch_next {
                    self.cache.prefetch(&ticket.filter, n + 1, self.page_size);
                }
                outcome
            }
            Err(err) if n <= 1 => {
                warn!(%err, "first page failed, showing demo listings");
                inner.state = PaginationState::default();
                self.publish(&mut inner, self.demo.clone(), DataOrigin::Demo);
                PageOutcome::FellBackToDemo(err)
            }
            Err(err) => {
                warn!(page = n, %err, "page failed");
                self.bus
                    .emit(EventKind::Notice, format!("page {n} failed: {err}"));
                self.status_tx.send_modify(|s| {
                    s.error = Some(PageError {
                        page: n,
                        message: format!("Could not load more properties ({err})."),
                    })
                });
                PageOutcome::Failed(err)
            }
        }
    }

    fn merge(&self, inner: &mut Inner, n: u32, page: &PropertyPage) -> PageOutcome {
        inner.state.current_page = n;
        inner.state.total_count = page.count;
        inner.state.has_next = page.has_next();

        let current = self.set_tx.borrow().clone();
        if n <= 1 {
            if page.results.is_empty() && current.origin == DataOrigin::Demo {
                debug!("first page empty, keeping demo listings");
                return PageOutcome::Loaded {
                    page: n,
                    added: 0,
                    total: page.count,
                };
            }
            let added = page.results.len();
            self.publish(inner, Arc::new(page.results.clone()), DataOrigin::Live);
            self.bus
                .emit(EventKind::Page, format!("page 1 loaded: {added} properties"));
            return PageOutcome::Loaded {
                page: n,
                added,
                total: page.count,
            };
        }

        let mut seen: HashSet<PropertyId> = current.properties.iter().map(|p| p.id).collect();
        let mut merged = current.properties.as_ref().clone();
        let before = merged.len();
        merged.extend(page.results.iter().filter(|p| seen.insert(p.id)).cloned());
        let added = merged.len() - before;
        let origin = match current.origin {
            DataOrigin::Demo => DataOrigin::Live,
            other => other,
        };
        self.publish(inner, Arc::new(merged), origin);
        self.bus
            .emit(EventKind::Page, format!("page {n} appended: {added} properties"));
        PageOutcome::Loaded {
            page: n,
            added,
            total: page.count,
        }
    }

    fn publish(&self, inner: &mut Inner, properties: Arc<Vec<Property>>, origin: DataOrigin) {
        inner.revision += 1;
        self.set_tx.send_replace(PropertySet {
            properties,
            origin,
            signature: inner.signature.clone(),
            revision: inner.revision,
        });
    }
}
