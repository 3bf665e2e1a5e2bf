use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use runtime::{Debounce, InputKind};
use tokio::time::Duration;
use tracing::{debug, trace};

use crate::engine::{MapEngine, MoveEvent, Viewport};

/// How a camera move came about.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MoveKind {
    Genuine(InputKind),
    Programmatic,
}

/// Viewport reported once movement has stopped.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Settled {
    pub viewport: Viewport,
    /// Whether any move in the collapsed burst came from a device.
    pub genuine: bool,
    /// Running count of settle notifications.
    pub seq: u64,
}

/// Reads the camera from the engine and collapses move-end bursts into one
/// settle notification.
pub struct ViewportTracker {
    engine: Arc<dyn MapEngine>,
    settle: Debounce,
    burst_genuine: Arc<AtomicBool>,
    last: Arc<Mutex<Option<Settled>>>,
    settles: Arc<AtomicU64>,
}

impl ViewportTracker {
    pub fn new(engine: Arc<dyn MapEngine>, settle_delay: Duration) -> Self {
        Self {
            engine,
            settle: Debounce::new("viewport-settle", settle_delay),
            burst_genuine: Arc::new(AtomicBool::new(false)),
            last: Arc::new(Mutex::new(None)),
            settles: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn classify(event: &MoveEvent) -> MoveKind {
        match event.origin {
            Some(kind) => MoveKind::Genuine(kind),
            None => MoveKind::Programmatic,
        }
    }

    /// Current camera, straight from the engine.
    pub fn current(&self) -> Viewport {
        self.engine.viewport()
    }

    pub fn last_settled(&self) -> Option<Settled> {
        *self.last.lock()
    }

    pub fn settle_count(&self) -> u64 {
        self.settles.load(Ordering::SeqCst)
    }

    pub fn settle_pending(&self) -> bool {
        self.settle.is_pending()
    }

    /// A move began: any pending settle is withdrawn.
    pub fn move_started(&self, event: &MoveEvent) -> MoveKind {
        let kind = Self::classify(event);
        if event.is_genuine() {
            self.burst_genuine.store(true, Ordering::SeqCst);
        }
        if self.settle.cancel() {
            trace!("settle withdrawn by new move");
        }
        kind
    }

    /// A move ended: (re)arm the settle timer. `on_settle` runs once the
    /// camera has been still for the settle delay, with the viewport read at
    /// that moment.
    pub fn move_ended<F, Fut>(&self, event: &MoveEvent, on_settle: F) -> MoveKind
    where
        F: FnOnce(Settled) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let kind = Self::classify(event);
        if event.is_genuine() {
            self.burst_genuine.store(true, Ordering::SeqCst);
        }
        let engine = self.engine.clone();
        let burst_genuine = self.burst_genuine.clone();
        let last = self.last.clone();
        let settles = self.settles.clone();
        self.settle.schedule(async move {
            let settled = Settled {
                viewport: engine.viewport(),
                genuine: burst_genuine.swap(false, Ordering::SeqCst),
                seq: settles.fetch_add(1, Ordering::SeqCst) + 1,
            };
            *last.lock() = Some(settled);
            debug!(
                zoom = settled.viewport.zoom,
                lng = settled.viewport.center.lng,
                lat = settled.viewport.center.lat,
                genuine = settled.genuine,
                "viewport settled"
            );
            on_settle(settled).await;
        });
        kind
    }

    pub fn cancel(&self) {
        self.settle.cancel();
    }
}
