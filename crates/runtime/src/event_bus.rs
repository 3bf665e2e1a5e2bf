use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Maximum number of events retained; older events are dropped first.
const DEFAULT_CAPACITY: usize = 1024;

/// Coarse category of an orchestration event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Session,
    Camera,
    Flight,
    Rotation,
    Tour,
    Page,
    Notice,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Session => "session",
            EventKind::Camera => "camera",
            EventKind::Flight => "flight",
            EventKind::Rotation => "rotation",
            EventKind::Tour => "tour",
            EventKind::Page => "page",
            EventKind::Notice => "notice",
        }
    }
}

/// Structured trail entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Milliseconds since the bus was created.
    pub at_ms: u64,
    pub kind: EventKind,
    pub message: String,
}

/// Bounded, shareable record of what the orchestrator did.
///
/// Every event is also forwarded to `tracing` at debug level, so the bus is
/// purely additive to normal logging.
#[derive(Debug, Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
    created_at: Instant,
}

#[derive(Debug)]
struct BusInner {
    capacity: usize,
    events: VecDeque<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                capacity: capacity.max(1),
                events: VecDeque::new(),
            })),
            created_at: Instant::now(),
        }
    }

    pub fn emit(&self, kind: EventKind, message: impl Into<String>) {
        let message = message.into();
        debug!(kind = kind.as_str(), "{message}");
        let at_ms = self.created_at.elapsed().as_millis() as u64;
        let mut inner = self.inner.lock();
        if inner.events.len() == inner.capacity {
            inner.events.pop_front();
        }
        inner.events.push_back(Event {
            at_ms,
            kind,
            message,
        });
    }

    pub fn events(&self) -> Vec<Event> {
        self.inner.lock().events.iter().cloned().collect()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<Event> {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn drain(&self) -> Vec<Event> {
        self.inner.lock().events.drain(..).collect()
    }
}
