use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Kind of raw input the host observed on the map surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum InputKind {
    Pointer,
    Touch,
    Wheel,
    Keyboard,
}

impl InputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::Pointer => "pointer",
            InputKind::Touch => "touch",
            InputKind::Wheel => "wheel",
            InputKind::Keyboard => "keyboard",
        }
    }
}

/// Why the session was interrupted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InterruptCause {
    /// A genuine input event or a device-originated camera move.
    Input(InputKind),
    /// The explicit skip/explore affordance.
    Skip,
}

/// Component currently allowed to write camera state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CameraWriter {
    AutoFlight,
    IdleRotation,
    User,
}

/// Whether the map is in plain browsing or in an editing workflow.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BrowseMode {
    #[default]
    Browsing,
    Editing,
}

/// Session-scoped orchestration state shared by every component.
///
/// Cheap to clone; all clones observe the same state. The interrupt flag is
/// a one-way latch: once a genuine user gesture is seen, the automated camera
/// writers (intro flight, idle rotation) stay disabled for the rest of the
/// session.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    interrupted: AtomicBool,
    cancel: CancellationToken,
    writer: Mutex<Option<CameraWriter>>,
    tour_open: AtomicBool,
    browse_mode: Mutex<BrowseMode>,
    started_at: Instant,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionInner {
                interrupted: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                writer: Mutex::new(None),
                tour_open: AtomicBool::new(false),
                browse_mode: Mutex::new(BrowseMode::default()),
                started_at: Instant::now(),
            }),
        }
    }

    /// Latch the interrupt flag.
    ///
    /// Returns `true` only for the call that actually latched it. Cancels the
    /// session token so pending automated camera work wakes up and exits.
    pub fn interrupt(&self, cause: InterruptCause) -> bool {
        if self.inner.interrupted.swap(true, Ordering::SeqCst) {
            return false;
        }
        *self.inner.writer.lock() = Some(CameraWriter::User);
        self.inner.cancel.cancel();
        info!(?cause, elapsed_ms = self.elapsed().as_millis() as u64, "session interrupted");
        true
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    /// Token cancelled when the session is interrupted.
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Try to become the camera writer.
    ///
    /// Automated writers are refused once the session is interrupted, and
    /// refused while a different writer holds the camera.
    pub fn claim_camera(&self, writer: CameraWriter) -> bool {
        let mut current = self.inner.writer.lock();
        if writer == CameraWriter::User {
            *current = Some(CameraWriter::User);
            return true;
        }
        if self.is_interrupted() {
            return false;
        }
        match *current {
            None => {
                *current = Some(writer);
                debug!(?writer, "camera claimed");
                true
            }
            Some(held) => held == writer,
        }
    }

    /// Give the camera back if `writer` holds it.
    pub fn release_camera(&self, writer: CameraWriter) {
        let mut current = self.inner.writer.lock();
        if *current == Some(writer) {
            *current = None;
            debug!(?writer, "camera released");
        }
    }

    pub fn camera_writer(&self) -> Option<CameraWriter> {
        *self.inner.writer.lock()
    }

    /// True when `writer` may issue a camera command right now.
    pub fn may_write(&self, writer: CameraWriter) -> bool {
        if writer != CameraWriter::User && self.is_interrupted() {
            return false;
        }
        self.camera_writer() == Some(writer)
    }

    pub fn set_tour_open(&self, open: bool) {
        self.inner.tour_open.store(open, Ordering::SeqCst);
    }

    pub fn tour_open(&self) -> bool {
        self.inner.tour_open.load(Ordering::SeqCst)
    }

    pub fn browse_mode(&self) -> BrowseMode {
        *self.inner.browse_mode.lock()
    }

    pub fn set_browse_mode(&self, mode: BrowseMode) {
        *self.inner.browse_mode.lock() = mode;
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraWriter, InputKind, InterruptCause, Session};

    #[test]
    fn interrupt_latches_once() {
        let session = Session::new();
        assert!(!session.is_interrupted());
        assert!(session.interrupt(InterruptCause::Input(InputKind::Pointer)));
        assert!(!session.interrupt(InterruptCause::Skip));
        assert!(session.is_interrupted());
        assert!(session.cancellation().is_cancelled());
    }

    #[test]
    fn automated_writers_are_exclusive() {
        let session = Session::new();
        assert!(session.claim_camera(CameraWriter::AutoFlight));
        assert!(!session.claim_camera(CameraWriter::IdleRotation));
        session.release_camera(CameraWriter::AutoFlight);
        assert!(session.claim_camera(CameraWriter::IdleRotation));
        assert!(session.may_write(CameraWriter::IdleRotation));
        assert!(!session.may_write(CameraWriter::AutoFlight));
    }

    #[test]
    fn interrupt_hands_camera_to_user_for_good() {
        let session = Session::new();
        assert!(session.claim_camera(CameraWriter::IdleRotation));
        session.interrupt(InterruptCause::Input(InputKind::Wheel));

        assert_eq!(session.camera_writer(), Some(CameraWriter::User));
        assert!(!session.may_write(CameraWriter::IdleRotation));
        session.release_camera(CameraWriter::IdleRotation);
        assert!(!session.claim_camera(CameraWriter::IdleRotation));
        assert!(!session.claim_camera(CameraWriter::AutoFlight));
    }

    #[test]
    fn clones_share_state() {
        let a = Session::new();
        let b = a.clone();
        b.set_tour_open(true);
        assert!(a.tour_open());
    }
}
