use std::sync::{Arc, Weak};

use foundation::wrap_bearing;
use parking_lot::Mutex;
use runtime::{CameraWriter, Debounce, EventBus, EventKind, FrameClock, Session};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::{RotationConfig, RotationProfile};
use crate::engine::MapEngine;

/// Bearing after rotating at `speed_deg_per_s` for `dt`.
pub fn advance_bearing(bearing: f64, speed_deg_per_s: f64, dt: Duration) -> f64 {
    wrap_bearing(bearing + speed_deg_per_s * dt.as_secs_f64())
}

/// Why rotation did not start.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RotationBlock {
    Interrupted,
    TourOpen,
    ZoomedIn,
    CameraBusy,
    EngineNotReady,
}

/// Spins the globe when nobody is using it.
///
/// In the `Idle` profile rotation starts only when the camera is zoomed out,
/// no tour is open, the session was never interrupted, and the map has been
/// quiet for the quiescence period. Activity pauses it and re-arms the
/// quiescence timer. The `Showcase` profile starts on the first activity and
/// keeps spinning regardless of zoom, only stepping aside while a host command
/// moves the camera. Both stop for good once the session is interrupted.
pub struct IdleRotation {
    engine: Arc<dyn MapEngine>,
    session: Session,
    bus: EventBus,
    config: RotationConfig,
    quiescence: Debounce,
    frames: Mutex<Option<JoinHandle<()>>>,
    this: Weak<IdleRotation>,
}

impl IdleRotation {
    pub fn new(
        engine: Arc<dyn MapEngine>,
        session: Session,
        bus: EventBus,
        config: RotationConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            engine,
            session,
            bus,
            quiescence: Debounce::new("rotation-quiescence", config.quiescence()),
            config,
            frames: Mutex::new(None),
            this: this.clone(),
        })
    }

    pub fn profile(&self) -> RotationProfile {
        self.config.profile
    }

    pub fn is_active(&self) -> bool {
        self.frames
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn resume_pending(&self) -> bool {
        self.quiescence.is_pending()
    }

    /// Preconditions for starting, ignoring quiescence.
    pub fn blocked_by(&self) -> Option<RotationBlock> {
        if self.session.is_interrupted() {
            return Some(RotationBlock::Interrupted);
        }
        if !self.engine.is_ready() {
            return Some(RotationBlock::EngineNotReady);
        }
        if self.config.profile == RotationProfile::Showcase {
            return None;
        }
        if self.session.tour_open() {
            return Some(RotationBlock::TourOpen);
        }
        if self.engine.viewport().zoom > self.config.max_zoom {
            return Some(RotationBlock::ZoomedIn);
        }
        None
    }

    /// Start rotating now if the preconditions hold. Returns whether rotation
    /// is running afterwards.
    pub fn start_now(&self) -> bool {
        if self.is_active() {
            return true;
        }
        if let Some(block) = self.blocked_by() {
            debug!(?block, "rotation not started");
            return false;
        }
        if !self.session.claim_camera(CameraWriter::IdleRotation) {
            debug!(block = ?RotationBlock::CameraBusy, "rotation not started");
            return false;
        }

        self.engine.set_pitch(0.0);
        self.engine.set_bearing(0.0);

        let engine = self.engine.clone();
        let session = self.session.clone();
        let cancel = session.cancellation();
        let speed = self.config.speed_deg_per_s();
        let frame = self.config.frame();
        let mut clock = FrameClock::new(self.config.max_frame_dt());
        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(frame);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticks.tick() => {}
                }
                if !session.may_write(CameraWriter::IdleRotation) {
                    break;
                }
                let dt = clock.tick(Instant::now());
                if dt.is_zero() {
                    continue;
                }
                let bearing = engine.viewport().bearing;
                engine.set_bearing(advance_bearing(bearing, speed, dt));
            }
            debug!("rotation frames stopped");
        });
        if let Some(prev) = self.frames.lock().replace(handle) {
            prev.abort();
        }
        info!(profile = ?self.config.profile, speed, "rotation started");
        self.bus.emit(EventKind::Rotation, "started");
        true
    }

    /// Stop the frame loop and give the camera back.
    pub fn pause(&self) -> bool {
        let running = self.frames.lock().take();
        let was_active = running.as_ref().is_some_and(|h| !h.is_finished());
        if let Some(handle) = running {
            handle.abort();
        }
        self.session.release_camera(CameraWriter::IdleRotation);
        if was_active {
            debug!("rotation paused");
            self.bus.emit(EventKind::Rotation, "paused");
        }
        was_active
    }

    /// The map was moved or settled: pause and restart the quiescence wait.
    /// A showcase spins without waiting and is never paused by activity.
    pub fn note_activity(&self) {
        if self.session.is_interrupted() {
            self.stop();
            return;
        }
        if self.config.profile == RotationProfile::Showcase {
            self.start_now();
            return;
        }
        self.pause();
        let this = self.this.clone();
        self.quiescence.schedule(async move {
            if let Some(rotation) = this.upgrade() {
                rotation.start_now();
            }
        });
    }

    /// A host command is about to move the camera. Idle rotation waits for
    /// quiescence as usual; a showcase steps aside until that move settles.
    pub fn hand_over(&self) {
        if self.config.profile == RotationProfile::Showcase && !self.session.is_interrupted() {
            self.quiescence.cancel();
            self.pause();
            return;
        }
        self.note_activity();
    }

    /// Stop permanently for this session.
    pub fn stop(&self) {
        self.quiescence.cancel();
        self.pause();
    }
}

impl Drop for IdleRotation {
    fn drop(&mut self) {
        if let Some(handle) = self.frames.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{IdleRotation, RotationBlock, advance_bearing};
    use crate::config::{RotationConfig, RotationProfile};
    use crate::engine::MapEngine;
    use crate::headless::HeadlessEngine;
    use foundation::LngLat;
    use runtime::{CameraWriter, EventBus, InputKind, InterruptCause, Session};
    use tokio::time::{Duration, sleep};

    fn setup(profile: RotationProfile, zoom: f64) -> (Arc<HeadlessEngine>, Session, Arc<IdleRotation>) {
        let engine = Arc::new(HeadlessEngine::new());
        engine.jump_to(LngLat::new(30.0, 20.0), zoom);
        let session = Session::new();
        let config = RotationConfig {
            profile,
            ..RotationConfig::default()
        };
        let rotation = IdleRotation::new(engine.clone(), session.clone(), EventBus::new(), config);
        (engine, session, rotation)
    }

    #[test]
    fn bearing_advances_and_wraps() {
        assert_eq!(advance_bearing(10.0, 3.0, Duration::from_secs(2)), 16.0);
        assert!((advance_bearing(359.0, 3.0, Duration::from_secs(1)) - 2.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn rotates_at_constant_speed_from_neutral() {
        let (engine, _, rotation) = setup(RotationProfile::Idle, 2.0);
        engine.set_pitch(40.0);
        engine.set_bearing(120.0);
        assert!(rotation.start_now());
        assert_eq!(engine.viewport().pitch, 0.0);

        sleep(Duration::from_millis(2000)).await;
        let bearing = engine.viewport().bearing;
        assert!((5.5..=6.5).contains(&bearing), "bearing {bearing}");
    }

    #[tokio::test(start_paused = true)]
    async fn resumes_only_after_quiescence() {
        let (_, _, rotation) = setup(RotationProfile::Idle, 2.0);
        assert!(rotation.start_now());

        rotation.note_activity();
        assert!(!rotation.is_active());
        sleep(Duration::from_millis(6900)).await;
        assert!(!rotation.is_active());

        // More activity restarts the wait.
        rotation.note_activity();
        sleep(Duration::from_millis(6900)).await;
        assert!(!rotation.is_active());
        sleep(Duration::from_millis(200)).await;
        assert!(rotation.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_start_when_zoomed_in_or_tour_open() {
        let (engine, session, rotation) = setup(RotationProfile::Idle, 9.0);
        assert_eq!(rotation.blocked_by(), Some(RotationBlock::ZoomedIn));
        rotation.note_activity();
        sleep(Duration::from_secs(8)).await;
        assert!(!rotation.is_active());

        engine.jump_to(LngLat::new(30.0, 20.0), 2.5);
        session.set_tour_open(true);
        assert!(!rotation.start_now());
        session.set_tour_open(false);
        assert!(rotation.start_now());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_stops_rotation_for_good() {
        let (engine, session, rotation) = setup(RotationProfile::Idle, 2.0);
        assert!(rotation.start_now());
        sleep(Duration::from_millis(500)).await;

        session.interrupt(InterruptCause::Input(InputKind::Pointer));
        sleep(Duration::from_millis(50)).await;
        let writes = engine.bearing_writes();
        assert!(!rotation.is_active());

        rotation.note_activity();
        sleep(Duration::from_secs(30)).await;
        assert_eq!(engine.bearing_writes(), writes);
        assert!(!rotation.start_now());
        assert_eq!(session.camera_writer(), Some(CameraWriter::User));
    }

    #[tokio::test(start_paused = true)]
    async fn showcase_starts_on_activity_without_waiting() {
        let (engine, _, rotation) = setup(RotationProfile::Showcase, 16.0);
        rotation.note_activity();
        assert!(rotation.is_active());

        rotation.hand_over();
        assert!(!rotation.is_active());
        sleep(Duration::from_secs(10)).await;
        let writes = engine.bearing_writes();
        assert!(!rotation.is_active());

        rotation.note_activity();
        sleep(Duration::from_millis(500)).await;
        assert!(engine.bearing_writes() > writes);
    }

    #[tokio::test(start_paused = true)]
    async fn showcase_ignores_zoom_and_activity() {
        let (engine, _, rotation) = setup(RotationProfile::Showcase, 12.0);
        assert!(rotation.start_now());
        rotation.note_activity();
        sleep(Duration::from_millis(1000)).await;
        assert!(rotation.is_active());
        let bearing = engine.viewport().bearing;
        assert!((7.5..=8.5).contains(&bearing), "bearing {bearing}");
    }
}
