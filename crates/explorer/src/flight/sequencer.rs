use std::sync::{Arc, Weak};

use foundation::Easing;
use parking_lot::Mutex;
use runtime::{CameraWriter, EventBus, EventKind, Session};
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FlightConfig;
use crate::engine::{MapEngine, NetworkHint, Presenter};
use crate::flight::plan::{FlightPlan, FlightStep};
use crate::rotation::IdleRotation;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlightPhase {
    Idle,
    Flying(usize),
    GrandFinale,
    Complete,
}

/// How the intro ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlightEnd {
    /// Ran through the finale and handed over to rotation.
    Finished,
    /// Genuine input or the skip affordance.
    Interrupted,
    /// The host moved the camera through the control surface.
    TakenOver,
    LowBandwidth,
    /// The camera was not available (session already interrupted).
    Refused,
}

struct FlightState {
    phase: FlightPhase,
    end: Option<FlightEnd>,
    plan: Option<Arc<FlightPlan>>,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

/// Plays the intro flight once per session.
///
/// Each step is issued only after the previous one's duration has elapsed,
/// by a single task that waits on a cancellation token between steps. The
/// grand finale is followed by a fixed settle delay; move-completion events
/// from the engine are not used for sequencing.
pub struct AutoFlight {
    engine: Arc<dyn MapEngine>,
    presenter: Arc<dyn Presenter>,
    rotation: Arc<IdleRotation>,
    session: Session,
    bus: EventBus,
    config: FlightConfig,
    state: Mutex<FlightState>,
    this: Weak<AutoFlight>,
}

impl AutoFlight {
    pub fn new(
        engine: Arc<dyn MapEngine>,
        presenter: Arc<dyn Presenter>,
        rotation: Arc<IdleRotation>,
        session: Session,
        bus: EventBus,
        config: FlightConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            engine,
            presenter,
            rotation,
            session,
            bus,
            config,
            state: Mutex::new(FlightState {
                phase: FlightPhase::Idle,
                end: None,
                plan: None,
                cancel: None,
                task: None,
            }),
            this: this.clone(),
        })
    }

    pub fn phase(&self) -> FlightPhase {
        self.state.lock().phase
    }

    pub fn end(&self) -> Option<FlightEnd> {
        self.state.lock().end
    }

    pub fn plan(&self) -> Option<Arc<FlightPlan>> {
        self.state.lock().plan.clone()
    }

    /// True while the intro owns the camera.
    pub fn is_running(&self) -> bool {
        matches!(
            self.phase(),
            FlightPhase::Flying(_) | FlightPhase::GrandFinale
        )
    }

    /// Begin the intro. Returns `false` when it was skipped or refused; the
    /// phase is `Complete` in that case.
    pub fn start(&self, plan: FlightPlan, hint: &NetworkHint) -> bool {
        if self.state.lock().phase != FlightPhase::Idle {
            warn!("intro flight already started or ended");
            return false;
        }
        if hint.is_constrained() {
            info!(effective_type = ?hint.effective_type, save_data = hint.save_data, "skipping intro on a constrained network");
            self.conclude(FlightEnd::LowBandwidth);
            self.rotation.note_activity();
            return false;
        }
        if !self.session.claim_camera(CameraWriter::AutoFlight) {
            debug!("intro flight refused the camera");
            self.conclude(FlightEnd::Refused);
            return false;
        }

        let plan = Arc::new(plan);
        let cancel = self.session.cancellation().child_token();
        info!(
            region = plan.region,
            source = ?plan.source,
            stops = plan.steps.len(),
            "intro flight started"
        );
        self.engine.set_interactive(false);
        self.presenter.set_intro_visible(true);
        self.bus
            .emit(EventKind::Flight, format!("start {} ({:?})", plan.region, plan.source));

        let Some(this) = self.this.upgrade() else {
            return false;
        };
        let mut state = self.state.lock();
        state.phase = FlightPhase::Flying(0);
        state.plan = Some(plan.clone());
        state.cancel = Some(cancel.clone());
        state.task = Some(tokio::spawn(this.drive(plan, cancel)));
        true
    }

    /// End the intro early. Returns `false` if it had already ended.
    pub fn abort(&self, end: FlightEnd) -> bool {
        let (cancel, task) = {
            let mut state = self.state.lock();
            if state.phase == FlightPhase::Complete {
                return false;
            }
            let was_idle = state.phase == FlightPhase::Idle;
            state.phase = FlightPhase::Complete;
            state.end = Some(end);
            if was_idle {
                return true;
            }
            (state.cancel.take(), state.task.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            task.abort();
        }
        self.session.release_camera(CameraWriter::AutoFlight);
        self.engine.set_interactive(true);
        self.presenter.set_intro_visible(false);
        info!(?end, "intro flight ended early");
        self.bus.emit(EventKind::Flight, format!("ended early: {end:?}"));
        true
    }

    async fn drive(self: Arc<Self>, plan: Arc<FlightPlan>, cancel: CancellationToken) {
        for (i, step) in plan.steps.iter().enumerate() {
            if !self.issue(FlightPhase::Flying(i), step) {
                return;
            }
            if !pause(&cancel, step.duration).await {
                return;
            }
        }
        if !self.issue(FlightPhase::GrandFinale, &plan.finale) {
            return;
        }
        if !pause(&cancel, self.config.finale_settle()).await {
            return;
        }
        self.finish();
    }

    fn issue(&self, phase: FlightPhase, step: &FlightStep) -> bool {
        {
            let mut state = self.state.lock();
            if state.phase == FlightPhase::Complete
                || !self.session.may_write(CameraWriter::AutoFlight)
            {
                return false;
            }
            state.phase = phase;
        }
        self.engine
            .fly_to(step.target, step.duration, Easing::EngineDefault);
        debug!(?phase, label = %step.label, duration_ms = step.duration.as_millis() as u64, "flight step");
        self.bus
            .emit(EventKind::Flight, format!("{phase:?}: {}", step.label));
        true
    }

    fn finish(&self) {
        {
            let mut state = self.state.lock();
            if state.phase == FlightPhase::Complete {
                return;
            }
            state.phase = FlightPhase::Complete;
            state.end = Some(FlightEnd::Finished);
            state.cancel = None;
            state.task = None;
        }
        self.session.release_camera(CameraWriter::AutoFlight);
        self.engine.set_interactive(true);
        self.presenter.set_intro_visible(false);
        info!("intro flight complete, handing over to rotation");
        self.bus.emit(EventKind::Flight, "complete");
        self.rotation.start_now();
    }

    fn conclude(&self, end: FlightEnd) {
        {
            let mut state = self.state.lock();
            state.phase = FlightPhase::Complete;
            state.end = Some(end);
        }
        self.engine.set_interactive(true);
        self.presenter.set_intro_visible(false);
        self.bus.emit(EventKind::Flight, format!("skipped: {end:?}"));
    }
}

/// Wait for `duration` unless cancelled first. Returns `true` if the full
/// duration elapsed.
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{AutoFlight, FlightEnd, FlightPhase};
    use crate::config::{FlightConfig, RotationConfig};
    use crate::engine::{MapEngine, NetworkHint};
    use crate::flight::plan::FlightPlan;
    use crate::headless::{HeadlessEngine, HeadlessPresenter};
    use crate::rotation::IdleRotation;
    use catalog::fallback_region;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use runtime::{EventBus, InputKind, InterruptCause, Session};
    use tokio::time::{Duration, sleep};

    struct Rig {
        engine: Arc<HeadlessEngine>,
        presenter: Arc<HeadlessPresenter>,
        session: Session,
        rotation: Arc<IdleRotation>,
        flight: Arc<AutoFlight>,
    }

    fn rig() -> Rig {
        let engine = Arc::new(HeadlessEngine::new());
        let presenter = Arc::new(HeadlessPresenter::new());
        let session = Session::new();
        let bus = EventBus::new();
        let rotation = IdleRotation::new(
            engine.clone(),
            session.clone(),
            bus.clone(),
            RotationConfig::default(),
        );
        let flight = AutoFlight::new(
            engine.clone(),
            presenter.clone(),
            rotation.clone(),
            session.clone(),
            bus,
            FlightConfig::default(),
        );
        Rig {
            engine,
            presenter,
            session,
            rotation,
            flight,
        }
    }

    fn itinerary_plan() -> FlightPlan {
        let mut rng = StdRng::seed_from_u64(42);
        FlightPlan::build(&[], fallback_region(), &FlightConfig::default(), &mut rng)
    }

    #[tokio::test(start_paused = true)]
    async fn runs_to_the_finale_and_hands_over_to_rotation() {
        let rig = rig();
        let plan = itinerary_plan();
        let total = plan.total_duration(Duration::from_millis(6600));
        let moves = plan.move_count();

        assert!(rig.flight.start(plan, &NetworkHint::default()));
        assert!(rig.presenter.intro_visible());
        assert!(!rig.engine.is_interactive());

        sleep(total - Duration::from_millis(100)).await;
        assert_eq!(rig.flight.phase(), FlightPhase::GrandFinale);
        assert!(!rig.rotation.is_active());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(rig.flight.phase(), FlightPhase::Complete);
        assert_eq!(rig.flight.end(), Some(FlightEnd::Finished));
        assert_eq!(rig.engine.fly_targets().len(), moves);
        assert!(rig.engine.is_interactive());
        assert!(!rig.presenter.intro_visible());
        assert!(rig.rotation.is_active());
        assert_eq!(rig.engine.viewport().zoom, 1.6);
    }

    #[tokio::test(start_paused = true)]
    async fn next_step_waits_for_the_previous_duration() {
        let rig = rig();
        assert!(rig.flight.start(itinerary_plan(), &NetworkHint::default()));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(rig.flight.phase(), FlightPhase::Flying(0));
        assert_eq!(rig.engine.fly_targets().len(), 1);

        sleep(Duration::from_millis(6980)).await;
        assert_eq!(rig.engine.fly_targets().len(), 1);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(rig.flight.phase(), FlightPhase::Flying(1));
        assert_eq!(rig.engine.fly_targets().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_cancels_pending_steps_for_good() {
        let rig = rig();
        assert!(rig.flight.start(itinerary_plan(), &NetworkHint::default()));
        sleep(Duration::from_secs(10)).await;

        rig.session.interrupt(InterruptCause::Input(InputKind::Pointer));
        assert!(rig.flight.abort(FlightEnd::Interrupted));
        let issued = rig.engine.command_count();

        sleep(Duration::from_secs(120)).await;
        assert_eq!(rig.engine.command_count(), issued);
        assert_eq!(rig.flight.phase(), FlightPhase::Complete);
        assert_eq!(rig.flight.end(), Some(FlightEnd::Interrupted));
        assert!(!rig.rotation.is_active());
        assert!(rig.engine.is_interactive());
        assert!(!rig.flight.abort(FlightEnd::Interrupted));
    }

    #[tokio::test(start_paused = true)]
    async fn constrained_network_skips_the_intro() {
        let rig = rig();
        let hint = NetworkHint {
            effective_type: Some("2g".into()),
            save_data: false,
        };
        assert!(!rig.flight.start(itinerary_plan(), &hint));
        assert_eq!(rig.flight.phase(), FlightPhase::Complete);
        assert_eq!(rig.flight.end(), Some(FlightEnd::LowBandwidth));
        assert!(rig.engine.fly_targets().is_empty());

        // Rotation still follows the regular idle path.
        sleep(Duration::from_millis(7100)).await;
        assert!(rig.rotation.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn takeover_leaves_the_session_usable() {
        let rig = rig();
        assert!(rig.flight.start(itinerary_plan(), &NetworkHint::default()));
        sleep(Duration::from_secs(3)).await;
        assert!(rig.flight.abort(FlightEnd::TakenOver));
        assert!(!rig.session.is_interrupted());
        assert_eq!(rig.session.camera_writer(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn refused_once_interrupted() {
        let rig = rig();
        rig.session.interrupt(InterruptCause::Skip);
        assert!(!rig.flight.start(itinerary_plan(), &NetworkHint::default()));
        assert_eq!(rig.flight.end(), Some(FlightEnd::Refused));
        assert!(rig.engine.fly_targets().is_empty());
    }
}
