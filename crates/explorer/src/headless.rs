//! Engine, tour surface and presenter that run without a display.
//!
//! Camera commands apply instantly and are recorded, so the simulator can log
//! them and tests can assert on them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use catalog::{Property, PropertyId};
use foundation::{Easing, LngLat, clamp_pitch, wrap_bearing};
use parking_lot::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use crate::engine::{
    CameraTarget, MapEngine, Notice, PointFeature, Popup, Presenter, ScreenPoint, TourSurface,
    Viewport,
};

const SURFACE_WIDTH_PX: f64 = 1280.0;
const SURFACE_HEIGHT_PX: f64 = 800.0;

#[derive(Debug, Clone, PartialEq)]
pub enum CameraCommand {
    FlyTo {
        target: CameraTarget,
        duration: Duration,
        easing: Easing,
    },
    SetBearing(f64),
    SetPitch(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommand {
    pub at: Instant,
    pub command: CameraCommand,
}

#[derive(Debug)]
pub struct HeadlessEngine {
    ready: AtomicBool,
    interactive: AtomicBool,
    viewport: Mutex<Viewport>,
    commands: Mutex<Vec<RecordedCommand>>,
    features: Mutex<Vec<PointFeature>>,
    log_commands: bool,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessEngine {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(true),
            interactive: AtomicBool::new(true),
            viewport: Mutex::new(Viewport::around(
                LngLat::new(20.0, 20.0),
                1.5,
                SURFACE_WIDTH_PX,
                SURFACE_HEIGHT_PX,
            )),
            commands: Mutex::new(Vec::new()),
            features: Mutex::new(Vec::new()),
            log_commands: false,
        }
    }

    /// Log every camera command at info level.
    pub fn logging(mut self) -> Self {
        self.log_commands = true;
        self
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Move the camera without recording a command, as a user gesture would.
    pub fn jump_to(&self, center: LngLat, zoom: f64) {
        let mut vp = self.viewport.lock();
        let (pitch, bearing) = (vp.pitch, vp.bearing);
        *vp = Viewport::around(center, zoom, SURFACE_WIDTH_PX, SURFACE_HEIGHT_PX);
        vp.pitch = pitch;
        vp.bearing = bearing;
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().clone()
    }

    pub fn command_count(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn fly_targets(&self) -> Vec<CameraTarget> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c.command {
                CameraCommand::FlyTo { target, .. } => Some(target),
                _ => None,
            })
            .collect()
    }

    pub fn bearing_writes(&self) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| matches!(c.command, CameraCommand::SetBearing(_)))
            .count()
    }

    pub fn features(&self) -> Vec<PointFeature> {
        self.features.lock().clone()
    }

    fn record(&self, command: CameraCommand) {
        if self.log_commands {
            match &command {
                CameraCommand::FlyTo {
                    target, duration, ..
                } => info!(
                    lng = target.center.map(|c| c.lng),
                    lat = target.center.map(|c| c.lat),
                    zoom = target.zoom,
                    duration_ms = duration.as_millis() as u64,
                    "fly_to"
                ),
                CameraCommand::SetPitch(p) => info!(pitch = p, "set_pitch"),
                CameraCommand::SetBearing(b) => debug!(bearing = b, "set_bearing"),
            }
        }
        self.commands.lock().push(RecordedCommand {
            at: Instant::now(),
            command,
        });
    }
}

impl MapEngine for HeadlessEngine {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn viewport(&self) -> Viewport {
        *self.viewport.lock()
    }

    fn fly_to(&self, target: CameraTarget, duration: Duration, easing: Easing) {
        {
            let mut vp = self.viewport.lock();
            let (center, zoom, pitch, bearing) = target.resolve(&vp);
            *vp = Viewport::around(center, zoom, SURFACE_WIDTH_PX, SURFACE_HEIGHT_PX);
            vp.pitch = pitch;
            vp.bearing = bearing;
        }
        self.record(CameraCommand::FlyTo {
            target,
            duration,
            easing,
        });
    }

    fn set_bearing(&self, bearing: f64) {
        self.viewport.lock().bearing = wrap_bearing(bearing);
        self.record(CameraCommand::SetBearing(bearing));
    }

    fn set_pitch(&self, pitch: f64) {
        self.viewport.lock().pitch = clamp_pitch(pitch);
        self.record(CameraCommand::SetPitch(pitch));
    }

    fn set_interactive(&self, enabled: bool) {
        self.interactive.store(enabled, Ordering::SeqCst);
    }

    fn set_point_features(&self, features: Vec<PointFeature>) {
        *self.features.lock() = features;
    }

    fn project(&self, point: LngLat) -> Option<ScreenPoint> {
        let vp = self.viewport.lock();
        let px_per_deg = 256.0 * 2f64.powf(vp.zoom) / 360.0;
        let x = (point.lng - vp.center.lng) * px_per_deg + SURFACE_WIDTH_PX * 0.5;
        let y = (vp.center.lat - point.lat) * px_per_deg + SURFACE_HEIGHT_PX * 0.5;
        let on_screen = (0.0..=SURFACE_WIDTH_PX).contains(&x) && (0.0..=SURFACE_HEIGHT_PX).contains(&y);
        on_screen.then_some(ScreenPoint::new(x, y))
    }
}

/// Tour surface that tracks what is mounted.
#[derive(Debug, Default)]
pub struct HeadlessTourSurface {
    mounted: Mutex<Vec<(PropertyId, String)>>,
    max_mounted: AtomicUsize,
    mounts: AtomicUsize,
    warmed: Mutex<Vec<String>>,
}

impl HeadlessTourSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mounted(&self) -> Option<(PropertyId, String)> {
        self.mounted.lock().last().cloned()
    }

    /// Largest number of tours that were ever mounted at the same time.
    pub fn max_mounted(&self) -> usize {
        self.max_mounted.load(Ordering::SeqCst)
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }

    pub fn warmed(&self) -> Vec<String> {
        self.warmed.lock().clone()
    }
}

impl TourSurface for HeadlessTourSurface {
    fn mount(&self, property: PropertyId, url: &str) {
        let mut mounted = self.mounted.lock();
        mounted.push((property, url.to_string()));
        self.max_mounted.fetch_max(mounted.len(), Ordering::SeqCst);
        self.mounts.fetch_add(1, Ordering::SeqCst);
        info!(property = %property, url, "tour mounted");
    }

    fn unmount(&self) {
        if let Some((property, _)) = self.mounted.lock().pop() {
            info!(property = %property, "tour unmounted");
        }
    }

    fn warm(&self, url: &str) {
        self.warmed.lock().push(url.to_string());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresenterCall {
    Loading(bool),
    Notice(Notice),
    ClearNotice,
    Popup(Popup),
    HidePopup,
    Panel(PropertyId),
    Intro(bool),
    Navigating(bool),
}

/// Presenter that records every call.
#[derive(Debug, Default)]
pub struct HeadlessPresenter {
    calls: Mutex<Vec<PresenterCall>>,
}

impl HeadlessPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PresenterCall> {
        self.calls.lock().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                PresenterCall::Notice(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn intro_visible(&self) -> bool {
        self.calls
            .lock()
            .iter()
            .rev()
            .find_map(|c| match c {
                PresenterCall::Intro(v) => Some(*v),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn navigating(&self) -> bool {
        self.calls
            .lock()
            .iter()
            .rev()
            .find_map(|c| match c {
                PresenterCall::Navigating(v) => Some(*v),
                _ => None,
            })
            .unwrap_or(false)
    }

    fn push(&self, call: PresenterCall) {
        debug!(?call, "presenter");
        self.calls.lock().push(call);
    }
}

impl Presenter for HeadlessPresenter {
    fn set_loading(&self, loading: bool) {
        self.push(PresenterCall::Loading(loading));
    }

    fn show_notice(&self, notice: Notice) {
        self.push(PresenterCall::Notice(notice));
    }

    fn clear_notice(&self) {
        self.push(PresenterCall::ClearNotice);
    }

    fn show_popup(&self, popup: Popup) {
        self.push(PresenterCall::Popup(popup));
    }

    fn hide_popup(&self) {
        self.push(PresenterCall::HidePopup);
    }

    fn open_panel(&self, property: &Property) {
        self.push(PresenterCall::Panel(property.id));
    }

    fn set_intro_visible(&self, visible: bool) {
        self.push(PresenterCall::Intro(visible));
    }

    fn set_navigating(&self, navigating: bool) {
        self.push(PresenterCall::Navigating(navigating));
    }
}
