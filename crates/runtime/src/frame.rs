use tokio::time::{Duration, Instant};

/// Per-frame delta-time source for frame-scheduled animation.
///
/// The first tick after a (re)start yields zero so an animation never jumps
/// by the time spent paused. Later deltas are clamped to `max_dt` to ride out
/// frame-rate hiccups.
#[derive(Debug, Copy, Clone)]
pub struct FrameClock {
    last: Option<Instant>,
    max_dt: Duration,
}

impl FrameClock {
    pub fn new(max_dt: Duration) -> Self {
        Self { last: None, max_dt }
    }

    pub fn tick(&mut self, now: Instant) -> Duration {
        let dt = match self.last {
            Some(last) => now.saturating_duration_since(last).min(self.max_dt),
            None => Duration::ZERO,
        };
        self.last = Some(now);
        dt
    }

    pub fn last_frame(&self) -> Option<Instant> {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::FrameClock;
    use tokio::time::{Duration, Instant};

    #[test]
    fn first_tick_is_zero() {
        let mut clock = FrameClock::new(Duration::from_millis(50));
        assert_eq!(clock.tick(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn deltas_are_clamped() {
        let mut clock = FrameClock::new(Duration::from_millis(50));
        let t0 = Instant::now();
        clock.tick(t0);
        assert_eq!(clock.tick(t0 + Duration::from_millis(16)), Duration::from_millis(16));
        assert_eq!(
            clock.tick(t0 + Duration::from_millis(816)),
            Duration::from_millis(50)
        );
    }

    #[test]
    fn reset_forgets_last_frame() {
        let mut clock = FrameClock::new(Duration::from_millis(50));
        let t0 = Instant::now();
        clock.tick(t0);
        clock.reset();
        assert!(clock.last_frame().is_none());
        assert_eq!(clock.tick(t0 + Duration::from_secs(5)), Duration::ZERO);
    }
}
