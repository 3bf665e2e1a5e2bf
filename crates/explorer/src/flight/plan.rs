use catalog::{Property, Region};
use foundation::{GeoBounds, LngLat, wrap_bearing};
use rand::Rng;
use tokio::time::Duration;

use crate::config::FlightConfig;
use crate::engine::CameraTarget;

/// One scripted camera move.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightStep {
    pub label: String,
    pub target: CameraTarget,
    /// Length of the move; the next step is issued once it has elapsed.
    pub duration: Duration,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlightSource {
    /// Visits located listings in the region.
    Properties,
    /// The region's canned itinerary.
    Itinerary,
}

/// Immutable intro script: ordered steps plus the grand finale.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightPlan {
    pub region: &'static str,
    pub source: FlightSource,
    pub steps: Vec<FlightStep>,
    pub finale: FlightStep,
}

impl FlightPlan {
    /// Build the intro for `region`.
    ///
    /// Located properties inside the region are preferred, spread across
    /// latitude bands. Without any, the region's itinerary is flown instead.
    pub fn build<R: Rng + ?Sized>(
        properties: &[Property],
        region: &Region,
        config: &FlightConfig,
        rng: &mut R,
    ) -> Self {
        let max_stops = config.max_stops.max(1);
        let candidates: Vec<(&Property, LngLat)> = properties
            .iter()
            .filter_map(|p| p.position().map(|at| (p, at)))
            .filter(|(_, at)| region.contains(*at))
            .collect();

        let (source, poses): (FlightSource, Vec<(String, CameraTarget)>) = if candidates.is_empty()
        {
            let poses = region
                .itinerary
                .iter()
                .take(max_stops)
                .map(|w| {
                    (
                        w.name.to_string(),
                        CameraTarget::pose(w.center, w.zoom, w.pitch, w.bearing),
                    )
                })
                .collect();
            (FlightSource::Itinerary, poses)
        } else {
            let picked = spread_by_latitude(&candidates, region.bounds, max_stops, rng);
            let poses = picked
                .into_iter()
                .map(|(p, at)| {
                    let bearing = wrap_bearing(rng.random_range(-60.0..60.0));
                    (
                        p.name.clone(),
                        CameraTarget::pose(at, config.property_zoom, config.property_pitch, bearing),
                    )
                })
                .collect();
            (FlightSource::Properties, poses)
        };

        let steps = poses
            .into_iter()
            .enumerate()
            .map(|(i, (label, target))| FlightStep {
                label,
                target,
                duration: step_duration(i, config, rng),
            })
            .collect();

        let finale = FlightStep {
            label: "grand finale".to_string(),
            target: CameraTarget::pose(region.bounds.center(), config.finale_zoom, 0.0, 0.0),
            duration: Duration::from_millis(config.step_min_ms),
        };

        Self {
            region: region.id,
            source,
            steps,
            finale,
        }
    }

    /// Camera moves including the finale.
    pub fn move_count(&self) -> usize {
        self.steps.len() + 1
    }

    /// Time from the first step until the hand-off to rotation.
    pub fn total_duration(&self, finale_settle: Duration) -> Duration {
        self.steps.iter().map(|s| s.duration).sum::<Duration>() + finale_settle
    }
}

fn step_duration<R: Rng + ?Sized>(index: usize, config: &FlightConfig, rng: &mut R) -> Duration {
    if index == 0 {
        return config.first_step();
    }
    let ms = if config.step_max_ms > config.step_min_ms {
        rng.random_range(config.step_min_ms..=config.step_max_ms)
    } else {
        config.step_min_ms
    };
    Duration::from_millis(ms)
}

/// Pick up to `max` candidates, one random pick per latitude band of
/// `bounds`, then top up randomly from what is left. Picks come back ordered
/// south to north, top-ups last.
pub fn spread_by_latitude<'a, R: Rng + ?Sized>(
    candidates: &[(&'a Property, LngLat)],
    bounds: GeoBounds,
    max: usize,
    rng: &mut R,
) -> Vec<(&'a Property, LngLat)> {
    if candidates.is_empty() || max == 0 {
        return Vec::new();
    }
    let bands = max;
    let span = bounds.lat_span().max(f64::EPSILON);
    let band_of = |lat: f64| {
        let t = ((lat - bounds.south) / span).clamp(0.0, 1.0);
        ((t * bands as f64) as usize).min(bands - 1)
    };

    let mut by_band: Vec<Vec<usize>> = vec![Vec::new(); bands];
    for (i, (_, at)) in candidates.iter().enumerate() {
        by_band[band_of(at.lat)].push(i);
    }

    let mut chosen: Vec<usize> = Vec::with_capacity(max);
    for members in by_band.iter().filter(|m| !m.is_empty()) {
        chosen.push(members[rng.random_range(0..members.len())]);
    }

    let mut rest: Vec<usize> = (0..candidates.len()).filter(|i| !chosen.contains(i)).collect();
    while chosen.len() < max && !rest.is_empty() {
        let pick = rng.random_range(0..rest.len());
        chosen.push(rest.swap_remove(pick));
    }

    chosen.truncate(max);
    chosen.into_iter().map(|i| candidates[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::{FlightPlan, FlightSource, spread_by_latitude};
    use crate::config::FlightConfig;
    use catalog::{Property, fallback_region};
    use foundation::{GeoBounds, LngLat};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tokio::time::Duration;

    fn at(id: u64, lng: f64, lat: f64) -> Property {
        Property::new(id, format!("p{id}"), LngLat::new(lng, lat))
    }

    #[test]
    fn empty_property_set_flies_the_itinerary() {
        let region = fallback_region();
        let mut rng = StdRng::seed_from_u64(7);
        let plan = FlightPlan::build(&[], region, &FlightConfig::default(), &mut rng);

        assert_eq!(plan.source, FlightSource::Itinerary);
        assert_eq!(plan.region, "gulf");
        assert_eq!(plan.steps.len(), region.itinerary.len().min(5));
        assert_eq!(plan.steps[0].label, region.itinerary[0].name);
        assert_eq!(plan.steps[0].duration, Duration::from_millis(7000));
        for step in &plan.steps[1..] {
            assert!((8000..=9000).contains(&(step.duration.as_millis() as u64)));
        }
        assert_eq!(plan.finale.target.zoom, Some(1.6));
    }

    #[test]
    fn properties_outside_the_region_are_ignored() {
        let props = vec![at(1, 2.35, 48.85), at(2, -74.0, 40.7)];
        let mut rng = StdRng::seed_from_u64(1);
        let plan = FlightPlan::build(&props, fallback_region(), &FlightConfig::default(), &mut rng);
        assert_eq!(plan.source, FlightSource::Itinerary);
    }

    #[test]
    fn visits_at_most_five_located_properties() {
        let mut props: Vec<Property> = (0..12)
            .map(|i| at(i, 55.0 + i as f64 * 0.05, 23.0 + i as f64 * 0.3))
            .collect();
        props.push(Property::new(99, "unlocated", LngLat::new(0.0, 0.0)));
        let mut rng = StdRng::seed_from_u64(3);
        let plan = FlightPlan::build(&props, fallback_region(), &FlightConfig::default(), &mut rng);

        assert_eq!(plan.source, FlightSource::Properties);
        assert_eq!(plan.steps.len(), 5);
        assert!(plan.steps.iter().all(|s| s.label != "unlocated"));
        assert!(plan.steps.iter().all(|s| s.target.zoom == Some(13.0)));
        assert_eq!(plan.move_count(), 6);
    }

    #[test]
    fn picks_spread_across_latitude_bands() {
        // Three clustered in the south, one each further north.
        let props = vec![
            at(1, 55.0, 0.5),
            at(2, 55.1, 0.6),
            at(3, 55.2, 0.7),
            at(4, 55.0, 4.5),
            at(5, 55.0, 8.5),
        ];
        let candidates: Vec<_> = props.iter().map(|p| (p, p.position().unwrap())).collect();
        let bounds = GeoBounds::new(50.0, 0.0, 60.0, 10.0);
        let mut rng = StdRng::seed_from_u64(11);
        let picked = spread_by_latitude(&candidates, bounds, 3, &mut rng);

        let ids: Vec<u64> = picked.iter().map(|(p, _)| p.id.0).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids[0] <= 3);
        assert_eq!(&ids[1..], &[4, 5]);
    }

    #[test]
    fn sparse_bands_are_topped_up() {
        let props = vec![at(1, 55.0, 0.5), at(2, 55.1, 0.6), at(3, 55.2, 0.7)];
        let candidates: Vec<_> = props.iter().map(|p| (p, p.position().unwrap())).collect();
        let bounds = GeoBounds::new(50.0, 0.0, 60.0, 10.0);
        let mut rng = StdRng::seed_from_u64(5);
        let picked = spread_by_latitude(&candidates, bounds, 5, &mut rng);
        let mut ids: Vec<u64> = picked.iter().map(|(p, _)| p.id.0).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
