use serde::{Deserialize, Serialize};

/// Easing curves passed through to the map engine's flight primitive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    /// Whatever the engine uses by default for `fly_to`.
    #[default]
    EngineDefault,
    Linear,
    /// `1 - (1 - t)^3`
    EaseOutCubic,
}

impl Easing {
    /// Evaluate the curve at `t`, clamped to `[0, 1]`.
    ///
    /// `EngineDefault` is approximated as ease-in-out cubic for callers that
    /// need to interpolate locally.
    pub fn apply(self, t: f64) -> f64 {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 1.0 };
        match self {
            Easing::Linear => t,
            Easing::EaseOutCubic => ease_out_cubic(t),
            Easing::EngineDefault => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) * 0.5
                }
            }
        }
    }
}

pub fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}
