use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// Tunables of the orchestrator, loadable from a JSON file. Missing fields
/// take their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub viewport: ViewportConfig,
    pub flight: FlightConfig,
    pub rotation: RotationConfig,
    pub tour: TourConfig,
    pub pagination: PaginationConfig,
    pub markers: MarkerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Quiet period after the last move-end before a settle is reported.
    pub settle_ms: u64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self { settle_ms: 500 }
    }
}

impl ViewportConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    pub enabled: bool,
    pub first_step_ms: u64,
    pub step_min_ms: u64,
    pub step_max_ms: u64,
    pub max_stops: usize,
    pub property_zoom: f64,
    pub property_pitch: f64,
    pub finale_zoom: f64,
    /// Wait after the finale move before handing over to rotation.
    pub finale_settle_ms: u64,
    pub geolocation_timeout_ms: u64,
    /// Fixed RNG seed for reproducible plans.
    pub seed: Option<u64>,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            first_step_ms: 7000,
            step_min_ms: 8000,
            step_max_ms: 9000,
            max_stops: 5,
            property_zoom: 13.0,
            property_pitch: 55.0,
            finale_zoom: 1.6,
            finale_settle_ms: 6600,
            geolocation_timeout_ms: 5000,
            seed: None,
        }
    }
}

impl FlightConfig {
    pub fn first_step(&self) -> Duration {
        Duration::from_millis(self.first_step_ms)
    }

    pub fn finale_settle(&self) -> Duration {
        Duration::from_millis(self.finale_settle_ms)
    }

    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_millis(self.geolocation_timeout_ms)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationProfile {
    /// Rotate slowly, only when idle and zoomed out.
    #[default]
    Idle,
    /// Rotate continuously at a faster rate (backdrop mode).
    Showcase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub profile: RotationProfile,
    /// Rotation only starts at or below this zoom.
    pub max_zoom: f64,
    pub idle_speed_deg_per_s: f64,
    pub showcase_speed_deg_per_s: f64,
    pub quiescence_ms: u64,
    pub frame_ms: u64,
    pub max_frame_dt_ms: u64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            profile: RotationProfile::Idle,
            max_zoom: 3.0,
            idle_speed_deg_per_s: 3.0,
            showcase_speed_deg_per_s: 8.0,
            quiescence_ms: 7000,
            frame_ms: 16,
            max_frame_dt_ms: 50,
        }
    }
}

impl RotationConfig {
    pub fn speed_deg_per_s(&self) -> f64 {
        match self.profile {
            RotationProfile::Idle => self.idle_speed_deg_per_s,
            RotationProfile::Showcase => self.showcase_speed_deg_per_s,
        }
    }

    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    pub fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_ms.max(1))
    }

    pub fn max_frame_dt(&self) -> Duration {
        Duration::from_millis(self.max_frame_dt_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TourConfig {
    pub open_zoom: f64,
    pub close_zoom: f64,
    pub radius_m: f64,
    pub prefetch_zoom: f64,
    pub prefetch_limit: usize,
    /// Camera move before an explicitly requested tour opens.
    pub explicit_duration_ms: u64,
    pub explicit_zoom: f64,
    pub explicit_pitch: f64,
}

impl Default for TourConfig {
    fn default() -> Self {
        Self {
            open_zoom: 14.5,
            close_zoom: 13.5,
            radius_m: 600.0,
            prefetch_zoom: 11.0,
            prefetch_limit: 5,
            explicit_duration_ms: 3000,
            explicit_zoom: 16.0,
            explicit_pitch: 50.0,
        }
    }
}

impl TourConfig {
    pub fn explicit_duration(&self) -> Duration {
        Duration::from_millis(self.explicit_duration_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_size: u32,
    pub prefetch_next: bool,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            prefetch_next: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Pointer hit radius around a marker, in CSS pixels.
    pub hit_radius_px: f64,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self { hit_radius_px: 14.0 }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read config: {err}"),
            ConfigError::Parse(err) => write!(f, "cannot parse config: {err}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl ExplorerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tour.close_zoom > self.tour.open_zoom {
            return Err(ConfigError::Invalid(format!(
                "tour.close_zoom ({}) is above tour.open_zoom ({})",
                self.tour.close_zoom, self.tour.open_zoom
            )));
        }
        if self.flight.step_min_ms > self.flight.step_max_ms {
            return Err(ConfigError::Invalid(
                "flight.step_min_ms is above flight.step_max_ms".into(),
            ));
        }
        if self.tour.radius_m <= 0.0 || !self.tour.radius_m.is_finite() {
            return Err(ConfigError::Invalid("tour.radius_m must be positive".into()));
        }
        if self.pagination.page_size == 0 {
            return Err(ConfigError::Invalid("pagination.page_size must be non-zero".into()));
        }
        Ok(())
    }
}
