//! Runtime settings
//!
//! Loaded from an optional JSON file; any field left out keeps its default.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::SimError;
use crate::sim::{ClockTiming, Dimensions, ShapeCounts, ShapeTuning};

/// Server and simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Server ===
    pub host: String,
    pub port: u16,
    /// Buffered feeds per subscriber before it starts skipping
    pub broadcast_capacity: usize,

    // === Clock ===
    pub tick_period_ms: u64,
    pub rotation_interval_ms: u64,

    // === Motion ===
    /// Fraction of shapes moving after each re-roll (0.0 - 1.0)
    pub moving_fraction: f64,
    pub max_velocity: f64,
    pub angular_velocity_range: f64,

    // === Shapes ===
    pub min_size: f64,
    pub max_size: f64,
    pub spawn_margin: f64,
    /// Requests asking for more shapes of one kind are rejected
    pub max_shapes_per_kind: u32,

    // === Panel ===
    pub panel_width: f64,
    pub panel_height: f64,

    /// RNG seed (random when absent)
    pub seed: Option<u64>,
    /// Population created at startup
    pub initial_shapes: ShapeCounts,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            broadcast_capacity: 64,

            tick_period_ms: TICK_PERIOD_MS,
            rotation_interval_ms: ROTATION_INTERVAL_MS,

            moving_fraction: MOVING_FRACTION,
            max_velocity: MAX_VELOCITY,
            angular_velocity_range: ANGULAR_VELOCITY_RANGE,

            min_size: MIN_SIZE,
            max_size: MAX_SIZE,
            spawn_margin: SPAWN_MARGIN,
            max_shapes_per_kind: MAX_SHAPES_PER_KIND,

            panel_width: PANEL_WIDTH,
            panel_height: PANEL_HEIGHT,

            seed: None,
            initial_shapes: ShapeCounts::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, SimError> {
        let json = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load from `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SimError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                log::info!("Using default settings");
                Ok(Self::default())
            }
        }
    }

    /// Check the settings describe a simulation that can keep its invariants
    pub fn validate(&self) -> Result<(), SimError> {
        let fail = |msg: String| Err(SimError::InvalidSettings(msg));

        if self.tick_period_ms == 0 {
            return fail("tick_period_ms must be positive".into());
        }
        if self.rotation_interval_ms == 0 {
            return fail("rotation_interval_ms must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.moving_fraction) {
            return fail(format!("moving_fraction {} is outside [0, 1]", self.moving_fraction));
        }
        if !(self.max_velocity >= 0.0 && self.angular_velocity_range >= 0.0) {
            return fail("velocities must be non-negative".into());
        }
        if !(self.min_size > 0.0 && self.min_size <= self.max_size) {
            return fail(format!(
                "size range [{}, {}] is empty or non-positive",
                self.min_size, self.max_size
            ));
        }
        // The spawn area must keep every bounding square inside the smallest panel
        if !(self.spawn_margin >= self.max_size / 2.0 && 2.0 * self.spawn_margin < PANEL_MIN) {
            return fail(format!(
                "spawn_margin {} must be in [max_size / 2, {})",
                self.spawn_margin,
                PANEL_MIN / 2.0
            ));
        }
        if self.broadcast_capacity == 0 {
            return fail("broadcast_capacity must be positive".into());
        }
        if self.initial_shapes.max_per_kind() > self.max_shapes_per_kind {
            return fail(format!(
                "initial_shapes asks for more than max_shapes_per_kind ({})",
                self.max_shapes_per_kind
            ));
        }
        Dimensions::validated(self.panel_width, self.panel_height)?;
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn default_panel(&self) -> Dimensions {
        Dimensions::new(self.panel_width, self.panel_height)
    }

    pub fn tuning(&self) -> ShapeTuning {
        ShapeTuning {
            min_size: self.min_size,
            max_size: self.max_size,
            spawn_margin: self.spawn_margin,
            max_velocity: self.max_velocity,
            angular_velocity_range: self.angular_velocity_range,
        }
    }

    pub fn timing(&self) -> ClockTiming {
        ClockTiming {
            period: Duration::from_millis(self.tick_period_ms),
            dt: SIM_DT,
            rotation_interval: Duration::from_millis(self.rotation_interval_ms),
        }
    }
}
