//! Shape Panel - bouncing shapes streamed at a fixed tick rate
//!
//! Core modules:
//! - `sim`: Simulation core (shape kinematics, shared store, fixed-rate clock)
//! - `broadcast`: Snapshot delivery to subscribers
//! - `service`: Facade used by the request-handling layer
//! - `settings`: Runtime configuration
//! - `server`: HTTP and WebSocket surface

pub mod broadcast;
pub mod error;
pub mod server;
pub mod service;
pub mod settings;
pub mod sim;

pub use broadcast::{Broadcaster, ChannelBroadcaster, Feed};
pub use error::SimError;
pub use service::Simulation;
pub use sim::ShapeCounts;
pub use settings::Settings;

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f64 = 1.0 / 60.0;
    /// Wall-clock period between ticks, in milliseconds
    pub const TICK_PERIOD_MS: u64 = 16;

    /// Default panel dimensions
    pub const PANEL_WIDTH: f64 = 800.0;
    pub const PANEL_HEIGHT: f64 = 600.0;
    /// Accepted panel dimension range (inclusive, both axes)
    pub const PANEL_MIN: f64 = 200.0;
    pub const PANEL_MAX: f64 = 2000.0;

    /// Velocity components are drawn from [-MAX_VELOCITY/2, MAX_VELOCITY/2] (units/s)
    pub const MAX_VELOCITY: f64 = 100.0;
    /// Angular velocity is drawn from [-RANGE/2, RANGE/2] (rad/s)
    pub const ANGULAR_VELOCITY_RANGE: f64 = 2.0;

    /// How often the moving set is re-rolled, in milliseconds
    pub const ROTATION_INTERVAL_MS: u64 = 3000;
    /// Fraction of shapes moving after each re-roll (rounded down)
    pub const MOVING_FRACTION: f64 = 0.25;

    /// Shape size range (side of the bounding square)
    pub const MIN_SIZE: f64 = 20.0;
    pub const MAX_SIZE: f64 = 50.0;
    /// Largest population accepted per shape kind
    pub const MAX_SHAPES_PER_KIND: u32 = 10_000;
    /// Distance from each panel edge to the spawn area
    pub const SPAWN_MARGIN: f64 = 25.0;

    /// Shape colors (0xRRGGBB)
    pub const SHAPE_COLORS: [u32; 7] = [
        0xFF6B6B, 0x4ECDC4, 0x45B7D1, 0x96CEB4, 0xFFEAA7, 0xDDA0DD, 0x98D8C8,
    ];

    /// Name of the channel carrying the continuous shape feed
    pub const TOPIC_SHAPES: &str = "/topic/shapes";
}
