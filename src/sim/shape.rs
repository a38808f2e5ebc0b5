//! Shape entities and their kinematics
//!
//! A shape is a square-bounded body that drifts in a straight line, spins at
//! a constant rate and bounces off the panel walls. Shapes never interact
//! with each other.

use std::fmt;
use std::str::FromStr;

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::panel::Dimensions;
use crate::consts::*;

/// Shape kinds (descriptive only, physics is identical)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Circle,
    Rectangle,
    Triangle,
}

impl ShapeKind {
    /// Creation order used by the store
    pub const ALL: [ShapeKind; 3] = [ShapeKind::Circle, ShapeKind::Rectangle, ShapeKind::Triangle];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Circle => "circle",
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Triangle => "triangle",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape identifier: store generation plus the index minted within it.
///
/// The index restarts at zero whenever the store is cleared, the generation
/// does not, so an identifier is never handed out twice in one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId {
    generation: u32,
    index: u32,
}

impl ShapeId {
    pub fn new(generation: u32, index: u32) -> Self {
        Self { generation, index }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape_{}_{}", self.generation, self.index)
    }
}

#[derive(Debug, Error)]
#[error("malformed shape id: {0:?}")]
pub struct ParseShapeIdError(String);

impl FromStr for ShapeId {
    type Err = ParseShapeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseShapeIdError(s.to_string());
        let rest = s.strip_prefix("shape_").ok_or_else(malformed)?;
        let (generation, index) = rest.split_once('_').ok_or_else(malformed)?;
        Ok(Self {
            generation: generation.parse().map_err(|_| malformed())?,
            index: index.parse().map_err(|_| malformed())?,
        })
    }
}

impl Serialize for ShapeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShapeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Tunables that shape creation and movement draw from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeTuning {
    pub min_size: f64,
    pub max_size: f64,
    pub spawn_margin: f64,
    pub max_velocity: f64,
    pub angular_velocity_range: f64,
}

impl Default for ShapeTuning {
    fn default() -> Self {
        Self {
            min_size: MIN_SIZE,
            max_size: MAX_SIZE,
            spawn_margin: SPAWN_MARGIN,
            max_velocity: MAX_VELOCITY,
            angular_velocity_range: ANGULAR_VELOCITY_RANGE,
        }
    }
}

/// A simulated shape.
///
/// While `moving` is false, `vel` and `angular_vel` are zero and `update`
/// leaves the shape untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    /// Center of the bounding square
    pub pos: DVec2,
    pub vel: DVec2,
    /// Rotation (radians, unbounded)
    pub angle: f64,
    pub angular_vel: f64,
    pub moving: bool,
    /// 0xRRGGBB, fixed at creation
    pub color: u32,
    /// Side of the bounding square, fixed at creation
    pub size: f64,
}

impl Shape {
    /// Create a stationary shape
    pub fn new(id: ShapeId, kind: ShapeKind, pos: DVec2, size: f64, color: u32) -> Self {
        Self {
            id,
            kind,
            pos,
            vel: DVec2::ZERO,
            angle: 0.0,
            angular_vel: 0.0,
            moving: false,
            color,
            size,
        }
    }

    /// Create a stationary shape with random size, color and position inside
    /// the spawn area of `panel`
    pub fn spawn<R: Rng + ?Sized>(
        id: ShapeId,
        kind: ShapeKind,
        panel: Dimensions,
        tuning: &ShapeTuning,
        rng: &mut R,
    ) -> Self {
        let size = tuning.min_size + rng.random::<f64>() * (tuning.max_size - tuning.min_size);
        let color = SHAPE_COLORS[rng.random_range(0..SHAPE_COLORS.len())];

        let margin = tuning.spawn_margin;
        let pos = DVec2::new(
            margin + rng.random::<f64>() * (panel.width - 2.0 * margin),
            margin + rng.random::<f64>() * (panel.height - 2.0 * margin),
        );

        Self::new(id, kind, pos, size, color)
    }

    #[inline]
    pub fn half_size(&self) -> f64 {
        self.size / 2.0
    }

    /// Whether the bounding square lies inside `[0, width] x [0, height]`
    pub fn fits_within(&self, width: f64, height: f64) -> bool {
        let half = self.half_size();
        self.pos.x - half >= 0.0
            && self.pos.x + half <= width
            && self.pos.y - half >= 0.0
            && self.pos.y + half <= height
    }

    /// Advance by one timestep, then bounce off any wall the shape reached
    pub fn update(&mut self, dt: f64, panel_width: f64, panel_height: f64) {
        if !self.moving {
            return;
        }

        self.pos += self.vel * dt;
        self.angle += self.angular_vel * dt;

        let half = self.half_size();
        let (x, vx) = reflect_axis(self.pos.x, self.vel.x, half, panel_width);
        let (y, vy) = reflect_axis(self.pos.y, self.vel.y, half, panel_height);
        self.pos = DVec2::new(x, y);
        self.vel = DVec2::new(vx, vy);
    }

    /// Start moving with a fresh random velocity and spin
    pub fn start_moving<R: Rng + ?Sized>(
        &mut self,
        max_velocity: f64,
        angular_velocity_range: f64,
        rng: &mut R,
    ) {
        self.moving = true;
        self.vel = DVec2::new(
            (rng.random::<f64>() - 0.5) * max_velocity,
            (rng.random::<f64>() - 0.5) * max_velocity,
        );
        self.angular_vel = (rng.random::<f64>() - 0.5) * angular_velocity_range;
    }

    /// Freeze in place (position, angle, color and size are kept)
    pub fn stop_moving(&mut self) {
        self.vel = DVec2::ZERO;
        self.angular_vel = 0.0;
        self.moving = false;
    }
}

/// Clamp one axis to `[half, extent - half]` and point its velocity back
/// inside when an edge was reached
#[inline]
fn reflect_axis(pos: f64, vel: f64, half: f64, extent: f64) -> (f64, f64) {
    if pos - half <= 0.0 {
        (half, vel.abs())
    } else if pos + half >= extent {
        (extent - half, -vel.abs())
    } else {
        (pos, vel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn moving_shape(pos: DVec2, vel: DVec2, size: f64) -> Shape {
        let id = ShapeId::new(0, 0);
        let mut shape = Shape::new(id, ShapeKind::Circle, pos, size, SHAPE_COLORS[0]);
        shape.vel = vel;
        shape.angular_vel = 1.0;
        shape.moving = true;
        shape
    }

    #[test]
    fn test_stationary_shape_ignores_update() {
        let mut shape = Shape::new(
            ShapeId::new(0, 3),
            ShapeKind::Triangle,
            DVec2::new(100.0, 100.0),
            30.0,
            SHAPE_COLORS[1],
        );
        let before = shape.clone();
        shape.update(SIM_DT, PANEL_WIDTH, PANEL_HEIGHT);
        assert_eq!(shape, before);
    }

    #[test]
    fn test_integrates_position_and_angle() {
        let mut shape = moving_shape(DVec2::new(400.0, 300.0), DVec2::new(60.0, -30.0), 40.0);
        shape.update(0.5, PANEL_WIDTH, PANEL_HEIGHT);
        assert_eq!(shape.pos, DVec2::new(430.0, 285.0));
        assert_eq!(shape.angle, 0.5);
        assert_eq!(shape.vel, DVec2::new(60.0, -30.0));
    }

    #[test]
    fn test_right_wall_reflection() {
        // Right edge at 795, next step would put it at 805
        let mut shape = moving_shape(DVec2::new(775.0, 300.0), DVec2::new(600.0, 0.0), 40.0);
        shape.update(SIM_DT, PANEL_WIDTH, PANEL_HEIGHT);

        assert_eq!(shape.pos.x + shape.half_size(), PANEL_WIDTH);
        assert!(shape.vel.x < 0.0);
        assert_eq!(shape.vel.x, -600.0);
    }

    #[test]
    fn test_left_wall_reflection() {
        let mut shape = moving_shape(DVec2::new(21.0, 300.0), DVec2::new(-120.0, 10.0), 40.0);
        shape.update(SIM_DT, PANEL_WIDTH, PANEL_HEIGHT);

        assert_eq!(shape.pos.x, 20.0);
        assert_eq!(shape.vel.x, 120.0);
        assert_eq!(shape.vel.y, 10.0);
    }

    #[test]
    fn test_corner_reflects_both_axes() {
        let mut shape = moving_shape(DVec2::new(779.0, 579.0), DVec2::new(300.0, 300.0), 40.0);
        shape.update(SIM_DT, PANEL_WIDTH, PANEL_HEIGHT);

        assert_eq!(shape.pos, DVec2::new(780.0, 580.0));
        assert!(shape.vel.x < 0.0);
        assert!(shape.vel.y < 0.0);
    }

    #[test]
    fn test_start_and_stop_moving() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut shape = Shape::new(
            ShapeId::new(1, 0),
            ShapeKind::Rectangle,
            DVec2::new(200.0, 200.0),
            25.0,
            SHAPE_COLORS[2],
        );

        shape.start_moving(MAX_VELOCITY, ANGULAR_VELOCITY_RANGE, &mut rng);
        assert!(shape.moving);
        assert!(shape.vel.x.abs() <= MAX_VELOCITY / 2.0);
        assert!(shape.vel.y.abs() <= MAX_VELOCITY / 2.0);
        assert!(shape.angular_vel.abs() <= ANGULAR_VELOCITY_RANGE / 2.0);
        assert!(shape.vel != DVec2::ZERO);

        shape.update(SIM_DT, PANEL_WIDTH, PANEL_HEIGHT);
        let (pos, angle) = (shape.pos, shape.angle);

        shape.stop_moving();
        assert!(!shape.moving);
        assert_eq!(shape.vel, DVec2::ZERO);
        assert_eq!(shape.angular_vel, 0.0);
        assert_eq!(shape.pos, pos);
        assert_eq!(shape.angle, angle);
        assert_eq!(shape.size, 25.0);
        assert_eq!(shape.color, SHAPE_COLORS[2]);
    }

    #[test]
    fn test_spawn_within_panel_and_size_range() {
        let mut rng = Pcg32::seed_from_u64(42);
        let tuning = ShapeTuning::default();
        let panel = Dimensions::new(PANEL_MIN, PANEL_MIN);

        for i in 0..500 {
            let id = ShapeId::new(0, i);
            let shape = Shape::spawn(id, ShapeKind::Circle, panel, &tuning, &mut rng);
            assert!(!shape.moving);
            assert!(shape.size >= MIN_SIZE && shape.size <= MAX_SIZE);
            assert!(SHAPE_COLORS.contains(&shape.color));
            assert!(shape.fits_within(panel.width, panel.height));
        }
    }

    #[test]
    fn test_shape_id_text_form() {
        let id = ShapeId::new(4, 17);
        assert_eq!(id.to_string(), "shape_4_17");
        assert_eq!("shape_4_17".parse::<ShapeId>().unwrap(), id);
        assert!("shape_4".parse::<ShapeId>().is_err());
        assert!("circle_1_2".parse::<ShapeId>().is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"shape_4_17\"");
    }

    proptest! {
        #[test]
        fn prop_update_keeps_bounding_box_inside(
            width in PANEL_MIN..=PANEL_MAX,
            height in PANEL_MIN..=PANEL_MAX,
            size in MIN_SIZE..=MAX_SIZE,
            fx in 0.0f64..=1.0,
            fy in 0.0f64..=1.0,
            vx in -5000.0f64..5000.0,
            vy in -5000.0f64..5000.0,
            steps in 1usize..200,
        ) {
            let half = size / 2.0;
            let pos = DVec2::new(half + fx * (width - size), half + fy * (height - size));
            let mut shape = moving_shape(pos, DVec2::new(vx, vy), size);

            for _ in 0..steps {
                shape.update(SIM_DT, width, height);
                prop_assert!(shape.pos.x - half >= -1e-9);
                prop_assert!(shape.pos.x + half <= width + 1e-9);
                prop_assert!(shape.pos.y - half >= -1e-9);
                prop_assert!(shape.pos.y + half <= height + 1e-9);
            }
        }

        #[test]
        fn prop_stopped_shape_is_frozen(
            x in 0.0f64..2000.0,
            y in 0.0f64..2000.0,
            vx in -100.0f64..100.0,
            vy in -100.0f64..100.0,
            steps in 1usize..50,
        ) {
            let mut shape = moving_shape(DVec2::new(x, y), DVec2::new(vx, vy), 30.0);
            shape.stop_moving();
            let pos = shape.pos;

            for _ in 0..steps {
                shape.update(SIM_DT, PANEL_WIDTH, PANEL_HEIGHT);
            }
            prop_assert_eq!(shape.pos, pos);
            prop_assert_eq!(shape.vel, DVec2::ZERO);
            prop_assert_eq!(shape.angular_vel, 0.0);
        }
    }
}
