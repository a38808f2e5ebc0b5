//! Authoritative collection of live shapes
//!
//! All state lives behind one `RwLock`: a reset or re-population happens
//! under a single write guard, so readers see either the old population or
//! the new one, never a partially cleared map.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::panel::Dimensions;
use super::sampling;
use super::shape::{Shape, ShapeId, ShapeKind, ShapeTuning};
use crate::consts::MOVING_FRACTION;
use crate::error::SimError;

/// Requested population, per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShapeCounts {
    pub circles: u32,
    pub rects: u32,
    pub triangles: u32,
}

impl ShapeCounts {
    pub fn new(circles: u32, rects: u32, triangles: u32) -> Self {
        Self {
            circles,
            rects,
            triangles,
        }
    }

    /// Build from untrusted signed input, rejecting negative counts and any
    /// count above `limit`
    pub fn from_signed(
        circles: i64,
        rects: i64,
        triangles: i64,
        limit: u32,
    ) -> Result<Self, SimError> {
        let check = |kind: ShapeKind, value: i64| {
            if value < 0 {
                return Err(SimError::NegativeCount { kind, value });
            }
            match u32::try_from(value) {
                Ok(count) if count <= limit => Ok(count),
                _ => Err(SimError::CountTooLarge { kind, value, limit }),
            }
        };
        Ok(Self {
            circles: check(ShapeKind::Circle, circles)?,
            rects: check(ShapeKind::Rectangle, rects)?,
            triangles: check(ShapeKind::Triangle, triangles)?,
        })
    }

    pub fn of(&self, kind: ShapeKind) -> u32 {
        match kind {
            ShapeKind::Circle => self.circles,
            ShapeKind::Rectangle => self.rects,
            ShapeKind::Triangle => self.triangles,
        }
    }

    pub fn total(&self) -> u64 {
        self.circles as u64 + self.rects as u64 + self.triangles as u64
    }

    /// Largest single-kind count
    pub fn max_per_kind(&self) -> u32 {
        self.circles.max(self.rects).max(self.triangles)
    }
}

/// Store contents. Only reachable through `ShapeStore::lock`.
#[derive(Debug)]
pub struct StoreState {
    shapes: BTreeMap<ShapeId, Shape>,
    /// Bumped on every clear
    generation: u32,
    /// Next index to mint within the current generation
    next_index: u32,
    rng: Pcg32,
    last_rotation: Instant,
    tuning: ShapeTuning,
    moving_fraction: f64,
}

impl StoreState {
    /// Drop every shape and restart the index counter and rotation timer
    fn clear(&mut self, now: Instant) {
        self.shapes.clear();
        self.generation = self.generation.wrapping_add(1);
        self.next_index = 0;
        self.last_rotation = now;
    }

    fn next_shape_id(&mut self) -> ShapeId {
        let id = ShapeId::new(self.generation, self.next_index);
        self.next_index += 1;
        id
    }

    fn spawn(&mut self, kind: ShapeKind, panel: Dimensions) -> ShapeId {
        let id = self.next_shape_id();
        let shape = Shape::spawn(id, kind, panel, &self.tuning, &mut self.rng);
        self.shapes.insert(id, shape);
        id
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn moving_count(&self) -> usize {
        self.shapes.values().filter(|s| s.moving).count()
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    /// Integrate every shape by one fixed step inside `panel`
    pub fn advance(&mut self, dt: f64, panel: Dimensions) {
        for shape in self.shapes.values_mut() {
            shape.update(dt, panel.width, panel.height);
        }
    }

    /// Whether more than `interval` has elapsed since the moving set was last rolled
    pub fn rotation_due(&self, now: Instant, interval: Duration) -> bool {
        now.saturating_duration_since(self.last_rotation) > interval
    }

    /// Stop every shape, then start a fresh random subset moving.
    ///
    /// Returns how many shapes were started.
    pub fn rotate_moving(&mut self, now: Instant) -> usize {
        for shape in self.shapes.values_mut() {
            shape.stop_moving();
        }

        let ids: Vec<ShapeId> = self.shapes.keys().copied().collect();
        let picked = sampling::choose_fraction(&mut self.rng, ids.len(), self.moving_fraction);
        let (max_velocity, angular_range) =
            (self.tuning.max_velocity, self.tuning.angular_velocity_range);
        for &i in &picked {
            if let Some(shape) = self.shapes.get_mut(&ids[i]) {
                shape.start_moving(max_velocity, angular_range, &mut self.rng);
            }
        }

        self.last_rotation = now;
        picked.len()
    }

    /// Value copies of every shape, ordered by id
    pub fn snapshot(&self) -> Vec<Shape> {
        self.shapes.values().cloned().collect()
    }
}

/// Concurrent shape store shared by the clock and request handlers
#[derive(Debug)]
pub struct ShapeStore {
    state: RwLock<StoreState>,
}

impl ShapeStore {
    /// Create an empty store. A `seed` makes layouts and rotations reproducible.
    pub fn new(tuning: ShapeTuning, moving_fraction: f64, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(rand::random);
        log::debug!("Shape store RNG seed: {seed}");
        Self {
            state: RwLock::new(StoreState {
                shapes: BTreeMap::new(),
                generation: 0,
                next_index: 0,
                rng: Pcg32::seed_from_u64(seed),
                last_rotation: Instant::now(),
                tuning,
                moving_fraction,
            }),
        }
    }

    /// Exclusive access for a multi-step update (used by the clock)
    pub fn lock(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole population with `counts` shapes placed inside `panel`,
    /// then start the first moving subset. Returns the new snapshot.
    pub fn initialize(&self, counts: ShapeCounts, panel: Dimensions) -> Vec<Shape> {
        let mut state = self.lock();
        state.clear(Instant::now());

        for kind in ShapeKind::ALL {
            for _ in 0..counts.of(kind) {
                state.spawn(kind, panel);
            }
        }
        let started = state.rotate_moving(Instant::now());

        log::info!(
            "Initialized {} shapes ({} circles, {} rectangles, {} triangles), {} moving",
            state.len(),
            counts.circles,
            counts.rects,
            counts.triangles,
            started
        );
        state.snapshot()
    }

    /// Remove every shape without repopulating
    pub fn reset(&self) {
        let mut state = self.lock();
        let dropped = state.len();
        state.clear(Instant::now());
        log::info!("Shape store reset ({dropped} shapes dropped)");
    }

    pub fn snapshot(&self) -> Vec<Shape> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ShapeStore {
    fn default() -> Self {
        Self::new(ShapeTuning::default(), MOVING_FRACTION, None)
    }
}
