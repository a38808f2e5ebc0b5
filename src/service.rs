//! Simulation facade for the request-handling layer
//!
//! Owns handles to the shared store, panel bounds and broadcaster, and
//! records the last requested population for reporting.

use std::sync::{Arc, Mutex, PoisonError};

use crate::broadcast::{Broadcaster, Feed, Snapshot};
use crate::consts::MAX_SHAPES_PER_KIND;
use crate::error::SimError;
use crate::settings::Settings;
use crate::sim::{ClockTiming, Dimensions, PanelBounds, ShapeCounts, ShapeStore, SimulationClock};

pub struct Simulation {
    store: Arc<ShapeStore>,
    panel: Arc<PanelBounds>,
    broadcaster: Arc<dyn Broadcaster>,
    max_per_kind: u32,
    /// Last requested population. Informational only: the store is the
    /// authority on what is alive.
    requested: Mutex<ShapeCounts>,
}

impl Simulation {
    pub fn new(
        store: Arc<ShapeStore>,
        panel: Arc<PanelBounds>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            store,
            panel,
            broadcaster,
            max_per_kind: MAX_SHAPES_PER_KIND,
            requested: Mutex::new(ShapeCounts::default()),
        }
    }

    /// Cap on any single kind in a request
    pub fn with_max_per_kind(mut self, max_per_kind: u32) -> Self {
        self.max_per_kind = max_per_kind;
        self
    }

    /// Build the store and bounds described by `settings`
    pub fn from_settings(settings: &Settings, broadcaster: Arc<dyn Broadcaster>) -> Self {
        let store = ShapeStore::new(settings.tuning(), settings.moving_fraction, settings.seed);
        let panel = PanelBounds::with_default(settings.default_panel());
        Self::new(Arc::new(store), Arc::new(panel), broadcaster)
            .with_max_per_kind(settings.max_shapes_per_kind)
    }

    /// Validate a requested population before it reaches the store
    pub fn checked_counts(
        &self,
        circles: i64,
        rects: i64,
        triangles: i64,
    ) -> Result<ShapeCounts, SimError> {
        ShapeCounts::from_signed(circles, rects, triangles, self.max_per_kind)
    }

    /// A clock driving this simulation's store and bounds
    pub fn clock(&self, timing: ClockTiming) -> SimulationClock {
        SimulationClock::new(
            Arc::clone(&self.store),
            Arc::clone(&self.panel),
            Arc::clone(&self.broadcaster),
            timing,
        )
    }

    /// Replace the population and publish the fresh snapshot
    pub fn initialize(&self, counts: ShapeCounts) -> Snapshot {
        let shapes: Snapshot = self.store.initialize(counts, self.panel.get()).into();
        *self.requested.lock().unwrap_or_else(PoisonError::into_inner) = counts;
        self.publish(Arc::clone(&shapes));
        shapes
    }

    /// Resize the panel first, then initialize. An invalid size is logged and
    /// skipped; the population is still created inside the current bounds.
    pub fn initialize_with_panel(
        &self,
        counts: ShapeCounts,
        width: f64,
        height: f64,
    ) -> Snapshot {
        if let Err(err) = self.set_panel_size(width, height) {
            log::warn!("Ignoring panel size in initialize request: {err}");
        }
        self.initialize(counts)
    }

    pub fn get_shapes(&self) -> Snapshot {
        self.store.snapshot().into()
    }

    /// Take a snapshot and also push it to every subscriber
    pub fn publish_shapes(&self) -> Snapshot {
        let shapes = self.get_shapes();
        self.publish(Arc::clone(&shapes));
        shapes
    }

    /// Last requested population
    pub fn configuration(&self) -> ShapeCounts {
        *self.requested.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sum of the last requested population (not the live count)
    pub fn get_total_shapes(&self) -> u64 {
        self.configuration().total()
    }

    /// Number of shapes actually alive
    pub fn live_shapes(&self) -> usize {
        self.store.len()
    }

    pub fn panel_config(&self) -> Dimensions {
        self.panel.get()
    }

    /// Resize the panel. On error the bounds are unchanged; callers fall back
    /// to `panel_config`.
    pub fn set_panel_size(&self, width: f64, height: f64) -> Result<Dimensions, SimError> {
        let dims = self.panel.set(width, height)?;
        self.broadcaster.publish(Feed::Panel(dims));
        Ok(dims)
    }

    pub fn reset_panel(&self) -> Dimensions {
        let dims = self.panel.reset_to_default();
        self.broadcaster.publish(Feed::Panel(dims));
        dims
    }

    /// Drop every shape and clear the recorded configuration
    pub fn reset(&self) -> Snapshot {
        self.store.reset();
        *self.requested.lock().unwrap_or_else(PoisonError::into_inner) = ShapeCounts::default();
        self.publish_shapes()
    }

    fn publish(&self, shapes: Snapshot) {
        self.broadcaster.publish(Feed::Shapes { tick: None, shapes });
    }
}
