//! Simulation core
//!
//! Everything with state-transition or timing logic lives here:
//! - Fixed timestep only (the tick never measures elapsed time)
//! - Seeded RNG owned by the store
//! - Stable iteration order (by shape ID)
//! - No transport dependencies beyond the `Broadcaster` seam

pub mod clock;
pub mod panel;
pub mod sampling;
pub mod shape;
pub mod store;

pub use clock::{ClockTiming, SimulationClock, TickReport};
pub use panel::{Dimensions, PanelBounds};
pub use sampling::{choose_fraction, quota};
pub use shape::{ParseShapeIdError, Shape, ShapeId, ShapeKind, ShapeTuning};
pub use store::{ShapeCounts, ShapeStore, StoreState};
