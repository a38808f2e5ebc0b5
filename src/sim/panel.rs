//! Panel bounds shared between the clock and request handlers

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::SimError;

/// Panel width and height
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const DEFAULT: Dimensions = Dimensions {
        width: PANEL_WIDTH,
        height: PANEL_HEIGHT,
    };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Validate against the accepted `[PANEL_MIN, PANEL_MAX]` range on both axes
    pub fn validated(width: f64, height: f64) -> Result<Self, SimError> {
        let in_range = |v: f64| (PANEL_MIN..=PANEL_MAX).contains(&v);
        if in_range(width) && in_range(height) {
            Ok(Self { width, height })
        } else {
            Err(SimError::InvalidDimensions { width, height })
        }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Current panel size, internally synchronized.
///
/// Holds only values that passed `Dimensions::validated`, so readers never
/// observe an out-of-range panel.
#[derive(Debug)]
pub struct PanelBounds {
    current: RwLock<Dimensions>,
    default: Dimensions,
}

impl PanelBounds {
    pub fn new() -> Self {
        Self::with_default(Dimensions::DEFAULT)
    }

    /// Bounds whose reset target is `default` (assumed already validated)
    pub fn with_default(default: Dimensions) -> Self {
        Self {
            current: RwLock::new(default),
            default,
        }
    }

    pub fn get(&self) -> Dimensions {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the bounds. On error the previous bounds stay in place.
    pub fn set(&self, width: f64, height: f64) -> Result<Dimensions, SimError> {
        let dims = Dimensions::validated(width, height)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = dims;
        log::info!("Panel configured: {:.0} x {:.0}", dims.width, dims.height);
        Ok(dims)
    }

    pub fn reset_to_default(&self) -> Dimensions {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = self.default;
        log::debug!("Panel reset to {:.0} x {:.0}", self.default.width, self.default.height);
        self.default
    }
}

impl Default for PanelBounds {
    fn default() -> Self {
        Self::new()
    }
}
