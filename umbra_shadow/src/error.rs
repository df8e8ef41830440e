// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for configuring shadow worlds.
//!
//! Per-frame operations never fail: invalid geometry, stale ids, and uninitialized state
//! all degrade to empty results. Only configuration is checked.

use kurbo::Rect;
use thiserror::Error;

/// Result type for shadow configuration.
pub type Result<T> = std::result::Result<T, ShadowError>;

/// Errors raised while configuring a realm, world, or renderer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShadowError {
    /// The world rectangle has zero area, is inverted, or is not finite.
    #[error("world rect {0:?} is degenerate")]
    DegenerateWorldRect(Rect),

    /// The minimum cell size must be at least one world unit.
    #[error("unit size must be >= 1, got {0}")]
    InvalidUnitSize(f64),

    /// A rebuild slice must make progress.
    #[error("iterations per frame must be non-zero")]
    ZeroIterationsPerFrame,

    /// Quad-tree nodes must hold at least one object before splitting.
    #[error("max objects per node must be non-zero")]
    ZeroMaxObjects,

    /// A render-target slot beyond the configured budget was requested.
    #[error("shadow texture slot {index} is outside the budget of {budget}")]
    TextureSlotOutOfBudget {
        /// Requested slot.
        index: usize,
        /// Number of slots allocated by the last budget initialization.
        budget: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let e = ShadowError::InvalidUnitSize(0.5);
        assert_eq!(e.to_string(), "unit size must be >= 1, got 0.5");
        let e = ShadowError::TextureSlotOutOfBudget {
            index: 4,
            budget: 4,
        };
        assert!(e.to_string().contains("slot 4"));
    }
}
