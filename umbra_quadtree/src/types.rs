// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configuration and the object-bounds seam.

use kurbo::Rect;

use crate::rect::is_valid_rect;

/// Tuning knobs for a [`QuadTree`](crate::QuadTree).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QuadTreeConfig {
    /// Objects a node holds before it tries to split.
    pub max_objects: usize,
    /// Deepest level a node may be created at. The root is level `0`.
    pub max_level: u32,
    /// Smallest quadrant edge length. A node whose halves would be narrower never splits.
    pub unit_size: f64,
}

impl Default for QuadTreeConfig {
    fn default() -> Self {
        Self {
            max_objects: 10,
            max_level: 5,
            unit_size: 1.0,
        }
    }
}

impl QuadTreeConfig {
    /// Set the per-node object budget.
    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }

    /// Set the maximum depth.
    pub fn with_max_level(mut self, max_level: u32) -> Self {
        self.max_level = max_level;
        self
    }

    /// Set the minimum quadrant size.
    pub fn with_unit_size(mut self, unit_size: f64) -> Self {
        self.unit_size = unit_size;
        self
    }

    /// Whether a node covering `area` at depth `level` may split into four quadrants.
    pub fn can_subdivide(&self, area: Rect, level: u32) -> bool {
        level < self.max_level
            && area.width() * 0.5 >= self.unit_size
            && area.height() * 0.5 >= self.unit_size
    }
}

/// Supplies world-space bounds for objects stored in a [`QuadTree`](crate::QuadTree).
///
/// The tree never stores rectangles itself; it asks the provider every time it needs one.
/// Closures of the form `Fn(&T) -> Rect` implement this trait.
pub trait ObjectBounds<T> {
    /// World-space bounds of `obj`.
    fn rect(&self, obj: &T) -> Rect;

    /// Whether `obj` may be inserted or returned from a query.
    ///
    /// Defaults to a finite, non-inverted bounds check.
    fn is_valid(&self, obj: &T) -> bool {
        is_valid_rect(self.rect(obj))
    }
}

impl<T, F: Fn(&T) -> Rect> ObjectBounds<T> for F {
    #[inline]
    fn rect(&self, obj: &T) -> Rect {
        self(obj)
    }
}
