// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Point lights as seen by the shadow passes.

use kurbo::{Point, Rect};

use crate::sink::uniform;
use crate::types::LightId;

/// A shadow-casting point light.
#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    /// Identity used by caster light filters.
    pub id: LightId,
    /// World position.
    pub position: Point,
    /// Depth of the light above the scene plane.
    pub z: f64,
    /// Outer radius of influence.
    pub outer_radius: f64,
    /// Shadow darkness in `[0, 1]`.
    pub shadow_intensity: f64,
    /// Shadow darkness applied to volumetric light in `[0, 1]`.
    pub shadow_volume_intensity: f64,
}

impl Light {
    /// A light at `position` with the given radius and full-strength shadows.
    pub fn new(id: LightId, position: Point, outer_radius: f64) -> Self {
        Self {
            id,
            position,
            z: 0.0,
            outer_radius,
            shadow_intensity: 1.0,
            shadow_volume_intensity: 1.0,
        }
    }

    /// Square of side `2 * outer_radius` centered on the light.
    pub fn influence_rect(&self) -> Rect {
        let r = self.outer_radius;
        Rect::new(
            self.position.x - r,
            self.position.y - r,
            self.position.x + r,
            self.position.y + r,
        )
    }

    /// `_LightPos` value: `(x, y, -z, 0)`.
    pub fn position_uniform(&self) -> [f32; 4] {
        [
            uniform(self.position.x),
            uniform(self.position.y),
            uniform(-self.z),
            0.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn influence_rect_is_centered_square() {
        let l = Light::new(LightId(0), Point::new(10.0, -4.0), 3.0);
        assert_eq!(l.influence_rect(), Rect::new(7.0, -7.0, 13.0, -1.0));
    }

    #[test]
    fn position_uniform_negates_z() {
        let mut l = Light::new(LightId(0), Point::new(1.0, 2.0), 1.0);
        l.z = 5.0;
        assert_eq!(l.position_uniform(), [1.0, 2.0, -5.0, 0.0]);
    }
}
