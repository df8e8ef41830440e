// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rectangle predicates shared by the tree and its callers.
//!
//! Kurbo's `Rect` is used with `x0`/`y0` as the minimum corner and `x1`/`y1` as the
//! maximum corner. Three different tests are used on purpose:
//!
//! - [`contains_rect`] is closed: an object touching a node's edge still belongs to it.
//! - [`overlaps`] is open: two rectangles that only share an edge do not overlap.
//! - [`touches`] is closed: used to prune node areas conservatively.

use kurbo::Rect;

/// True if all coordinates are finite and the rectangle is not inverted.
#[inline]
pub fn is_valid_rect(r: Rect) -> bool {
    r.x0.is_finite()
        && r.y0.is_finite()
        && r.x1.is_finite()
        && r.y1.is_finite()
        && r.x0 <= r.x1
        && r.y0 <= r.y1
}

/// True if `inner` lies within `outer`, edges included.
#[inline]
pub fn contains_rect(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 && inner.y0 >= outer.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

/// Strict overlap: the rectangles share interior area along both axes.
///
/// A zero-sized rectangle strictly inside the other still overlaps it.
#[inline]
pub fn overlaps(a: Rect, b: Rect) -> bool {
    a.x1 > b.x0 && a.x0 < b.x1 && a.y1 > b.y0 && a.y0 < b.y1
}

/// Closed overlap: the rectangles intersect or share an edge.
#[inline]
pub fn touches(a: Rect, b: Rect) -> bool {
    a.x1 >= b.x0 && a.x0 <= b.x1 && a.y1 >= b.y0 && a.y0 <= b.y1
}

/// Area of the intersection of two rectangles, zero if they are disjoint.
#[inline]
pub fn intersection_area(a: Rect, b: Rect) -> f64 {
    let w = a.x1.min(b.x1) - a.x0.max(b.x0);
    let h = a.y1.min(b.y1) - a.y0.max(b.y0);
    if w <= 0.0 || h <= 0.0 { 0.0 } else { w * h }
}

/// Split `area` into its four quadrants: top-left, top-right, bottom-left, bottom-right.
///
/// The quadrants share edges at the center point and tile `area` exactly.
pub fn quadrants(area: Rect) -> [Rect; 4] {
    let cx = area.x0 + area.width() * 0.5;
    let cy = area.y0 + area.height() * 0.5;
    [
        Rect::new(area.x0, area.y0, cx, cy),
        Rect::new(cx, area.y0, area.x1, cy),
        Rect::new(area.x0, cy, cx, area.y1),
        Rect::new(cx, cy, area.x1, area.y1),
    ]
}
