// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=umbra_quadtree --heading-base-level=0

//! Umbra QuadTree: a bounded 2D quad-tree tuned for per-frame rebuilds.
//!
//! - Insert objects whose world-space bounds are supplied by an [`ObjectBounds`] provider.
//! - Query every object strictly overlapping a rectangle.
//! - Reset with [`QuadTree::clear`], or with [`QuadTree::soft_clear`] to keep allocated
//!   child nodes around for the next fill.
//!
//! The tree does not copy rectangles into its nodes. Whenever a bounds test is needed the
//! provider is asked again, so objects that move after insertion are found by their
//! current bounds as long as they still fit the node that stores them. Objects whose bounds
//! become invalid (non-finite or inverted) are skipped by queries, and pruned by
//! [`QuadTree::find_objects`].
//!
//! # Example
//!
//! ```rust
//! use kurbo::Rect;
//! use umbra_quadtree::{QuadTree, QuadTreeConfig};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Sprite {
//!     id: u32,
//!     bounds: Rect,
//! }
//!
//! let config = QuadTreeConfig::default().with_unit_size(16.0);
//! let mut tree = QuadTree::new(
//!     Rect::new(0.0, 0.0, 1024.0, 1024.0),
//!     |s: &Sprite| s.bounds,
//!     config,
//! );
//!
//! tree.insert(Sprite { id: 1, bounds: Rect::new(10.0, 10.0, 20.0, 20.0) });
//! tree.insert(Sprite { id: 2, bounds: Rect::new(600.0, 600.0, 610.0, 610.0) });
//!
//! let mut hits = Vec::new();
//! tree.get_nodes(&mut hits, Rect::new(0.0, 0.0, 512.0, 512.0));
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].id, 1);
//! ```
//!
//! ## Rectangle semantics
//!
//! Containment is closed, object overlap is strict. See [`rect`] for the predicates.
//!
//! ## Subdivision
//!
//! A node splits when it holds more than [`QuadTreeConfig::max_objects`] objects, is
//! shallower than [`QuadTreeConfig::max_level`], and each half of its area is at least
//! [`QuadTreeConfig::unit_size`] wide and tall. Objects that straddle a quadrant boundary
//! stay at the parent.

#![no_std]

extern crate alloc;

pub mod rect;
pub mod tree;
pub mod types;

pub use tree::QuadTree;
pub use types::{ObjectBounds, QuadTreeConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use kurbo::Rect;

    #[test]
    fn moved_object_is_found_by_current_bounds() {
        use core::cell::Cell;

        let x = Cell::new(10.0);
        let mut tree = QuadTree::new(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            |_: &u32| Rect::new(x.get(), 10.0, x.get() + 2.0, 12.0),
            QuadTreeConfig::default(),
        );
        assert!(tree.insert(7));
        x.set(40.0);

        let mut hits = Vec::new();
        tree.get_nodes(&mut hits, Rect::new(0.0, 0.0, 20.0, 20.0));
        assert!(hits.is_empty());
        tree.get_nodes(&mut hits, Rect::new(30.0, 0.0, 50.0, 20.0));
        assert_eq!(hits, [7]);
    }

    #[test]
    fn edge_sharing_query_misses_object() {
        let mut tree = QuadTree::new(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            |r: &Rect| *r,
            QuadTreeConfig::default(),
        );
        tree.insert(Rect::new(10.0, 10.0, 20.0, 20.0));
        let mut hits = Vec::new();
        tree.get_nodes(&mut hits, Rect::new(20.0, 10.0, 30.0, 20.0));
        assert!(hits.is_empty());
        tree.get_nodes(&mut hits, Rect::new(19.0, 10.0, 30.0, 20.0));
        assert_eq!(hits.len(), 1);
    }
}
