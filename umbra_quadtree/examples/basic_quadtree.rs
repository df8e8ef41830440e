// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Umbra QuadTree: fill, query, soft clear, and refill.

use kurbo::Rect;
use umbra_quadtree::{QuadTree, QuadTreeConfig};

fn main() {
    let config = QuadTreeConfig::default()
        .with_max_objects(2)
        .with_unit_size(8.0);
    let mut tree = QuadTree::new(Rect::new(0.0, 0.0, 128.0, 128.0), |r: &Rect| *r, config);

    for i in 0..8 {
        let x = f64::from(i) * 14.0;
        tree.insert(Rect::new(x, x, x + 4.0, x + 4.0));
    }
    println!("grid after fill: {} nodes", tree.grid().len());

    let mut hits = Vec::new();
    tree.get_nodes(&mut hits, Rect::new(0.0, 0.0, 32.0, 32.0));
    println!("hits in (0,0)-(32,32): {hits:?}");

    // Children stay allocated and are reused by the next fill.
    tree.soft_clear();
    tree.insert(Rect::new(100.0, 4.0, 104.0, 8.0));
    println!(
        "after refill: {} objects, {} allocated nodes",
        tree.count(),
        tree.node_count()
    );
}
