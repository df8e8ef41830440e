// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena-backed quad-tree: insertion, overlap queries, removal, hard and soft clears.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;

use kurbo::Rect;

use crate::rect::{contains_rect, overlaps, quadrants, touches};
use crate::types::{ObjectBounds, QuadTreeConfig};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct NodeIdx(usize);

impl NodeIdx {
    const ROOT: Self = Self(0);

    const fn get(self) -> usize {
        self.0
    }

    /// Index of quadrant `q` when `self` is the first of four siblings.
    const fn sibling(self, q: usize) -> Self {
        Self(self.0 + q)
    }
}

#[derive(Clone, Debug)]
struct QNode<T> {
    area: Rect,
    level: u32,
    objects: Vec<T>,
    // First of four contiguous children; kept across soft clears for reuse.
    children: Option<NodeIdx>,
    split: bool,
}

impl<T> QNode<T> {
    fn new(area: Rect, level: u32) -> Self {
        Self {
            area,
            level,
            objects: Vec::new(),
            children: None,
            split: false,
        }
    }

    /// Children that are part of the live topology.
    fn live_children(&self) -> Option<NodeIdx> {
        if self.split { self.children } else { None }
    }
}

/// A bounded quad-tree over objects of type `T`.
///
/// Objects are stored in the deepest node whose area fully contains their bounds.
/// A node splits once its local object count exceeds
/// [`QuadTreeConfig::max_objects`] and [`QuadTreeConfig::can_subdivide`] allows it;
/// the split is permanent until [`QuadTree::clear`] or [`QuadTree::soft_clear`].
///
/// Bounds are read through an [`ObjectBounds`] provider at insert and query time.
pub struct QuadTree<T, B: ObjectBounds<T>> {
    bounds: B,
    config: QuadTreeConfig,
    nodes: Vec<QNode<T>>,
}

impl<T, B: ObjectBounds<T>> Debug for QuadTree<T, B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QuadTree")
            .field("area", &self.area())
            .field("config", &self.config)
            .field("allocated_nodes", &self.nodes.len())
            .field("objects", &self.count())
            .finish_non_exhaustive()
    }
}

impl<T, B: ObjectBounds<T>> QuadTree<T, B> {
    /// Create an empty tree covering `area`.
    pub fn new(area: Rect, bounds: B, config: QuadTreeConfig) -> Self {
        Self {
            bounds,
            config,
            nodes: vec![QNode::new(area, 0)],
        }
    }

    /// Create an empty tree with the default configuration.
    pub fn with_default_config(area: Rect, bounds: B) -> Self {
        Self::new(area, bounds, QuadTreeConfig::default())
    }

    /// Area covered by the root node.
    pub fn area(&self) -> Rect {
        self.nodes[NodeIdx::ROOT.get()].area
    }

    /// Configuration the tree was built with.
    pub fn config(&self) -> &QuadTreeConfig {
        &self.config
    }

    /// The bounds provider.
    pub fn bounds_provider(&self) -> &B {
        &self.bounds
    }

    /// Number of nodes allocated in the arena, reachable or not.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Insert `obj`.
    ///
    /// Returns `false` if the provider reports it invalid or its bounds are not fully
    /// contained by the root area.
    pub fn insert(&mut self, obj: T) -> bool {
        if !self.bounds.is_valid(&obj) {
            return false;
        }
        let rect = self.bounds.rect(&obj);
        self.insert_at(NodeIdx::ROOT, obj, rect).is_ok()
    }

    /// Insert every object from `objects`, returning how many were accepted.
    pub fn insert_range<I: IntoIterator<Item = T>>(&mut self, objects: I) -> usize {
        let mut accepted = 0;
        for obj in objects {
            if self.insert(obj) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Remove every object and drop all child nodes.
    pub fn clear(&mut self) {
        let area = self.area();
        self.nodes.clear();
        self.nodes.push(QNode::new(area, 0));
    }

    /// Remove every object but keep allocated child nodes for the next split.
    ///
    /// The tree behaves as empty afterwards. Children are emptied lazily when a node
    /// splits again.
    pub fn soft_clear(&mut self) {
        Self::soft_clear_node(&mut self.nodes[NodeIdx::ROOT.get()]);
    }

    /// Total number of stored objects.
    pub fn count(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![NodeIdx::ROOT];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx.get()];
            total += node.objects.len();
            if let Some(first) = node.live_children() {
                stack.extend((0..4).map(|q| first.sibling(q)));
            }
        }
        total
    }

    /// Areas of every reachable node, root first.
    pub fn grid(&self) -> Vec<Rect> {
        let mut out = Vec::new();
        let mut stack = vec![NodeIdx::ROOT];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx.get()];
            out.push(node.area);
            if let Some(first) = node.live_children() {
                stack.extend((0..4).rev().map(|q| first.sibling(q)));
            }
        }
        out
    }

    fn soft_clear_node(node: &mut QNode<T>) {
        node.split = false;
        node.objects.clear();
    }

    fn insert_at(&mut self, idx: NodeIdx, obj: T, rect: Rect) -> Result<(), T> {
        if !contains_rect(self.nodes[idx.get()].area, rect) {
            return Err(obj);
        }
        if let Some(first) = self.nodes[idx.get()].live_children() {
            let mut obj = obj;
            for q in 0..4 {
                match self.insert_at(first.sibling(q), obj, rect) {
                    Ok(()) => return Ok(()),
                    Err(back) => obj = back,
                }
            }
            self.nodes[idx.get()].objects.push(obj);
            return Ok(());
        }

        let node = &mut self.nodes[idx.get()];
        node.objects.push(obj);
        if node.objects.len() > self.config.max_objects
            && self.config.can_subdivide(node.area, node.level)
        {
            self.split(idx);
        }
        Ok(())
    }

    fn split(&mut self, idx: NodeIdx) {
        let (area, level, retained) = {
            let node = &self.nodes[idx.get()];
            (node.area, node.level, node.children)
        };
        let first = match retained {
            Some(first) => {
                for q in 0..4 {
                    Self::soft_clear_node(&mut self.nodes[first.sibling(q).get()]);
                }
                first
            }
            None => {
                let first = NodeIdx(self.nodes.len());
                for quad in quadrants(area) {
                    self.nodes.push(QNode::new(quad, level + 1));
                }
                first
            }
        };
        let node = &mut self.nodes[idx.get()];
        node.children = Some(first);
        node.split = true;

        let held = core::mem::take(&mut node.objects);
        let mut kept = Vec::with_capacity(held.len());
        'objects: for obj in held {
            let rect = self.bounds.rect(&obj);
            let mut obj = obj;
            for q in 0..4 {
                match self.insert_at(first.sibling(q), obj, rect) {
                    Ok(()) => continue 'objects,
                    Err(back) => obj = back,
                }
            }
            kept.push(obj);
        }
        self.nodes[idx.get()].objects = kept;
    }

    fn visit_overlapping(&self, rect: Rect, mut f: impl FnMut(&QNode<T>)) {
        let mut stack = vec![NodeIdx::ROOT];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx.get()];
            if !touches(node.area, rect) {
                continue;
            }
            f(node);
            if let Some(first) = node.live_children() {
                stack.extend((0..4).rev().map(|q| first.sibling(q)));
            }
        }
    }
}

impl<T: Clone, B: ObjectBounds<T>> QuadTree<T, B> {
    /// Append to `out` every valid object whose bounds overlap `rect`.
    ///
    /// Recursion is pruned by node area; each object found in a visited node is then
    /// tested against its own bounds. Invalid objects are skipped but stay stored.
    pub fn get_nodes(&self, out: &mut Vec<T>, rect: Rect) {
        let bounds = &self.bounds;
        self.visit_overlapping(rect, |node| {
            out.extend(
                node.objects
                    .iter()
                    .filter(|o| bounds.is_valid(o) && overlaps(rect, bounds.rect(o)))
                    .cloned(),
            );
        });
    }

    /// Like [`QuadTree::get_nodes`], but objects that have become invalid are removed
    /// from the nodes visited by the walk.
    pub fn find_objects(&mut self, out: &mut Vec<T>, rect: Rect) {
        let mut stack = vec![NodeIdx::ROOT];
        while let Some(idx) = stack.pop() {
            let node = &mut self.nodes[idx.get()];
            if !touches(node.area, rect) {
                continue;
            }
            let bounds = &self.bounds;
            node.objects.retain(|o| {
                if !bounds.is_valid(o) {
                    return false;
                }
                if overlaps(rect, bounds.rect(o)) {
                    out.push(o.clone());
                }
                true
            });
            if let Some(first) = node.live_children() {
                stack.extend((0..4).rev().map(|q| first.sibling(q)));
            }
        }
    }

    /// Append every stored object to `out`.
    pub fn get_all(&self, out: &mut Vec<T>) {
        let mut stack = vec![NodeIdx::ROOT];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx.get()];
            if let Some(first) = node.live_children() {
                stack.extend((0..4).rev().map(|q| first.sibling(q)));
            }
            out.extend(node.objects.iter().cloned());
        }
    }
}

impl<T: PartialEq, B: ObjectBounds<T>> QuadTree<T, B> {
    /// Remove the first stored object equal to `obj`.
    ///
    /// Scans the local node first, then descends only into quadrants that fully contain
    /// the object's bounds. Objects whose bounds are no longer valid are searched for in
    /// every quadrant.
    pub fn remove(&mut self, obj: &T) -> bool {
        let rect = self.bounds.rect(obj);
        let targeted = crate::rect::is_valid_rect(rect);
        let mut stack = vec![NodeIdx::ROOT];
        while let Some(idx) = stack.pop() {
            let node = &mut self.nodes[idx.get()];
            if let Some(pos) = node.objects.iter().position(|o| o == obj) {
                node.objects.remove(pos);
                return true;
            }
            let Some(first) = node.live_children() else {
                continue;
            };
            for q in 0..4 {
                let child = first.sibling(q);
                if !targeted || contains_rect(self.nodes[child.get()].area, rect) {
                    stack.push(child);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rect::intersection_area;

    #[derive(Clone, Debug, PartialEq)]
    struct Item {
        id: u32,
        rect: Rect,
    }

    fn item(id: u32, rect: Rect) -> Item {
        Item { id, rect }
    }

    type Tree = QuadTree<Item, fn(&Item) -> Rect>;

    fn tree(area: Rect, config: QuadTreeConfig) -> Tree {
        let bounds: fn(&Item) -> Rect = |i| i.rect;
        QuadTree::new(area, bounds, config)
    }

    /// Xorshift generator matching the one used by the benches.
    struct Rng(u64);

    impl Rng {
        fn next_u64(&mut self) -> u64 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            x
        }

        fn next_f64(&mut self) -> f64 {
            (self.next_u64() >> 11) as f64 / (1_u64 << 53) as f64
        }
    }

    fn random_items(seed: u64, n: u32, world: f64, size: f64) -> Vec<Item> {
        let mut rng = Rng(seed);
        (0..n)
            .map(|id| {
                let x = rng.next_f64() * (world - size);
                let y = rng.next_f64() * (world - size);
                item(id, Rect::new(x, y, x + size, y + size))
            })
            .collect()
    }

    fn ids(v: Vec<Item>) -> Vec<u32> {
        let mut out: Vec<u32> = v.into_iter().map(|i| i.id).collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn rejects_outside_and_invalid() {
        let mut t = tree(Rect::new(0.0, 0.0, 100.0, 100.0), QuadTreeConfig::default());
        assert!(!t.insert(item(0, Rect::new(90.0, 90.0, 110.0, 110.0))));
        assert!(!t.insert(item(1, Rect::new(f64::NAN, 0.0, 1.0, 1.0))));
        assert!(t.insert(item(2, Rect::new(0.0, 0.0, 100.0, 100.0))));
        assert_eq!(t.count(), 1);
    }

    #[test]
    fn split_pushes_objects_down_and_keeps_straddlers() {
        let cfg = QuadTreeConfig::default().with_max_objects(2);
        let mut t = tree(Rect::new(0.0, 0.0, 100.0, 100.0), cfg);
        t.insert(item(0, Rect::new(1.0, 1.0, 2.0, 2.0)));
        t.insert(item(1, Rect::new(60.0, 60.0, 61.0, 61.0)));
        assert_eq!(t.grid().len(), 1, "no split at the budget");
        // Straddles the center and must stay at the root.
        t.insert(item(2, Rect::new(45.0, 45.0, 55.0, 55.0)));
        assert_eq!(t.grid().len(), 5, "one split into four quadrants");
        assert_eq!(t.nodes[0].objects.len(), 1);
        assert_eq!(t.nodes[0].objects[0].id, 2);
        assert_eq!(t.count(), 3);
    }

    #[test]
    fn children_tile_parent_exactly() {
        let cfg = QuadTreeConfig::default()
            .with_max_objects(0)
            .with_max_level(1);
        let mut t = tree(Rect::new(-50.0, 10.0, 150.0, 90.0), cfg);
        t.insert(item(0, Rect::new(0.0, 20.0, 1.0, 21.0)));
        let grid = t.grid();
        let parent = grid[0];
        let children = &grid[1..5];
        let sum: f64 = children.iter().map(|r| r.area()).sum();
        assert_eq!(sum, parent.area());
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert_eq!(intersection_area(children[i], children[j]), 0.0);
            }
        }
    }

    #[test]
    fn unit_floor_makes_a_flat_bucket() {
        let cfg = QuadTreeConfig::default()
            .with_max_objects(1)
            .with_unit_size(64.0);
        let mut t = tree(Rect::new(0.0, 0.0, 100.0, 100.0), cfg);
        for i in 0..20 {
            let x = f64::from(i) * 4.0;
            assert!(t.insert(item(i, Rect::new(x, x, x + 1.0, x + 1.0))));
        }
        assert_eq!(t.grid().len(), 1);
        let mut out = Vec::new();
        t.get_nodes(&mut out, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(ids(out), vec![0, 1, 2]);
    }

    #[test]
    fn zero_sized_area_accepts_points_only() {
        let mut t = tree(Rect::new(5.0, 5.0, 5.0, 5.0), QuadTreeConfig::default());
        assert!(t.insert(item(0, Rect::new(5.0, 5.0, 5.0, 5.0))));
        assert!(!t.insert(item(1, Rect::new(5.0, 5.0, 6.0, 6.0))));
        let mut out = Vec::new();
        t.get_nodes(&mut out, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(ids(out), vec![0]);
    }

    #[test]
    fn query_matches_brute_force() {
        let world = Rect::new(0.0, 0.0, 1024.0, 1024.0);
        let cfg = QuadTreeConfig::default().with_unit_size(16.0);
        let items = random_items(0xCAFE_F00D_DEAD_BEEF, 50, 1024.0, 4.0);
        let mut t = tree(world, cfg);
        for i in &items {
            assert!(t.insert(i.clone()));
        }
        let query = Rect::new(0.0, 0.0, 512.0, 512.0);
        let mut out = Vec::new();
        t.get_nodes(&mut out, query);
        let expected: Vec<Item> = items
            .iter()
            .filter(|i| overlaps(query, i.rect))
            .cloned()
            .collect();
        assert_eq!(ids(out), ids(expected));
    }

    #[test]
    fn containing_query_always_finds_object() {
        let world = Rect::new(0.0, 0.0, 256.0, 256.0);
        let cfg = QuadTreeConfig::default()
            .with_max_objects(1)
            .with_max_level(8);
        let items = random_items(0x1234_5678_9ABC_DEF0, 300, 256.0, 3.0);
        let mut t = tree(world, cfg);
        for i in &items {
            t.insert(i.clone());
        }
        for i in &items {
            let q = i.rect.inflate(0.5, 0.5);
            let mut out = Vec::new();
            t.get_nodes(&mut out, q);
            assert!(out.iter().any(|o| o.id == i.id), "item {} not found", i.id);
        }
    }

    #[test]
    fn soft_clear_matches_fresh_tree() {
        let world = Rect::new(0.0, 0.0, 512.0, 512.0);
        let cfg = QuadTreeConfig::default()
            .with_max_objects(3)
            .with_unit_size(8.0);
        let first = random_items(0xBADC_F00D_1234_5678, 200, 512.0, 6.0);
        let second = random_items(0xC1A5_7E55_9999_ABCD, 120, 512.0, 6.0);

        let mut reused = tree(world, cfg);
        reused.insert_range(first.iter().cloned());
        let allocated = reused.node_count();
        reused.soft_clear();
        assert_eq!(reused.count(), 0);
        assert_eq!(reused.grid().len(), 1);
        let mut none = Vec::new();
        reused.get_nodes(&mut none, world);
        assert!(none.is_empty(), "soft-cleared tree must look empty");

        reused.insert_range(second.iter().cloned());
        let mut fresh = tree(world, cfg);
        fresh.insert_range(second.iter().cloned());

        for q in [
            world,
            Rect::new(0.0, 0.0, 100.0, 300.0),
            Rect::new(200.0, 200.0, 260.0, 480.0),
        ] {
            let mut a = Vec::new();
            let mut b = Vec::new();
            reused.get_nodes(&mut a, q);
            fresh.get_nodes(&mut b, q);
            assert_eq!(ids(a), ids(b));
        }
        assert!(
            reused.node_count() >= allocated,
            "soft clear keeps the arena"
        );
    }

    #[test]
    fn hard_clear_drops_children() {
        let cfg = QuadTreeConfig::default().with_max_objects(1);
        let mut t = tree(Rect::new(0.0, 0.0, 64.0, 64.0), cfg);
        t.insert_range(random_items(7, 40, 64.0, 2.0));
        assert!(t.node_count() > 1);
        t.clear();
        assert_eq!(t.node_count(), 1);
        assert_eq!(t.count(), 0);
    }

    #[test]
    fn find_objects_prunes_invalid() {
        use core::cell::Cell;

        let dead = Cell::new(u32::MAX);
        let mut t = QuadTree::new(
            Rect::new(0.0, 0.0, 100.0, 100.0),
            |i: &Item| {
                if i.id == dead.get() {
                    Rect::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
                } else {
                    i.rect
                }
            },
            QuadTreeConfig::default(),
        );
        t.insert(item(0, Rect::new(1.0, 1.0, 2.0, 2.0)));
        t.insert(item(1, Rect::new(3.0, 3.0, 4.0, 4.0)));
        dead.set(0);

        let mut out = Vec::new();
        t.get_nodes(&mut out, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(ids(out), vec![1]);
        assert_eq!(t.count(), 2, "get_nodes does not mutate");

        let mut out = Vec::new();
        t.find_objects(&mut out, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(ids(out), vec![1]);
        assert_eq!(t.count(), 1, "find_objects drops the invalid entry");
    }

    #[test]
    fn remove_targets_quadrants() {
        let cfg = QuadTreeConfig::default().with_max_objects(1);
        let mut t = tree(Rect::new(0.0, 0.0, 64.0, 64.0), cfg);
        let items = random_items(99, 30, 64.0, 2.0);
        t.insert_range(items.iter().cloned());
        assert!(t.remove(&items[10]));
        assert!(!t.remove(&items[10]));
        assert_eq!(t.count(), 29);
        let mut all = Vec::new();
        t.get_all(&mut all);
        assert!(all.iter().all(|i| i.id != 10));
    }
}
