// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shadow realm: one static quad-tree plus two dynamic quad-trees rebuilt alternately
//! in time-sliced passes.
//!
//! Readers always query the active dynamic tree. The other tree is soft-cleared and
//! refilled over as many [`ShadowRealm::tick`] calls as the dynamic list needs at
//! `budget` insertions per tick; only when it is full does it become active. A query
//! therefore sees either the previous complete snapshot or the new one, never a partial
//! fill.

use kurbo::Rect;
use umbra_quadtree::rect::is_valid_rect;
use umbra_quadtree::{QuadTree, QuadTreeConfig};

use crate::error::{Result, ShadowError};
use crate::types::CasterId;

/// Realm tuning.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RealmConfig {
    /// World rectangle; the realm initializes itself from it when set.
    pub world_rect: Option<Rect>,
    /// Insertions per rebuild slice.
    pub iterations_per_frame: usize,
    /// Smallest quad-tree cell edge.
    pub unit_size: f64,
    /// Objects per node before a split.
    pub max_objects: usize,
    /// Maximum tree depth.
    pub max_level: u32,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            world_rect: None,
            iterations_per_frame: 100,
            unit_size: 16.0,
            max_objects: 10,
            max_level: 5,
        }
    }
}

impl RealmConfig {
    /// Set the world rectangle.
    pub fn with_world_rect(mut self, rect: Rect) -> Self {
        self.world_rect = Some(rect);
        self
    }

    /// Set the rebuild slice size.
    pub fn with_iterations_per_frame(mut self, n: usize) -> Self {
        self.iterations_per_frame = n;
        self
    }

    /// Set the minimum cell edge.
    pub fn with_unit_size(mut self, unit_size: f64) -> Self {
        self.unit_size = unit_size;
        self
    }

    /// Set the per-node object budget.
    pub fn with_max_objects(mut self, n: usize) -> Self {
        self.max_objects = n;
        self
    }

    /// Set the maximum depth.
    pub fn with_max_level(mut self, level: u32) -> Self {
        self.max_level = level;
        self
    }

    /// Check the tuning values. The world rect is checked by [`ShadowRealm::init`].
    pub fn validate(&self) -> Result<()> {
        if self.unit_size.is_nan() || self.unit_size < 1.0 {
            return Err(ShadowError::InvalidUnitSize(self.unit_size));
        }
        if self.iterations_per_frame == 0 {
            return Err(ShadowError::ZeroIterationsPerFrame);
        }
        if self.max_objects == 0 {
            return Err(ShadowError::ZeroMaxObjects);
        }
        Ok(())
    }

    fn tree_config(&self) -> QuadTreeConfig {
        QuadTreeConfig::default()
            .with_max_objects(self.max_objects)
            .with_max_level(self.max_level)
            .with_unit_size(self.unit_size)
    }
}

/// A caster as stored in a realm tree: its id and the bounds it had when inserted.
///
/// Dynamic trees are rebuilt continuously, so a snapshot is at most one rebuild cycle old.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RealmEntry {
    /// The caster.
    pub id: CasterId,
    /// Bounds at insertion time.
    pub bounds: Rect,
}

type EntryBounds = fn(&RealmEntry) -> Rect;

fn entry_bounds(entry: &RealmEntry) -> Rect {
    entry.bounds
}

type RealmTree = QuadTree<RealmEntry, EntryBounds>;

/// Progress of the dynamic rebuild.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RebuildState {
    /// No pass has started since initialization.
    NotStarted,
    /// The inactive tree is being filled.
    Filling {
        /// Next position in the pass snapshot.
        cursor: usize,
        /// Casters in the pass snapshot.
        total: usize,
    },
    /// The last pass completed and was published; the next tick starts a new one.
    Ready,
}

struct Trees {
    dynamic: [RealmTree; 2],
    statics: RealmTree,
}

impl Trees {
    fn new(area: Rect, config: QuadTreeConfig) -> Self {
        let tree = || QuadTree::new(area, entry_bounds as EntryBounds, config);
        Self {
            dynamic: [tree(), tree()],
            statics: tree(),
        }
    }
}

/// Double-buffered spatial index of shadow casters.
pub struct ShadowRealm {
    config: RealmConfig,
    trees: Option<Trees>,
    active: usize,
    state: RebuildState,
    pending_static: Vec<RealmEntry>,
    // Dynamic ids captured when the current pass started.
    snapshot: Vec<CasterId>,
    swaps: u64,
}

impl core::fmt::Debug for ShadowRealm {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShadowRealm")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .field("active", &self.active)
            .field("state", &self.state)
            .field("pending_static", &self.pending_static.len())
            .field("swaps", &self.swaps)
            .finish_non_exhaustive()
    }
}

impl ShadowRealm {
    /// Create a realm. If the config carries a world rect, the realm is initialized from it.
    pub fn new(config: RealmConfig) -> Result<Self> {
        config.validate()?;
        let mut realm = Self {
            config,
            trees: None,
            active: 0,
            state: RebuildState::NotStarted,
            pending_static: Vec::new(),
            snapshot: Vec::new(),
            swaps: 0,
        };
        if let Some(rect) = config.world_rect {
            realm.init(rect)?;
        }
        Ok(realm)
    }

    /// Configuration.
    pub fn config(&self) -> &RealmConfig {
        &self.config
    }

    /// Whether a world rect has been configured.
    pub fn is_initialized(&self) -> bool {
        self.trees.is_some()
    }

    /// Rebuild progress.
    pub fn state(&self) -> RebuildState {
        self.state
    }

    /// Number of completed rebuild passes.
    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Allocate the three trees over `rect` and seed deferred static casters.
    ///
    /// Re-initializing discards every tree, including static entries, and restarts the
    /// rebuild; static casters must register again.
    pub fn init(&mut self, rect: Rect) -> Result<()> {
        if !is_valid_rect(rect) || rect.width() <= 0.0 || rect.height() <= 0.0 {
            log::warn!("rejected shadow world rect {rect:?}");
            return Err(ShadowError::DegenerateWorldRect(rect));
        }
        self.config.world_rect = Some(rect);
        let mut trees = Trees::new(rect, self.config.tree_config());
        let seeded = self.pending_static.len();
        for entry in self.pending_static.drain(..) {
            trees.statics.insert(entry);
        }
        self.trees = Some(trees);
        self.active = 0;
        self.state = RebuildState::NotStarted;
        self.snapshot.clear();
        log::debug!("shadow world initialized over {rect:?}, {seeded} deferred static casters");
        Ok(())
    }

    /// Index a static caster, or defer it until [`ShadowRealm::init`].
    ///
    /// Returns `false` if the entry was rejected for invalid or out-of-world bounds.
    pub fn register_static(&mut self, entry: RealmEntry) -> bool {
        match &mut self.trees {
            Some(trees) => trees.statics.insert(entry),
            None => {
                self.pending_static.push(entry);
                true
            }
        }
    }

    /// Remove a static caster, indexed or deferred.
    pub fn unregister_static(&mut self, entry: &RealmEntry) -> bool {
        if let Some(pos) = self.pending_static.iter().position(|e| e.id == entry.id) {
            self.pending_static.remove(pos);
            return true;
        }
        match &mut self.trees {
            Some(trees) => trees.statics.remove(entry),
            None => false,
        }
    }

    /// Drop every static caster.
    pub fn clear_static(&mut self) {
        self.pending_static.clear();
        if let Some(trees) = &mut self.trees {
            trees.statics.clear();
        }
    }

    /// Advance the dynamic rebuild by at most `budget` insertions.
    ///
    /// A pass fills the inactive tree from a snapshot of `dynamic` taken when the pass
    /// starts, so changes to the list show up in the next pass. `bounds_of` returns `None`
    /// for casters that no longer exist, which are skipped.
    ///
    /// Returns `true` if this tick published a new tree. A no-op before initialization.
    pub fn tick(
        &mut self,
        budget: usize,
        dynamic: &[CasterId],
        mut bounds_of: impl FnMut(CasterId) -> Option<Rect>,
    ) -> bool {
        let Some(trees) = &mut self.trees else {
            return false;
        };
        let building = 1 - self.active;
        let cursor = match self.state {
            RebuildState::NotStarted | RebuildState::Ready => {
                trees.dynamic[building].soft_clear();
                self.snapshot.clear();
                self.snapshot.extend_from_slice(dynamic);
                0
            }
            RebuildState::Filling { cursor, .. } => cursor,
        };

        let total = self.snapshot.len();
        let end = cursor.saturating_add(budget.max(1)).min(total);
        for &id in &self.snapshot[cursor..end] {
            if let Some(bounds) = bounds_of(id) {
                trees.dynamic[building].insert(RealmEntry { id, bounds });
            }
        }
        log::trace!("rebuild slice {cursor}..{end} of {total}");

        if end >= total {
            self.active = building;
            self.state = RebuildState::Ready;
            self.swaps += 1;
            log::debug!(
                "dynamic shadow tree {building} published with {} casters",
                trees.dynamic[building].count()
            );
            true
        } else {
            self.state = RebuildState::Filling { cursor: end, total };
            false
        }
    }

    /// Append every caster overlapping `rect` from the static and active trees, drop those
    /// `resolve` rejects, and sort the whole list ascending by group id.
    ///
    /// `resolve` maps a caster to its effective shadow group, or `None` if it was
    /// destroyed or disabled. The sort is stable, so equal groups keep tree order.
    pub fn get_shadow_casters(
        &self,
        out: &mut Vec<CasterId>,
        rect: Rect,
        mut resolve: impl FnMut(CasterId) -> Option<i32>,
    ) {
        let Some(trees) = &self.trees else { return };
        let mut hits = Vec::new();
        trees.statics.get_nodes(&mut hits, rect);
        trees.dynamic[self.active].get_nodes(&mut hits, rect);
        let mut keyed: Vec<(i32, CasterId)> = hits
            .into_iter()
            .filter_map(|e| resolve(e.id).map(|g| (g, e.id)))
            .collect();
        keyed.sort_by_key(|&(g, _)| g);
        out.extend(keyed.into_iter().map(|(_, id)| id));
    }

    /// Node areas of the static, active, and building trees, for debug overlays.
    pub fn debug_grids(&self) -> [Vec<Rect>; 3] {
        match &self.trees {
            Some(trees) => [
                trees.statics.grid(),
                trees.dynamic[self.active].grid(),
                trees.dynamic[1 - self.active].grid(),
            ],
            None => [Vec::new(), Vec::new(), Vec::new()],
        }
    }

    /// Casters in the active dynamic tree.
    pub fn active_count(&self) -> usize {
        self.trees
            .as_ref()
            .map_or(0, |t| t.dynamic[self.active].count())
    }

    /// Casters in the static tree.
    pub fn static_count(&self) -> usize {
        self.trees.as_ref().map_or(0, |t| t.statics.count())
    }
}
