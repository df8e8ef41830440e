// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shadow world: caster and composite storage, registration lifecycle, per-caster
//! updates, and per-frame culling.

use kurbo::Rect;

use crate::caster::Caster;
use crate::error::Result;
use crate::realm::{RealmConfig, RealmEntry, ShadowRealm};
use crate::registry::{GroupAncestry, ShadowCasterRegistry};
use crate::types::{CasterFlags, CasterId, CompositeId, GroupRef};

/// Non-static casters run their logical update once every `TICK_COUNT + 1` calls, each
/// on its own phase.
pub const TICK_COUNT: u32 = 0x0F;

/// Slot storage with generation counters. Generations persist across frees.
#[derive(Clone, Debug)]
struct Slots<T> {
    entries: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
        }
    }
}

impl<T> Slots<T> {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Ids use 32-bit slot indices by design."
    )]
    fn insert(&mut self, value: T) -> (u32, u32) {
        if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.entries[idx] = Some(value);
            (idx as u32, generation)
        } else {
            self.entries.push(Some(value));
            self.generations.push(1);
            ((self.entries.len() - 1) as u32, 1)
        }
    }

    fn is_live(&self, idx: usize, generation: u32) -> bool {
        self.generations.get(idx) == Some(&generation)
            && self.entries.get(idx).is_some_and(Option::is_some)
    }

    fn get(&self, idx: usize, generation: u32) -> Option<&T> {
        if self.is_live(idx, generation) {
            self.entries[idx].as_ref()
        } else {
            None
        }
    }

    fn get_mut(&mut self, idx: usize, generation: u32) -> Option<&mut T> {
        if self.is_live(idx, generation) {
            self.entries[idx].as_mut()
        } else {
            None
        }
    }

    fn remove(&mut self, idx: usize, generation: u32) -> Option<T> {
        if !self.is_live(idx, generation) {
            return None;
        }
        self.free_list.push(idx);
        self.entries[idx].take()
    }

    #[allow(
        clippy::cast_possible_truncation,
        reason = "Slots are only ever allocated with 32-bit indices."
    )]
    fn live(&self) -> impl Iterator<Item = (u32, u32, &T)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|v| (i as u32, self.generations[i], v)))
    }
}

/// Registration bucket of an enabled caster.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Bucket {
    Dynamic,
    Static,
    Persistent,
}

#[derive(Clone, Debug)]
struct CasterSlot {
    caster: Caster,
    bucket: Option<Bucket>,
    group: Option<GroupRef>,
    previous_shadow_group: i32,
    previous_casts_shadows: bool,
    tick: u32,
    force_update: bool,
    // Bounds the static tree was given, needed to find the entry again.
    static_entry: Option<RealmEntry>,
}

#[derive(Clone, Debug)]
struct CompositeSlot {
    shadow_group: i32,
}

/// A self-contained shadow world.
///
/// Owns its casters, composites, registry, and realm. Worlds share no state, so several may
/// coexist, for example one per loaded scene.
pub struct ShadowWorld {
    casters: Slots<CasterSlot>,
    composites: Slots<CompositeSlot>,
    registry: ShadowCasterRegistry,
    realm: ShadowRealm,
    culled: Vec<CasterId>,
    next_phase: u32,
}

impl core::fmt::Debug for ShadowWorld {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShadowWorld")
            .field("casters_alive", &self.casters.live().count())
            .field("composites_alive", &self.composites.live().count())
            .field("registry", &self.registry)
            .field("realm", &self.realm)
            .field("culled", &self.culled.len())
            .finish_non_exhaustive()
    }
}

fn group_of(
    casters: &Slots<CasterSlot>,
    composites: &Slots<CompositeSlot>,
    id: CasterId,
) -> Option<i32> {
    let slot = casters.get(id.idx(), id.generation())?;
    slot.bucket?;
    match slot.group {
        Some(GroupRef::Composite(c)) => Some(
            composites
                .get(c.idx(), c.generation())
                .map_or(slot.caster.shadow_group, |g| g.shadow_group),
        ),
        _ => Some(slot.caster.shadow_group),
    }
}

impl ShadowWorld {
    /// Create a world. The realm is initialized if `config` carries a world rect.
    pub fn new(config: RealmConfig) -> Result<Self> {
        Ok(Self {
            casters: Slots::default(),
            composites: Slots::default(),
            registry: ShadowCasterRegistry::new(),
            realm: ShadowRealm::new(config)?,
            culled: Vec::new(),
            next_phase: 0,
        })
    }

    /// The caster registry.
    pub fn registry(&self) -> &ShadowCasterRegistry {
        &self.registry
    }

    /// The spatial realm.
    pub fn realm(&self) -> &ShadowRealm {
        &self.realm
    }

    // --- casters ---

    /// Add and enable a caster.
    ///
    /// Its first logical update runs on the next [`ShadowWorld::update`], after which it
    /// updates on its own phase.
    pub fn add_caster(&mut self, caster: Caster) -> CasterId {
        let tick = self.next_phase;
        self.next_phase = (self.next_phase + 1) & TICK_COUNT;
        let (idx, generation) = self.casters.insert(CasterSlot {
            previous_shadow_group: caster.shadow_group,
            previous_casts_shadows: caster.casts_shadows(),
            caster,
            bucket: None,
            group: None,
            tick,
            force_update: true,
            static_entry: None,
        });
        let id = CasterId::new(idx, generation);
        self.enable_caster(id);
        id
    }

    /// Disable and free a caster. Its id becomes stale.
    pub fn remove_caster(&mut self, id: CasterId) -> Option<Caster> {
        self.disable_caster(id);
        self.casters
            .remove(id.idx(), id.generation())
            .map(|slot| slot.caster)
    }

    /// Whether `id` refers to a live caster.
    pub fn is_alive(&self, id: CasterId) -> bool {
        self.casters.is_live(id.idx(), id.generation())
    }

    /// Whether `id` is live and registered.
    pub fn is_enabled(&self, id: CasterId) -> bool {
        self.slot(id).is_some_and(|s| s.bucket.is_some())
    }

    /// The caster behind `id`.
    pub fn caster(&self, id: CasterId) -> Option<&Caster> {
        self.slot(id).map(|s| &s.caster)
    }

    /// Mutable access to a caster.
    ///
    /// Static casters are re-indexed only when force-updated. Changing the
    /// [`CasterFlags::STATIC`] or [`CasterFlags::PERSISTENT`] flags takes effect when the
    /// caster is next enabled.
    pub fn caster_mut(&mut self, id: CasterId) -> Option<&mut Caster> {
        self.casters
            .get_mut(id.idx(), id.generation())
            .map(|s| &mut s.caster)
    }

    /// Live caster ids in slot order.
    pub fn caster_ids(&self) -> impl Iterator<Item = CasterId> + '_ {
        self.casters
            .live()
            .map(|(i, generation, _)| CasterId::new(i, generation))
    }

    /// The group `id` currently belongs to.
    pub fn group_of(&self, id: CasterId) -> Option<GroupRef> {
        self.slot(id).and_then(|s| s.group)
    }

    fn slot(&self, id: CasterId) -> Option<&CasterSlot> {
        self.casters.get(id.idx(), id.generation())
    }

    /// Register `id` into exactly one of the persistent, static, or dynamic lists.
    ///
    /// Returns `false` if the caster is stale or already enabled.
    pub fn enable_caster(&mut self, id: CasterId) -> bool {
        let Some(slot) = self.casters.get_mut(id.idx(), id.generation()) else {
            return false;
        };
        if slot.bucket.is_some() {
            return false;
        }
        let flags = slot.caster.flags;
        let bucket = if flags.contains(CasterFlags::PERSISTENT) {
            self.registry.register_persistent(id);
            Bucket::Persistent
        } else if flags.contains(CasterFlags::STATIC) {
            self.registry.register_static(id);
            let entry = RealmEntry {
                id,
                bounds: slot.caster.bounds,
            };
            self.realm.register_static(entry);
            slot.static_entry = Some(entry);
            Bucket::Static
        } else {
            self.registry.register_dynamic(id);
            Bucket::Dynamic
        };
        slot.bucket = Some(bucket);
        slot.group = None;
        slot.force_update = true;
        true
    }

    /// Unregister `id` from its list and leave its group. Returns `false` if not enabled.
    pub fn disable_caster(&mut self, id: CasterId) -> bool {
        let Some(slot) = self.casters.get_mut(id.idx(), id.generation()) else {
            return false;
        };
        let Some(bucket) = slot.bucket.take() else {
            return false;
        };
        match bucket {
            Bucket::Dynamic => {
                self.registry.unregister_dynamic(id);
            }
            Bucket::Persistent => {
                self.registry.unregister_persistent(id);
            }
            Bucket::Static => {
                self.registry.unregister_static(id);
                if let Some(entry) = slot.static_entry.take() {
                    self.realm.unregister_static(&entry);
                }
            }
        }
        let group = slot.group.take();
        self.registry.remove_from_shadow_caster_group(id, group);
        self.registry.remove_group(GroupRef::Caster(id));
        true
    }

    /// Run the next update of `id` regardless of its phase or static flag.
    pub fn force_update(&mut self, id: CasterId) {
        if let Some(slot) = self.casters.get_mut(id.idx(), id.generation()) {
            slot.force_update = true;
        }
    }

    // --- composites ---

    /// Add a composite with the given shadow group. It enters the ordered group list.
    pub fn add_composite(&mut self, shadow_group: i32) -> CompositeId {
        let (idx, generation) = self.composites.insert(CompositeSlot { shadow_group });
        let id = CompositeId::new(idx, generation);
        self.registry
            .add_group(GroupRef::Composite(id), shadow_group);
        id
    }

    /// Remove a composite. Its members fall back to their own shadow group and are
    /// re-resolved on their next update.
    pub fn remove_composite(&mut self, id: CompositeId) -> bool {
        if self.composites.remove(id.idx(), id.generation()).is_none() {
            return false;
        }
        let group = GroupRef::Composite(id);
        self.registry.remove_group(group);
        let members: Vec<CasterId> = self
            .registry
            .group(group)
            .map(|g| g.members().to_vec())
            .unwrap_or_default();
        for m in members {
            self.force_update(m);
        }
        true
    }

    /// Whether `id` refers to a live composite.
    pub fn is_composite_alive(&self, id: CompositeId) -> bool {
        self.composites.is_live(id.idx(), id.generation())
    }

    /// Shadow group of a composite.
    pub fn composite_shadow_group(&self, id: CompositeId) -> Option<i32> {
        self.composites
            .get(id.idx(), id.generation())
            .map(|c| c.shadow_group)
    }

    /// Change a composite's shadow group and move it in the ordered group list.
    pub fn set_composite_shadow_group(&mut self, id: CompositeId, shadow_group: i32) -> bool {
        let Some(slot) = self.composites.get_mut(id.idx(), id.generation()) else {
            return false;
        };
        if slot.shadow_group != shadow_group {
            slot.shadow_group = shadow_group;
            self.registry
                .add_group(GroupRef::Composite(id), shadow_group);
            log::debug!("composite {id:?} moved to shadow group {shadow_group}");
        }
        true
    }

    /// Shadow group `id` renders with: its composite's group when nested under a live
    /// composite, otherwise its own. `None` if stale or disabled.
    pub fn effective_shadow_group(&self, id: CasterId) -> Option<i32> {
        group_of(&self.casters, &self.composites, id)
    }

    // --- updates ---

    /// The logical update of one caster: resolve its group and fix up the group list.
    ///
    /// Dynamic casters run on their phase, once every `TICK_COUNT + 1` calls. Static
    /// casters run only after [`ShadowWorld::force_update`]; that is also when their
    /// static index entry is refreshed. Returns whether the update ran.
    pub fn update_caster(&mut self, id: CasterId, ancestry: &impl GroupAncestry) -> bool {
        let Some(slot) = self.casters.get_mut(id.idx(), id.generation()) else {
            return false;
        };
        let Some(bucket) = slot.bucket else {
            return false;
        };
        if !slot.force_update {
            if bucket == Bucket::Static {
                return false;
            }
            if slot.tick != 0 {
                slot.tick -= 1;
                return false;
            }
            slot.tick = TICK_COUNT;
        }
        slot.force_update = false;

        if bucket == Bucket::Static {
            let fresh = RealmEntry {
                id,
                bounds: slot.caster.bounds,
            };
            if slot.static_entry != Some(fresh) {
                if let Some(old) = slot.static_entry.take() {
                    self.realm.unregister_static(&old);
                }
                self.realm.register_static(fresh);
                slot.static_entry = Some(fresh);
            }
        }

        let own = GroupRef::Caster(id);
        let previous = slot.group;
        let joined = self
            .registry
            .add_to_shadow_caster_group(id, &mut slot.group, ancestry);
        if joined && slot.group.is_some() {
            if previous == Some(own) {
                self.registry.remove_group(own);
            }
            self.registry.remove_from_shadow_caster_group(id, previous);
            if slot.group == Some(own) && slot.caster.casts_shadows() {
                self.registry.add_group(own, slot.caster.shadow_group);
            }
        }

        let shadow_group = slot.caster.shadow_group;
        if shadow_group != slot.previous_shadow_group {
            slot.previous_shadow_group = shadow_group;
            if slot.group == Some(own) && self.registry.remove_group(own) {
                self.registry.add_group(own, shadow_group);
            }
        }

        let casts = slot.caster.casts_shadows();
        if casts != slot.previous_casts_shadows {
            slot.previous_casts_shadows = casts;
            if slot.group == Some(own) {
                if casts {
                    self.registry.add_group(own, shadow_group);
                } else {
                    self.registry.remove_group(own);
                }
            }
        }
        true
    }

    /// Run [`ShadowWorld::update_caster`] for every enabled caster. Returns how many ran.
    pub fn update(&mut self, ancestry: &impl GroupAncestry) -> usize {
        let ids: Vec<CasterId> = self.caster_ids().collect();
        ids.into_iter()
            .filter(|&id| self.update_caster(id, ancestry))
            .count()
    }

    // --- frame ---

    /// Initialize or re-initialize the realm over `rect`, re-indexing static casters.
    pub fn init_world(&mut self, rect: Rect) -> Result<()> {
        self.realm.init(rect)?;
        self.realm.clear_static();
        let Self { casters, realm, .. } = self;
        for (_, _, slot) in casters.live() {
            if let Some(entry) = slot.static_entry {
                realm.register_static(entry);
            }
        }
        Ok(())
    }

    /// Advance the dynamic rebuild by one slice of `iterations_per_frame` insertions.
    /// Returns `true` when a new tree was published.
    pub fn tick(&mut self) -> bool {
        let budget = self.realm.config().iterations_per_frame;
        let Self {
            casters,
            registry,
            realm,
            ..
        } = self;
        realm.tick(budget, registry.dynamic(), |id| {
            casters
                .get(id.idx(), id.generation())
                .filter(|s| s.bucket.is_some())
                .map(|s| s.caster.bounds)
        })
    }

    /// Rebuild the culled list for `viewport`.
    ///
    /// Casters overlapping the viewport in the static and active trees, plus every
    /// persistent caster, stably sorted ascending by effective shadow group.
    pub fn optimize_shadows(&mut self, viewport: Rect) {
        let Self {
            casters,
            composites,
            registry,
            realm,
            culled,
            ..
        } = self;
        culled.clear();
        realm.get_shadow_casters(culled, viewport, |id| group_of(casters, composites, id));
        culled.extend(
            registry
                .persistent()
                .iter()
                .copied()
                .filter(|&id| group_of(casters, composites, id).is_some()),
        );
        culled.sort_by_key(|&id| group_of(casters, composites, id).unwrap_or(i32::MAX));
    }

    /// The culled, group-sorted caster list from the last [`ShadowWorld::optimize_shadows`].
    pub fn culled_casters(&self) -> &[CasterId] {
        &self.culled
    }

    /// Scene unload: clear static registrations and the static tree.
    ///
    /// Static casters are disabled and must be enabled again to re-register.
    pub fn scene_unloaded(&mut self) {
        let statics: Vec<CasterId> = self.registry.statics().to_vec();
        self.registry.clear_static();
        self.realm.clear_static();
        for id in &statics {
            if let Some(slot) = self.casters.get_mut(id.idx(), id.generation()) {
                slot.static_entry = None;
            }
            self.disable_caster(*id);
        }
        self.culled.retain(|id| !statics.contains(id));
        log::debug!("scene unloaded, dropped {} static casters", statics.len());
    }
}
