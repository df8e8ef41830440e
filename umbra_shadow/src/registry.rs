// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Caster registry: static, dynamic, and persistent lists, shadow groups, and the ordered
//! group list.

use std::collections::HashMap;

use crate::types::{CasterId, CompositeId, GroupRef};

/// Resolves the composite a caster is grouped under.
///
/// Grouping is defined by nesting in the host's scene tree. The registry never walks that
/// tree itself; the host answers through this trait.
pub trait GroupAncestry {
    /// The outermost composite above `caster`, or `None` if it is not nested under one.
    fn group_ancestor(&self, caster: CasterId) -> Option<CompositeId>;
}

/// Every caster is its own group.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoAncestry;

impl GroupAncestry for NoAncestry {
    #[inline]
    fn group_ancestor(&self, _caster: CasterId) -> Option<CompositeId> {
        None
    }
}

impl<F: Fn(CasterId) -> Option<CompositeId>> GroupAncestry for F {
    #[inline]
    fn group_ancestor(&self, caster: CasterId) -> Option<CompositeId> {
        self(caster)
    }
}

/// Parent links of a host scene tree.
pub trait SceneParent {
    /// Host scene node.
    type Node: Copy;

    /// Scene node carrying `caster`.
    fn node_of(&self, caster: CasterId) -> Option<Self::Node>;

    /// Parent of `node`, or `None` at a root.
    fn parent_of(&self, node: Self::Node) -> Option<Self::Node>;

    /// Composite attached to `node`, if any.
    fn composite_at(&self, node: Self::Node) -> Option<CompositeId>;
}

/// [`GroupAncestry`] over a [`SceneParent`]: walks strictly upward from the caster's parent
/// and keeps the last composite found, so the outermost composite wins.
#[derive(Clone, Debug)]
pub struct HierarchyAncestry<P>(pub P);

impl<P: SceneParent> GroupAncestry for HierarchyAncestry<P> {
    fn group_ancestor(&self, caster: CasterId) -> Option<CompositeId> {
        let scene = &self.0;
        let mut found = None;
        let mut cursor = scene.node_of(caster).and_then(|n| scene.parent_of(n));
        while let Some(node) = cursor {
            if let Some(composite) = scene.composite_at(node) {
                found = Some(composite);
            }
            cursor = scene.parent_of(node);
        }
        found
    }
}

/// Ordered, deduplicated members of one group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CasterGroup {
    members: Vec<CasterId>,
}

impl CasterGroup {
    /// Members in join order.
    pub fn members(&self) -> &[CasterId] {
        &self.members
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn insert(&mut self, caster: CasterId) {
        if !self.members.contains(&caster) {
            self.members.push(caster);
        }
    }

    fn remove(&mut self, caster: CasterId) -> bool {
        if let Some(pos) = self.members.iter().position(|&m| m == caster) {
            self.members.remove(pos);
            true
        } else {
            false
        }
    }
}

/// Bookkeeping for the casters of one world.
///
/// Every registration call is idempotent.
#[derive(Clone, Debug, Default)]
pub struct ShadowCasterRegistry {
    dynamic: Vec<CasterId>,
    statics: Vec<CasterId>,
    persistent: Vec<CasterId>,
    groups: Vec<(GroupRef, i32)>,
    members: HashMap<GroupRef, CasterGroup>,
}

fn add_unique(list: &mut Vec<CasterId>, caster: CasterId) -> bool {
    if list.contains(&caster) {
        return false;
    }
    list.push(caster);
    true
}

fn remove_one(list: &mut Vec<CasterId>, caster: CasterId) -> bool {
    if let Some(pos) = list.iter().position(|&c| c == caster) {
        list.remove(pos);
        true
    } else {
        false
    }
}

impl ShadowCasterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to the dynamic list. Returns `false` if already present.
    pub fn register_dynamic(&mut self, caster: CasterId) -> bool {
        add_unique(&mut self.dynamic, caster)
    }

    /// Add to the static list. Returns `false` if already present.
    pub fn register_static(&mut self, caster: CasterId) -> bool {
        add_unique(&mut self.statics, caster)
    }

    /// Add to the persistent list. Returns `false` if already present.
    pub fn register_persistent(&mut self, caster: CasterId) -> bool {
        add_unique(&mut self.persistent, caster)
    }

    /// Remove from the dynamic list. Returns `false` if absent.
    pub fn unregister_dynamic(&mut self, caster: CasterId) -> bool {
        remove_one(&mut self.dynamic, caster)
    }

    /// Remove from the static list. Returns `false` if absent.
    pub fn unregister_static(&mut self, caster: CasterId) -> bool {
        remove_one(&mut self.statics, caster)
    }

    /// Remove from the persistent list. Returns `false` if absent.
    pub fn unregister_persistent(&mut self, caster: CasterId) -> bool {
        remove_one(&mut self.persistent, caster)
    }

    /// Dynamic casters in registration order.
    pub fn dynamic(&self) -> &[CasterId] {
        &self.dynamic
    }

    /// Static casters in registration order.
    pub fn statics(&self) -> &[CasterId] {
        &self.statics
    }

    /// Persistent casters in registration order.
    pub fn persistent(&self) -> &[CasterId] {
        &self.persistent
    }

    /// Drop every static registration. Called on scene unload.
    pub fn clear_static(&mut self) {
        self.statics.clear();
    }

    /// Resolve the group `caster` belongs to and join it if it changed.
    ///
    /// The group is the outermost composite reported by `ancestry`, or the caster itself.
    /// When it differs from `current`, the caster joins it, `current` is updated, and
    /// `true` is returned; the caller then leaves the previous group and fixes up the
    /// group list. The previous group is not left here.
    pub fn add_to_shadow_caster_group(
        &mut self,
        caster: CasterId,
        current: &mut Option<GroupRef>,
        ancestry: &impl GroupAncestry,
    ) -> bool {
        let resolved = ancestry
            .group_ancestor(caster)
            .map_or(GroupRef::Caster(caster), GroupRef::Composite);
        if *current == Some(resolved) {
            return false;
        }
        self.members.entry(resolved).or_default().insert(caster);
        log::debug!("caster {caster:?} joined group {resolved:?} (was {current:?})");
        *current = Some(resolved);
        true
    }

    /// Leave `group`. A `None` group is ignored.
    pub fn remove_from_shadow_caster_group(&mut self, caster: CasterId, group: Option<GroupRef>) {
        let Some(group) = group else { return };
        if let Some(g) = self.members.get_mut(&group) {
            g.remove(caster);
            if g.is_empty() {
                self.members.remove(&group);
            }
        }
    }

    /// Members of `group`.
    pub fn group(&self, group: GroupRef) -> Option<&CasterGroup> {
        self.members.get(&group)
    }

    /// Insert `group` into the ordered group list under `shadow_group`.
    ///
    /// The list stays ascending by shadow group id; a group joining an id that is already
    /// present goes after the existing entries. Re-adding a listed group moves it.
    pub fn add_group(&mut self, group: GroupRef, shadow_group: i32) {
        self.remove_group(group);
        let pos = self
            .groups
            .iter()
            .position(|&(_, id)| id > shadow_group)
            .unwrap_or(self.groups.len());
        self.groups.insert(pos, (group, shadow_group));
    }

    /// Remove `group` from the ordered group list. Returns `false` if absent.
    pub fn remove_group(&mut self, group: GroupRef) -> bool {
        if let Some(pos) = self.groups.iter().position(|&(g, _)| g == group) {
            self.groups.remove(pos);
            true
        } else {
            false
        }
    }

    /// The ordered group list with each group's shadow group id.
    pub fn groups(&self) -> &[(GroupRef, i32)] {
        &self.groups
    }
}
