// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types: caster and composite identifiers, flags, layer and light filters.

/// Identifier for a caster in a [`ShadowWorld`](crate::ShadowWorld).
///
/// A slot index plus a generation counter. Removing a caster frees its slot; a later
/// caster reusing the slot gets a higher generation, so stale ids never alias it.
///
/// `CasterId`s order by slot, then generation. The order is only used for deterministic
/// tie-breaks.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CasterId(pub(crate) u32, pub(crate) u32);

impl CasterId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

/// Identifier for a composite caster: a grouping parent that makes every caster nested
/// below it share one shadow group.
///
/// Same slot and generation semantics as [`CasterId`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CompositeId(pub(crate) u32, pub(crate) u32);

impl CompositeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

/// Host-assigned light identity, compared by [`LightFilter`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LightId(pub u32);

/// The group a caster currently belongs to.
///
/// An ungrouped caster is its own group.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum GroupRef {
    /// The caster acts as its own group.
    Caster(CasterId),
    /// The caster is nested under a composite.
    Composite(CompositeId),
}

bitflags::bitflags! {
    /// Per-caster shadow switches.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CasterFlags: u8 {
        /// The caster emits shadow geometry.
        const CASTS_SHADOWS           = 0b0000_0001;
        /// Exclude the silhouettes of the caster's renderers from its group's shadow.
        const USE_RENDERER_SILHOUETTE = 0b0000_0010;
        /// Host-side data for lit shaders: the caster's own shape stays in its shadow.
        /// Shadow passes record the same commands with or without it.
        const SELF_SHADOWS            = 0b0000_0100;
        /// The caster never moves: indexed once in the static tree, updated only on demand.
        const STATIC                  = 0b0000_1000;
        /// Always rendered, never culled.
        const PERSISTENT              = 0b0001_0000;
    }
}

impl Default for CasterFlags {
    fn default() -> Self {
        Self::CASTS_SHADOWS | Self::USE_RENDERER_SILHOUETTE
    }
}

/// Shared shadow shader families. Selects a row of the renderer's material table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ShadowMaterialType {
    /// Extruded mesh shadows.
    MeshShadow,
    /// Standing sprite shadows, expanded from a single point.
    SpriteShadow,
    /// Flat sprite shadows drawn from a quad mesh.
    SpriteShadowSimple,
    /// Caster-supplied material; never shared.
    Custom,
}

impl ShadowMaterialType {
    /// Number of material types.
    pub const COUNT: usize = 4;

    /// Row of this type in a material table.
    pub const fn index(self) -> usize {
        match self {
            Self::MeshShadow => 0,
            Self::SpriteShadow => 1,
            Self::SpriteShadowSimple => 2,
            Self::Custom => 3,
        }
    }
}

/// Sorting layers a caster casts shadows into.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SortingLayers {
    /// Every layer.
    #[default]
    All,
    /// Only the listed layer ids.
    Only(Vec<i32>),
}

impl SortingLayers {
    /// Whether `layer` is shadowed.
    pub fn contains(&self, layer: i32) -> bool {
        match self {
            Self::All => true,
            Self::Only(layers) => layers.contains(&layer),
        }
    }
}

/// Per-caster allow or deny list of lights.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LightFilter {
    /// Every light sees this caster.
    #[default]
    Unrestricted,
    /// Listed lights ignore this caster.
    Deny(Vec<LightId>),
    /// Only listed lights see this caster.
    Allow(Vec<LightId>),
}

impl LightFilter {
    /// Whether `light` should draw this caster's shadow.
    pub fn admits(&self, light: LightId) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Deny(lights) => !lights.contains(&light),
            Self::Allow(lights) => lights.contains(&light),
        }
    }
}
