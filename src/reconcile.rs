//! Grid reconciliation.
//!
//! [`GridState`] remembers which entity is rendered for each key.  Given a
//! fresh snapshot, [`plan`] computes the per-key operations that bring the
//! rendered state in line with it:
//!
//! | previous        | snapshot           | op        |
//! |-----------------|--------------------|-----------|
//! | absent          | none               | –         |
//! | absent          | kind K             | `Spawn`   |
//! | kind K          | none / missing     | `Destroy` |
//! | kind K          | kind K' ≠ K        | `Replace` |
//! | kind K          | kind K             | –         |
//!
//! Keys are independent of each other, so the result does not depend on
//! iteration order.  Ops are emitted in key order to keep logs stable.
//!
//! [`LevelTable`] covers the other half: pre-placed scenery whose discrete
//! state (open/closed, damage level) is toggled in place.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

use crate::error::{ClientError, ClientResult};
use crate::scene::Scene;
use crate::stage::Stage;
use crate::types::{EntityHandle, EntityKind, FireValue, PoiValue, Vec3};

pub trait CellValue: Copy + Eq + Debug {
    /// Visual to render for this value, `None` when nothing should be shown.
    fn kind(self) -> Option<EntityKind>;
}

impl CellValue for FireValue {
    fn kind(self) -> Option<EntityKind> {
        match self {
            FireValue::Clear => None,
            FireValue::Smoke => Some(EntityKind::Smoke),
            FireValue::Fire => Some(EntityKind::Fire),
        }
    }
}

impl CellValue for PoiValue {
    fn kind(self) -> Option<EntityKind> {
        match self {
            PoiValue::Empty => None,
            PoiValue::Hidden => Some(EntityKind::Poi),
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridOp<K> {
    Spawn { key: K, kind: EntityKind },
    Destroy { key: K },
    Replace { key: K, kind: EntityKind },
}

impl<K: Copy> GridOp<K> {
    pub fn key(&self) -> K {
        match self {
            GridOp::Spawn { key, .. } | GridOp::Destroy { key } | GridOp::Replace { key, .. } => {
                *key
            }
        }
    }
}

/// Ops applied by one reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport<K> {
    pub ops: Vec<GridOp<K>>,
}

impl<K> Default for ReconcileReport<K> {
    fn default() -> Self {
        Self { ops: Vec::new() }
    }
}

impl<K> ReconcileReport<K> {
    pub fn spawned(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, GridOp::Spawn { .. } | GridOp::Replace { .. }))
            .count()
    }

    pub fn destroyed(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, GridOp::Destroy { .. } | GridOp::Replace { .. }))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Grid state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedEntity {
    pub handle: EntityHandle,
    pub kind: EntityKind,
}

/// Rendered entity per key, carried across snapshot applications.
#[derive(Debug)]
pub struct GridState<K> {
    entries: HashMap<K, RenderedEntity>,
}

impl<K> Default for GridState<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

/// Pure diff of `snapshot` against `previous`.  Keys missing from the
/// snapshot count as none.
pub fn plan<K, V>(snapshot: &HashMap<K, V>, previous: &GridState<K>) -> Vec<GridOp<K>>
where
    K: Copy + Eq + Hash + Ord,
    V: CellValue,
{
    let keys: BTreeSet<K> = snapshot
        .keys()
        .chain(previous.entries.keys())
        .copied()
        .collect();

    keys.into_iter()
        .filter_map(|key| {
            let wanted = snapshot.get(&key).and_then(|v| v.kind());
            match (previous.entries.get(&key), wanted) {
                (None, None) => None,
                (None, Some(kind)) => Some(GridOp::Spawn { key, kind }),
                (Some(_), None) => Some(GridOp::Destroy { key }),
                (Some(current), Some(kind)) if current.kind != kind => {
                    Some(GridOp::Replace { key, kind })
                }
                (Some(_), Some(_)) => None,
            }
        })
        .collect()
}

impl<K> GridState<K>
where
    K: Copy + Eq + Hash + Ord + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&RenderedEntity> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Diff against `snapshot` and apply the result through `stage`.
    pub fn reconcile<V, S>(
        &mut self,
        snapshot: &HashMap<K, V>,
        stage: &mut Stage<S>,
        place: impl Fn(K) -> Vec3,
    ) -> ReconcileReport<K>
    where
        V: CellValue,
        S: Scene,
    {
        let ops = plan(snapshot, self);
        self.apply(&ops, stage, place);
        ReconcileReport { ops }
    }

    /// Apply previously planned ops.
    pub fn apply<S: Scene>(
        &mut self,
        ops: &[GridOp<K>],
        stage: &mut Stage<S>,
        place: impl Fn(K) -> Vec3,
    ) {
        for op in ops {
            match *op {
                GridOp::Spawn { key, kind } => {
                    let handle = stage.spawn(kind, place(key));
                    self.entries.insert(key, RenderedEntity { handle, kind });
                }
                GridOp::Destroy { key } => {
                    if let Some(old) = self.entries.remove(&key) {
                        stage.destroy(old.handle);
                    }
                }
                GridOp::Replace { key, kind } => {
                    if let Some(old) = self.entries.remove(&key) {
                        stage.destroy(old.handle);
                    }
                    let handle = stage.spawn(kind, place(key));
                    self.entries.insert(key, RenderedEntity { handle, kind });
                }
            }
        }
    }

    /// Remove and release one key outside of a snapshot pass.
    pub fn remove<S: Scene>(&mut self, key: &K, stage: &mut Stage<S>) -> Option<RenderedEntity> {
        let old = self.entries.remove(key)?;
        stage.destroy(old.handle);
        Some(old)
    }

    /// Release every rendered entity.
    pub fn clear<S: Scene>(&mut self, stage: &mut Stage<S>) {
        for (_, e) in self.entries.drain() {
            stage.destroy(e.handle);
        }
    }
}

// ---------------------------------------------------------------------------
// Level table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Slot {
    handle: EntityHandle,
    level: u8,
}

/// Discrete per-key state of pre-placed scenery.
#[derive(Debug)]
pub struct LevelTable<K> {
    slots: HashMap<K, Slot>,
}

impl<K> Default for LevelTable<K> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<K> LevelTable<K>
where
    K: Copy + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, key: K, handle: EntityHandle) {
        if let Some(prev) = self.slots.insert(key, Slot { handle, level: 0 }) {
            log::warn!("{:?} rebound from {} to {}", key, prev.handle, handle);
        }
    }

    pub fn level(&self, key: &K) -> Option<u8> {
        self.slots.get(key).map(|s| s.level)
    }

    pub fn handle(&self, key: &K) -> Option<EntityHandle> {
        self.slots.get(key).map(|s| s.handle)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.slots.keys()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Set `key` to `level`.  Returns whether the visual changed.
    pub fn set<S: Scene>(&mut self, key: K, level: u8, stage: &mut Stage<S>) -> ClientResult<bool> {
        let slot = self
            .slots
            .get_mut(&key)
            .ok_or_else(|| ClientError::Mapping(format!("{:?}", key)))?;
        if slot.level == level {
            return Ok(false);
        }
        slot.level = level;
        stage.set_visual_state(slot.handle, level);
        Ok(true)
    }

    /// Return every slot to level 0.
    pub fn reset<S: Scene>(&mut self, stage: &mut Stage<S>) {
        for slot in self.slots.values_mut() {
            if slot.level != 0 {
                slot.level = 0;
                stage.set_visual_state(slot.handle, 0);
            }
        }
    }
}
