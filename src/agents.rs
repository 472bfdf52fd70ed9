//! Firefighter agents.
//!
//! Agents are keyed by simulation id rather than by cell: they move, so a
//! cell-keyed diff would churn a destroy/spawn pair for every step.  Motion
//! comes from `move`/`knock_out` events; [`AgentLayer::catch_up`] covers
//! agents whose events were skipped.

use std::collections::{HashMap, HashSet};

use crate::error::{ClientError, ClientResult};
use crate::layout::GridLayout;
use crate::protocol::AgentRecord;
use crate::scene::Scene;
use crate::stage::Stage;
use crate::types::{EntityHandle, EntityKind, GridCell, Vec3};

#[derive(Debug, Clone, Copy)]
struct AgentSlot {
    handle: EntityHandle,
    /// Cell the agent is at, or heading to.
    cell: GridCell,
    carrying: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AgentSync {
    pub spawned: usize,
    pub destroyed: usize,
    pub restyled: usize,
}

#[derive(Debug, Default)]
pub struct AgentLayer {
    slots: HashMap<u32, AgentSlot>,
}

impl AgentLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn handle(&self, id: u32) -> Option<EntityHandle> {
        self.slots.get(&id).map(|s| s.handle)
    }

    pub fn cell(&self, id: u32) -> Option<GridCell> {
        self.slots.get(&id).map(|s| s.cell)
    }

    pub fn carrying(&self, id: u32) -> Option<bool> {
        self.slots.get(&id).map(|s| s.carrying)
    }

    /// Current world positions of every agent, for door proximity.
    pub fn positions<S: Scene>(&self, stage: &Stage<S>) -> Vec<Vec3> {
        self.slots
            .values()
            .filter_map(|s| stage.position(s.handle))
            .collect()
    }

    /// Spawn new agents, drop departed ones and refresh the carrying visual.
    pub fn reconcile<S: Scene>(
        &mut self,
        records: &[AgentRecord],
        stage: &mut Stage<S>,
        layout: &GridLayout,
    ) -> AgentSync {
        let mut sync = AgentSync::default();
        let present: HashSet<u32> = records.iter().map(|r| r.id).collect();

        let mut gone: Vec<u32> = self
            .slots
            .keys()
            .filter(|id| !present.contains(*id))
            .copied()
            .collect();
        gone.sort_unstable();
        for id in gone {
            if let Some(slot) = self.slots.remove(&id) {
                stage.destroy(slot.handle);
                log::debug!("Agent {} left", id);
                sync.destroyed += 1;
            }
        }

        for record in records {
            match self.slots.get_mut(&record.id) {
                Some(slot) => {
                    if slot.carrying != record.carrying {
                        slot.carrying = record.carrying;
                        stage.set_visual_state(slot.handle, record.carrying as u8);
                        sync.restyled += 1;
                    }
                }
                None => {
                    let cell = record.cell();
                    let handle = stage.spawn(EntityKind::Agent, layout.cell_to_world(cell));
                    if record.carrying {
                        stage.set_visual_state(handle, 1);
                    }
                    self.slots.insert(
                        record.id,
                        AgentSlot {
                            handle,
                            cell,
                            carrying: record.carrying,
                        },
                    );
                    log::debug!("Agent {} joined at {}", record.id, cell);
                    sync.spawned += 1;
                }
            }
        }

        sync
    }

    /// Start moving agent `id` toward `target`.
    pub fn transition<S: Scene>(
        &mut self,
        id: u32,
        target: GridCell,
        speed: f32,
        stage: &mut Stage<S>,
        layout: &GridLayout,
    ) -> ClientResult<EntityHandle> {
        let slot = self
            .slots
            .get_mut(&id)
            .ok_or_else(|| ClientError::Mapping(format!("agent {}", id)))?;
        slot.cell = target;
        stage.start_tween(slot.handle, layout.cell_to_world(target), speed);
        Ok(slot.handle)
    }

    /// Send agents whose tracked cell disagrees with the snapshot, and that
    /// are not already moving, to their reported cell.
    pub fn catch_up<S: Scene>(
        &mut self,
        records: &[AgentRecord],
        speed: f32,
        stage: &mut Stage<S>,
        layout: &GridLayout,
    ) -> usize {
        let mut moved = 0;
        for record in records {
            let Some(slot) = self.slots.get_mut(&record.id) else {
                continue;
            };
            if slot.cell != record.cell() && !stage.is_tweening(slot.handle) {
                log::debug!("Agent {} drifted, moving to {}", record.id, record.cell());
                slot.cell = record.cell();
                stage.start_tween(slot.handle, layout.cell_to_world(slot.cell), speed);
                moved += 1;
            }
        }
        moved
    }

    pub fn clear<S: Scene>(&mut self, stage: &mut Stage<S>) {
        for (_, slot) in self.slots.drain() {
            stage.destroy(slot.handle);
        }
    }
}
