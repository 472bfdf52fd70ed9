//! Door state on pre-placed door objects.
//!
//! Doors are driven either by `open_door`/`close_door` events or, in
//! proximity mode, by agents standing near them.  A door missing from the
//! snapshot's door list has been blown away and stays destroyed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::layout::GridLayout;
use crate::reconcile::LevelTable;
use crate::scene::Scene;
use crate::stage::Stage;
use crate::types::{DoorKey, DoorState, EntityHandle, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorMode {
    /// Open/close only on simulation events.
    #[default]
    Events,
    /// Open while an agent is within the proximity radius.
    Proximity,
}

#[derive(Debug, Default)]
pub struct DoorLayer {
    table: LevelTable<DoorKey>,
}

impl DoorLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, key: DoorKey, handle: EntityHandle) {
        self.table.bind(key, handle);
    }

    pub fn state(&self, key: &DoorKey) -> Option<DoorState> {
        self.table.level(key).map(DoorState::from_level)
    }

    pub fn bound(&self) -> usize {
        self.table.len()
    }

    /// Toggle a door.  Destroyed doors ignore toggles.  Returns whether the
    /// visual changed.
    pub fn toggle<S: Scene>(
        &mut self,
        key: DoorKey,
        state: DoorState,
        stage: &mut Stage<S>,
    ) -> ClientResult<bool> {
        match self.state(&key) {
            None => Err(ClientError::Mapping(format!("door {}", key))),
            Some(DoorState::Destroyed) => Ok(false),
            Some(_) => {
                let changed = self.table.set(key, state.level(), stage)?;
                if changed {
                    log::info!("Door {} -> {:?}", key, state);
                }
                Ok(changed)
            }
        }
    }

    /// Mark bound doors absent from `standing` as destroyed.
    pub fn reconcile<S: Scene>(&mut self, standing: &HashSet<DoorKey>, stage: &mut Stage<S>) -> usize {
        let gone: Vec<DoorKey> = self
            .table
            .keys()
            .filter(|k| !standing.contains(*k))
            .copied()
            .collect();

        let mut changed = 0;
        for key in gone {
            if let Ok(true) = self.table.set(key, DoorState::Destroyed.level(), stage) {
                log::info!("Door {} destroyed", key);
                changed += 1;
            }
        }
        changed
    }

    /// Proximity mode: open doors with an agent within `radius`, close the rest.
    pub fn update_proximity<S: Scene>(
        &mut self,
        agents: &[Vec3],
        radius: f32,
        layout: &GridLayout,
        stage: &mut Stage<S>,
    ) -> usize {
        let keys: Vec<DoorKey> = self.table.keys().copied().collect();
        let mut changed = 0;
        for key in keys {
            let centre = layout.door_to_world(key);
            let near = agents.iter().any(|p| p.distance(centre) <= radius);
            let want = if near { DoorState::Open } else { DoorState::Closed };
            if let Ok(true) = self.toggle(key, want, stage) {
                changed += 1;
            }
        }
        changed
    }

    pub fn reset<S: Scene>(&mut self, stage: &mut Stage<S>) {
        self.table.reset(stage);
    }
}
