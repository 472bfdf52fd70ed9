//! Render boundary.
//!
//! The engine side implements [`Scene`]; everything in this crate talks to it
//! only through handles.  [`HeadlessScene`] is an in-memory implementation
//! that records each call, used by the CLI and the tests.

use std::collections::HashMap;

use crate::config::ScenerySettings;
use crate::layout::GridLayout;
use crate::types::{EntityHandle, EntityKind, Vec3};

pub trait Scene {
    /// Instantiate a visual of `kind` at `position`.
    fn spawn(&mut self, kind: EntityKind, position: Vec3) -> EntityHandle;
    fn destroy(&mut self, handle: EntityHandle);
    fn set_position(&mut self, handle: EntityHandle, position: Vec3);
    /// Discrete visual state: door open level, wall damage level, agent load.
    fn set_visual_state(&mut self, handle: EntityHandle, level: u8);
    /// Look up a pre-placed scene object by name.
    fn find(&self, name: &str) -> Option<EntityHandle>;
}

// ---------------------------------------------------------------------------
// Headless implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SceneOp {
    Spawn {
        handle: EntityHandle,
        kind: EntityKind,
        position: Vec3,
    },
    Destroy {
        handle: EntityHandle,
    },
    SetPosition {
        handle: EntityHandle,
        position: Vec3,
    },
    SetVisualState {
        handle: EntityHandle,
        level: u8,
    },
}

#[derive(Debug, Clone)]
pub struct HeadlessEntity {
    pub kind: EntityKind,
    pub position: Vec3,
    pub level: u8,
    pub name: Option<String>,
}

/// Scene mirror with an operation log.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    entities: HashMap<EntityHandle, HeadlessEntity>,
    names: HashMap<String, EntityHandle>,
    ops: Vec<SceneOp>,
    next_id: u64,
    /// Log every op at `debug` level as it happens.
    pub trace_ops: bool,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-placed object (a wall or door already in the level).
    pub fn add_fixture(
        &mut self,
        name: impl Into<String>,
        kind: EntityKind,
        position: Vec3,
    ) -> EntityHandle {
        let name = name.into();
        let handle = self.issue();
        self.entities.insert(
            handle,
            HeadlessEntity {
                kind,
                position,
                level: 0,
                name: Some(name.clone()),
            },
        );
        self.names.insert(name, handle);
        handle
    }

    /// A scene holding one fixture per scenery binding, placed from `layout`.
    /// Bindings that do not resolve are skipped.
    pub fn with_scenery(scenery: &ScenerySettings, layout: &GridLayout) -> Self {
        let mut scene = Self::new();
        for door in &scenery.doors {
            if let Ok(key) = door.key() {
                scene.add_fixture(door.name.clone(), EntityKind::Door, layout.door_to_world(key));
            }
        }
        for wall in &scenery.walls {
            let position = match (wall.position, wall.key(layout)) {
                (Some(pos), _) => pos,
                (None, Ok(key)) => layout.wall_to_world(key),
                (None, Err(_)) => continue,
            };
            scene.add_fixture(wall.name.clone(), EntityKind::Wall, position);
        }
        scene
    }

    pub fn entity(&self, handle: EntityHandle) -> Option<&HeadlessEntity> {
        self.entities.get(&handle)
    }

    pub fn is_alive(&self, handle: EntityHandle) -> bool {
        self.entities.contains_key(&handle)
    }

    /// Live entities of `kind` (fixtures included).
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.values().filter(|e| e.kind == kind).count()
    }

    /// Live entities of `kind` at `position` (within a millimetre).
    pub fn kinds_at(&self, position: Vec3) -> Vec<EntityKind> {
        self.entities
            .values()
            .filter(|e| e.position.distance(position) < 1e-3)
            .map(|e| e.kind)
            .collect()
    }

    pub fn ops(&self) -> &[SceneOp] {
        &self.ops
    }

    /// Drain the op log (entities are kept).
    pub fn take_ops(&mut self) -> Vec<SceneOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn spawn_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SceneOp::Spawn { .. }))
            .count()
    }

    pub fn destroy_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, SceneOp::Destroy { .. }))
            .count()
    }

    fn issue(&mut self) -> EntityHandle {
        self.next_id += 1;
        EntityHandle(self.next_id)
    }

    fn record(&mut self, op: SceneOp) {
        if self.trace_ops {
            log::debug!("[scene] {:?}", op);
        }
        self.ops.push(op);
    }
}

impl Scene for HeadlessScene {
    fn spawn(&mut self, kind: EntityKind, position: Vec3) -> EntityHandle {
        let handle = self.issue();
        self.entities.insert(
            handle,
            HeadlessEntity {
                kind,
                position,
                level: 0,
                name: None,
            },
        );
        self.record(SceneOp::Spawn {
            handle,
            kind,
            position,
        });
        handle
    }

    fn destroy(&mut self, handle: EntityHandle) {
        if self.entities.remove(&handle).is_none() {
            log::warn!("[scene] destroy of unknown entity {}", handle);
            return;
        }
        self.record(SceneOp::Destroy { handle });
    }

    fn set_position(&mut self, handle: EntityHandle, position: Vec3) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.position = position;
            self.record(SceneOp::SetPosition { handle, position });
        }
    }

    fn set_visual_state(&mut self, handle: EntityHandle, level: u8) {
        if let Some(e) = self.entities.get_mut(&handle) {
            e.level = level;
            self.record(SceneOp::SetVisualState { handle, level });
        }
    }

    fn find(&self, name: &str) -> Option<EntityHandle> {
        self.names.get(name).copied()
    }
}
