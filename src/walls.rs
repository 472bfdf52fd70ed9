//! Wall damage on pre-placed wall objects.

use std::collections::HashMap;

use crate::error::{ClientError, ClientResult};
use crate::reconcile::LevelTable;
use crate::scene::Scene;
use crate::stage::Stage;
use crate::types::{Direction, EntityHandle, GridCell, WallDamage, WallKey};

#[derive(Debug, Default)]
pub struct WallLayer {
    table: LevelTable<WallKey>,
}

impl WallLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, key: WallKey, handle: EntityHandle) {
        self.table.bind(key, handle);
    }

    pub fn damage(&self, key: &WallKey) -> Option<u8> {
        self.table.level(key)
    }

    pub fn bound(&self) -> usize {
        self.table.len()
    }

    /// Bring every bound wall to the level reported by the snapshot.  Keys
    /// outside the snapshot grid keep their current level.  Returns the
    /// number of walls whose visual changed.
    pub fn reconcile<S: Scene>(
        &mut self,
        snapshot: &HashMap<WallKey, WallDamage>,
        stage: &mut Stage<S>,
    ) -> usize {
        let keys: Vec<WallKey> = self.table.keys().copied().collect();
        let mut changed = 0;
        for key in keys {
            let Some(damage) = snapshot.get(&key) else {
                continue;
            };
            if let Ok(true) = self.table.set(key, damage.level(), stage) {
                log::debug!("Wall {} now {:?}", key, damage);
                changed += 1;
            }
        }
        changed
    }

    /// Apply damage to the wall between `a` and `b`, both faces.  Returns the
    /// number of faces whose visual changed.  Faces with no bound object are
    /// reported as a mapping error only if neither face is bound.
    pub fn strike<S: Scene>(
        &mut self,
        a: GridCell,
        b: GridCell,
        damage: WallDamage,
        stage: &mut Stage<S>,
    ) -> ClientResult<usize> {
        let direction = Direction::between(a, b).ok_or_else(|| {
            ClientError::Mapping(format!("wall between non-adjacent {} and {}", a, b))
        })?;
        let near = WallKey::new(a, direction);
        let far = WallKey::new(b, direction.opposite());

        let mut changed = 0;
        let mut bound = 0;
        for key in [near, far] {
            match self.table.set(key, damage.level(), stage) {
                Ok(c) => {
                    bound += 1;
                    changed += c as usize;
                }
                Err(e) => log::debug!("Wall face skipped: {}", e),
            }
        }

        if bound == 0 {
            return Err(ClientError::Mapping(format!("wall {}", near)));
        }
        Ok(changed)
    }

    pub fn reset<S: Scene>(&mut self, stage: &mut Stage<S>) {
        self.table.reset(stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::HeadlessScene;
    use crate::types::{EntityKind, Vec3};

    fn setup() -> (WallLayer, Stage<HeadlessScene>, WallKey) {
        let mut stage = Stage::new(HeadlessScene::new(), 0.01);
        let mut walls = WallLayer::new();
        let key = WallKey::new(GridCell::new(1, 1), Direction::East);
        let near = stage.scene_mut().add_fixture("wall (1)", EntityKind::Wall, Vec3::zero());
        let far = stage.scene_mut().add_fixture("wall (2)", EntityKind::Wall, Vec3::zero());
        walls.bind(key, near);
        walls.bind(key.mirrored().unwrap(), far);
        (walls, stage, key)
    }

    #[test]
    fn strike_marks_both_faces() {
        let (mut walls, mut stage, key) = setup();
        let changed = walls
            .strike(GridCell::new(1, 1), GridCell::new(1, 2), WallDamage::Damaged, &mut stage)
            .unwrap();
        assert_eq!(changed, 2);
        assert_eq!(walls.damage(&key), Some(1));
        assert_eq!(walls.damage(&key.mirrored().unwrap()), Some(1));

        let again = walls
            .strike(GridCell::new(1, 2), GridCell::new(1, 1), WallDamage::Damaged, &mut stage)
            .unwrap();
        assert_eq!(again, 0);
    }

    #[test]
    fn strike_on_unbound_wall_is_a_mapping_error() {
        let (mut walls, mut stage, _) = setup();
        let err = walls
            .strike(GridCell::new(4, 4), GridCell::new(5, 4), WallDamage::Demolished, &mut stage)
            .unwrap_err();
        assert!(matches!(err, ClientError::Mapping(_)));
        assert!(walls
            .strike(GridCell::new(0, 0), GridCell::new(2, 2), WallDamage::Damaged, &mut stage)
            .is_err());
    }

    #[test]
    fn reconcile_follows_snapshot_levels() {
        let (mut walls, mut stage, key) = setup();
        let mut snap = HashMap::new();
        snap.insert(key, WallDamage::Demolished);
        snap.insert(key.mirrored().unwrap(), WallDamage::Intact);
        assert_eq!(walls.reconcile(&snap, &mut stage), 1);
        assert_eq!(walls.damage(&key), Some(2));
        assert_eq!(walls.reconcile(&snap, &mut stage), 0);
    }
}
