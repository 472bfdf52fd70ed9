//! `Stage` – sole owner of the scene and of every entity spawned through it.
//!
//! Besides forwarding create/destroy to the [`Scene`], the stage runs the two
//! pieces of timed work the client needs:
//!
//! - **Tweens**: linear motion toward a target at a fixed speed, one per
//!   entity.  Starting a new tween for an entity replaces the old one.
//! - **Scheduled despawns**: one-shot removals after a delay.
//!
//! Both advance only in [`Stage::tick`].  Releasing an entity cancels its
//! tween and its pending despawn first, so neither can touch a freed handle.

use std::collections::HashMap;
use std::time::Duration;

use crate::scene::Scene;
use crate::types::{EntityHandle, EntityKind, Vec3};

#[derive(Debug, Clone, Copy)]
struct Tween {
    target: Vec3,
    speed: f32,
}

#[derive(Debug, Clone, Copy)]
struct Live {
    kind: EntityKind,
    position: Vec3,
}

/// What a single [`Stage::tick`] did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickOutcome {
    /// Entities whose tween reached its target this tick.
    pub arrived: Vec<EntityHandle>,
    /// Entities released by an expired despawn timer.
    pub expired: Vec<EntityHandle>,
}

pub struct Stage<S: Scene> {
    scene: S,
    live: HashMap<EntityHandle, Live>,
    tweens: HashMap<EntityHandle, Tween>,
    despawns: HashMap<EntityHandle, Duration>,
    snap_epsilon: f32,
}

impl<S: Scene> Stage<S> {
    pub fn new(scene: S, snap_epsilon: f32) -> Self {
        Self {
            scene,
            live: HashMap::new(),
            tweens: HashMap::new(),
            despawns: HashMap::new(),
            snap_epsilon,
        }
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn spawn(&mut self, kind: EntityKind, position: Vec3) -> EntityHandle {
        let handle = self.scene.spawn(kind, position);
        self.live.insert(handle, Live { kind, position });
        log::debug!("Spawned {:?} {} at {}", kind, handle, position);
        handle
    }

    /// Release an entity.  Returns `false` if it was already gone.
    pub fn destroy(&mut self, handle: EntityHandle) -> bool {
        let Some(live) = self.live.remove(&handle) else {
            return false;
        };
        self.tweens.remove(&handle);
        self.despawns.remove(&handle);
        self.scene.destroy(handle);
        log::debug!("Destroyed {:?} {}", live.kind, handle);
        true
    }

    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn kind(&self, handle: EntityHandle) -> Option<EntityKind> {
        self.live.get(&handle).map(|l| l.kind)
    }

    pub fn position(&self, handle: EntityHandle) -> Option<Vec3> {
        self.live.get(&handle).map(|l| l.position)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Visual state changes also apply to pre-placed scenery the stage never
    /// spawned, so this goes straight to the scene.
    pub fn set_visual_state(&mut self, handle: EntityHandle, level: u8) {
        self.scene.set_visual_state(handle, level);
    }

    pub fn find(&self, name: &str) -> Option<EntityHandle> {
        self.scene.find(name)
    }

    // -----------------------------------------------------------------------
    // Timed work
    // -----------------------------------------------------------------------

    /// Start moving `handle` toward `target`, cancelling any motion in flight.
    pub fn start_tween(&mut self, handle: EntityHandle, target: Vec3, speed: f32) -> bool {
        if !self.live.contains_key(&handle) {
            return false;
        }
        if self.tweens.insert(handle, Tween { target, speed }).is_some() {
            log::debug!("Tween for {} replaced", handle);
        }
        true
    }

    pub fn is_tweening(&self, handle: EntityHandle) -> bool {
        self.tweens.contains_key(&handle)
    }

    pub fn despawn_after(&mut self, handle: EntityHandle, delay: Duration) -> bool {
        if !self.live.contains_key(&handle) {
            return false;
        }
        self.despawns.insert(handle, delay);
        true
    }

    pub fn has_pending_despawn(&self, handle: EntityHandle) -> bool {
        self.despawns.contains_key(&handle)
    }

    /// Advance every tween and timer by `dt`.
    pub fn tick(&mut self, dt: Duration) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let secs = dt.as_secs_f32();

        let mut handles: Vec<_> = self.tweens.keys().copied().collect();
        handles.sort();
        for handle in handles {
            let (Some(tween), Some(live)) = (self.tweens.get(&handle), self.live.get_mut(&handle))
            else {
                continue;
            };
            let tween = *tween;
            let mut next = live.position.move_towards(tween.target, tween.speed * secs);
            let done = next.distance(tween.target) <= self.snap_epsilon;
            if done {
                next = tween.target;
            }
            live.position = next;
            self.scene.set_position(handle, next);
            if done {
                self.tweens.remove(&handle);
                outcome.arrived.push(handle);
            }
        }

        let mut due = Vec::new();
        for (handle, remaining) in self.despawns.iter_mut() {
            *remaining = remaining.saturating_sub(dt);
            if remaining.is_zero() {
                due.push(*handle);
            }
        }
        due.sort();
        for handle in due {
            if self.destroy(handle) {
                outcome.expired.push(handle);
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::HeadlessScene;

    fn stage() -> Stage<HeadlessScene> {
        Stage::new(HeadlessScene::new(), 0.01)
    }

    #[test]
    fn tween_moves_at_fixed_speed_then_snaps() {
        let mut s = stage();
        let h = s.spawn(EntityKind::Agent, Vec3::zero());
        s.start_tween(h, Vec3::new(2.0, 0.0, 0.0), 5.0);

        s.tick(Duration::from_millis(200));
        let p = s.position(h).unwrap();
        assert!((p.x - 1.0).abs() < 1e-4);
        assert!(s.is_tweening(h));

        let out = s.tick(Duration::from_millis(300));
        assert_eq!(out.arrived, vec![h]);
        assert_eq!(s.position(h).unwrap(), Vec3::new(2.0, 0.0, 0.0));
        assert!(!s.is_tweening(h));
    }

    #[test]
    fn new_tween_replaces_running_one() {
        let mut s = stage();
        let h = s.spawn(EntityKind::Agent, Vec3::zero());
        s.start_tween(h, Vec3::new(10.0, 0.0, 0.0), 1.0);
        s.start_tween(h, Vec3::new(0.0, 0.0, -10.0), 1.0);
        s.tick(Duration::from_secs(1));
        let p = s.position(h).unwrap();
        assert!(p.x.abs() < 1e-4);
        assert!((p.z + 1.0).abs() < 1e-4);
    }

    #[test]
    fn destroy_cancels_tween_and_despawn() {
        let mut s = stage();
        let h = s.spawn(EntityKind::Victim, Vec3::zero());
        s.start_tween(h, Vec3::new(1.0, 0.0, 0.0), 1.0);
        s.despawn_after(h, Duration::from_secs(1));

        assert!(s.destroy(h));
        assert!(!s.is_tweening(h));
        assert!(!s.has_pending_despawn(h));

        let out = s.tick(Duration::from_secs(2));
        assert!(out.expired.is_empty());
        assert_eq!(s.scene().destroy_count(), 1);
        assert!(!s.destroy(h));
    }

    #[test]
    fn despawn_fires_once_after_delay() {
        let mut s = stage();
        let h = s.spawn(EntityKind::FalseAlarm, Vec3::zero());
        s.despawn_after(h, Duration::from_secs(3));

        assert!(s.tick(Duration::from_secs(2)).expired.is_empty());
        assert_eq!(s.tick(Duration::from_secs(1)).expired, vec![h]);
        assert!(s.tick(Duration::from_secs(5)).expired.is_empty());
        assert_eq!(s.scene().destroy_count(), 1);
    }
}
