//! Points of interest: hidden markers plus short-lived reveals.
//!
//! Hidden POIs are a plain [`GridState`].  A reveal event swaps the marker for
//! a `Victim`/`FalseAlarm` visual that lives outside the grid state and is
//! removed by a stage timer.  The next snapshot usually reports the cell as
//! empty already, so a reveal must survive a reconcile pass that finds
//! nothing to do there; it is only cut short when the pass spawns a new
//! marker into the same cell.

use std::collections::HashMap;
use std::time::Duration;

use crate::layout::GridLayout;
use crate::reconcile::{GridOp, GridState, ReconcileReport};
use crate::scene::Scene;
use crate::stage::Stage;
use crate::types::{EntityHandle, EntityKind, GridCell, PoiValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    Victim,
    FalseAlarm,
}

impl RevealOutcome {
    pub fn kind(self) -> EntityKind {
        match self {
            RevealOutcome::Victim => EntityKind::Victim,
            RevealOutcome::FalseAlarm => EntityKind::FalseAlarm,
        }
    }
}

#[derive(Debug, Default)]
pub struct PoiLayer {
    markers: GridState<GridCell>,
    reveals: HashMap<GridCell, EntityHandle>,
}

impl PoiLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn markers(&self) -> &GridState<GridCell> {
        &self.markers
    }

    /// Handle of the reveal currently shown at `cell`, if any.
    pub fn reveal_at<S: Scene>(&self, cell: GridCell, stage: &Stage<S>) -> Option<EntityHandle> {
        self.reveals
            .get(&cell)
            .copied()
            .filter(|h| stage.contains(*h))
    }

    pub fn reconcile<S: Scene>(
        &mut self,
        snapshot: &HashMap<GridCell, PoiValue>,
        stage: &mut Stage<S>,
        layout: &GridLayout,
    ) -> ReconcileReport<GridCell> {
        self.forget_expired(stage);

        let ops = crate::reconcile::plan(snapshot, &self.markers);
        for op in &ops {
            if matches!(op, GridOp::Spawn { .. } | GridOp::Replace { .. }) {
                if let Some(h) = self.reveals.remove(&op.key()) {
                    log::debug!("Reveal at {} cut short by new marker", op.key());
                    stage.destroy(h);
                }
            }
        }
        self.markers.apply(&ops, stage, |c| layout.cell_to_world(c));
        ReconcileReport { ops }
    }

    /// Replace the marker at `cell` with a timed reveal.
    pub fn reveal<S: Scene>(
        &mut self,
        cell: GridCell,
        outcome: RevealOutcome,
        delay: Duration,
        stage: &mut Stage<S>,
        layout: &GridLayout,
    ) -> EntityHandle {
        if self.markers.remove(&cell, stage).is_none() {
            log::warn!("Reveal at {} with no POI marker rendered", cell);
        }
        if let Some(prev) = self.reveals.remove(&cell) {
            stage.destroy(prev);
        }

        let handle = stage.spawn(outcome.kind(), layout.cell_to_world(cell));
        stage.despawn_after(handle, delay);
        self.reveals.insert(cell, handle);
        log::info!("Revealed {:?} at {}", outcome, cell);
        handle
    }

    pub fn clear<S: Scene>(&mut self, stage: &mut Stage<S>) {
        self.markers.clear(stage);
        for (_, h) in self.reveals.drain() {
            stage.destroy(h);
        }
    }

    fn forget_expired<S: Scene>(&mut self, stage: &Stage<S>) {
        self.reveals.retain(|_, h| stage.contains(*h));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::HeadlessScene;

    fn snapshot(cells: &[(i32, i32)]) -> HashMap<GridCell, PoiValue> {
        let mut out = HashMap::new();
        for r in 0..3 {
            for c in 0..3 {
                out.insert(GridCell::new(r, c), PoiValue::Empty);
            }
        }
        for (r, c) in cells {
            out.insert(GridCell::new(*r, *c), PoiValue::Hidden);
        }
        out
    }

    #[test]
    fn reveal_survives_empty_snapshot_and_expires() {
        let layout = GridLayout::default();
        let mut stage = Stage::new(HeadlessScene::new(), 0.01);
        let mut poi = PoiLayer::new();
        let cell = GridCell::new(1, 1);

        poi.reconcile(&snapshot(&[(1, 1)]), &mut stage, &layout);
        let h = poi.reveal(cell, RevealOutcome::Victim, Duration::from_secs(3), &mut stage, &layout);

        let report = poi.reconcile(&snapshot(&[]), &mut stage, &layout);
        assert!(report.is_empty());
        assert_eq!(poi.reveal_at(cell, &stage), Some(h));

        stage.tick(Duration::from_secs(3));
        assert!(!stage.contains(h));
        assert_eq!(poi.reveal_at(cell, &stage), None);
    }

    #[test]
    fn new_marker_cuts_reveal_short_without_double_free() {
        let layout = GridLayout::default();
        let mut stage = Stage::new(HeadlessScene::new(), 0.01);
        let mut poi = PoiLayer::new();
        let cell = GridCell::new(0, 2);

        let h = poi.reveal(cell, RevealOutcome::FalseAlarm, Duration::from_secs(3), &mut stage, &layout);
        poi.reconcile(&snapshot(&[(0, 2)]), &mut stage, &layout);
        assert!(!stage.contains(h));
        assert_eq!(poi.markers().get(&cell).unwrap().kind, EntityKind::Poi);

        let destroys_before = stage.scene().destroy_count();
        let out = stage.tick(Duration::from_secs(4));
        assert!(out.expired.is_empty());
        assert_eq!(stage.scene().destroy_count(), destroys_before);
    }
}
