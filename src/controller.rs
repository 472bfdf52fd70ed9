//! `SceneController` – applies simulation snapshots to the scene.
//!
//! ## Snapshot pass
//!
//! ```text
//! StateSnapshot
//!   └── decode()            ← every check, no scene mutation
//!         ├── agents        ← join / leave / carrying
//!         ├── events        ← step-gated, from the next unconsumed index
//!         ├── agents        ← catch up on moves the events did not cover
//!         ├── fire          ← GridState diff
//!         ├── poi           ← GridState diff + reveal transients
//!         ├── walls         ← damage levels
//!         └── doors         ← destroyed doors
//! ```
//!
//! ## Event gating
//!
//! The server sends its whole event history on every poll.  The controller
//! keeps the index of the first event it has not consumed yet and walks
//! forward from there:
//!
//! | event step vs snapshot step | result                                |
//! |-----------------------------|---------------------------------------|
//! | equal                       | applied, consumed                     |
//! | greater                     | stop; retried on the next poll        |
//! | less                        | stale, consumed without applying      |
//!
//! Events that cannot be mapped onto the scene are logged and consumed.
//! Inside a snapshot pass, `remove_smoke`/`extinguish_fire` leave a cell the
//! same snapshot still reports burning to the fire diff.

use std::collections::HashMap;
use std::time::Duration;

use crate::agents::{AgentLayer, AgentSync};
use crate::config::{ControllerSettings, ScenerySettings};
use crate::doors::{DoorLayer, DoorMode};
use crate::error::{ClientError, ClientResult};
use crate::poi::{PoiLayer, RevealOutcome};
use crate::protocol::{EventAction, SimulationEvent, StateSnapshot};
use crate::reconcile::{GridState, ReconcileReport};
use crate::scene::Scene;
use crate::stage::{Stage, TickOutcome};
use crate::types::{DoorKey, DoorState, FireValue, GridCell, WallDamage};
use crate::walls::WallLayer;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What applying one event did to the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum EventEffect {
    AgentMoved { id: u32, cell: GridCell },
    Revealed { cell: GridCell, outcome: RevealOutcome },
    Door { key: DoorKey, state: DoorState, changed: bool },
    Wall { a: GridCell, b: GridCell, damage: WallDamage, faces_changed: usize },
    FireCleared { cell: GridCell, removed: bool },
    /// Nothing to draw; the next snapshot carries the result.
    Noted(EventAction),
}

#[derive(Debug)]
pub enum EventOutcome {
    Applied(EventEffect),
    /// The event belongs to a later step.
    Pending,
    /// The event belongs to an earlier step.
    Stale,
    /// The event could not be mapped onto the scene.
    Ignored(ClientError),
}

#[derive(Debug, Default, Clone)]
pub struct PollReport {
    pub step: u64,
    pub events_applied: usize,
    pub events_stale: usize,
    pub events_ignored: usize,
    /// Consumption stopped at an event for a later step.
    pub events_pending: bool,
    pub agents: AgentSync,
    pub agents_caught_up: usize,
    pub fire: ReconcileReport<GridCell>,
    pub poi: ReconcileReport<GridCell>,
    pub walls_changed: usize,
    pub doors_destroyed: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BindReport {
    pub doors: usize,
    pub walls: usize,
    pub missing: usize,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct SceneController<S: Scene> {
    stage: Stage<S>,
    fire: GridState<GridCell>,
    poi: PoiLayer,
    walls: WallLayer,
    doors: DoorLayer,
    agents: AgentLayer,
    settings: ControllerSettings,
    next_event: usize,
    last_step: Option<u64>,
}

impl<S: Scene> SceneController<S> {
    pub fn new(stage: Stage<S>, settings: ControllerSettings) -> Self {
        Self {
            stage,
            fire: GridState::new(),
            poi: PoiLayer::new(),
            walls: WallLayer::new(),
            doors: DoorLayer::new(),
            agents: AgentLayer::new(),
            settings,
            next_event: 0,
            last_step: None,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn stage(&self) -> &Stage<S> {
        &self.stage
    }

    pub fn scene(&self) -> &S {
        self.stage.scene()
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn fire(&self) -> &GridState<GridCell> {
        &self.fire
    }

    pub fn poi(&self) -> &PoiLayer {
        &self.poi
    }

    pub fn walls(&self) -> &WallLayer {
        &self.walls
    }

    pub fn doors(&self) -> &DoorLayer {
        &self.doors
    }

    pub fn agents(&self) -> &AgentLayer {
        &self.agents
    }

    /// Index of the first event not yet consumed.
    pub fn next_event(&self) -> usize {
        self.next_event
    }

    pub fn last_step(&self) -> Option<u64> {
        self.last_step
    }

    // -----------------------------------------------------------------------
    // Scenery
    // -----------------------------------------------------------------------

    /// Resolve the declarative door and wall tables against the scene.
    pub fn bind_scenery(&mut self, scenery: &ScenerySettings) -> BindReport {
        let mut report = BindReport::default();

        for door in &scenery.doors {
            let key = match door.key() {
                Ok(k) => k,
                Err(e) => {
                    log::warn!("Door binding {:?} skipped: {}", door.name, e);
                    report.missing += 1;
                    continue;
                }
            };
            match self.stage.find(&door.name) {
                Some(handle) => {
                    self.doors.bind(key, handle);
                    report.doors += 1;
                }
                None => {
                    log::warn!("{}", ClientError::Mapping(format!("door {:?}", door.name)));
                    report.missing += 1;
                }
            }
        }

        for wall in &scenery.walls {
            let key = match wall.key(&self.settings.layout) {
                Ok(k) => k,
                Err(e) => {
                    log::warn!("Wall binding {:?} skipped: {}", wall.name, e);
                    report.missing += 1;
                    continue;
                }
            };
            match self.stage.find(&wall.name) {
                Some(handle) => {
                    self.walls.bind(key, handle);
                    report.walls += 1;
                }
                None => {
                    log::warn!("{}", ClientError::Mapping(format!("wall {:?}", wall.name)));
                    report.missing += 1;
                }
            }
        }

        log::info!(
            "Bound {} doors and {} walls ({} missing)",
            report.doors,
            report.walls,
            report.missing
        );
        report
    }

    // -----------------------------------------------------------------------
    // Snapshot pass
    // -----------------------------------------------------------------------

    /// Bring the scene in line with `snapshot`.  A snapshot that fails
    /// validation leaves the scene untouched.
    pub fn apply_snapshot(&mut self, snapshot: &StateSnapshot) -> ClientResult<PollReport> {
        let frame = snapshot.decode()?;
        let layout = self.settings.layout;

        if let Some(last) = self.last_step {
            if frame.step < last {
                log::warn!("Step went backwards ({} -> {})", last, frame.step);
            }
        }

        let mut report = PollReport {
            step: frame.step,
            ..Default::default()
        };

        report.agents = self.agents.reconcile(&frame.agents, &mut self.stage, &layout);
        self.consume_events(&snapshot.events, frame.step, &frame.fire, &mut report);
        report.agents_caught_up = self.agents.catch_up(
            &frame.agents,
            self.settings.move_speed,
            &mut self.stage,
            &layout,
        );

        report.fire = self
            .fire
            .reconcile(&frame.fire, &mut self.stage, |c| layout.cell_to_world(c));
        report.poi = self.poi.reconcile(&frame.poi, &mut self.stage, &layout);
        report.walls_changed = self.walls.reconcile(&frame.walls, &mut self.stage);
        if let Some(standing) = &frame.doors {
            report.doors_destroyed = self.doors.reconcile(standing, &mut self.stage);
        }

        self.last_step = Some(frame.step);
        log::info!(
            "Step {}: {} events applied, fire +{}/-{}, poi +{}/-{}",
            report.step,
            report.events_applied,
            report.fire.spawned(),
            report.fire.destroyed(),
            report.poi.spawned(),
            report.poi.destroyed(),
        );
        Ok(report)
    }

    fn consume_events(
        &mut self,
        events: &[SimulationEvent],
        step: u64,
        fire: &HashMap<GridCell, FireValue>,
        report: &mut PollReport,
    ) {
        if self.next_event > events.len() {
            log::warn!(
                "Event index {} is past the {} events reported; ignoring",
                self.next_event,
                events.len()
            );
            return;
        }

        while let Some(event) = events.get(self.next_event) {
            match self.gate(event, step, Some(fire)) {
                EventOutcome::Pending => {
                    report.events_pending = true;
                    break;
                }
                EventOutcome::Applied(effect) => {
                    log::debug!("Event {} applied: {:?}", self.next_event, effect);
                    report.events_applied += 1;
                }
                EventOutcome::Stale => {
                    log::info!(
                        "Event {} ({:?}) is from step {}, now {}; skipped",
                        self.next_event,
                        event.action,
                        event.step,
                        step
                    );
                    report.events_stale += 1;
                }
                EventOutcome::Ignored(e) => {
                    log::warn!("Event {} ({:?}) ignored: {}", self.next_event, event.action, e);
                    report.events_ignored += 1;
                }
            }
            self.next_event += 1;
        }
    }

    /// Apply one event if it belongs to `current_step`.
    pub fn apply_event(&mut self, event: &SimulationEvent, current_step: u64) -> EventOutcome {
        self.gate(event, current_step, None)
    }

    fn gate(
        &mut self,
        event: &SimulationEvent,
        current_step: u64,
        fire: Option<&HashMap<GridCell, FireValue>>,
    ) -> EventOutcome {
        if event.step > current_step {
            return EventOutcome::Pending;
        }
        if event.step < current_step {
            return EventOutcome::Stale;
        }
        match self.dispatch(event, fire) {
            Ok(effect) => EventOutcome::Applied(effect),
            Err(e) => EventOutcome::Ignored(e),
        }
    }

    fn dispatch(
        &mut self,
        event: &SimulationEvent,
        fire: Option<&HashMap<GridCell, FireValue>>,
    ) -> ClientResult<EventEffect> {
        let layout = self.settings.layout;
        match event.action {
            EventAction::Move | EventAction::KnockOut => {
                let id = event.id.ok_or_else(|| missing(event, "id"))?;
                let cell = event.position().ok_or_else(|| missing(event, "pos"))?;
                self.agents
                    .transition(id, cell, self.settings.move_speed, &mut self.stage, &layout)?;
                Ok(EventEffect::AgentMoved { id, cell })
            }
            EventAction::PickUpVictim | EventAction::RemoveFalseAlarm => {
                let cell = event.position().ok_or_else(|| missing(event, "pos"))?;
                let outcome = if event.action == EventAction::PickUpVictim {
                    RevealOutcome::Victim
                } else {
                    RevealOutcome::FalseAlarm
                };
                self.poi.reveal(
                    cell,
                    outcome,
                    self.settings.reveal_delay,
                    &mut self.stage,
                    &layout,
                );
                Ok(EventEffect::Revealed { cell, outcome })
            }
            EventAction::OpenDoor | EventAction::CloseDoor => {
                let (a, b) = event.edge().ok_or_else(|| missing(event, "pos1/pos2"))?;
                let key = DoorKey::new(a, b)?;
                let state = if event.action == EventAction::OpenDoor {
                    DoorState::Open
                } else {
                    DoorState::Closed
                };
                let changed = self.doors.toggle(key, state, &mut self.stage)?;
                Ok(EventEffect::Door { key, state, changed })
            }
            EventAction::DamageWall | EventAction::DemolishWall => {
                let (a, b) = event.edge().ok_or_else(|| missing(event, "pos1/pos2"))?;
                let damage = if event.action == EventAction::DamageWall {
                    WallDamage::Damaged
                } else {
                    WallDamage::Demolished
                };
                let faces_changed = self.walls.strike(a, b, damage, &mut self.stage)?;
                Ok(EventEffect::Wall {
                    a,
                    b,
                    damage,
                    faces_changed,
                })
            }
            EventAction::RemoveSmoke | EventAction::ExtinguishFire => {
                let cell = event.position().ok_or_else(|| missing(event, "pos"))?;
                let burning = fire
                    .and_then(|f| f.get(&cell))
                    .is_some_and(|v| *v != FireValue::Clear);
                let removed = !burning && self.fire.remove(&cell, &mut self.stage).is_some();
                Ok(EventEffect::FireCleared { cell, removed })
            }
            EventAction::DropOffVictim => Ok(EventEffect::Noted(event.action)),
            EventAction::Unknown => Err(ClientError::Mapping("unknown event action".to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Frame / lifecycle
    // -----------------------------------------------------------------------

    /// Advance tweens and timers by one frame.
    pub fn tick(&mut self, dt: Duration) -> TickOutcome {
        let outcome = self.stage.tick(dt);
        if self.settings.door_mode == DoorMode::Proximity {
            let positions = self.agents.positions(&self.stage);
            self.doors.update_proximity(
                &positions,
                self.settings.proximity_radius,
                &self.settings.layout,
                &mut self.stage,
            );
        }
        outcome
    }

    /// Release everything spawned, reset scenery and start over from the
    /// first event.
    pub fn clear(&mut self) {
        self.fire.clear(&mut self.stage);
        self.poi.clear(&mut self.stage);
        self.agents.clear(&mut self.stage);
        self.walls.reset(&mut self.stage);
        self.doors.reset(&mut self.stage);
        self.next_event = 0;
        self.last_step = None;
        log::info!("Scene cleared");
    }
}

fn missing(event: &SimulationEvent, field: &str) -> ClientError {
    ClientError::Schema(format!("{:?} event without {}", event.action, field))
}
