//! Simulation server wire protocol.
//!
//! This module owns **every message that crosses the HTTP boundary** between
//! the simulation server and this client.
//!
//! ## Endpoints
//!
//! | Endpoint      | Method | Body returned                          |
//! |---------------|--------|----------------------------------------|
//! | `/step`       | POST   | `{"step": 7}` or `{"step": "MAX"}`     |
//! | `/state`      | GET    | [`StateSnapshot`]                      |
//!
//! ## Coordinate convention
//!
//! The outer index of `fire`, `poi` and `walls_damage` is the row, the inner
//! one the column.  Event positions `[a, b]` and agent `{x, y}` follow the
//! same order (`a`/`x` is the row).
//!
//! ## Validation
//!
//! [`StateSnapshot::decode`] performs every check up front and produces a
//! typed [`WorldFrame`].  Nothing touches the scene until it succeeds.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{ClientError, ClientResult};
use crate::types::{Direction, DoorKey, FireValue, GridCell, PoiValue, WallDamage, WallKey};

// ---------------------------------------------------------------------------
// Step acknowledgement  (POST /step)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAck {
    /// The server computed a step; carries the new step counter.
    Advanced(u64),
    /// The server refuses to step further (`"MAX"`).
    Finished,
}

#[derive(Deserialize)]
struct StepBody {
    step: StepField,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StepField {
    Number(u64),
    Text(String),
}

pub fn parse_step_ack(body: &[u8]) -> ClientResult<StepAck> {
    let parsed: StepBody = serde_json::from_slice(body)?;
    match parsed.step {
        StepField::Number(n) => Ok(StepAck::Advanced(n)),
        StepField::Text(t) if t == "MAX" => Ok(StepAck::Finished),
        StepField::Text(t) => Err(ClientError::Schema(format!("unexpected step value {:?}", t))),
    }
}

// ---------------------------------------------------------------------------
// State snapshot  (GET /state)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: u32,
    #[serde(rename = "x", alias = "row")]
    pub row: i32,
    #[serde(rename = "y", alias = "col")]
    pub col: i32,
    #[serde(rename = "carrying_victim", alias = "carrying", default)]
    pub carrying: bool,
}

impl AgentRecord {
    pub fn cell(&self) -> GridCell {
        GridCell::new(self.row, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Move,
    KnockOut,
    PickUpVictim,
    RemoveFalseAlarm,
    OpenDoor,
    CloseDoor,
    DamageWall,
    DemolishWall,
    DropOffVictim,
    RemoveSmoke,
    ExtinguishFire,
    #[serde(other)]
    Unknown,
}

/// One state transition recorded by the server, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationEvent {
    pub action: EventAction,
    pub step: u64,
    /// Acting agent.
    #[serde(default, alias = "agent_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<[i32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos1: Option<[i32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos2: Option<[i32; 2]>,
}

impl SimulationEvent {
    pub fn position(&self) -> Option<GridCell> {
        self.pos.map(GridCell::from)
    }

    /// `(pos1, pos2)` for events that name an edge between two cells.
    pub fn edge(&self) -> Option<(GridCell, GridCell)> {
        Some((self.pos1?.into(), self.pos2?.into()))
    }
}

/// Full state as returned by `GET /state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub step: u64,
    pub agents: Vec<AgentRecord>,
    pub fire: Vec<Vec<f64>>,
    pub poi: Vec<Vec<f64>>,
    pub walls_damage: Vec<Vec<Vec<f64>>>,
    /// Doors still standing, keyed by door id.  Older servers omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doors: Option<BTreeMap<String, Vec<i32>>>,
    /// Every event since the simulation started.
    pub events: Vec<SimulationEvent>,
}

pub fn parse_state(body: &[u8]) -> ClientResult<StateSnapshot> {
    Ok(serde_json::from_slice(body)?)
}

// ---------------------------------------------------------------------------
// Decoded frame
// ---------------------------------------------------------------------------

/// Typed, validated view of one [`StateSnapshot`].
#[derive(Debug, Clone)]
pub struct WorldFrame {
    pub step: u64,
    pub fire: HashMap<GridCell, FireValue>,
    pub poi: HashMap<GridCell, PoiValue>,
    pub walls: HashMap<WallKey, WallDamage>,
    pub doors: Option<HashSet<DoorKey>>,
    pub agents: Vec<AgentRecord>,
}

impl StateSnapshot {
    pub fn decode(&self) -> ClientResult<WorldFrame> {
        let fire = decode_grid(&self.fire, FireValue::from_code)?;
        let poi = decode_grid(&self.poi, PoiValue::from_code)?;
        let walls = decode_walls(&self.walls_damage)?;
        let doors = self.doors.as_ref().map(decode_doors).transpose()?;

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if !seen.insert(agent.id) {
                return Err(ClientError::Schema(format!("duplicate agent id {}", agent.id)));
            }
        }

        Ok(WorldFrame {
            step: self.step,
            fire,
            poi,
            walls,
            doors,
            agents: self.agents.clone(),
        })
    }
}

fn decode_grid<V>(
    rows: &[Vec<f64>],
    convert: impl Fn(f64) -> ClientResult<V>,
) -> ClientResult<HashMap<GridCell, V>> {
    let mut out = HashMap::new();
    for (row, cols) in rows.iter().enumerate() {
        for (col, raw) in cols.iter().enumerate() {
            out.insert(GridCell::new(row as i32, col as i32), convert(*raw)?);
        }
    }
    Ok(out)
}

fn decode_walls(rows: &[Vec<Vec<f64>>]) -> ClientResult<HashMap<WallKey, WallDamage>> {
    let mut out = HashMap::new();
    for (row, cols) in rows.iter().enumerate() {
        for (col, sides) in cols.iter().enumerate() {
            let cell = GridCell::new(row as i32, col as i32);
            if sides.len() != Direction::ALL.len() {
                return Err(ClientError::Schema(format!(
                    "cell {} has {} wall values instead of 4",
                    cell,
                    sides.len()
                )));
            }
            for (direction, raw) in Direction::ALL.iter().zip(sides) {
                out.insert(WallKey::new(cell, *direction), WallDamage::from_code(*raw)?);
            }
        }
    }
    Ok(out)
}

fn decode_doors(doors: &BTreeMap<String, Vec<i32>>) -> ClientResult<HashSet<DoorKey>> {
    doors
        .iter()
        .map(|(id, value)| match value.as_slice() {
            [r1, c1, r2, c2] => DoorKey::new(GridCell::new(*r1, *c1), GridCell::new(*r2, *c2)),
            [r2, c2] => DoorKey::new(parse_cell_id(id)?, GridCell::new(*r2, *c2)),
            _ => Err(ClientError::Schema(format!(
                "door {:?} has {} coordinates",
                id,
                value.len()
            ))),
        })
        .collect()
}

/// Parses a `"(r, c)"` door id.
fn parse_cell_id(id: &str) -> ClientResult<GridCell> {
    let bad = || ClientError::Schema(format!("door id {:?} is not a cell", id));
    let inner = id.trim().trim_start_matches('(').trim_end_matches(')');
    let mut parts = inner.split(',').map(|p| p.trim().parse::<i32>());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(r)), Some(Ok(c)), None) => Ok(GridCell::new(r, c)),
        _ => Err(bad()),
    }
}

// ---------------------------------------------------------------------------
// Endpoint helpers
// ---------------------------------------------------------------------------

pub mod endpoints {
    pub const STEP: &str = "/step";
    pub const STATE: &str = "/state";
}
