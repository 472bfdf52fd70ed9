//! Client configuration.
//!
//! Loaded once at start-up from an optional TOML file, then `TACO__`-prefixed
//! environment variables (`TACO__SERVER_URL`, `TACO__LAYOUT__CELL_SIZE`, ...).
//! Every field has a default, so an empty source set yields a usable config.
//!
//! The scenery tables replace hardcoded object lookups: each entry names a
//! pre-placed scene object and the grid key it represents.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::doors::DoorMode;
use crate::error::{ClientError, ClientResult};
use crate::layout::GridLayout;
use crate::types::{Direction, DoorKey, GridCell, Vec3, WallKey};

// ---------------------------------------------------------------------------
// Scenery tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoorBinding {
    pub name: String,
    pub a: [i32; 2],
    pub b: [i32; 2],
}

impl DoorBinding {
    pub fn key(&self) -> ClientResult<DoorKey> {
        DoorKey::new(GridCell::from(self.a), GridCell::from(self.b))
    }
}

/// A wall object, addressed either by cell + side or by its world position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WallBinding {
    pub name: String,
    #[serde(default)]
    pub cell: Option<[i32; 2]>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub position: Option<Vec3>,
}

impl WallBinding {
    pub fn key(&self, layout: &GridLayout) -> ClientResult<WallKey> {
        match (self.cell, self.direction, self.position) {
            (Some(cell), Some(direction), _) => Ok(WallKey::new(cell.into(), direction)),
            (_, _, Some(pos)) => Ok(layout.wall_key_at(pos)),
            _ => Err(config_error(format!(
                "wall {:?} needs cell + direction or a position",
                self.name
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScenerySettings {
    pub doors: Vec<DoorBinding>,
    pub walls: Vec<WallBinding>,
}

// ---------------------------------------------------------------------------
// Client config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the simulation server.
    pub server_url: String,
    pub request_timeout_ms: u64,
    pub layout: GridLayout,
    /// How long a revealed victim / false alarm stays visible.
    pub reveal_delay_ms: u64,
    /// Agent tween speed, world units per second.
    pub move_speed: f32,
    pub snap_epsilon: f32,
    pub frame_rate_hz: f32,
    /// Step automatically at this period instead of waiting for input.
    pub auto_step_ms: Option<u64>,
    pub door_mode: DoorMode,
    pub proximity_radius: f32,
    pub scenery: ScenerySettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            request_timeout_ms: 5_000,
            layout: GridLayout::default(),
            reveal_delay_ms: 3_000,
            move_speed: 5.0,
            snap_epsilon: 0.01,
            frame_rate_hz: 60.0,
            auto_step_ms: None,
            door_mode: DoorMode::Events,
            proximity_radius: 1.0,
            scenery: ScenerySettings::default(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("TACO")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: ClientConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ClientResult<()> {
        if !positive(self.layout.cell_size) {
            return Err(config_error("layout.cell_size must be positive"));
        }
        if !positive(self.move_speed) {
            return Err(config_error("move_speed must be positive"));
        }
        if !positive(self.frame_rate_hz) || self.frame_rate_hz > MAX_FRAME_RATE_HZ {
            return Err(config_error(format!(
                "frame_rate_hz must be in (0, {}]",
                MAX_FRAME_RATE_HZ
            )));
        }
        if !(self.snap_epsilon.is_finite() && self.snap_epsilon >= 0.0) {
            return Err(config_error("snap_epsilon must be zero or more"));
        }
        if !(self.proximity_radius.is_finite() && self.proximity_radius >= 0.0) {
            return Err(config_error("proximity_radius must be zero or more"));
        }
        for door in &self.scenery.doors {
            door.key()?;
        }
        for wall in &self.scenery.walls {
            wall.key(&self.layout)?;
        }
        Ok(())
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.frame_rate_hz)
    }

    /// Controller-facing subset.
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            layout: self.layout,
            reveal_delay: self.reveal_delay(),
            move_speed: self.move_speed,
            door_mode: self.door_mode,
            proximity_radius: self.proximity_radius,
        }
    }
}

/// Tunables the scene controller needs at run time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSettings {
    pub layout: GridLayout,
    pub reveal_delay: Duration,
    pub move_speed: f32,
    pub door_mode: DoorMode,
    pub proximity_radius: f32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        ClientConfig::default().controller_settings()
    }
}

/// Upper bound on the frame task rate; keeps the frame interval non-zero.
pub const MAX_FRAME_RATE_HZ: f32 = 1000.0;

fn positive(v: f32) -> bool {
    v.is_finite() && v > 0.0
}

fn config_error(msg: impl Into<String>) -> ClientError {
    ClientError::Config(config::ConfigError::Message(msg.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_board() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.reveal_delay(), Duration::from_secs(3));
        assert_eq!(cfg.layout.cell_size, 2.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn wall_binding_needs_an_address() {
        let layout = GridLayout {
            wall_offset: 0.45,
            ..Default::default()
        };
        let by_cell = WallBinding {
            name: "wall (3)".into(),
            cell: Some([1, 1]),
            direction: Some(Direction::East),
            position: None,
        };
        assert_eq!(
            by_cell.key(&layout).unwrap(),
            WallKey::new(GridCell::new(1, 1), Direction::East)
        );

        let by_pos = WallBinding {
            name: "wall (4)".into(),
            cell: None,
            direction: None,
            position: Some(layout.wall_to_world(WallKey::new(GridCell::new(2, 2), Direction::South))),
        };
        assert_eq!(
            by_pos.key(&layout).unwrap(),
            WallKey::new(GridCell::new(2, 2), Direction::South)
        );

        let neither = WallBinding {
            name: "wall (5)".into(),
            cell: Some([1, 1]),
            direction: None,
            position: None,
        };
        assert!(matches!(neither.key(&layout), Err(ClientError::Config(_))));
    }

    #[test]
    fn frame_rate_and_epsilon_are_bounded() {
        for hz in [f32::INFINITY, f32::NAN, 0.0, -60.0, 1.0e9] {
            let cfg = ClientConfig {
                frame_rate_hz: hz,
                ..Default::default()
            };
            assert!(cfg.validate().is_err(), "frame_rate_hz {} accepted", hz);
        }

        let cfg = ClientConfig {
            frame_rate_hz: MAX_FRAME_RATE_HZ,
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
        assert!(!cfg.frame_interval().is_zero());

        let cfg = ClientConfig {
            snap_epsilon: -0.01,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = ClientConfig {
            move_speed: f32::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_adjacent_door_fails_validation() {
        let mut cfg = ClientConfig::default();
        cfg.scenery.doors.push(DoorBinding {
            name: "door-rotate".into(),
            a: [1, 3],
            b: [4, 3],
        });
        assert!(cfg.validate().is_err());
    }
}
