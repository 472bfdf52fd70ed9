//! TacoRescue client
//!
//! Mirrors a remote rescue simulation into a scene: polls the server for
//! grid snapshots, diffs them against what is already on screen and issues
//! the minimal spawn / destroy / state changes through a [`scene::Scene`].
//!
//! ## Architecture
//!
//! ```text
//! Session  (session.rs)            ← step → fetch → apply, frame ticks
//!   ├── SimulationServer  (server.rs)     ← HTTP /step, /state
//!   └── SceneController  (controller.rs)  ← event gating, layer order
//!         ├── GridState     (reconcile.rs) ← fire
//!         ├── PoiLayer      (poi.rs)       ← POI markers + reveals
//!         ├── WallLayer     (walls.rs)     ┐ LevelTable over
//!         ├── DoorLayer     (doors.rs)     ┘ pre-placed scenery
//!         ├── AgentLayer    (agents.rs)
//!         └── Stage         (stage.rs)     ← entity ownership, tweens, timers
//!               └── Scene   (scene.rs)     ← render boundary
//! ```
//!
//! Everything below `Session` is synchronous and always compiled; the
//! `client` feature adds the network adapter, the session loop and the
//! binary.

// Core modules are always available (no client feature needed).
pub mod agents;
pub mod config;
pub mod controller;
pub mod doors;
pub mod error;
pub mod layout;
pub mod poi;
pub mod protocol;
pub mod reconcile;
pub mod scene;
pub mod stage;
pub mod types;
pub mod walls;

// Network-side modules require the `client` feature.
#[cfg(feature = "client")]
pub mod server;
#[cfg(feature = "client")]
pub mod session;

pub use config::{ClientConfig, ControllerSettings, ScenerySettings};
pub use controller::{EventEffect, EventOutcome, PollReport, SceneController};
pub use error::{ClientError, ClientResult};
pub use layout::GridLayout;
pub use protocol::{SimulationEvent, StateSnapshot, StepAck};
pub use reconcile::{GridOp, GridState, LevelTable, ReconcileReport};
pub use scene::{HeadlessScene, Scene};
pub use stage::Stage;
pub use types::{Direction, DoorKey, EntityHandle, EntityKind, GridCell, Vec3, WallKey};

// Convenience re-exports (client only)
#[cfg(feature = "client")]
pub use server::{HttpServer, SimulationServer};
#[cfg(feature = "client")]
pub use session::{Session, SessionStats, Trigger};
