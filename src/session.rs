//! Session loop – drives step → fetch → apply on demand.
//!
//! ## Tasks
//!
//! ```text
//! Session::run
//!   ├── trigger loop   (this task)   ← Step / Reset, one at a time
//!   └── frame task     (spawned)     ← controller.tick(dt) at frame_rate_hz
//! ```
//!
//! Both share the controller through `Arc<Mutex<_>>`; the lock is held only
//! for a single snapshot pass or a single frame, never across an await.
//!
//! Errors stop at the poll boundary: a failed poll is logged and the scene
//! keeps whatever it showed before.  Shutdown cancels an outstanding request.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::Instrument;

use crate::controller::{PollReport, SceneController};
use crate::error::ClientResult;
use crate::protocol::StepAck;
use crate::scene::Scene;
use crate::server::SimulationServer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Advance the simulation one step and render the result.
    Step,
    /// Clear the scene and re-render from the first event.
    Reset,
}

/// Result of one successful poll.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// `None` when the step request failed but the fetch went through.
    pub ack: Option<StepAck>,
    pub report: PollReport,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub polls: u64,
    pub failures: u64,
    pub resets: u64,
    pub finished: bool,
}

pub struct Session<V: SimulationServer, S: Scene> {
    server: V,
    controller: Arc<Mutex<SceneController<S>>>,
    frame_interval: Duration,
}

impl<V, S> Session<V, S>
where
    V: SimulationServer,
    S: Scene + Send + 'static,
{
    pub fn new(server: V, controller: SceneController<S>, frame_interval: Duration) -> Self {
        Self {
            server,
            controller: Arc::new(Mutex::new(controller)),
            // tokio's interval rejects a zero period
            frame_interval: frame_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn controller(&self) -> Arc<Mutex<SceneController<S>>> {
        self.controller.clone()
    }

    /// One poll: advance, fetch, apply.  A failed advance is logged and the
    /// fetch still goes ahead.
    pub async fn step_and_sync(&self) -> ClientResult<SyncOutcome> {
        let ack = match self.server.advance().await {
            Ok(ack) => Some(ack),
            Err(e) => {
                log::warn!("Step request failed: {}", e);
                None
            }
        };
        if ack == Some(StepAck::Finished) {
            log::info!("Simulation reports its final step");
        }

        let snapshot = self.server.fetch_state().await?;
        let report = self.controller.lock().apply_snapshot(&snapshot)?;
        Ok(SyncOutcome { ack, report })
    }

    /// Serve triggers until the channel closes or `shutdown` flips.
    pub async fn run(
        &self,
        mut triggers: mpsc::Receiver<Trigger>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SessionStats {
        let mut stats = SessionStats::default();

        // -------------------------------------------------------------------
        // Frame task
        // -------------------------------------------------------------------

        let frame_controller = self.controller.clone();
        let frame_interval = self.frame_interval;
        let frame_handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(frame_interval);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last = tokio::time::Instant::now();
            loop {
                timer.tick().await;
                let now = tokio::time::Instant::now();
                let dt = now - last;
                last = now;
                frame_controller.lock().tick(dt);
            }
        });

        // -------------------------------------------------------------------
        // Trigger loop
        // -------------------------------------------------------------------

        if *shutdown.borrow() {
            frame_handle.abort();
            return stats;
        }

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    log::info!("Session shutting down");
                    break;
                }
                trigger = triggers.recv() => match trigger {
                    None => {
                        log::info!("Trigger source closed");
                        break;
                    }
                    Some(Trigger::Reset) => {
                        self.controller.lock().clear();
                        stats.resets += 1;
                    }
                    Some(Trigger::Step) => {
                        stats.polls += 1;
                        let span = tracing::info_span!("poll", n = stats.polls);
                        tokio::select! {
                            result = self.step_and_sync().instrument(span) => match result {
                                Ok(outcome) => {
                                    if outcome.ack == Some(StepAck::Finished) {
                                        stats.finished = true;
                                    }
                                }
                                Err(e) if e.is_parse() => {
                                    log::error!("Snapshot discarded: {}", e);
                                    stats.failures += 1;
                                }
                                Err(e) => {
                                    log::warn!("Poll failed: {}", e);
                                    stats.failures += 1;
                                }
                            },
                            _ = shutdown.changed() => {
                                log::info!("Session shutting down; poll abandoned");
                                break;
                            }
                        }
                    }
                },
            }
        }

        frame_handle.abort();
        stats
    }
}
