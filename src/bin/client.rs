//! taco-rescue-client binary
//!
//! Polls a TacoRescue simulation server and mirrors it into a headless scene.
//! Each line on stdin steps the simulation once (`r` resets the scene, `q`
//! quits); with `--auto-step-ms` the client steps on a timer instead.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! | Flag / env                 | Default                    | Description                  |
//! |----------------------------|----------------------------|------------------------------|
//! | `TACO_SERVER_URL`          | `http://localhost:5000`    | Simulation server base URL   |
//! | `TACO_CONFIG`              | `config/tacorescue.toml`   | Layout, timings and scenery  |
//! | `TACO_FRAME_RATE_HZ`       | `60`                       | Tween / timer tick rate      |
//! | `TACO_AUTO_STEP_MS`        | *(off)*                    | Step period when unattended  |
//!
//! Any key of the TOML file can also be set as `TACO__<KEY>`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use taco_rescue::{
    config::ClientConfig,
    controller::SceneController,
    scene::HeadlessScene,
    server::HttpServer,
    session::{Session, Trigger},
    stage::Stage,
    types::EntityKind,
};
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "taco-rescue-client", about = "TacoRescue simulation client", version)]
struct Args {
    /// Simulation server base URL
    #[arg(long, env = "TACO_SERVER_URL")]
    server_url: Option<String>,

    /// Configuration file
    #[arg(long, env = "TACO_CONFIG", default_value = "config/tacorescue.toml")]
    config: PathBuf,

    /// Frame rate for tweens and timers (Hz)
    #[arg(long, env = "TACO_FRAME_RATE_HZ")]
    frame_rate_hz: Option<f32>,

    /// Step automatically every N milliseconds
    #[arg(long, env = "TACO_AUTO_STEP_MS")]
    auto_step_ms: Option<u64>,

    /// Log every scene operation at debug level
    #[arg(long)]
    trace_scene: bool,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taco_rescue=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config_path = if args.config.exists() {
        Some(args.config.as_path())
    } else {
        log::warn!("{} not found; using built-in defaults", args.config.display());
        None
    };
    let mut cfg = ClientConfig::load(config_path).context("loading configuration")?;
    if let Some(url) = args.server_url {
        cfg.server_url = url;
    }
    if let Some(hz) = args.frame_rate_hz {
        cfg.frame_rate_hz = hz;
    }
    if args.auto_step_ms.is_some() {
        cfg.auto_step_ms = args.auto_step_ms;
    }
    cfg.validate().context("validating configuration")?;

    log::info!(
        "Starting taco-rescue-client (server='{}', frame_rate={}Hz, doors={}, walls={})",
        cfg.server_url,
        cfg.frame_rate_hz,
        cfg.scenery.doors.len(),
        cfg.scenery.walls.len(),
    );

    // Scene, stage and controller
    let mut scene = HeadlessScene::with_scenery(&cfg.scenery, &cfg.layout);
    scene.trace_ops = args.trace_scene;
    let stage = Stage::new(scene, cfg.snap_epsilon);
    let mut controller = SceneController::new(stage, cfg.controller_settings());
    controller.bind_scenery(&cfg.scenery);

    let server = HttpServer::new(cfg.server_url.clone(), cfg.request_timeout())
        .context("building HTTP client")?;
    let session = Session::new(server, controller, cfg.frame_interval());

    // Triggers
    let (trigger_tx, trigger_rx) = mpsc::channel(8);
    match cfg.auto_step_ms {
        Some(ms) => spawn_auto_stepper(trigger_tx, Duration::from_millis(ms.max(1))),
        None => spawn_stdin_reader(trigger_tx),
    }

    // Shutdown on SIGINT
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("taco-rescue-client shutting down (SIGINT)");
        }
        let _ = shutdown_tx.send(true);
    });

    // Run until shutdown
    let stats = session.run(trigger_rx, shutdown_rx).await;

    let controller = session.controller();
    let ctl = controller.lock();
    log::info!(
        "Session over: {} polls, {} failed, {} resets, last step {:?}, {} fire / {} smoke / {} agents on screen",
        stats.polls,
        stats.failures,
        stats.resets,
        ctl.last_step(),
        ctl.scene().count(EntityKind::Fire),
        ctl.scene().count(EntityKind::Smoke),
        ctl.agents().len(),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Trigger sources
// ---------------------------------------------------------------------------

fn spawn_auto_stepper(tx: mpsc::Sender<Trigger>, period: Duration) {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        loop {
            timer.tick().await;
            if tx.send(Trigger::Step).await.is_err() {
                break;
            }
        }
    });
}

fn spawn_stdin_reader(tx: mpsc::Sender<Trigger>) {
    println!("Enter: step   r: reset   q: quit");
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let trigger = match line.trim() {
                "q" | "quit" => break,
                "r" | "reset" => Trigger::Reset,
                _ => Trigger::Step,
            };
            if tx.send(trigger).await.is_err() {
                break;
            }
        }
    });
}
