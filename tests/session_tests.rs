//! Session loop tests (in-memory simulation server)

#![cfg(feature = "client")]

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::json;
    use taco_rescue::{
        config::ControllerSettings,
        controller::SceneController,
        protocol::{StateSnapshot, StepAck},
        scene::HeadlessScene,
        server::SimulationServer,
        session::{Session, Trigger},
        stage::Stage,
        types::EntityKind,
        ClientError, ClientResult,
    };
    use tokio::sync::{mpsc, watch};

    #[derive(Default)]
    struct FakeServer {
        acks: Mutex<VecDeque<ClientResult<StepAck>>>,
        states: Mutex<VecDeque<ClientResult<StateSnapshot>>>,
        advances: AtomicUsize,
        fetches: AtomicUsize,
        /// `fetch_state` never resolves.
        stalled: bool,
    }

    impl FakeServer {
        fn with_states(states: Vec<ClientResult<StateSnapshot>>) -> Self {
            Self {
                states: Mutex::new(states.into()),
                ..Default::default()
            }
        }
    }

    impl SimulationServer for FakeServer {
        async fn advance(&self) -> ClientResult<StepAck> {
            let n = self.advances.fetch_add(1, Ordering::SeqCst) as u64;
            self.acks
                .lock()
                .pop_front()
                .unwrap_or(Ok(StepAck::Advanced(n + 1)))
        }

        async fn fetch_state(&self) -> ClientResult<StateSnapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.stalled {
                std::future::pending::<()>().await;
            }
            self.states
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ClientError::Transport("connection refused".into())))
        }
    }

    fn fire_state(step: u64, fire: serde_json::Value) -> StateSnapshot {
        serde_json::from_value(json!({
            "step": step,
            "agents": [],
            "fire": fire,
            "poi": [],
            "walls_damage": [],
            "events": []
        }))
        .unwrap()
    }

    fn session(server: FakeServer) -> Session<FakeServer, HeadlessScene> {
        let stage = Stage::new(HeadlessScene::new(), 0.01);
        let controller = SceneController::new(stage, ControllerSettings::default());
        Session::new(server, controller, Duration::from_millis(10))
    }

    // -----------------------------------------------------------------------
    // step_and_sync
    // -----------------------------------------------------------------------

    #[test]
    fn step_and_sync_applies_fetched_state() {
        let s = session(FakeServer::with_states(vec![Ok(fire_state(1, json!([[0, 2]])))]));
        let outcome = tokio_test::block_on(s.step_and_sync()).unwrap();

        assert_eq!(outcome.ack, Some(StepAck::Advanced(1)));
        assert_eq!(outcome.report.step, 1);
        assert_eq!(s.controller().lock().scene().count(EntityKind::Fire), 1);
    }

    #[test]
    fn failed_step_still_fetches() {
        let server = FakeServer::with_states(vec![Ok(fire_state(4, json!([[1]])))]);
        server
            .acks
            .lock()
            .push_back(Err(ClientError::Transport("timeout".into())));
        let s = session(server);

        let outcome = tokio_test::block_on(s.step_and_sync()).unwrap();
        assert_eq!(outcome.ack, None);
        assert_eq!(outcome.report.step, 4);
    }

    #[test]
    fn failed_fetch_keeps_previous_scene() {
        let s = session(FakeServer::with_states(vec![
            Ok(fire_state(1, json!([[2, 2]]))),
            Err(ClientError::Transport("connection reset".into())),
        ]));

        tokio_test::block_on(s.step_and_sync()).unwrap();
        let err = tokio_test::block_on(s.step_and_sync()).unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));

        let ctl = s.controller();
        let ctl = ctl.lock();
        assert_eq!(ctl.scene().count(EntityKind::Fire), 2);
        assert_eq!(ctl.last_step(), Some(1));
    }

    // -----------------------------------------------------------------------
    // run
    // -----------------------------------------------------------------------

    #[test]
    fn run_serves_triggers_until_channel_closes() {
        let s = session(FakeServer::with_states(vec![
            Ok(fire_state(1, json!([[2]]))),
            Err(ClientError::Schema("ragged grid".into())),
        ]));
        let (tx, rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio_test::block_on(async {
            tx.send(Trigger::Step).await.unwrap();
            tx.send(Trigger::Step).await.unwrap();
            tx.send(Trigger::Reset).await.unwrap();
        });
        drop(tx);

        let stats = tokio_test::block_on(s.run(rx, shutdown_rx));
        assert_eq!(stats.polls, 2);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.resets, 1);
        assert!(!stats.finished);

        let ctl = s.controller();
        let ctl = ctl.lock();
        assert_eq!(ctl.scene().count(EntityKind::Fire), 0);
        assert_eq!(ctl.last_step(), None);
    }

    #[test]
    fn run_reports_finished_simulation() {
        let server = FakeServer::with_states(vec![Ok(fire_state(50, json!([])))]);
        server.acks.lock().push_back(Ok(StepAck::Finished));
        let s = session(server);
        let (tx, rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio_test::block_on(tx.send(Trigger::Step)).unwrap();
        drop(tx);

        let stats = tokio_test::block_on(s.run(rx, shutdown_rx));
        assert!(stats.finished);
        assert_eq!(stats.failures, 0);
    }

    #[test]
    fn shutdown_abandons_a_stalled_fetch() {
        let server = FakeServer {
            stalled: true,
            ..Default::default()
        };
        let s = session(server);
        let (tx, rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let stats = tokio_test::block_on(async {
            tx.send(Trigger::Step).await.unwrap();
            let stop = async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                shutdown_tx.send(true).unwrap();
            };
            let (stats, ()) = tokio::join!(
                tokio::time::timeout(Duration::from_secs(2), s.run(rx, shutdown_rx)),
                stop
            );
            stats
        })
        .expect("run did not return after shutdown");

        assert_eq!(stats.polls, 1);
        assert_eq!(stats.failures, 0);
        assert!(!stats.finished);
        assert_eq!(s.controller().lock().last_step(), None);
    }

    #[test]
    fn run_returns_immediately_after_shutdown() {
        let server = FakeServer::with_states(vec![Ok(fire_state(1, json!([[1]])))]);
        let s = session(server);
        let (tx, rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();

        tokio_test::block_on(tx.send(Trigger::Step)).unwrap();
        let stats = tokio_test::block_on(s.run(rx, shutdown_rx));
        assert_eq!(stats.polls, 0);
        assert_eq!(s.controller().lock().last_step(), None);
    }
}
