use std::time::Duration;

use airlink::prelude::*;

fn scenario_config(stations: u32, duration: Duration) -> SimConfig {
    SimConfig {
        name: "scenario".to_string(),
        num_stations: stations,
        sim_duration: duration,
        step_interval: Duration::from_secs(1),
        seed: 7,
        traffic_pattern: TrafficPattern::Constant { rate_pps: 500.0 },
        ..SimConfig::default()
    }
}

// Three nodes (two stations plus the AP), five steps, scripted action
// sequence. Checks the whole contract: spaces at setup, one observation
// per step, apply-per-step, and the one-step lag between an action and
// the CW the info string reports.
#[tokio::test]
async fn five_step_scenario_with_scripted_agent() {
    let config = scenario_config(2, Duration::from_secs_f64(4.5));
    let (channel, mut handle) = local_channel(8);
    let mut sim = Simulation::new(config).unwrap().with_agent(channel);

    let driver = tokio::spawn(async move {
        let init = handle.recv().await.unwrap();
        match init {
            EnvMessage::Init {
                observation_space,
                action_space,
            } => {
                assert_eq!(observation_space.shape, vec![3]);
                assert_eq!(action_space.shape, vec![1]);
            }
            other => panic!("expected init, got {other:?}"),
        }

        let mut observations = Vec::new();
        let mut infos = Vec::new();
        for action in [2.0, 4.0, 8.0, 1.0, 3.0] {
            match handle.recv().await.unwrap() {
                EnvMessage::Step {
                    observation,
                    done,
                    info,
                    ..
                } => {
                    assert!(!done);
                    observations.push(observation);
                    infos.push(info);
                }
                other => panic!("expected step, got {other:?}"),
            }
            handle.send_action(vec![action]).await.unwrap();
        }

        assert!(matches!(handle.recv().await.unwrap(), EnvMessage::Stop));
        (observations, infos)
    });

    let report = sim.run().await.unwrap();
    let (observations, infos) = driver.await.unwrap();

    assert_eq!(report.steps, 5);
    assert_eq!(observations.len(), 5);
    for observation in &observations {
        assert_eq!(observation.len(), 3);
    }
    // The next firing is queued before the action lands, so each info
    // string reports the previous step's action.
    assert_eq!(infos, ["CW: 0", "CW: 2", "CW: 4", "CW: 8", "CW: 1"]);

    // The last action is live on every node when the run ends.
    assert_eq!(report.final_cw, 3);
    for node in sim.nodes() {
        let mac = node.contention_window().unwrap();
        assert_eq!(mac.cw_min(), 3);
        assert_eq!(mac.cw_max(), 3);
    }
}

#[tokio::test]
async fn agent_disconnect_halts_the_run() {
    let config = scenario_config(2, Duration::from_secs(10));
    let (channel, mut handle) = local_channel(8);
    let mut sim = Simulation::new(config).unwrap().with_agent(channel);

    let driver = tokio::spawn(async move {
        assert!(matches!(
            handle.recv().await.unwrap(),
            EnvMessage::Init { .. }
        ));
        assert!(matches!(
            handle.recv().await.unwrap(),
            EnvMessage::Step { .. }
        ));
        handle.send_action(vec![4.0]).await.unwrap();
        // Walk away mid-episode.
        drop(handle);
    });

    let err = sim.run().await.unwrap_err();
    assert!(err.to_string().contains("agent"), "unexpected error: {err}");
    driver.await.unwrap();
}

#[tokio::test]
async fn cancellation_stops_the_step_scheduler() {
    let config = scenario_config(2, Duration::from_secs(10));
    let (channel, mut handle) = local_channel(8);
    let mut sim = Simulation::new(config).unwrap().with_agent(channel);
    let cancel = sim.cancellation_token();

    let driver = tokio::spawn(async move {
        assert!(matches!(
            handle.recv().await.unwrap(),
            EnvMessage::Init { .. }
        ));
        assert!(matches!(
            handle.recv().await.unwrap(),
            EnvMessage::Step { .. }
        ));
        // Cancel instead of answering; keep the handle alive so the only
        // way out is the cancellation path.
        cancel.cancel();
        handle
    });

    let err = sim.run().await.unwrap_err();
    assert!(err.to_string().contains("cancelled"), "unexpected error: {err}");
    drop(driver.await.unwrap());
}

#[tokio::test]
async fn malformed_action_aborts_the_step() {
    let config = scenario_config(2, Duration::from_secs(10));
    let (channel, mut handle) = local_channel(8);
    let mut sim = Simulation::new(config).unwrap().with_agent(channel);

    let driver = tokio::spawn(async move {
        assert!(matches!(
            handle.recv().await.unwrap(),
            EnvMessage::Init { .. }
        ));
        assert!(matches!(
            handle.recv().await.unwrap(),
            EnvMessage::Step { .. }
        ));
        handle.send_action(vec![2.0, 3.0]).await.unwrap();
        handle
    });

    let err = sim.run().await.unwrap_err();
    assert!(
        err.to_string().contains("exactly one element"),
        "unexpected error: {err}"
    );
    drop(driver.await.unwrap());
}

#[tokio::test]
async fn baseline_run_delivers_traffic_without_an_agent() {
    let mut config = scenario_config(3, Duration::from_secs(3));
    config.initial_cw = 15;
    let mut sim = Simulation::new(config).unwrap();

    let report = sim.run().await.unwrap();
    assert!(report.delivered_packets > 0);
    assert_eq!(report.steps, 0);
    assert_eq!(report.final_cw, 15);
    // One flow per station that got traffic through.
    assert!(report.flows.len() <= 3);
    assert!(!report.flows.is_empty());
}

#[tokio::test]
async fn identical_seeds_reproduce_the_run() {
    let run = |seed: u64| async move {
        let mut config = scenario_config(3, Duration::from_secs(3));
        config.seed = seed;
        let mut sim = Simulation::new(config).unwrap();
        sim.run().await.unwrap()
    };

    let a = run(42).await;
    let b = run(42).await;
    assert_eq!(a.delivered_packets, b.delivered_packets);
    assert_eq!(a.collisions, b.collisions);
    assert_eq!(a.dropped_packets, b.dropped_packets);
}
