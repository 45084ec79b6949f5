#![cfg(unix)]

mod common;

use common::{house, sandbox, terminal_count, until_terminal, WRITES_OUTPUT};
use house_sim_bridge::model::{Notification, RunState};
use house_sim_bridge::{Bridge, BridgeError, HostEvent};
use std::time::Duration;

/// Slow enough that a second run can start while the first is in flight.
fn slow_writer() -> String {
    format!("sleep 0.3\n{WRITES_OUTPUT}")
}

#[tokio::test]
async fn newer_run_supersedes_older_one_for_same_house() {
    let sb = sandbox(&slow_writer());
    let (bridge, mut host_rx) = Bridge::start(sb.settings.clone());
    let mut form_a = bridge.open_form_session().await.expect("session a");
    let mut form_b = bridge.open_form_session().await.expect("session b");

    let (a_run, _) = bridge
        .save_config(form_a.id, house("Test House"))
        .await
        .expect("save a");
    let (b_run_started, _) = bridge
        .save_config(form_b.id, house("test   house"))
        .await
        .expect("save b");
    assert!(b_run_started > a_run);

    let a_events = until_terminal(&mut form_a).await;
    assert_eq!(terminal_count(&a_events), 1);
    let b_run = match a_events.last() {
        Some(Notification::SimulationError { error, .. }) => match error.as_ref() {
            BridgeError::Superseded { by } => *by,
            other => panic!("unexpected {other:?}"),
        },
        other => panic!("unexpected {other:?}"),
    };

    assert_eq!(b_run, b_run_started);

    let b_events = until_terminal(&mut form_b).await;
    assert_eq!(terminal_count(&b_events), 1);
    match b_events.last() {
        Some(Notification::SimulationComplete { run, id, .. }) => {
            assert_eq!(*run, b_run);
            assert_eq!(id.as_str(), "test_house");
        }
        other => panic!("unexpected {other:?}"),
    }

    // Run A's process was killed and nothing more reaches its session.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(form_a.try_recv().is_none());

    // Only B's completion opened a results view and closed a form.
    assert!(matches!(host_rx.recv().await, Some(HostEvent::SessionOpened(_))));
    assert!(matches!(host_rx.recv().await, Some(HostEvent::SessionClosed(id)) if id == form_b.id));
    assert!(host_rx.try_recv().is_err());
}

#[tokio::test]
async fn different_houses_run_side_by_side() {
    let sb = sandbox(&slow_writer());
    let (bridge, _host_rx) = Bridge::start(sb.settings.clone());
    let mut form_a = bridge.open_form_session().await.expect("session a");
    let mut form_b = bridge.open_form_session().await.expect("session b");

    bridge.save_config(form_a.id, house("North")).await.expect("a");
    bridge.save_config(form_b.id, house("South")).await.expect("b");

    for (form, name) in [(&mut form_a, "north"), (&mut form_b, "south")] {
        let events = until_terminal(form).await;
        match events.last() {
            Some(Notification::SimulationComplete { id, .. }) => assert_eq!(id.as_str(), name),
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[tokio::test]
async fn closing_the_form_cancels_its_run() {
    let sb = sandbox(&slow_writer());
    let (bridge, _host_rx) = Bridge::start(sb.settings.clone());
    let mut form = bridge.open_form_session().await.expect("session");

    bridge
        .run_default_simulation(form.id)
        .await
        .expect("default run");
    loop {
        match form.recv().await {
            Some(Notification::RunStateChanged { state: RunState::Launching, .. }) => break,
            Some(_) => continue,
            None => panic!("session closed early"),
        }
    }
    bridge.close_session(form.id);
    assert!(form.recv().await.is_none());

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(
        !sb.settings
            .result_dir
            .join("john_doe's_smart_house_output.json")
            .exists(),
        "cancelled simulator should not have finished"
    );
}

#[tokio::test]
async fn shutdown_fails_live_runs() {
    let sb = sandbox(&slow_writer());
    let (bridge, _host_rx) = Bridge::start(sb.settings.clone());
    let mut form = bridge.open_form_session().await.expect("session");

    bridge
        .run_default_simulation(form.id)
        .await
        .expect("default run");
    bridge.shutdown();

    let events = until_terminal(&mut form).await;
    assert!(matches!(
        events.last(),
        Some(Notification::SimulationError { error, .. })
            if matches!(error.as_ref(), BridgeError::BridgeClosed)
    ));
    assert!(bridge.open_form_session().await.is_err());
}

#[tokio::test]
async fn resubmitting_from_one_form_waits_for_the_latest_run() {
    let sb = sandbox(&slow_writer());
    let (bridge, _host_rx) = Bridge::start(sb.settings.clone());
    let mut form = bridge.open_form_session().await.expect("session");

    let (first, _) = bridge
        .save_config(form.id, house("Test House"))
        .await
        .expect("first save");
    let (second, _) = bridge
        .save_config(form.id, house("Test House"))
        .await
        .expect("second save");
    assert_ne!(first, second);

    let outcome = tokio::time::timeout(Duration::from_secs(10), form.recv_terminal_for(second))
        .await
        .expect("run did not finish in time");
    match outcome {
        Some(Notification::SimulationComplete { run, id, .. }) => {
            assert_eq!(run, second);
            assert_eq!(id.as_str(), "test_house");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn superseded_error_stays_tagged_with_the_old_run() {
    let sb = sandbox(&slow_writer());
    let (bridge, _host_rx) = Bridge::start(sb.settings.clone());
    let mut form = bridge.open_form_session().await.expect("session");

    let (first, _) = bridge
        .save_config(form.id, house("Test House"))
        .await
        .expect("first save");
    let (second, _) = bridge
        .save_config(form.id, house("Test House"))
        .await
        .expect("second save");

    // The first terminal in the queue belongs to the displaced run.
    let stale = tokio::time::timeout(Duration::from_secs(10), form.recv_terminal())
        .await
        .expect("superseded error in time");
    match stale {
        Some(Notification::SimulationError { run, error }) => {
            assert_eq!(run, first);
            assert!(matches!(error.as_ref(), BridgeError::Superseded { by } if *by == second));
        }
        other => panic!("unexpected {other:?}"),
    }
}
