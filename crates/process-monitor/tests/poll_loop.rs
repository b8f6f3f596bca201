//! Poll loop behaviour against a scripted fake process

mod common;

use common::{
    broken_pipe, count, failing_after, fake_pipe, fast_config, kinds, recorder, FakeProcess,
};
use std::time::{Duration, Instant};
use process_monitor::{
    EventKind, LaunchOutcome, Pipe, ProcessHandle, TickOutcome, Trigger, LOST_EXIT_CODE,
};

#[smol_potat::test]
async fn test_immediate_exit_without_output() {
    let process = FakeProcess::new();
    process.exit(0);
    let (out_tx, out) = fake_pipe();
    let (err_tx, err) = fake_pipe();
    drop((out_tx, err_tx));

    let mut handle = ProcessHandle::attach(
        process.clone(),
        [(Pipe::Stdout, out), (Pipe::Stderr, err)],
        fast_config(),
    )
    .unwrap();
    let (events, listener) = recorder();
    handle.on(Trigger::All, listener);

    assert_eq!(handle.wait().await.unwrap(), LaunchOutcome::Exited(0));
    assert_eq!(kinds(&events), vec![EventKind::Start, EventKind::Finished]);
    assert!(events.lock().unwrap()[1].payload.is_none());
    assert_eq!(handle.exit_code(), Some(0));
    assert_eq!(handle.stdout_log("\n"), "");
}

#[smol_potat::test]
async fn test_output_delivered_per_tick() {
    let process = FakeProcess::new();
    let (out_tx, out) = fake_pipe();
    let mut handle =
        ProcessHandle::attach(process.clone(), [(Pipe::Stdout, out)], fast_config()).unwrap();
    let (events, listener) = recorder();
    handle.on(Trigger::All, listener);

    out_tx.send(b"first line\n".to_vec()).await.unwrap();
    assert_eq!(handle.tick().await.unwrap(), TickOutcome::Running);

    out_tx.send(b"second line\n".to_vec()).await.unwrap();
    drop(out_tx);
    process.exit(3);
    assert!(matches!(handle.tick().await.unwrap(), TickOutcome::Exited(_)));

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].kind, EventKind::Start);
    assert!(events[0].payload.is_none());
    assert_eq!(events[1].kind, EventKind::Running);
    assert_eq!(events[1].output(Pipe::Stdout).unwrap().message, "first line");
    assert_eq!(events[2].kind, EventKind::Finished);
    assert_eq!(events[2].output(Pipe::Stdout).unwrap().message, "second line");
    assert!(events[2].output(Pipe::Stderr).is_none());

    assert_eq!(handle.stdout_log("\n"), "first line\nsecond line");
    assert_eq!(handle.exit_code(), Some(3));
}

#[smol_potat::test]
async fn test_idle_tick_has_null_payload() {
    let process = FakeProcess::new();
    let (_out_tx, out) = fake_pipe();
    let mut handle =
        ProcessHandle::attach(process.clone(), [(Pipe::Stdout, out)], fast_config()).unwrap();
    let (events, listener) = recorder();
    handle.on(Trigger::Running, listener);

    handle.tick().await.unwrap();
    handle.tick().await.unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.payload.is_none()));
    assert_eq!(handle.exit_code(), None);
}

#[smol_potat::test]
async fn test_whitespace_never_buffered() {
    let process = FakeProcess::new();
    let (out_tx, out) = fake_pipe();
    let mut handle =
        ProcessHandle::attach(process.clone(), [(Pipe::Stdout, out)], fast_config()).unwrap();
    let (events, listener) = recorder();
    handle.on(Trigger::All, listener);

    out_tx.send(b"   \n\n\t \n".to_vec()).await.unwrap();
    handle.tick().await.unwrap();
    drop(out_tx);
    process.exit(0);
    handle.wait().await.unwrap();

    assert_eq!(handle.stdout_log("\n"), "");
    assert!(handle.output_log().groups(Pipe::Stdout).is_empty());
    assert!(events.lock().unwrap().iter().all(|e| e.payload.is_none()));
}

#[smol_potat::test]
async fn test_vanished_process_is_terminal() {
    let process = FakeProcess::new();
    let (_out_tx, out) = fake_pipe();
    let mut handle =
        ProcessHandle::attach(process.clone(), [(Pipe::Stdout, out)], fast_config()).unwrap();
    let (finished, listener) = recorder();
    handle.on(Trigger::Finished, listener);

    handle.tick().await.unwrap();
    process.vanish();

    assert_eq!(
        handle.wait().await.unwrap(),
        LaunchOutcome::Exited(LOST_EXIT_CODE)
    );
    assert_eq!(count(&finished, EventKind::Finished), 1);
    assert_eq!(handle.exit_code(), Some(LOST_EXIT_CODE));
}

#[smol_potat::test]
async fn test_no_ticks_after_exit() {
    let process = FakeProcess::new();
    process.exit(5);
    let mut handle = ProcessHandle::attach(
        process.clone(),
        std::iter::empty::<(Pipe, process_monitor::BoxedReader)>(),
        fast_config(),
    )
    .unwrap();
    let (events, listener) = recorder();
    handle.on(Trigger::All, listener);

    let first = handle.tick().await.unwrap();
    let probes = process.probes();
    let second = handle.tick().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(process.probes(), probes);
    assert_eq!(count(&events, EventKind::Finished), 1);
    assert_eq!(handle.exit_code(), Some(5));
    assert_eq!(handle.exit_code(), Some(5));
    assert!(handle.is_finished());
}

#[smol_potat::test]
async fn test_specific_listener_shadows_wildcard() {
    let process = FakeProcess::new();
    let (out_tx, out) = fake_pipe();
    let mut handle =
        ProcessHandle::attach(process.clone(), [(Pipe::Stdout, out)], fast_config()).unwrap();
    let (running, running_listener) = recorder();
    let (all, all_listener) = recorder();
    handle
        .on(Trigger::Running, running_listener)
        .on(Trigger::All, all_listener);

    out_tx.send(b"tick\n".to_vec()).await.unwrap();
    handle.tick().await.unwrap();
    handle.tick().await.unwrap();
    process.exit(0);
    handle.wait().await.unwrap();

    assert_eq!(count(&running, EventKind::Running), 2);
    assert_eq!(kinds(&all), vec![EventKind::Start, EventKind::Finished]);
}

#[smol_potat::test]
async fn test_log_only_grows() {
    let process = FakeProcess::new();
    let (out_tx, out) = fake_pipe();
    let mut handle =
        ProcessHandle::attach(process.clone(), [(Pipe::Stdout, out)], fast_config()).unwrap();

    let mut previous = handle.stdout_log("\n");
    for line in ["a", "b", "c"] {
        out_tx.send(format!("{line}\n").into_bytes()).await.unwrap();
        handle.tick().await.unwrap();
        let current = handle.stdout_log("\n");
        assert!(current.starts_with(&previous));
        assert!(current.len() > previous.len());
        previous = current;
    }
    assert_eq!(previous, "a\nb\nc");
    assert_eq!(handle.output_log().groups(Pipe::Stdout).len(), 3);
}

#[smol_potat::test]
async fn test_cancel_without_kill_leaves_process() {
    let process = FakeProcess::new();
    let (_out_tx, out) = fake_pipe();
    let mut config = fast_config();
    config.kill_on_cancel = false;
    let mut handle = ProcessHandle::attach(process.clone(), [(Pipe::Stdout, out)], config).unwrap();

    handle.tick().await.unwrap();
    handle.cancellation_token().cancel();

    assert_eq!(handle.wait().await.unwrap(), LaunchOutcome::Cancelled);
    assert!(!process.was_killed());
    assert!(handle.is_running());
    assert_eq!(handle.exit_code(), None);
}

#[smol_potat::test]
async fn test_cancel_kills_and_finishes() {
    let process = FakeProcess::new();
    let (_out_tx, out) = fake_pipe();
    let mut handle =
        ProcessHandle::attach(process.clone(), [(Pipe::Stdout, out)], fast_config()).unwrap();
    let (events, listener) = recorder();
    handle.on(Trigger::All, listener);

    handle.cancellation_token().cancel();
    assert_eq!(handle.wait().await.unwrap(), LaunchOutcome::Exited(137));
    assert!(process.was_killed());
    assert_eq!(count(&events, EventKind::Finished), 1);
    assert!(handle.exit_status().unwrap().terminated_by_signal());
}

#[smol_potat::test]
async fn test_snapshot_from_another_task() {
    let process = FakeProcess::new();
    let (out_tx, out) = fake_pipe();
    let mut handle =
        ProcessHandle::attach(process.clone(), [(Pipe::Stdout, out)], fast_config()).unwrap();
    let log = handle.output_log();

    let runner = smol::spawn(async move {
        let outcome = handle.wait().await.unwrap();
        (handle, outcome)
    });

    out_tx.send(b"progress\n".to_vec()).await.unwrap();
    while log.text(Pipe::Stdout, "\n").is_empty() {
        smol::Timer::after(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(log.exit_code(), None);

    process.exit(0);
    let (handle, outcome) = runner.await;
    assert_eq!(outcome, LaunchOutcome::Exited(0));
    assert_eq!(log.text(Pipe::Stdout, "\n"), "progress");
    assert_eq!(log.exit_code(), handle.exit_code());
}

#[smol_potat::test]
async fn test_failing_pipe_does_not_spin() {
    let process = FakeProcess::new();
    let config = fast_config();
    let idle = config.idle_interval();
    let mut handle =
        ProcessHandle::attach(process.clone(), [(Pipe::Stdout, broken_pipe())], config).unwrap();
    let (events, listener) = recorder();
    handle.on(Trigger::All, listener);

    let started = Instant::now();
    for _ in 0..10 {
        assert_eq!(handle.tick().await.unwrap(), TickOutcome::Running);
    }
    assert!(started.elapsed() >= idle * 10);

    process.exit(0);
    assert_eq!(handle.wait().await.unwrap(), LaunchOutcome::Exited(0));

    assert_eq!(count(&events, EventKind::Running), 10);
    assert_eq!(count(&events, EventKind::Finished), 1);
    let events = events.lock().unwrap();
    assert!(events.iter().all(|e| e.payload.is_none()));
    assert_eq!(handle.stdout_log("\n"), "");
}

#[smol_potat::test]
async fn test_failing_pipe_tick_rate_is_bounded() {
    let process = FakeProcess::new();
    let mut handle = ProcessHandle::attach(
        process.clone(),
        [(Pipe::Stdout, broken_pipe())],
        fast_config(),
    )
    .unwrap();
    let (running, listener) = recorder();
    handle.on(Trigger::Running, listener);

    let runner = smol::spawn(async move {
        let outcome = handle.wait().await.unwrap();
        (handle, outcome)
    });
    smol::Timer::after(Duration::from_millis(100)).await;
    process.exit(0);
    let (_handle, outcome) = runner.await;

    assert_eq!(outcome, LaunchOutcome::Exited(0));
    // 5ms idle interval over 100ms
    assert!(count(&running, EventKind::Running) <= 25);
}

#[smol_potat::test]
async fn test_read_failure_keeps_earlier_chunks() {
    let process = FakeProcess::new();
    let mut handle = ProcessHandle::attach(
        process.clone(),
        [(Pipe::Stdout, failing_after(b"partial output\n"))],
        fast_config(),
    )
    .unwrap();
    let (events, listener) = recorder();
    handle.on(Trigger::Running, listener);

    handle.tick().await.unwrap();
    process.exit(0);
    handle.wait().await.unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events[0].output(Pipe::Stdout).unwrap().message, "partial output");
    assert_eq!(handle.stdout_log("\n"), "partial output");
    assert_eq!(handle.output_log().groups(Pipe::Stdout).len(), 1);
}
