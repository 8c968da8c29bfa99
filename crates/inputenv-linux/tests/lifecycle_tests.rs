//! Integration tests for the worker lifecycle: shutdown and rumble delivery

use inputenv_hal::mock::{MockDeviceSpec, MockEventInterface};
use inputenv_linux::{
    EnvironmentConfig, LifecycleCoordinator, LifecyclePhase, LinuxEnvironment, Platform,
    ShutdownOutcome,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn test_config() -> EnvironmentConfig {
    EnvironmentConfig {
        cleanup_grace_ms: 0,
        init_timeout_ms: 5000,
        register_exit_hook: false,
        ..EnvironmentConfig::default()
    }
}

fn rumble_pads() -> MockEventInterface {
    MockEventInterface::new(vec![
        MockDeviceSpec::new("Pad A")
            .with_abs_axes(6)
            .with_buttons(12)
            .with_force_feedback(),
        MockDeviceSpec::new("Pad B")
            .with_abs_axes(6)
            .with_buttons(12)
            .with_force_feedback(),
        MockDeviceSpec::new("Pad C")
            .with_abs_axes(6)
            .with_buttons(12)
            .with_force_feedback(),
    ])
}

#[test]
fn test_sequential_shutdown_runs_teardown_once() {
    let mock = rumble_pads();
    let handle = mock.handle();
    let env = LinuxEnvironment::with_interface(Platform::named("linux"), mock, &test_config());

    assert_eq!(env.request_shutdown(), ShutdownOutcome::Completed);
    assert_eq!(env.request_shutdown(), ShutdownOutcome::Completed);
    assert_eq!(env.phase(), LifecyclePhase::CleanupDone);

    assert_eq!(handle.init_calls(), 1);
    assert_eq!(handle.cleanups(), vec![0, 1, 2]);
}

#[test]
fn test_concurrent_shutdown_runs_teardown_once() {
    let config = EnvironmentConfig {
        cleanup_grace_ms: 50,
        ..test_config()
    };
    let mock = rumble_pads();
    let handle = mock.handle();
    let env = Arc::new(LinuxEnvironment::with_interface(
        Platform::named("linux"),
        mock,
        &config,
    ));

    let requesters: Vec<_> = (0..4)
        .map(|_| {
            let env = Arc::clone(&env);
            thread::spawn(move || {
                let outcome = env.request_shutdown();
                // Every requester returns only after teardown
                (outcome, env.phase())
            })
        })
        .collect();

    for requester in requesters {
        let (outcome, phase) = requester.join().unwrap();
        assert_eq!(outcome, ShutdownOutcome::Completed);
        assert_eq!(phase, LifecyclePhase::CleanupDone);
    }
    assert_eq!(handle.cleanups(), vec![0, 1, 2]);
}

#[test]
fn test_shutdown_wakes_idle_worker() {
    let config = EnvironmentConfig {
        shutdown_timeout_ms: Some(5000),
        ..test_config()
    };
    let mock = rumble_pads();
    let handle = mock.handle();
    let (coordinator, ack) = LifecycleCoordinator::start(mock, &config).unwrap();
    ack.wait(WAIT).unwrap();

    // Give the worker time to park on its monitor
    thread::sleep(Duration::from_millis(50));
    assert_eq!(coordinator.phase(), LifecyclePhase::Running);

    assert_eq!(coordinator.request_shutdown(), ShutdownOutcome::Completed);
    assert_eq!(handle.cleanups().len(), 3);
}

#[test]
fn test_rumble_is_dispatched() {
    let mock = rumble_pads();
    let handle = mock.handle();
    let env = LinuxEnvironment::with_interface(Platform::named("linux"), mock, &test_config());

    assert!(env.controllers()[1].rumblers()[0].rumble(0.8));
    assert!(handle.wait_for_rumbles(1, WAIT));
    assert_eq!(handle.rumbles(), vec![(1, 0.8)]);

    env.request_shutdown();
    // A delivered request is not replayed
    assert_eq!(handle.rumbles().len(), 1);
}

#[test]
fn test_rumble_last_writer_wins() {
    let mut mock = rumble_pads();
    let gate = mock.gate_first_rumble();
    let handle = mock.handle();
    let env = LinuxEnvironment::with_interface(Platform::named("linux"), mock, &test_config());

    // Hold the worker inside a first dispatch so it cannot see the next two
    assert!(env.request_rumble(0, 0.1));
    assert!(gate.wait_entered(WAIT));

    assert!(env.request_rumble(1, 0.5));
    assert!(env.request_rumble(2, 0.9));
    gate.release();

    assert!(handle.wait_for_rumbles(2, WAIT));
    env.request_shutdown();

    assert_eq!(handle.rumbles(), vec![(0, 0.1), (2, 0.9)]);
}

fn wait_for_phase(env: &LinuxEnvironment, phase: LifecyclePhase) -> bool {
    let deadline = Instant::now() + WAIT;
    while env.phase() != phase {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    true
}

#[test]
fn test_pending_rumble_discarded_when_shutdown_wins() {
    let mut mock = rumble_pads();
    let gate = mock.gate_first_rumble();
    let handle = mock.handle();
    let env = Arc::new(LinuxEnvironment::with_interface(
        Platform::named("linux"),
        mock,
        &test_config(),
    ));

    assert!(env.request_rumble(0, 0.1));
    assert!(gate.wait_entered(WAIT));
    // Queued behind the parked dispatch
    assert!(env.request_rumble(1, 0.5));

    let requester = {
        let env = Arc::clone(&env);
        thread::spawn(move || env.request_shutdown())
    };
    assert!(wait_for_phase(&env, LifecyclePhase::ShutdownRequested));
    gate.release();

    assert_eq!(requester.join().unwrap(), ShutdownOutcome::Completed);
    assert_eq!(env.phase(), LifecyclePhase::CleanupDone);
    assert_eq!(handle.rumbles(), vec![(0, 0.1)]);
    assert_eq!(handle.cleanups(), vec![0, 1, 2]);
}

#[test]
fn test_rumble_rejected_after_shutdown() {
    let mock = rumble_pads();
    let handle = mock.handle();
    let env = LinuxEnvironment::with_interface(Platform::named("linux"), mock, &test_config());
    let rumbler = env.controllers()[0].rumblers()[0].clone();

    env.request_shutdown();
    assert!(!env.request_rumble(0, 1.0));
    assert!(!rumbler.rumble(1.0));
    assert!(handle.rumbles().is_empty());
}

#[test]
fn test_cleanup_failure_does_not_stop_teardown() {
    let mock = rumble_pads().failing_cleanup(1);
    let handle = mock.handle();
    let env = LinuxEnvironment::with_interface(Platform::named("linux"), mock, &test_config());

    assert_eq!(env.request_shutdown(), ShutdownOutcome::Completed);
    assert_eq!(handle.cleanups(), vec![0, 1, 2]);
}

#[test]
fn test_failed_rumble_keeps_worker_alive() {
    let mock = MockEventInterface::new(vec![
        MockDeviceSpec::new("Keyboard").with_buttons(105),
        MockDeviceSpec::new("Pad")
            .with_abs_axes(2)
            .with_buttons(8)
            .with_force_feedback(),
    ]);
    let handle = mock.handle();
    let env = LinuxEnvironment::with_interface(Platform::named("linux"), mock, &test_config());

    // The keyboard has no force feedback; the worker logs and carries on
    assert!(env.request_rumble(0, 1.0));
    thread::sleep(Duration::from_millis(50));
    assert!(env.request_rumble(1, 0.3));
    assert!(handle.wait_for_rumbles(1, WAIT));
    assert_eq!(handle.rumbles(), vec![(1, 0.3)]);

    assert_eq!(env.request_shutdown(), ShutdownOutcome::Completed);
}
