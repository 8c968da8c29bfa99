//! Integration tests for environment construction and controller discovery

use inputenv_hal::mock::{MockDeviceSpec, MockEventInterface};
use inputenv_linux::{
    ControllerEnvironment, ControllerKind, EnvironmentConfig, LifecyclePhase, LinuxEnvironment,
    Platform, ShutdownOutcome,
};
use std::time::Duration;

fn test_config() -> EnvironmentConfig {
    EnvironmentConfig {
        cleanup_grace_ms: 0,
        init_timeout_ms: 5000,
        register_exit_hook: false,
        ..EnvironmentConfig::default()
    }
}

fn linux() -> Platform {
    Platform::named("linux")
}

#[test]
fn test_desktop_controllers() {
    let env = LinuxEnvironment::with_interface(linux(), MockEventInterface::desktop(), &test_config());

    assert!(env.is_supported());
    assert_eq!(env.phase(), LifecyclePhase::Running);

    let kinds: Vec<(usize, ControllerKind)> =
        env.controllers().iter().map(|c| (c.index(), c.kind())).collect();
    // The lid switch has no components and is dropped
    assert_eq!(
        kinds,
        vec![
            (0, ControllerKind::Keyboard),
            (1, ControllerKind::Mouse),
            (2, ControllerKind::Stick),
        ]
    );

    let pad = &env.controllers()[2];
    assert_eq!(pad.name(), "Microsoft X-Box 360 pad");
    assert_eq!(pad.rumblers().len(), 1);
    assert!(env.controllers()[0].rumblers().is_empty());
}

#[test]
fn test_zero_component_devices_excluded_regardless_of_name() {
    let mock = MockEventInterface::new(vec![
        MockDeviceSpec::new("Phantom Mouse"),
        MockDeviceSpec::new("Phantom Keyboard"),
        MockDeviceSpec::new("Phantom Joystick"),
        MockDeviceSpec::new("Real Joystick").with_abs_axes(2).with_buttons(2),
    ]);

    let env = LinuxEnvironment::with_interface(linux(), mock, &test_config());
    assert_eq!(env.controllers().len(), 1);
    assert_eq!(env.controllers()[0].index(), 3);
    assert!(env.controllers().iter().all(|c| c.component_count() > 0));
}

#[test]
fn test_classification_properties() {
    let mock = MockEventInterface::new(vec![
        MockDeviceSpec::new("Logitech Mouse").with_rel_axes(2).with_buttons(3),
        MockDeviceSpec::new("Generic HID").with_abs_axes(4).with_buttons(10),
        MockDeviceSpec::new("Unknown Widget")
            .with_rel_axes(1)
            .with_abs_axes(1)
            .with_buttons(50),
    ]);

    let env = LinuxEnvironment::with_interface(linux(), mock, &test_config());
    let kinds: Vec<ControllerKind> = env.controllers().iter().map(|c| c.kind()).collect();
    assert_eq!(
        kinds,
        vec![ControllerKind::Mouse, ControllerKind::Stick, ControllerKind::Stick]
    );
}

#[test]
fn test_unsupported_platform_never_touches_interface() {
    let mock = MockEventInterface::desktop();
    let handle = mock.handle();

    let env = LinuxEnvironment::with_interface(Platform::named("windows"), mock, &test_config());
    assert!(!env.is_supported());
    assert!(env.controllers().is_empty());
    assert_eq!(env.phase(), LifecyclePhase::NotStarted);
    assert_eq!(env.request_shutdown(), ShutdownOutcome::Completed);
    assert_eq!(handle.init_calls(), 0);
    assert!(handle.cleanups().is_empty());
}

#[test]
fn test_init_failure_yields_empty_environment() {
    let mock = MockEventInterface::desktop().failing_init("permission denied");
    let handle = mock.handle();

    let env = LinuxEnvironment::with_interface(linux(), mock, &test_config());
    assert!(env.is_supported());
    assert!(env.controllers().is_empty());

    // Nothing was opened, so nothing is cleaned up
    assert_eq!(env.request_shutdown(), ShutdownOutcome::Completed);
    assert_eq!(env.phase(), LifecyclePhase::CleanupDone);
    assert_eq!(handle.init_calls(), 1);
    assert!(handle.cleanups().is_empty());
}

#[test]
fn test_init_timeout_yields_empty_environment() {
    let mock = MockEventInterface::desktop().with_init_delay(Duration::from_millis(300));
    let handle = mock.handle();
    let config = EnvironmentConfig {
        init_timeout_ms: 20,
        ..test_config()
    };

    let env = LinuxEnvironment::with_interface(linux(), mock, &config);
    assert!(env.controllers().is_empty());

    // The worker still finishes init and tears down on request
    assert_eq!(env.request_shutdown(), ShutdownOutcome::Completed);
    assert_eq!(handle.init_calls(), 1);
    assert_eq!(handle.cleanups(), vec![0, 1, 2, 3]);
}

#[test]
fn test_drop_tears_down() {
    let mock = MockEventInterface::desktop();
    let handle = mock.handle();

    let env = LinuxEnvironment::with_interface(linux(), mock, &test_config());
    assert_eq!(env.controllers().len(), 3);
    drop(env);

    assert_eq!(handle.cleanups(), vec![0, 1, 2, 3]);
}

#[test]
fn test_rumbler_after_environment_dropped() {
    let env = LinuxEnvironment::with_interface(linux(), MockEventInterface::desktop(), &test_config());
    let rumbler = env.controllers()[2].rumblers()[0].clone();
    drop(env);

    assert!(!rumbler.rumble(1.0));
}
