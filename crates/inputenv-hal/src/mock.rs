//! Mock event subsystem for testing without real hardware
//!
//! The mock records every call made through [`EventInterface`] so tests can
//! assert on what the core did to the "native" side, and it can inject the
//! failures and delays a real subsystem produces.
//!
//! # Usage
//!
//! ```no_run
//! use inputenv_hal::mock::{MockDeviceSpec, MockEventInterface};
//! use std::path::Path;
//!
//! // The stock desktop set: keyboard, mouse, gamepad and a lid switch
//! let desktop = MockEventInterface::desktop();
//! let handle = desktop.handle();
//!
//! // Or a hand-written set
//! let custom = MockEventInterface::new(vec![
//!     MockDeviceSpec::new("Thrustmaster T.16000M").with_abs_axes(4).with_buttons(16),
//! ]);
//!
//! // Or a TOML device list
//! let from_file = MockEventInterface::from_profile_file(Path::new("devices.toml"));
//! ```

use crate::{DeviceError, EventInterface};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// One simulated device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockDeviceSpec {
    pub name: String,
    #[serde(default)]
    pub abs_axes: usize,
    #[serde(default)]
    pub rel_axes: usize,
    #[serde(default)]
    pub buttons: usize,
    #[serde(default)]
    pub force_feedback: bool,
}

impl MockDeviceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abs_axes: 0,
            rel_axes: 0,
            buttons: 0,
            force_feedback: false,
        }
    }

    pub fn with_abs_axes(mut self, count: usize) -> Self {
        self.abs_axes = count;
        self
    }

    pub fn with_rel_axes(mut self, count: usize) -> Self {
        self.rel_axes = count;
        self
    }

    pub fn with_buttons(mut self, count: usize) -> Self {
        self.buttons = count;
        self
    }

    pub fn with_force_feedback(mut self) -> Self {
        self.force_feedback = true;
        self
    }
}

/// Device list as stored in a TOML profile file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockDeviceSet {
    #[serde(default, rename = "device")]
    pub devices: Vec<MockDeviceSpec>,
}

/// Calls observed by the mock
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockCalls {
    pub init_calls: usize,
    /// Cleanup attempts, in call order (failed attempts included)
    pub cleanups: Vec<usize>,
    /// Dispatched rumbles as `(index, force)`, in call order
    pub rumbles: Vec<(usize, f32)>,
    /// Set once the mock itself has been dropped
    pub dropped: bool,
}

#[derive(Debug, Default)]
struct MockShared {
    calls: Mutex<MockCalls>,
    changed: Condvar,
}

impl MockShared {
    fn calls(&self) -> MutexGuard<'_, MockCalls> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, update: impl FnOnce(&mut MockCalls)) {
        update(&mut self.calls());
        self.changed.notify_all();
    }

    fn wait_until(&self, timeout: Duration, done: impl Fn(&MockCalls) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut calls = self.calls();
        while !done(&*calls) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            calls = self
                .changed
                .wait_timeout(calls, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Observer for a mock that has been moved elsewhere
#[derive(Debug, Clone)]
pub struct MockHandle {
    shared: Arc<MockShared>,
}

impl MockHandle {
    /// Snapshot of every call recorded so far
    pub fn calls(&self) -> MockCalls {
        self.shared.calls().clone()
    }

    pub fn init_calls(&self) -> usize {
        self.shared.calls().init_calls
    }

    pub fn cleanups(&self) -> Vec<usize> {
        self.shared.calls().cleanups.clone()
    }

    pub fn rumbles(&self) -> Vec<(usize, f32)> {
        self.shared.calls().rumbles.clone()
    }

    pub fn is_dropped(&self) -> bool {
        self.shared.calls().dropped
    }

    /// Block until at least `count` rumbles were dispatched
    pub fn wait_for_rumbles(&self, count: usize, timeout: Duration) -> bool {
        self.shared.wait_until(timeout, |c| c.rumbles.len() >= count)
    }

    /// Block until at least `count` cleanup calls were made
    pub fn wait_for_cleanups(&self, count: usize, timeout: Duration) -> bool {
        self.shared.wait_until(timeout, |c| c.cleanups.len() >= count)
    }
}

/// Test-side end of a gated first rumble
pub struct RumbleGate {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl RumbleGate {
    /// Wait until the gated rumble is parked inside the mock
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        self.entered.recv_timeout(timeout).is_ok()
    }

    /// Let the parked rumble return
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

/// Scriptable event subsystem
pub struct MockEventInterface {
    devices: Vec<MockDeviceSpec>,
    released: Vec<bool>,
    initialized: bool,
    init_failure: Option<String>,
    init_delay: Duration,
    failing_cleanups: HashSet<usize>,
    gate: Option<(Sender<()>, Receiver<()>)>,
    shared: Arc<MockShared>,
}

impl MockEventInterface {
    pub fn new(devices: Vec<MockDeviceSpec>) -> Self {
        let released = vec![false; devices.len()];
        Self {
            devices,
            released,
            initialized: false,
            init_failure: None,
            init_delay: Duration::ZERO,
            failing_cleanups: HashSet::new(),
            gate: None,
            shared: Arc::new(MockShared::default()),
        }
    }

    /// A typical desktop: keyboard, mouse, rumble gamepad and a lid switch
    /// that reports no buttons or axes
    pub fn desktop() -> Self {
        Self::new(vec![
            MockDeviceSpec::new("AT Translated Set 2 keyboard").with_buttons(248),
            MockDeviceSpec::new("Logitech USB Optical Mouse")
                .with_rel_axes(4)
                .with_buttons(5),
            MockDeviceSpec::new("Microsoft X-Box 360 pad")
                .with_abs_axes(8)
                .with_buttons(11)
                .with_force_feedback(),
            MockDeviceSpec::new("Lid Switch"),
        ])
    }

    /// Load the device list from a TOML file of `[[device]]` tables
    pub fn from_profile_file(path: &Path) -> Result<Self, DeviceError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, DeviceError> {
        let set: MockDeviceSet = toml::from_str(contents)
            .map_err(|e| DeviceError::InitializationFailed(e.to_string()))?;
        Ok(Self::new(set.devices))
    }

    /// Make `init` fail with the given reason
    pub fn failing_init(mut self, reason: impl Into<String>) -> Self {
        self.init_failure = Some(reason.into());
        self
    }

    /// Make `init` take at least `delay`
    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    /// Make `cleanup(index)` report an error
    pub fn failing_cleanup(mut self, index: usize) -> Self {
        self.failing_cleanups.insert(index);
        self
    }

    /// Park the first rumble dispatch until the returned gate is released
    pub fn gate_first_rumble(&mut self) -> RumbleGate {
        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel();
        self.gate = Some((entered_tx, release_rx));
        RumbleGate {
            entered: entered_rx,
            release: release_tx,
        }
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn spec(&self, index: usize) -> Result<&MockDeviceSpec, DeviceError> {
        if !self.initialized {
            return Err(DeviceError::NotInitialized);
        }
        match self.devices.get(index) {
            Some(spec) if !self.released[index] => Ok(spec),
            _ => Err(DeviceError::NoSuchDevice(index)),
        }
    }
}

impl EventInterface for MockEventInterface {
    fn init(&mut self) -> Result<(), DeviceError> {
        self.shared.record(|c| c.init_calls += 1);
        if !self.init_delay.is_zero() {
            std::thread::sleep(self.init_delay);
        }
        if let Some(reason) = &self.init_failure {
            return Err(DeviceError::InitializationFailed(reason.clone()));
        }
        self.initialized = true;
        tracing::debug!("[MOCK] Event subsystem initialized with {} devices", self.devices.len());
        Ok(())
    }

    fn device_count(&self) -> usize {
        if self.initialized { self.devices.len() } else { 0 }
    }

    fn device_name(&self, index: usize) -> Result<String, DeviceError> {
        Ok(self.spec(index)?.name.clone())
    }

    fn abs_axis_count(&self, index: usize) -> Result<usize, DeviceError> {
        Ok(self.spec(index)?.abs_axes)
    }

    fn rel_axis_count(&self, index: usize) -> Result<usize, DeviceError> {
        Ok(self.spec(index)?.rel_axes)
    }

    fn button_count(&self, index: usize) -> Result<usize, DeviceError> {
        Ok(self.spec(index)?.buttons)
    }

    fn has_force_feedback(&self, index: usize) -> bool {
        self.spec(index).is_ok_and(|s| s.force_feedback)
    }

    fn rumble(&mut self, index: usize, force: f32) -> Result<(), DeviceError> {
        if !self.spec(index)?.force_feedback {
            return Err(DeviceError::NoForceFeedback(index));
        }
        self.shared.record(|c| c.rumbles.push((index, force)));
        tracing::debug!("[MOCK] Rumble {:.2} on device {}", force, index);

        if let Some((entered, release)) = self.gate.take() {
            let _ = entered.send(());
            let _ = release.recv();
        }
        Ok(())
    }

    fn cleanup(&mut self, index: usize) -> Result<(), DeviceError> {
        self.shared.record(|c| c.cleanups.push(index));
        if index >= self.devices.len() {
            return Err(DeviceError::NoSuchDevice(index));
        }
        if self.failing_cleanups.contains(&index) {
            return Err(DeviceError::Io(std::io::Error::other(
                "simulated cleanup failure",
            )));
        }
        self.released[index] = true;
        tracing::debug!("[MOCK] Device {} released", index);
        Ok(())
    }
}

impl Drop for MockEventInterface {
    fn drop(&mut self) {
        self.shared.record(|c| c.dropped = true);
    }
}
