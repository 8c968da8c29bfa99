//! Event-subsystem lifecycle
//!
//! A single worker thread owns the native [`EventInterface`]: it initializes
//! it, enumerates devices, dispatches rumble requests, and tears everything
//! down exactly once. Other threads only touch the two monitors below and the
//! one-slot rumble mailbox.
//!
//! - the wake monitor carries "shutdown requested" and the pending rumble,
//!   and is what the worker sleeps on
//! - the completion monitor carries "cleanup done", and is what shutdown
//!   requesters sleep on

use crate::config::EnvironmentConfig;
use inputenv_hal::{DeviceDescriptor, DeviceError, EventInterface};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, sync_channel};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Event subsystem initialization failed: {0}")]
    InitFailed(#[from] DeviceError),

    #[error("Worker did not finish initialization within {0:?}")]
    InitTimedOut(Duration),

    #[error("Worker exited before acknowledging initialization")]
    WorkerGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    NotStarted,
    Running,
    ShutdownRequested,
    CleanupDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Teardown finished (now or earlier)
    Completed,
    /// The configured shutdown timeout elapsed first
    TimedOut,
}

/// A rumble waiting for the worker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RumbleRequest {
    pub device_index: usize,
    pub force: f32,
}

#[derive(Debug, Default)]
struct WakeState {
    running: bool,
    shutdown: bool,
    pending: Option<RumbleRequest>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Coordination state of one coordinator
#[derive(Debug)]
pub(crate) struct Shared {
    wake: Mutex<WakeState>,
    wake_signal: Condvar,
    cleanup_done: Mutex<bool>,
    completion_signal: Condvar,
    shutdown_timeout: Option<Duration>,
}

impl Shared {
    fn new(shutdown_timeout: Option<Duration>) -> Self {
        Self {
            wake: Mutex::new(WakeState::default()),
            wake_signal: Condvar::new(),
            cleanup_done: Mutex::new(false),
            completion_signal: Condvar::new(),
            shutdown_timeout,
        }
    }

    fn phase(&self) -> LifecyclePhase {
        let done = *lock(&self.cleanup_done);
        if done {
            return LifecyclePhase::CleanupDone;
        }
        let state = lock(&self.wake);
        if state.shutdown {
            LifecyclePhase::ShutdownRequested
        } else if state.running {
            LifecyclePhase::Running
        } else {
            LifecyclePhase::NotStarted
        }
    }

    /// Store a rumble in the mailbox, replacing any undelivered one
    pub(crate) fn request_rumble(&self, device_index: usize, force: f32) -> bool {
        let mut state = lock(&self.wake);
        if state.shutdown {
            tracing::debug!("Rumble for device {} dropped, shutdown in progress", device_index);
            return false;
        }
        if let Some(previous) = state.pending.replace(RumbleRequest {
            device_index,
            force,
        }) {
            tracing::trace!("Rumble for device {} superseded", previous.device_index);
        }
        self.wake_signal.notify_one();
        true
    }

    /// Flag shutdown, wake the worker and wait for teardown to complete
    pub(crate) fn request_shutdown(&self) -> ShutdownOutcome {
        {
            let mut state = lock(&self.wake);
            if !state.shutdown {
                state.shutdown = true;
                tracing::info!("Shutdown requested");
            }
            self.wake_signal.notify_all();
        }

        let done = lock(&self.cleanup_done);
        match self.shutdown_timeout {
            None => {
                let _done = self
                    .completion_signal
                    .wait_while(done, |done| !*done)
                    .unwrap_or_else(PoisonError::into_inner);
                ShutdownOutcome::Completed
            }
            Some(timeout) => {
                let (done, _) = self
                    .completion_signal
                    .wait_timeout_while(done, timeout, |done| !*done)
                    .unwrap_or_else(PoisonError::into_inner);
                if *done {
                    ShutdownOutcome::Completed
                } else {
                    tracing::warn!("Shutdown did not complete within {:?}", timeout);
                    ShutdownOutcome::TimedOut
                }
            }
        }
    }

    fn mark_running(&self) {
        lock(&self.wake).running = true;
    }

    fn mark_cleanup_done(&self) {
        *lock(&self.cleanup_done) = true;
        self.completion_signal.notify_all();
    }

    /// Serve rumble requests until shutdown is requested
    fn serve<I: EventInterface>(&self, interface: &mut I) {
        let mut state = lock(&self.wake);
        loop {
            if state.shutdown {
                if let Some(request) = state.pending.take() {
                    tracing::debug!(
                        "Discarding rumble for device {} at shutdown",
                        request.device_index
                    );
                }
                return;
            }

            if let Some(request) = state.pending.take() {
                drop(state);
                dispatch(interface, request);
                state = lock(&self.wake);
                continue;
            }

            // Spurious wake-ups go round the loop again
            state = self
                .wake_signal
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

fn dispatch<I: EventInterface>(interface: &mut I, request: RumbleRequest) {
    if let Err(e) = interface.rumble(request.device_index, request.force) {
        tracing::warn!("Rumble on device {} failed: {}", request.device_index, e);
    }
}

fn enumerate<I: EventInterface>(interface: &I) -> Vec<DeviceDescriptor> {
    (0..interface.device_count())
        .filter_map(|index| match interface.descriptor(index) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                tracing::warn!("Skipping device {}: {}", index, e);
                None
            }
        })
        .collect()
}

/// Release every device, continuing past failures
fn teardown<I: EventInterface>(interface: &mut I, grace: Duration) {
    // Let running feedback effects finish
    if !grace.is_zero() {
        thread::sleep(grace);
    }

    let count = interface.device_count();
    tracing::info!("Releasing {} devices", count);
    for index in 0..count {
        if let Err(e) = interface.cleanup(index) {
            tracing::warn!("Cleanup of device {} failed: {}", index, e);
        }
    }
}

/// Marks cleanup done when the worker exits, including by panic
struct CompletionGuard {
    shared: Arc<Shared>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::error!("Event worker panicked, releasing shutdown waiters");
        }
        self.shared.mark_cleanup_done();
    }
}

type InitResult = Result<Vec<DeviceDescriptor>, DeviceError>;

fn run_worker<I: EventInterface>(
    interface: I,
    shared: Arc<Shared>,
    ack: SyncSender<InitResult>,
    grace: Duration,
) {
    let _completion = CompletionGuard {
        shared: Arc::clone(&shared),
    };
    // Declared after the guard so the binding is released before waiters
    // are, on every exit path including unwinding
    let mut interface = interface;

    if let Err(e) = interface.init() {
        tracing::error!("Event subsystem initialization failed: {}", e);
        lock(&shared.wake).shutdown = true;
        let _ = ack.send(Err(e));
        return;
    }

    let devices = enumerate(&interface);
    shared.mark_running();
    tracing::info!("Event worker running with {} devices", devices.len());
    // The constructor may already have given up waiting
    let _ = ack.send(Ok(devices));

    shared.serve(&mut interface);

    tracing::info!("Cleaning up event subsystem");
    teardown(&mut interface, grace);
    drop(interface);
}

/// One-shot acknowledgment that the worker finished initializing
pub struct InitAck {
    rx: Receiver<InitResult>,
}

impl InitAck {
    /// Wait for the enumerated devices
    pub fn wait(self, timeout: Duration) -> Result<Vec<DeviceDescriptor>, LifecycleError> {
        match self.rx.recv_timeout(timeout) {
            Ok(Ok(devices)) => Ok(devices),
            Ok(Err(e)) => Err(LifecycleError::InitFailed(e)),
            Err(RecvTimeoutError::Timeout) => Err(LifecycleError::InitTimedOut(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(LifecycleError::WorkerGone),
        }
    }
}

/// Sending side of the rumble mailbox, held by rumblers
///
/// Holds a weak reference, so rumblers outliving the environment do nothing.
#[derive(Debug, Clone)]
pub struct RumbleChannel {
    shared: Weak<Shared>,
}

impl RumbleChannel {
    /// A channel that accepts nothing
    pub fn disconnected() -> Self {
        Self {
            shared: Weak::new(),
        }
    }

    pub fn send(&self, device_index: usize, force: f32) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.request_rumble(device_index, force),
            None => {
                tracing::debug!("Rumble for device {} dropped, environment is gone", device_index);
                false
            }
        }
    }
}

/// Owner of the worker thread and its coordination state
pub struct LifecycleCoordinator {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LifecycleCoordinator {
    /// Spawn the worker. The interface moves onto the worker thread and is
    /// never touched from anywhere else.
    pub fn start<I: EventInterface + 'static>(
        interface: I,
        config: &EnvironmentConfig,
    ) -> Result<(Self, InitAck), LifecycleError> {
        let shared = Arc::new(Shared::new(config.shutdown_timeout()));
        let (ack_tx, ack_rx) = sync_channel(1);
        let grace = config.cleanup_grace();

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("inputenv-worker".into())
            .spawn(move || run_worker(interface, worker_shared, ack_tx, grace))
            .map_err(LifecycleError::Spawn)?;
        tracing::info!("Event worker thread started");

        Ok((
            Self {
                shared,
                worker: Mutex::new(Some(worker)),
            },
            InitAck { rx: ack_rx },
        ))
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.shared.phase()
    }

    pub fn rumble_channel(&self) -> RumbleChannel {
        RumbleChannel {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Queue a rumble, replacing any not yet delivered. Fire-and-forget.
    pub fn request_rumble(&self, device_index: usize, force: f32) -> bool {
        self.shared.request_rumble(device_index, force)
    }

    /// Request teardown and block until it has completed. Safe to call any
    /// number of times from any thread; teardown runs once.
    pub fn request_shutdown(&self) -> ShutdownOutcome {
        let outcome = self.shared.request_shutdown();
        if outcome == ShutdownOutcome::Completed {
            if let Some(worker) = lock(&self.worker).take() {
                if worker.join().is_err() {
                    tracing::warn!("Event worker thread panicked");
                }
            }
        }
        outcome
    }

    pub(crate) fn shared(&self) -> Weak<Shared> {
        Arc::downgrade(&self.shared)
    }
}

impl Drop for LifecycleCoordinator {
    fn drop(&mut self) {
        self.request_shutdown();
    }
}
