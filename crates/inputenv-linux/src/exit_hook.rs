//! Process-exit hooks
//!
//! Coordinators register here so that leaving the process (returning from
//! `main`, `std::process::exit`) still tears the event subsystem down. The
//! global registry is run from a `libc::atexit` callback installed once.
//!
//! Signals do not run `atexit` handlers, so [`install_signal_exit`] bridges
//! SIGINT/SIGTERM through a self-pipe to a watcher thread that exits the
//! process normally.

use crate::lifecycle::Shared;
use std::sync::{Mutex, Once, OnceLock, PoisonError, Weak};

/// Coordinators to shut down at exit
#[derive(Debug, Default)]
pub struct ExitHooks {
    hooks: Mutex<Vec<Weak<Shared>>>,
}

impl ExitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, shared: Weak<Shared>) {
        let mut hooks = self.hooks.lock().unwrap_or_else(PoisonError::into_inner);
        hooks.retain(|hook| hook.strong_count() > 0);
        hooks.push(shared);
    }

    /// Number of coordinators still alive
    pub fn live_count(&self) -> usize {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|hook| hook.strong_count() > 0)
            .count()
    }

    /// Shut down every registered coordinator that is still alive
    pub fn run(&self) {
        let hooks = std::mem::take(
            &mut *self.hooks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for shared in hooks.iter().filter_map(Weak::upgrade) {
            shared.request_shutdown();
        }
    }
}

static GLOBAL: OnceLock<ExitHooks> = OnceLock::new();
static ATEXIT: Once = Once::new();

extern "C" fn run_global_hooks() {
    // Unwinding out of an atexit callback aborts the process
    let _ = std::panic::catch_unwind(|| {
        if let Some(hooks) = GLOBAL.get() {
            tracing::info!("Running exit hooks");
            hooks.run();
        }
    });
}

/// Register a coordinator with the process-wide exit hooks
pub(crate) fn register_global(shared: Weak<Shared>) {
    GLOBAL.get_or_init(ExitHooks::new).register(shared);
    ATEXIT.call_once(|| {
        // SAFETY: registering a plain extern "C" function with no arguments
        let rc = unsafe { libc::atexit(run_global_hooks) };
        if rc != 0 {
            tracing::warn!("Failed to register process exit hook");
        }
    });
}

#[cfg(unix)]
mod signals {
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
    use std::fs::File;
    use std::io::Read;
    use std::os::fd::{FromRawFd, IntoRawFd, OwnedFd};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::thread::JoinHandle;

    static PIPE_WRITE: AtomicI32 = AtomicI32::new(-1);
    static INSTALLED: Mutex<bool> = Mutex::new(false);

    extern "C" fn forward_signal(sig: i32) {
        let fd = PIPE_WRITE.load(Ordering::Relaxed);
        if fd >= 0 {
            let byte = sig as u8;
            // SAFETY: write(2) is async-signal-safe; the buffer is one valid byte
            unsafe {
                libc::write(fd, (&byte as *const u8).cast(), 1);
            }
        }
    }

    fn spawn_watcher(mut reader: File) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("inputenv-signals".into())
            .spawn(move || {
                let mut byte = [0u8; 1];
                // EOF means installation was rolled back
                if reader.read_exact(&mut byte).is_ok() {
                    let signo = i32::from(byte[0]);
                    tracing::info!("Received signal {}, exiting", signo);
                    std::process::exit(128 + signo);
                }
            })
    }

    pub fn install() -> nix::Result<()> {
        install_with(spawn_watcher)
    }

    /// Install once; a failed attempt leaves nothing behind and the next
    /// call tries again
    pub(super) fn install_with(
        spawn: impl FnOnce(File) -> std::io::Result<JoinHandle<()>>,
    ) -> nix::Result<()> {
        let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
        if *installed {
            return Ok(());
        }

        let (read_end, write_end) = nix::unistd::pipe()?;
        // On failure `write_end` closes here and the watcher sees EOF
        let _watcher = spawn(File::from(read_end)).map_err(|e| {
            tracing::warn!("Could not start signal watcher: {}", e);
            nix::Error::EAGAIN
        })?;

        PIPE_WRITE.store(write_end.into_raw_fd(), Ordering::Relaxed);
        if let Err(e) = set_handlers(SigHandler::Handler(forward_signal)) {
            let _ = set_handlers(SigHandler::SigDfl);
            let fd = PIPE_WRITE.swap(-1, Ordering::Relaxed);
            // SAFETY: fd came from into_raw_fd above and nothing else owns it
            drop(unsafe { OwnedFd::from_raw_fd(fd) });
            return Err(e);
        }

        *installed = true;
        tracing::debug!("SIGINT/SIGTERM now exit through the exit hooks");
        Ok(())
    }

    fn set_handlers(handler: SigHandler) -> nix::Result<()> {
        let action = SigAction::new(handler, SaFlags::SA_RESTART, SigSet::empty());
        // SAFETY: the forwarding handler only calls write(2)
        unsafe {
            sigaction(Signal::SIGTERM, &action)?;
            sigaction(Signal::SIGINT, &action)?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(super) fn is_installed() -> bool {
        *INSTALLED.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    pub(super) fn pipe_fd() -> i32 {
        PIPE_WRITE.load(Ordering::Relaxed)
    }
}

/// Make SIGINT and SIGTERM exit the process normally so exit hooks run
#[cfg(unix)]
pub fn install_signal_exit() -> nix::Result<()> {
    signals::install()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;
    use crate::lifecycle::{LifecycleCoordinator, LifecyclePhase};
    use inputenv_hal::mock::MockEventInterface;
    use std::time::Duration;

    #[test]
    fn test_run_shuts_down_live_coordinators() {
        let config = EnvironmentConfig {
            cleanup_grace_ms: 0,
            ..EnvironmentConfig::default()
        };
        let mock = MockEventInterface::desktop();
        let handle = mock.handle();
        let (coordinator, ack) = LifecycleCoordinator::start(mock, &config).unwrap();
        ack.wait(Duration::from_secs(5)).unwrap();

        let hooks = ExitHooks::new();
        hooks.register(coordinator.shared());
        assert_eq!(hooks.live_count(), 1);

        hooks.run();
        assert_eq!(coordinator.phase(), LifecyclePhase::CleanupDone);
        assert_eq!(handle.cleanups(), vec![0, 1, 2, 3]);
        assert_eq!(hooks.live_count(), 0);

        // Explicit shutdown afterwards observes the finished teardown
        coordinator.request_shutdown();
        assert_eq!(handle.cleanups().len(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_signal_install_is_reported_again() {
        let failing_spawn = |_reader: std::fs::File| -> std::io::Result<std::thread::JoinHandle<()>> {
            Err(std::io::Error::other("thread limit reached"))
        };

        assert!(signals::install_with(failing_spawn).is_err());
        assert!(!signals::is_installed());
        assert_eq!(signals::pipe_fd(), -1);

        // Nothing was recorded as installed, so the next attempt fails too
        assert!(signals::install_with(failing_spawn).is_err());
        assert_eq!(signals::pipe_fd(), -1);
    }

    #[test]
    fn test_dead_coordinators_are_skipped() {
        let hooks = ExitHooks::new();
        hooks.register(Weak::new());
        assert_eq!(hooks.live_count(), 0);
        hooks.run();
    }
}
