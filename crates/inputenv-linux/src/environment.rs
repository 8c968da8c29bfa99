//! Linux controller environment
//!
//! Construction checks the platform, starts the event worker, waits for its
//! initialization acknowledgment, and classifies every enumerated device.
//! The controller list is fixed from then on.

use crate::classify::{build_controller, classify};
use crate::config::EnvironmentConfig;
use crate::controller::Controller;
use crate::exit_hook;
use crate::lifecycle::{LifecycleCoordinator, LifecyclePhase, RumbleChannel, ShutdownOutcome};
use inputenv_hal::{DeviceDescriptor, EventInterface};

/// Operating system the environment runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    os_name: String,
}

impl Platform {
    pub fn current() -> Self {
        Self::named(std::env::consts::OS)
    }

    pub fn named(os_name: impl Into<String>) -> Self {
        Self {
            os_name: os_name.into(),
        }
    }

    pub fn os_name(&self) -> &str {
        &self.os_name
    }

    pub fn is_supported(&self) -> bool {
        self.os_name.to_lowercase().contains("linux")
    }
}

/// What the host framework sees of an environment
pub trait ControllerEnvironment {
    /// Controllers found at construction, or an empty slice
    fn controllers(&self) -> &[Controller];

    fn is_supported(&self) -> bool;
}

/// Classify descriptors into controllers, dropping devices with no
/// components. Order follows the descriptors.
pub fn create_controllers(
    descriptors: &[DeviceDescriptor],
    rumble: &RumbleChannel,
) -> Vec<Controller> {
    descriptors
        .iter()
        .map(|descriptor| build_controller(descriptor, classify(descriptor), rumble))
        .filter(|controller| {
            let keep = controller.component_count() > 0;
            if !keep {
                tracing::debug!("Ignoring {}: no buttons or axes", controller.name());
            }
            keep
        })
        .collect()
}

pub struct LinuxEnvironment {
    supported: bool,
    controllers: Vec<Controller>,
    coordinator: Option<LifecycleCoordinator>,
}

impl LinuxEnvironment {
    /// Environment over the real event devices, configured from the
    /// default configuration locations
    pub fn new() -> Self {
        let config = EnvironmentConfig::load_default().unwrap_or_else(|e| {
            tracing::warn!("Ignoring configuration: {}", e);
            EnvironmentConfig::default()
        });
        Self::with_config(&config)
    }

    #[cfg(target_os = "linux")]
    pub fn with_config(config: &EnvironmentConfig) -> Self {
        let interface = inputenv_hal::EvdevInterface::with_device_dir(&config.device_dir)
            .with_rumble_duration(config.rumble_duration_ms);
        Self::with_interface(Platform::current(), interface, config)
    }

    #[cfg(not(target_os = "linux"))]
    pub fn with_config(_config: &EnvironmentConfig) -> Self {
        let platform = Platform::current();
        tracing::info!("OS name is {}, Linux environment not supported", platform.os_name());
        Self::unsupported()
    }

    /// Environment over any event interface. The interface is only used
    /// when the platform is supported.
    pub fn with_interface<I: EventInterface + 'static>(
        platform: Platform,
        interface: I,
        config: &EnvironmentConfig,
    ) -> Self {
        if !platform.is_supported() {
            tracing::info!("OS name is {}, Linux environment not supported", platform.os_name());
            return Self::unsupported();
        }
        tracing::info!("OS name is {}, Linux environment supported", platform.os_name());

        let (coordinator, ack) = match LifecycleCoordinator::start(interface, config) {
            Ok(started) => started,
            Err(e) => {
                tracing::error!("Could not start event worker: {}", e);
                return Self {
                    supported: true,
                    controllers: Vec::new(),
                    coordinator: None,
                };
            }
        };

        if config.register_exit_hook {
            exit_hook::register_global(coordinator.shared());
        }
        if config.handle_signals {
            install_signal_exit();
        }

        let controllers = match ack.wait(config.init_timeout()) {
            Ok(descriptors) => create_controllers(&descriptors, &coordinator.rumble_channel()),
            Err(e) => {
                tracing::error!("No controllers available: {}", e);
                Vec::new()
            }
        };
        tracing::info!("Created {} controllers", controllers.len());

        Self {
            supported: true,
            controllers,
            coordinator: Some(coordinator),
        }
    }

    fn unsupported() -> Self {
        Self {
            supported: false,
            controllers: Vec::new(),
            coordinator: None,
        }
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn phase(&self) -> LifecyclePhase {
        match &self.coordinator {
            Some(coordinator) => coordinator.phase(),
            None => LifecyclePhase::NotStarted,
        }
    }

    /// Tear down the event subsystem and wait for it. Idempotent.
    pub fn request_shutdown(&self) -> ShutdownOutcome {
        match &self.coordinator {
            Some(coordinator) => coordinator.request_shutdown(),
            None => ShutdownOutcome::Completed,
        }
    }

    /// Queue a rumble for the worker; a newer request replaces an
    /// undelivered one
    pub fn request_rumble(&self, device_index: usize, force: f32) -> bool {
        match &self.coordinator {
            Some(coordinator) => coordinator.request_rumble(device_index, force),
            None => false,
        }
    }
}

#[cfg(unix)]
fn install_signal_exit() {
    if let Err(e) = exit_hook::install_signal_exit() {
        tracing::warn!("Could not install signal handlers: {}", e);
    }
}

#[cfg(not(unix))]
fn install_signal_exit() {
    tracing::warn!("Signal handling is only available on Unix");
}

impl Default for LinuxEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerEnvironment for LinuxEnvironment {
    fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    fn is_supported(&self) -> bool {
        self.supported
    }
}
