//! Linux controller environment
//!
//! Discovers event devices, classifies each as a mouse, keyboard or
//! joystick-like controller, and runs the background worker that owns the
//! native event subsystem for the life of the environment.
//!
//! # Example
//!
//! ```no_run
//! use inputenv_linux::{ControllerEnvironment, LinuxEnvironment};
//!
//! let env = LinuxEnvironment::new();
//! for controller in env.controllers() {
//!     println!("{controller}");
//!     if let Some(rumbler) = controller.rumblers().first() {
//!         rumbler.rumble(0.5);
//!     }
//! }
//! env.request_shutdown();
//! ```

pub mod classify;
pub mod config;
pub mod controller;
pub mod environment;
pub mod exit_hook;
pub mod lifecycle;

pub use classify::{ClassificationScore, build_controller, classify};
pub use config::{ConfigError, EnvironmentConfig};
pub use controller::{Controller, ControllerKind, LinuxDevice, LinuxKeyboard, LinuxMouse, Rumbler};
pub use environment::{ControllerEnvironment, LinuxEnvironment, Platform, create_controllers};
pub use lifecycle::{
    InitAck, LifecycleCoordinator, LifecycleError, LifecyclePhase, RumbleChannel, RumbleRequest,
    ShutdownOutcome,
};
