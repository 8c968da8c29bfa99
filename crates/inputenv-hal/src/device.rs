//! Device descriptors and the event-subsystem interface
//!
//! An [`EventInterface`] is owned by a single thread for its whole life.
//! It is `Send` so it can be moved onto that thread, but nothing here is
//! required to be `Sync`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Event subsystem initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Event subsystem not initialized")]
    NotInitialized,

    #[error("No device at index {0}")]
    NoSuchDevice(usize),

    #[error("Device {0} does not support force feedback")]
    NoForceFeedback(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Name and component counts of one device, as reported by the subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub index: usize,
    pub name: String,
    pub abs_axes: usize,
    pub rel_axes: usize,
    pub buttons: usize,
    #[serde(default)]
    pub force_feedback: bool,
}

impl DeviceDescriptor {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
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

    pub fn with_force_feedback(mut self, supported: bool) -> Self {
        self.force_feedback = supported;
        self
    }

    /// Buttons plus relative and absolute axes
    pub fn component_count(&self) -> usize {
        self.buttons + self.rel_axes + self.abs_axes
    }
}

/// Operations the core consumes from the native event subsystem
pub trait EventInterface: Send {
    /// Open the subsystem and discover devices. Called once, before any query.
    fn init(&mut self) -> Result<(), DeviceError>;

    fn device_count(&self) -> usize;

    fn device_name(&self, index: usize) -> Result<String, DeviceError>;

    fn abs_axis_count(&self, index: usize) -> Result<usize, DeviceError>;

    fn rel_axis_count(&self, index: usize) -> Result<usize, DeviceError>;

    fn button_count(&self, index: usize) -> Result<usize, DeviceError>;

    fn has_force_feedback(&self, _index: usize) -> bool {
        false
    }

    /// Play a feedback effect. `force` is clamped to `0.0..=1.0`; zero stops
    /// whatever is playing.
    fn rumble(&mut self, index: usize, force: f32) -> Result<(), DeviceError>;

    /// Release one device. Releasing an already released device is a no-op.
    fn cleanup(&mut self, index: usize) -> Result<(), DeviceError>;

    fn descriptor(&self, index: usize) -> Result<DeviceDescriptor, DeviceError> {
        Ok(DeviceDescriptor {
            index,
            name: self.device_name(index)?,
            abs_axes: self.abs_axis_count(index)?,
            rel_axes: self.rel_axis_count(index)?,
            buttons: self.button_count(index)?,
            force_feedback: self.has_force_feedback(index),
        })
    }
}
