//! Controller objects built from classified devices

use crate::lifecycle::RumbleChannel;
use inputenv_hal::DeviceDescriptor;
use std::fmt;

/// What a device was classified as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    Mouse,
    Keyboard,
    /// Generic multi-axis controller; also the fallback for anything unclear
    Stick,
}

impl ControllerKind {
    pub fn name(&self) -> &'static str {
        match self {
            ControllerKind::Mouse => "mouse",
            ControllerKind::Keyboard => "keyboard",
            ControllerKind::Stick => "stick",
        }
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Force-feedback actuator of one device
///
/// Requests go through the environment's rumble mailbox; the native call is
/// made by the worker thread.
#[derive(Clone)]
pub struct Rumbler {
    device_index: usize,
    channel: RumbleChannel,
}

impl Rumbler {
    pub(crate) fn new(device_index: usize, channel: RumbleChannel) -> Self {
        Self {
            device_index,
            channel,
        }
    }

    pub fn device_index(&self) -> usize {
        self.device_index
    }

    /// Start a rumble at `force` (`0.0..=1.0`). Returns false when the
    /// request was not accepted, e.g. after shutdown.
    pub fn rumble(&self, force: f32) -> bool {
        self.channel.send(self.device_index, force)
    }

    pub fn stop(&self) -> bool {
        self.rumble(0.0)
    }
}

impl fmt::Debug for Rumbler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rumbler")
            .field("device_index", &self.device_index)
            .finish()
    }
}

/// Generic event device
#[derive(Debug, Clone)]
pub struct LinuxDevice {
    index: usize,
    name: String,
    buttons: usize,
    rel_axes: usize,
    abs_axes: usize,
    kind: ControllerKind,
    rumblers: Vec<Rumbler>,
}

impl LinuxDevice {
    pub fn new(descriptor: &DeviceDescriptor, kind: ControllerKind) -> Self {
        Self {
            index: descriptor.index,
            name: descriptor.name.clone(),
            buttons: descriptor.buttons,
            rel_axes: descriptor.rel_axes,
            abs_axes: descriptor.abs_axes,
            kind,
            rumblers: Vec::new(),
        }
    }

    pub(crate) fn with_rumbler(mut self, rumbler: Rumbler) -> Self {
        self.rumblers.push(rumbler);
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    pub fn button_count(&self) -> usize {
        self.buttons
    }

    pub fn rel_axis_count(&self) -> usize {
        self.rel_axes
    }

    pub fn abs_axis_count(&self) -> usize {
        self.abs_axes
    }

    pub fn component_count(&self) -> usize {
        self.buttons + self.rel_axes + self.abs_axes
    }

    pub fn rumblers(&self) -> &[Rumbler] {
        &self.rumblers
    }
}

/// Pointer device: a ball of up to two relative axes, optional wheel, buttons
#[derive(Debug, Clone)]
pub struct LinuxMouse {
    device: LinuxDevice,
}

impl LinuxMouse {
    pub fn new(device: LinuxDevice) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &LinuxDevice {
        &self.device
    }

    /// Relative axes that move the pointer (X and Y)
    pub fn ball_axes(&self) -> usize {
        self.device.rel_axes.min(2)
    }

    pub fn has_wheel(&self) -> bool {
        self.device.rel_axes >= 3
    }

    pub fn button_count(&self) -> usize {
        self.device.buttons
    }
}

#[derive(Debug, Clone)]
pub struct LinuxKeyboard {
    device: LinuxDevice,
}

impl LinuxKeyboard {
    pub fn new(device: LinuxDevice) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &LinuxDevice {
        &self.device
    }

    pub fn key_count(&self) -> usize {
        self.device.buttons
    }
}

/// A controller exposed by the environment
#[derive(Debug, Clone)]
pub enum Controller {
    Mouse(LinuxMouse),
    Keyboard(LinuxKeyboard),
    Stick(LinuxDevice),
}

impl Controller {
    pub fn device(&self) -> &LinuxDevice {
        match self {
            Controller::Mouse(mouse) => mouse.device(),
            Controller::Keyboard(keyboard) => keyboard.device(),
            Controller::Stick(device) => device,
        }
    }

    pub fn index(&self) -> usize {
        self.device().index()
    }

    pub fn name(&self) -> &str {
        self.device().name()
    }

    pub fn kind(&self) -> ControllerKind {
        self.device().kind()
    }

    pub fn component_count(&self) -> usize {
        self.device().component_count()
    }

    pub fn rumblers(&self) -> &[Rumbler] {
        self.device().rumblers()
    }
}

impl fmt::Display for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let device = self.device();
        write!(
            f,
            "[{}] {} ({}: {} buttons, {} rel, {} abs)",
            device.index, device.name, device.kind, device.buttons, device.rel_axes, device.abs_axes
        )
    }
}
