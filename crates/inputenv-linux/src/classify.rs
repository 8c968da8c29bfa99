//! Device classification
//!
//! Guesses whether a device is a mouse, a keyboard or a joystick-like
//! controller from its name and component counts. Each signal nudges one of
//! three scores up or down; a kind wins only with a strict maximum, and
//! anything undecided is treated as a stick.

use crate::controller::{Controller, ControllerKind, LinuxDevice, LinuxKeyboard, LinuxMouse, Rumbler};
use crate::lifecycle::RumbleChannel;
use inputenv_hal::DeviceDescriptor;

/// Keyboards report far more keys than any pointer or pad
pub const KEYBOARD_BUTTON_THRESHOLD: usize = 64;

/// Relative axes needed to look like a pointer
pub const POINTER_REL_AXES: usize = 2;

/// Absolute axes needed to look like a stick
pub const STICK_ABS_AXES: usize = 2;

/// Per-kind likeness of one device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassificationScore {
    pub mouse: i32,
    pub keyboard: i32,
    pub stick: i32,
}

impl ClassificationScore {
    /// Score a device from its name and component counts
    pub fn of(descriptor: &DeviceDescriptor) -> Self {
        let mut score = Self::default();
        let name = descriptor.name.to_lowercase();

        if name.contains("mouse") {
            score.mouse += 1;
        }
        if name.contains("keyboard") {
            score.keyboard += 1;
        }
        if name.contains("joystick") {
            score.stick += 1;
        }

        score.mouse += nudge(descriptor.rel_axes >= POINTER_REL_AXES);
        score.stick += nudge(descriptor.abs_axes >= STICK_ABS_AXES);
        score.keyboard += nudge(descriptor.buttons > KEYBOARD_BUTTON_THRESHOLD);

        score
    }

    /// The kind with a strict maximum, or `Stick` when none has one
    pub fn decide(&self) -> ControllerKind {
        if self.mouse > self.keyboard && self.mouse > self.stick {
            ControllerKind::Mouse
        } else if self.keyboard > self.mouse && self.keyboard > self.stick {
            ControllerKind::Keyboard
        } else {
            ControllerKind::Stick
        }
    }
}

fn nudge(matches: bool) -> i32 {
    if matches { 1 } else { -1 }
}

/// Classify a device. Never fails; zero-component devices are classified
/// too and left for the caller to filter.
pub fn classify(descriptor: &DeviceDescriptor) -> ControllerKind {
    let score = ClassificationScore::of(descriptor);
    let kind = score.decide();
    tracing::debug!(
        "Classified {} as {} (mouse={}, keyboard={}, stick={})",
        descriptor.name,
        kind,
        score.mouse,
        score.keyboard,
        score.stick
    );
    kind
}

/// Build the controller object for a classified device
///
/// A rumbler is attached when the device supports force feedback.
pub fn build_controller(
    descriptor: &DeviceDescriptor,
    kind: ControllerKind,
    rumble: &RumbleChannel,
) -> Controller {
    let mut device = LinuxDevice::new(descriptor, kind);
    if descriptor.force_feedback {
        device = device.with_rumbler(Rumbler::new(descriptor.index, rumble.clone()));
    }

    match kind {
        ControllerKind::Mouse => Controller::Mouse(LinuxMouse::new(device)),
        ControllerKind::Keyboard => Controller::Keyboard(LinuxKeyboard::new(device)),
        ControllerKind::Stick => Controller::Stick(device),
    }
}
