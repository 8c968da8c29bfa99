//! Linux event device backend
//!
//! Enumerates `/dev/input/event*` nodes through evdev and dispatches
//! force-feedback effects to them.

use crate::{DeviceError, EventInterface, force_to_magnitude};
use evdev::{Device, FFEffect, FFEffectCode, FFEffectData, FFEffectKind, FFReplay, FFTrigger};
use std::fs;
use std::path::{Path, PathBuf};

/// Default directory holding event device nodes
pub const DEFAULT_DEVICE_DIR: &str = "/dev/input";

/// Default rumble replay length in milliseconds
pub const DEFAULT_RUMBLE_MS: u16 = 500;

/// An opened event device and its cached capabilities
struct OpenDevice {
    path: PathBuf,
    name: String,
    abs_axes: usize,
    rel_axes: usize,
    buttons: usize,
    force_feedback: bool,
    device: Device,
    effect: Option<FFEffect>,
}

/// Event subsystem backed by evdev
pub struct EvdevInterface {
    device_dir: PathBuf,
    rumble_ms: u16,
    initialized: bool,
    // Released devices leave a `None` so indices stay stable
    devices: Vec<Option<OpenDevice>>,
}

impl EvdevInterface {
    pub fn new() -> Self {
        Self::with_device_dir(DEFAULT_DEVICE_DIR)
    }

    pub fn with_device_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            device_dir: dir.into(),
            rumble_ms: DEFAULT_RUMBLE_MS,
            initialized: false,
            devices: Vec::new(),
        }
    }

    /// Set the replay length of rumble effects
    pub fn with_rumble_duration(mut self, millis: u16) -> Self {
        self.rumble_ms = millis;
        self
    }

    /// Event node paths in kernel order (`event0`, `event1`, ..., `event10`)
    fn event_nodes(dir: &Path) -> Result<Vec<PathBuf>, DeviceError> {
        let mut nodes: Vec<(u32, PathBuf)> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                let number = name.strip_prefix("event")?.parse::<u32>().ok()?;
                Some((number, e.path()))
            })
            .collect();

        nodes.sort_by_key(|(number, _)| *number);
        Ok(nodes.into_iter().map(|(_, path)| path).collect())
    }

    /// Open a node and read its capabilities
    fn probe_device(path: &Path) -> Result<OpenDevice, DeviceError> {
        let device = Device::open(path)?;

        let name = device.name().unwrap_or("Unknown").trim().to_string();
        let buttons = device.supported_keys().map_or(0, |keys| keys.iter().count());
        let rel_axes = device
            .supported_relative_axes()
            .map_or(0, |axes| axes.iter().count());
        let abs_axes = device
            .supported_absolute_axes()
            .map_or(0, |axes| axes.iter().count());
        let force_feedback = device
            .supported_ff()
            .is_some_and(|ff| ff.contains(FFEffectCode::FF_RUMBLE));

        Ok(OpenDevice {
            path: path.to_path_buf(),
            name,
            abs_axes,
            rel_axes,
            buttons,
            force_feedback,
            device,
            effect: None,
        })
    }

    fn open_device(&self, index: usize) -> Result<&OpenDevice, DeviceError> {
        if !self.initialized {
            return Err(DeviceError::NotInitialized);
        }
        self.devices
            .get(index)
            .and_then(Option::as_ref)
            .ok_or(DeviceError::NoSuchDevice(index))
    }

    fn rumble_effect(&self, magnitude: u16) -> FFEffectData {
        FFEffectData {
            direction: 0,
            trigger: FFTrigger {
                button: 0,
                interval: 0,
            },
            replay: FFReplay {
                length: self.rumble_ms,
                delay: 0,
            },
            kind: FFEffectKind::Rumble {
                strong_magnitude: magnitude,
                weak_magnitude: magnitude,
            },
        }
    }
}

impl Default for EvdevInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl EventInterface for EvdevInterface {
    fn init(&mut self) -> Result<(), DeviceError> {
        if !self.device_dir.exists() {
            return Err(DeviceError::InitializationFailed(format!(
                "{} does not exist",
                self.device_dir.display()
            )));
        }

        self.devices.clear();
        for path in Self::event_nodes(&self.device_dir)? {
            match Self::probe_device(&path) {
                Ok(device) => {
                    tracing::debug!(
                        "Opened {} at {} (abs={}, rel={}, buttons={}, ff={})",
                        device.name,
                        device.path.display(),
                        device.abs_axes,
                        device.rel_axes,
                        device.buttons,
                        device.force_feedback
                    );
                    self.devices.push(Some(device));
                }
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", path.display(), e);
                }
            }
        }

        self.initialized = true;
        tracing::info!(
            "Event subsystem initialized with {} devices from {}",
            self.devices.len(),
            self.device_dir.display()
        );
        Ok(())
    }

    fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn device_name(&self, index: usize) -> Result<String, DeviceError> {
        Ok(self.open_device(index)?.name.clone())
    }

    fn abs_axis_count(&self, index: usize) -> Result<usize, DeviceError> {
        Ok(self.open_device(index)?.abs_axes)
    }

    fn rel_axis_count(&self, index: usize) -> Result<usize, DeviceError> {
        Ok(self.open_device(index)?.rel_axes)
    }

    fn button_count(&self, index: usize) -> Result<usize, DeviceError> {
        Ok(self.open_device(index)?.buttons)
    }

    fn has_force_feedback(&self, index: usize) -> bool {
        self.open_device(index).is_ok_and(|d| d.force_feedback)
    }

    fn rumble(&mut self, index: usize, force: f32) -> Result<(), DeviceError> {
        let magnitude = force_to_magnitude(force);
        let data = self.rumble_effect(magnitude);

        self.open_device(index)?;
        let Some(Some(open)) = self.devices.get_mut(index) else {
            return Err(DeviceError::NoSuchDevice(index));
        };
        if !open.force_feedback {
            return Err(DeviceError::NoForceFeedback(index));
        }

        // Dropping the previous effect erases it from the device
        open.effect = None;
        if magnitude == 0 {
            tracing::debug!("Rumble stopped on {}", open.name);
            return Ok(());
        }

        let mut effect = open.device.upload_ff_effect(data)?;
        effect.play(1)?;
        open.effect = Some(effect);
        tracing::debug!("Rumble {:.2} on {}", force, open.name);
        Ok(())
    }

    fn cleanup(&mut self, index: usize) -> Result<(), DeviceError> {
        let slot = self
            .devices
            .get_mut(index)
            .ok_or(DeviceError::NoSuchDevice(index))?;

        if let Some(mut open) = slot.take() {
            if let Some(mut effect) = open.effect.take() {
                effect.stop()?;
            }
            tracing::debug!("Closed {} at {}", open.name, open.path.display());
        }
        Ok(())
    }
}
