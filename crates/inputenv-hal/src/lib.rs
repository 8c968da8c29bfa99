//! Native event-subsystem binding
//!
//! This crate describes what the inputenv core needs from the operating
//! system's input subsystem, and provides two implementations of it:
//!
//! - [`EvdevInterface`]: Linux event devices under `/dev/input` (Linux only)
//! - [`mock::MockEventInterface`]: a scriptable in-memory backend for
//!   development and testing on machines without the hardware
//!
//! # Example
//!
//! ```no_run
//! use inputenv_hal::{EventInterface, mock::MockEventInterface};
//!
//! fn main() -> inputenv_hal::Result<()> {
//!     let mut interface = MockEventInterface::desktop();
//!     interface.init()?;
//!     for index in 0..interface.device_count() {
//!         let descriptor = interface.descriptor(index)?;
//!         println!("{}: {} components", descriptor.name, descriptor.component_count());
//!     }
//!     Ok(())
//! }
//! ```

pub mod device;
#[cfg(target_os = "linux")]
pub mod input;
pub mod mock;

pub use device::{DeviceDescriptor, DeviceError, EventInterface};
#[cfg(target_os = "linux")]
pub use input::EvdevInterface;

/// HAL Result type
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Convert a normalized force into a rumble magnitude
///
/// Forces outside `0.0..=1.0` are clamped; NaN is treated as zero.
pub fn force_to_magnitude(force: f32) -> u16 {
    if force.is_nan() {
        return 0;
    }
    (force.clamp(0.0, 1.0) * f32::from(u16::MAX)).round() as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_to_magnitude_bounds() {
        assert_eq!(force_to_magnitude(0.0), 0);
        assert_eq!(force_to_magnitude(1.0), u16::MAX);
        assert_eq!(force_to_magnitude(2.5), u16::MAX);
        assert_eq!(force_to_magnitude(-1.0), 0);
        assert_eq!(force_to_magnitude(f32::NAN), 0);
    }

    #[test]
    fn test_force_to_magnitude_midpoint() {
        let half = force_to_magnitude(0.5);
        assert!((32767..=32768).contains(&half));
    }
}
