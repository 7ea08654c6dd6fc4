//! Device lifecycle layer for a native USB host-controller library
//!
//! This crate manages USB device enumeration, descriptor decoding, and the
//! lifecycle of opened device sessions (open, configure, claim interface,
//! release, close) with deterministic cleanup on every exit path.
//!
//! The native library is consumed through the [`backend::HostBackend`]
//! trait. Production code uses [`backend::LibusbBackend`]; tests substitute
//! the instrumented backend from [`test_support`].
//!
//! # Example
//!
//! ```no_run
//! use hostusb::{LogLevel, UsbManager};
//!
//! # fn main() -> Result<(), hostusb::UsbError> {
//! let manager = UsbManager::new()?;
//! manager.set_log_level(LogLevel::Warning);
//!
//! for device in manager.list_devices()? {
//!     let report = device.describe(None);
//!     println!("{}: {:04x}:{:04x}", device.id(), report.vendor_id, report.product_id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod device;
pub mod error;
pub mod guard;
pub mod manager;
pub mod session;
pub mod strings;
pub mod test_support;
pub mod types;

pub use backend::{HostBackend, LibusbBackend};
pub use device::UsbDevice;
pub use error::{Result, UsbError};
pub use guard::Defer;
pub use manager::UsbManager;
pub use session::{FromOpenHandle, UsbSession};
pub use types::{
    ConfigDescriptor, DeviceDescriptor, DeviceId, DeviceReport, EndpointDescriptor,
    InterfaceDescriptor, LogLevel,
};
