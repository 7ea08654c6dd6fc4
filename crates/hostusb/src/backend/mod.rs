//! Native host-controller backend abstraction
//!
//! The lifecycle layer never calls the native library directly; it goes
//! through [`HostBackend`] so that tests can substitute the instrumented
//! in-memory backend from [`crate::test_support`]. Methods mirror the
//! native collaborator surface one to one, returning raw negative status
//! codes that the layers above translate into [`crate::UsbError`].

use crate::types::{ConfigDescriptor, DeviceDescriptor, LogLevel};

mod libusb;

pub use libusb::LibusbBackend;

/// Capability surface of the native USB host-controller library
///
/// Tokens are opaque `Copy` values; the ownership discipline (one unref per
/// ref, one close per open, list freed exactly once) is enforced by the
/// device, session, and manager types, not by the backend.
pub trait HostBackend {
    /// Reference-counted device token, valid while at least one reference
    /// acquired through [`HostBackend::ref_device`] or an unfreed device
    /// list is held.
    type DeviceRef: Copy;
    /// Enumeration-list token, released with [`HostBackend::free_device_list`].
    type DeviceList: Copy;
    /// Open-session token, released with [`HostBackend::close`].
    type Handle: Copy;

    /// Set the native library's logging verbosity
    fn set_log_level(&self, level: LogLevel);

    /// Acquire the list of currently attached devices
    fn device_list(&self) -> Result<Self::DeviceList, i32>;

    /// Device references contained in an unfreed list
    ///
    /// The references are borrowed from the list: they stay valid until
    /// [`HostBackend::free_device_list`] unless individually acquired with
    /// [`HostBackend::ref_device`].
    fn devices_in(&self, list: Self::DeviceList) -> Vec<Self::DeviceRef>;

    /// Release an enumeration list and the references it holds
    fn free_device_list(&self, list: Self::DeviceList);

    /// Increment the reference count of a device
    fn ref_device(&self, device: Self::DeviceRef);

    /// Decrement the reference count of a device
    fn unref_device(&self, device: Self::DeviceRef);

    fn bus_number(&self, device: Self::DeviceRef) -> u8;

    fn device_address(&self, device: Self::DeviceRef) -> u8;

    /// Fetch the device descriptor
    fn device_descriptor(&self, device: Self::DeviceRef) -> Result<DeviceDescriptor, i32>;

    /// Fetch one configuration descriptor as an owned snapshot
    fn config_descriptor(
        &self,
        device: Self::DeviceRef,
        index: u8,
    ) -> Result<ConfigDescriptor, i32>;

    /// Open a device for configuration, claim, and transfer operations
    fn open(&self, device: Self::DeviceRef) -> Result<Self::Handle, i32>;

    /// Close an open handle
    fn close(&self, handle: Self::Handle);

    /// Currently active configuration value
    fn get_configuration(&self, handle: Self::Handle) -> Result<i32, i32>;

    fn set_configuration(&self, handle: Self::Handle, configuration: i32) -> Result<(), i32>;

    /// Kernel-driver query, returned raw: 0 inactive, 1 active, negative
    /// is a native error code
    fn kernel_driver_active(&self, handle: Self::Handle, interface: u8) -> i32;

    fn detach_kernel_driver(&self, handle: Self::Handle, interface: u8) -> Result<(), i32>;

    fn claim_interface(&self, handle: Self::Handle, interface: u8) -> Result<(), i32>;

    fn release_interface(&self, handle: Self::Handle, interface: u8) -> Result<(), i32>;

    /// Raw string-descriptor control read into `buf`
    ///
    /// Returns the number of bytes transferred. Decoding and the two-step
    /// length probe live in [`crate::strings`].
    fn read_string_descriptor(
        &self,
        handle: Self::Handle,
        index: u8,
        buf: &mut [u8],
    ) -> Result<usize, i32>;
}
