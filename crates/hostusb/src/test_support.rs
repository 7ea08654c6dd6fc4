//! Instrumented in-memory backend for tests
//!
//! [`MockBackend`] implements [`HostBackend`] over a fixed set of synthetic
//! devices, counts every acquisition/release pairing (references, handles,
//! claims, lists), and injects failures per device or per operation. Used
//! by the lifecycle integration tests; exported so downstream crates can
//! test against the same surface.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::backend::HostBackend;
use crate::strings::encode_string_descriptor;
use crate::types::{ConfigDescriptor, DeviceDescriptor, LogLevel};

/// One synthetic device
pub struct MockDevice {
    pub bus: u8,
    pub address: u8,
    pub descriptor: DeviceDescriptor,
    pub config: ConfigDescriptor,
    /// Raw string descriptors by index
    pub strings: HashMap<u8, Vec<u8>>,
    /// Fail descriptor fetches with this native code
    pub descriptor_failure: Option<i32>,
    /// Fail opens with this native code
    pub open_failure: Option<i32>,
}

impl MockDevice {
    /// A well-formed device with the given topology and identity
    pub fn new(bus: u8, address: u8, vendor_id: u16, product_id: u16) -> Self {
        MockDevice {
            bus,
            address,
            descriptor: DeviceDescriptor {
                usb_version: 0x0200,
                class: 0,
                subclass: 0,
                protocol: 0,
                max_packet_size_0: 64,
                vendor_id,
                product_id,
                device_version: 0x0100,
                manufacturer_index: 0,
                product_index: 0,
                serial_number_index: 0,
                num_configurations: 1,
            },
            config: ConfigDescriptor {
                num_interfaces: 1,
                configuration_value: 1,
                configuration_index: 0,
                attributes: 0x80,
                max_power: 50,
                interfaces: Vec::new(),
            },
            strings: HashMap::new(),
            descriptor_failure: None,
            open_failure: None,
        }
    }

    /// Attach an encoded string descriptor at `index`
    ///
    /// Callers point the relevant descriptor index field at it themselves.
    pub fn with_string(mut self, index: u8, text: &str) -> Self {
        self.strings.insert(index, encode_string_descriptor(text));
        self
    }
}

/// Acquisition/release counters
///
/// Tests assert symmetry: after all objects are destroyed, every counter
/// pair must balance.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MockCounters {
    pub refs: u32,
    pub unrefs: u32,
    pub opens: u32,
    pub closes: u32,
    pub claims: u32,
    pub releases: u32,
    pub detaches: u32,
    pub lists: u32,
    pub list_frees: u32,
}

#[derive(Default)]
struct MockState {
    counters: MockCounters,
    next_handle: usize,
    // handle token -> device index
    open_handles: HashMap<usize, usize>,
    configuration: i32,
    log_level: Option<LogLevel>,
}

/// In-memory [`HostBackend`] with failure injection
#[derive(Default)]
pub struct MockBackend {
    devices: Vec<MockDevice>,
    state: RefCell<MockState>,
    /// Fail list acquisition with this code
    pub list_failure: Option<i32>,
    /// Fail claims with this code
    pub claim_failure: Option<i32>,
    /// Fail releases with this code
    pub release_failure: Option<i32>,
    /// Raw result of kernel-driver queries (0, 1, or negative)
    pub kernel_driver_state: i32,
    /// Fail get_configuration with this code
    pub get_configuration_failure: Option<i32>,
}

impl MockBackend {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        MockBackend {
            devices,
            ..MockBackend::default()
        }
    }

    /// Snapshot of the counters
    pub fn counters(&self) -> MockCounters {
        self.state.borrow().counters.clone()
    }

    /// Configuration value as seen by the mock device
    pub fn configuration(&self) -> i32 {
        self.state.borrow().configuration
    }

    /// Last verbosity passed to [`HostBackend::set_log_level`]
    pub fn log_level(&self) -> Option<LogLevel> {
        self.state.borrow().log_level
    }

    fn device_of(&self, handle: usize) -> Option<&MockDevice> {
        let index = *self.state.borrow().open_handles.get(&handle)?;
        self.devices.get(index)
    }
}

impl HostBackend for MockBackend {
    type DeviceRef = usize;
    type DeviceList = usize;
    type Handle = usize;

    fn set_log_level(&self, level: LogLevel) {
        self.state.borrow_mut().log_level = Some(level);
    }

    fn device_list(&self) -> Result<Self::DeviceList, i32> {
        if let Some(code) = self.list_failure {
            return Err(code);
        }
        let mut state = self.state.borrow_mut();
        state.counters.lists += 1;
        Ok(state.counters.lists as usize)
    }

    fn devices_in(&self, _list: Self::DeviceList) -> Vec<Self::DeviceRef> {
        (0..self.devices.len()).collect()
    }

    fn free_device_list(&self, _list: Self::DeviceList) {
        self.state.borrow_mut().counters.list_frees += 1;
    }

    fn ref_device(&self, _device: Self::DeviceRef) {
        self.state.borrow_mut().counters.refs += 1;
    }

    fn unref_device(&self, _device: Self::DeviceRef) {
        self.state.borrow_mut().counters.unrefs += 1;
    }

    fn bus_number(&self, device: Self::DeviceRef) -> u8 {
        self.devices[device].bus
    }

    fn device_address(&self, device: Self::DeviceRef) -> u8 {
        self.devices[device].address
    }

    fn device_descriptor(&self, device: Self::DeviceRef) -> Result<DeviceDescriptor, i32> {
        let device = &self.devices[device];
        match device.descriptor_failure {
            Some(code) => Err(code),
            None => Ok(device.descriptor.clone()),
        }
    }

    fn config_descriptor(&self, device: Self::DeviceRef, _index: u8) -> Result<ConfigDescriptor, i32> {
        let device = &self.devices[device];
        match device.descriptor_failure {
            Some(code) => Err(code),
            None => Ok(device.config.clone()),
        }
    }

    fn open(&self, device: Self::DeviceRef) -> Result<Self::Handle, i32> {
        if let Some(code) = self.devices[device].open_failure {
            return Err(code);
        }
        let mut state = self.state.borrow_mut();
        state.counters.opens += 1;
        state.next_handle += 1;
        let handle = state.next_handle;
        state.open_handles.insert(handle, device);
        Ok(handle)
    }

    fn close(&self, handle: Self::Handle) {
        let mut state = self.state.borrow_mut();
        state.counters.closes += 1;
        state.open_handles.remove(&handle);
    }

    fn get_configuration(&self, _handle: Self::Handle) -> Result<i32, i32> {
        if let Some(code) = self.get_configuration_failure {
            return Err(code);
        }
        Ok(self.state.borrow().configuration)
    }

    fn set_configuration(&self, _handle: Self::Handle, configuration: i32) -> Result<(), i32> {
        self.state.borrow_mut().configuration = configuration;
        Ok(())
    }

    fn kernel_driver_active(&self, _handle: Self::Handle, _interface: u8) -> i32 {
        self.kernel_driver_state
    }

    fn detach_kernel_driver(&self, _handle: Self::Handle, _interface: u8) -> Result<(), i32> {
        self.state.borrow_mut().counters.detaches += 1;
        Ok(())
    }

    fn claim_interface(&self, _handle: Self::Handle, _interface: u8) -> Result<(), i32> {
        if let Some(code) = self.claim_failure {
            return Err(code);
        }
        self.state.borrow_mut().counters.claims += 1;
        Ok(())
    }

    fn release_interface(&self, _handle: Self::Handle, _interface: u8) -> Result<(), i32> {
        // Counted as an attempt even when injected to fail: release
        // symmetry is about attempts, not successes.
        self.state.borrow_mut().counters.releases += 1;
        if let Some(code) = self.release_failure {
            return Err(code);
        }
        Ok(())
    }

    fn read_string_descriptor(
        &self,
        handle: Self::Handle,
        index: u8,
        buf: &mut [u8],
    ) -> Result<usize, i32> {
        let raw = self
            .device_of(handle)
            .and_then(|device| device.strings.get(&index))
            .ok_or(-5)?;
        let n = raw.len().min(buf.len());
        buf[..n].copy_from_slice(&raw[..n]);
        Ok(n)
    }
}
