//! libusb-backed implementation of [`HostBackend`]
//!
//! Built on the raw `rusb::ffi` bindings rather than the safe wrappers:
//! the lifecycle layer above owns reference counting, list freeing, and
//! close-once semantics itself, and the safe API would duplicate them.
//!
//! Config descriptors are copied into owned snapshots and the native
//! allocation is freed before the fetch returns, so no native descriptor
//! memory outlives a backend call.

use std::mem::MaybeUninit;
use std::os::raw::{c_int, c_uchar, c_uint};
use std::ptr;
use std::slice;

use rusb::ffi;
use rusb::ffi::constants::{
    LIBUSB_DT_STRING, LIBUSB_ENDPOINT_IN, LIBUSB_LOG_LEVEL_DEBUG, LIBUSB_LOG_LEVEL_ERROR,
    LIBUSB_LOG_LEVEL_INFO, LIBUSB_LOG_LEVEL_NONE, LIBUSB_LOG_LEVEL_WARNING,
    LIBUSB_OPTION_LOG_LEVEL, LIBUSB_REQUEST_GET_DESCRIPTOR,
};

use crate::backend::HostBackend;
use crate::error::UsbError;
use crate::types::{
    ConfigDescriptor, DeviceDescriptor, EndpointDescriptor, InterfaceDescriptor, LogLevel,
};

const STRING_DESCRIPTOR_TIMEOUT_MS: c_uint = 1000;

/// Production backend owning one libusb context
///
/// The context is initialized once in [`LibusbBackend::new`] and torn down
/// exactly once on drop. Raw pointers make this type `!Send`/`!Sync`,
/// matching the single-threaded model of the layer above.
pub struct LibusbBackend {
    context: *mut ffi::libusb_context,
}

impl LibusbBackend {
    /// Initialize a libusb context
    pub fn new() -> Result<Self, UsbError> {
        let mut context = ptr::null_mut();
        let rc = unsafe { ffi::libusb_init(&mut context) };
        if rc < 0 {
            return Err(UsbError::ContextInit(rc));
        }
        Ok(LibusbBackend { context })
    }
}

impl Drop for LibusbBackend {
    fn drop(&mut self) {
        unsafe { ffi::libusb_exit(self.context) };
    }
}

impl HostBackend for LibusbBackend {
    type DeviceRef = *mut ffi::libusb_device;
    type DeviceList = *const *mut ffi::libusb_device;
    type Handle = *mut ffi::libusb_device_handle;

    fn set_log_level(&self, level: LogLevel) {
        let native = match level {
            LogLevel::None => LIBUSB_LOG_LEVEL_NONE,
            LogLevel::Error => LIBUSB_LOG_LEVEL_ERROR,
            LogLevel::Warning => LIBUSB_LOG_LEVEL_WARNING,
            LogLevel::Info => LIBUSB_LOG_LEVEL_INFO,
            LogLevel::Debug => LIBUSB_LOG_LEVEL_DEBUG,
        };
        unsafe { ffi::libusb_set_option(self.context, LIBUSB_OPTION_LOG_LEVEL, native as c_int) };
    }

    fn device_list(&self) -> Result<Self::DeviceList, i32> {
        let mut list = ptr::null();
        let rc = unsafe { ffi::libusb_get_device_list(self.context, &mut list) };
        if rc < 0 {
            return Err(rc as i32);
        }
        Ok(list)
    }

    fn devices_in(&self, list: Self::DeviceList) -> Vec<Self::DeviceRef> {
        // The native list is a null-terminated pointer array.
        let mut devices = Vec::new();
        let mut cursor = list;
        unsafe {
            while !(*cursor).is_null() {
                devices.push(*cursor);
                cursor = cursor.add(1);
            }
        }
        devices
    }

    fn free_device_list(&self, list: Self::DeviceList) {
        unsafe { ffi::libusb_free_device_list(list, 1) };
    }

    fn ref_device(&self, device: Self::DeviceRef) {
        unsafe { ffi::libusb_ref_device(device) };
    }

    fn unref_device(&self, device: Self::DeviceRef) {
        unsafe { ffi::libusb_unref_device(device) };
    }

    fn bus_number(&self, device: Self::DeviceRef) -> u8 {
        unsafe { ffi::libusb_get_bus_number(device) }
    }

    fn device_address(&self, device: Self::DeviceRef) -> u8 {
        unsafe { ffi::libusb_get_device_address(device) }
    }

    fn device_descriptor(&self, device: Self::DeviceRef) -> Result<DeviceDescriptor, i32> {
        let mut raw = MaybeUninit::<ffi::libusb_device_descriptor>::uninit();
        let rc = unsafe { ffi::libusb_get_device_descriptor(device, raw.as_mut_ptr()) };
        if rc < 0 {
            return Err(rc);
        }
        let raw = unsafe { raw.assume_init() };
        Ok(DeviceDescriptor {
            usb_version: raw.bcdUSB,
            class: raw.bDeviceClass,
            subclass: raw.bDeviceSubClass,
            protocol: raw.bDeviceProtocol,
            max_packet_size_0: raw.bMaxPacketSize0,
            vendor_id: raw.idVendor,
            product_id: raw.idProduct,
            device_version: raw.bcdDevice,
            manufacturer_index: raw.iManufacturer,
            product_index: raw.iProduct,
            serial_number_index: raw.iSerialNumber,
            num_configurations: raw.bNumConfigurations,
        })
    }

    fn config_descriptor(
        &self,
        device: Self::DeviceRef,
        index: u8,
    ) -> Result<ConfigDescriptor, i32> {
        let mut raw = ptr::null();
        let rc = unsafe { ffi::libusb_get_config_descriptor(device, index, &mut raw) };
        if rc < 0 {
            return Err(rc);
        }
        let snapshot = unsafe { snapshot_config(raw) };
        unsafe { ffi::libusb_free_config_descriptor(raw) };
        Ok(snapshot)
    }

    fn open(&self, device: Self::DeviceRef) -> Result<Self::Handle, i32> {
        let mut handle = ptr::null_mut();
        let rc = unsafe { ffi::libusb_open(device, &mut handle) };
        if rc < 0 {
            return Err(rc);
        }
        Ok(handle)
    }

    fn close(&self, handle: Self::Handle) {
        unsafe { ffi::libusb_close(handle) };
    }

    fn get_configuration(&self, handle: Self::Handle) -> Result<i32, i32> {
        let mut configuration: c_int = 0;
        let rc = unsafe { ffi::libusb_get_configuration(handle, &mut configuration) };
        if rc < 0 {
            return Err(rc);
        }
        Ok(configuration)
    }

    fn set_configuration(&self, handle: Self::Handle, configuration: i32) -> Result<(), i32> {
        let rc = unsafe { ffi::libusb_set_configuration(handle, configuration as c_int) };
        if rc < 0 {
            return Err(rc);
        }
        Ok(())
    }

    fn kernel_driver_active(&self, handle: Self::Handle, interface: u8) -> i32 {
        unsafe { ffi::libusb_kernel_driver_active(handle, c_int::from(interface)) }
    }

    fn detach_kernel_driver(&self, handle: Self::Handle, interface: u8) -> Result<(), i32> {
        let rc = unsafe { ffi::libusb_detach_kernel_driver(handle, c_int::from(interface)) };
        if rc < 0 {
            return Err(rc);
        }
        Ok(())
    }

    fn claim_interface(&self, handle: Self::Handle, interface: u8) -> Result<(), i32> {
        let rc = unsafe { ffi::libusb_claim_interface(handle, c_int::from(interface)) };
        if rc < 0 {
            return Err(rc);
        }
        Ok(())
    }

    fn release_interface(&self, handle: Self::Handle, interface: u8) -> Result<(), i32> {
        let rc = unsafe { ffi::libusb_release_interface(handle, c_int::from(interface)) };
        if rc < 0 {
            return Err(rc);
        }
        Ok(())
    }

    fn read_string_descriptor(
        &self,
        handle: Self::Handle,
        index: u8,
        buf: &mut [u8],
    ) -> Result<usize, i32> {
        let rc = unsafe {
            ffi::libusb_control_transfer(
                handle,
                LIBUSB_ENDPOINT_IN as u8,
                LIBUSB_REQUEST_GET_DESCRIPTOR as u8,
                ((LIBUSB_DT_STRING as u16) << 8) | u16::from(index),
                0,
                buf.as_mut_ptr() as *mut c_uchar,
                buf.len() as u16,
                STRING_DESCRIPTOR_TIMEOUT_MS,
            )
        };
        if rc < 0 {
            return Err(rc);
        }
        Ok(rc as usize)
    }
}

/// Copy a native config descriptor tree into an owned snapshot
///
/// Caller must pass a valid descriptor pointer and free it afterwards.
unsafe fn snapshot_config(raw: *const ffi::libusb_config_descriptor) -> ConfigDescriptor {
    let config = unsafe { &*raw };
    let mut interfaces = Vec::new();

    if !config.interface.is_null() {
        let native_interfaces =
            unsafe { slice::from_raw_parts(config.interface, usize::from(config.bNumInterfaces)) };
        for native_interface in native_interfaces {
            if native_interface.altsetting.is_null() || native_interface.num_altsetting <= 0 {
                continue;
            }
            let alt_settings = unsafe {
                slice::from_raw_parts(
                    native_interface.altsetting,
                    native_interface.num_altsetting as usize,
                )
            };
            for alt in alt_settings {
                let endpoints = if alt.endpoint.is_null() || alt.bNumEndpoints == 0 {
                    Vec::new()
                } else {
                    let native_endpoints = unsafe {
                        slice::from_raw_parts(alt.endpoint, usize::from(alt.bNumEndpoints))
                    };
                    native_endpoints
                        .iter()
                        .map(|endpoint| EndpointDescriptor {
                            address: endpoint.bEndpointAddress,
                            attributes: endpoint.bmAttributes,
                            max_packet_size: endpoint.wMaxPacketSize,
                            interval: endpoint.bInterval,
                        })
                        .collect()
                };
                interfaces.push(InterfaceDescriptor {
                    interface_number: alt.bInterfaceNumber,
                    alternate_setting: alt.bAlternateSetting,
                    class: alt.bInterfaceClass,
                    subclass: alt.bInterfaceSubClass,
                    protocol: alt.bInterfaceProtocol,
                    endpoints,
                });
            }
        }
    }

    ConfigDescriptor {
        num_interfaces: config.bNumInterfaces,
        configuration_value: config.bConfigurationValue,
        configuration_index: config.iConfiguration,
        attributes: config.bmAttributes,
        max_power: config.bMaxPower,
        interfaces,
    }
}
