//! Device object: identity plus descriptor snapshots
//!
//! A [`UsbDevice`] holds one acquired native device reference together with
//! the device and first-configuration descriptors fetched at construction.
//! The reference is released exactly once, on drop.

use std::rc::Rc;

use tracing::debug;

use crate::backend::HostBackend;
use crate::error::UsbError;
use crate::guard::Defer;
use crate::session::UsbSession;
use crate::strings;
use crate::types::{ConfigDescriptor, DeviceDescriptor, DeviceId, DeviceReport};

/// One attached USB device, not necessarily open
///
/// Not clonable: cloning would require a second reference acquisition and
/// open the door to double release. Obtain instances through
/// [`crate::UsbManager::list_devices`].
pub struct UsbDevice<B: HostBackend> {
    backend: Rc<B>,
    device: B::DeviceRef,
    id: DeviceId,
    descriptor: DeviceDescriptor,
    config: ConfigDescriptor,
}

impl<B: HostBackend> std::fmt::Debug for UsbDevice<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbDevice")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B: HostBackend> UsbDevice<B> {
    /// Acquire a reference to `device` and snapshot its descriptors
    ///
    /// On a failed descriptor fetch the acquired reference is released
    /// before the error propagates.
    pub(crate) fn new(backend: Rc<B>, device: B::DeviceRef) -> Result<Self, UsbError> {
        backend.ref_device(device);

        let bus = backend.bus_number(device);
        let address = backend.device_address(device);

        let descriptor = match backend.device_descriptor(device) {
            Ok(descriptor) => descriptor,
            Err(code) => {
                backend.unref_device(device);
                return Err(UsbError::DescriptorFetch { bus, address, code });
            }
        };
        let config = match backend.config_descriptor(device, 0) {
            Ok(config) => config,
            Err(code) => {
                backend.unref_device(device);
                return Err(UsbError::DescriptorFetch { bus, address, code });
            }
        };

        Ok(UsbDevice {
            backend,
            device,
            id: DeviceId::from_parts(bus, address),
            descriptor,
            config,
        })
    }

    /// Identity key, derived from bus number and device address
    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn bus_number(&self) -> u8 {
        self.id.bus_number()
    }

    pub fn device_address(&self) -> u8 {
        self.id.device_address()
    }

    /// Device descriptor snapshot taken at construction
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// First-configuration descriptor snapshot taken at construction
    pub fn config(&self) -> &ConfigDescriptor {
        &self.config
    }

    /// Produce a structured description of the device
    ///
    /// String descriptor indices are resolved through `session`'s handle
    /// when one is supplied, otherwise through a temporarily opened handle.
    /// If opening fails the string fields are omitted; the descriptor
    /// fields are reported either way.
    pub fn describe(&self, session: Option<&UsbSession<B>>) -> DeviceReport {
        match session {
            Some(session) => self.report_with(Some(session.raw_handle())),
            None => match self.backend.open(self.device) {
                Ok(handle) => {
                    let backend = &self.backend;
                    let _close = Defer::new(move || backend.close(handle));
                    self.report_with(Some(handle))
                }
                Err(code) => {
                    debug!(
                        "Could not open device {} to read strings (native code {})",
                        self.id, code
                    );
                    self.report_with(None)
                }
            },
        }
    }

    fn report_with(&self, handle: Option<B::Handle>) -> DeviceReport {
        let resolve = |index: u8| -> Option<String> {
            let handle = handle?;
            if index == 0 {
                return None;
            }
            let text = strings::read_string(self.backend.as_ref(), handle, index);
            if text.is_empty() { None } else { Some(text) }
        };

        DeviceReport {
            id: self.id,
            bus_number: self.bus_number(),
            device_address: self.device_address(),
            usb_version: self.descriptor.usb_version,
            class: self.descriptor.class,
            subclass: self.descriptor.subclass,
            protocol: self.descriptor.protocol,
            max_packet_size_0: self.descriptor.max_packet_size_0,
            vendor_id: self.descriptor.vendor_id,
            product_id: self.descriptor.product_id,
            device_version: self.descriptor.device_version,
            manufacturer: resolve(self.descriptor.manufacturer_index),
            product: resolve(self.descriptor.product_index),
            serial_number: resolve(self.descriptor.serial_number_index),
            num_configurations: self.descriptor.num_configurations,
            num_interfaces: self.config.num_interfaces,
            configuration_value: self.config.configuration_value,
            configuration: resolve(self.config.configuration_index),
            attributes: self.config.attributes,
            max_power_ma: self.config.max_power_milliamps(),
        }
    }
}

impl<B: HostBackend> Drop for UsbDevice<B> {
    fn drop(&mut self) {
        self.backend.unref_device(self.device);
    }
}
