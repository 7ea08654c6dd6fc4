//! USB device manager
//!
//! Owns the native context and composes enumeration, filtering, and session
//! opening. Every enumeration wraps the native device list in a [`Defer`]
//! guard so the list is freed on success and on every error path.

use std::rc::Rc;

use tracing::debug;

use crate::backend::{HostBackend, LibusbBackend};
use crate::device::UsbDevice;
use crate::error::UsbError;
use crate::guard::Defer;
use crate::session::{FromOpenHandle, UsbSession};
use crate::types::{DeviceId, LogLevel};

/// Device manager over one native context
///
/// Devices and sessions created through the manager share the backend via
/// `Rc`, so the context provably outlives them; the context itself is torn
/// down when the last owner drops. Deliberately not `Send`/`Sync` — the
/// native context is not safe for concurrent use.
pub struct UsbManager<B: HostBackend = LibusbBackend> {
    backend: Rc<B>,
}

impl UsbManager<LibusbBackend> {
    /// Initialize a manager over a fresh libusb context
    pub fn new() -> Result<Self, UsbError> {
        Ok(UsbManager::with_backend(LibusbBackend::new()?))
    }
}

impl<B: HostBackend> UsbManager<B> {
    /// Build a manager over an already-initialized backend
    pub fn with_backend(backend: B) -> Self {
        UsbManager {
            backend: Rc::new(backend),
        }
    }

    /// Access the underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Set the native library's logging verbosity (default: none)
    pub fn set_log_level(&self, level: LogLevel) {
        self.backend.set_log_level(level);
    }

    /// Enumerate all attached devices as full descriptor models
    ///
    /// A descriptor-fetch failure on any device aborts the whole call:
    /// devices constructed before the failure are dropped (releasing their
    /// references) and no partial list is returned.
    pub fn list_devices(&self) -> Result<Vec<UsbDevice<B>>, UsbError> {
        let list = self.backend.device_list().map_err(UsbError::Enumeration)?;
        let backend = &self.backend;
        let _free = Defer::new(move || backend.free_device_list(list));

        let mut devices = Vec::new();
        for device in self.backend.devices_in(list) {
            devices.push(UsbDevice::new(Rc::clone(&self.backend), device)?);
        }

        debug!("Enumerated {} devices", devices.len());
        Ok(devices)
    }

    /// Identity keys of attached devices matching a vendor/product filter
    ///
    /// `None` means "don't filter on this field". Cheaper than
    /// [`UsbManager::list_devices`]: no references are acquired and no
    /// descriptor models are built.
    pub fn find_devices(
        &self,
        vendor_id: Option<u16>,
        product_id: Option<u16>,
    ) -> Result<Vec<DeviceId>, UsbError> {
        let list = self.backend.device_list().map_err(UsbError::Enumeration)?;
        let backend = &self.backend;
        let _free = Defer::new(move || backend.free_device_list(list));

        let mut ids = Vec::new();
        for device in self.backend.devices_in(list) {
            let bus = self.backend.bus_number(device);
            let address = self.backend.device_address(device);
            let descriptor = self
                .backend
                .device_descriptor(device)
                .map_err(|code| UsbError::DescriptorFetch { bus, address, code })?;

            if vendor_id.is_some_and(|vid| descriptor.vendor_id != vid) {
                continue;
            }
            if product_id.is_some_and(|pid| descriptor.product_id != pid) {
                continue;
            }

            ids.push(DeviceId::from_parts(bus, address));
        }
        Ok(ids)
    }

    /// Open the device with identity `id` and build a session around it
    ///
    /// Re-enumerates and locates the device by its derived identity.
    /// Returns `Ok(None)` when no attached device matches — an identity
    /// from an earlier enumeration may have gone stale, which is expected
    /// rather than an error. If session construction fails after the
    /// native open succeeded, the handle is closed before the error
    /// propagates.
    pub fn open<S: FromOpenHandle<B>>(&self, id: DeviceId) -> Result<Option<S>, UsbError> {
        let list = self.backend.device_list().map_err(UsbError::Enumeration)?;
        let backend = &self.backend;
        let _free = Defer::new(move || backend.free_device_list(list));

        for device in self.backend.devices_in(list) {
            let found = DeviceId::from_parts(
                self.backend.bus_number(device),
                self.backend.device_address(device),
            );
            if found != id {
                continue;
            }

            let handle = self
                .backend
                .open(device)
                .map_err(|code| UsbError::native("open", code))?;

            return match S::from_open_handle(Rc::clone(&self.backend), device, handle) {
                Ok(session) => Ok(Some(session)),
                Err(err) => {
                    self.backend.close(handle);
                    Err(err)
                }
            };
        }

        debug!("Device {} not present in current enumeration", id);
        Ok(None)
    }

    /// [`UsbManager::open`] specialized to the default session type
    pub fn open_session(&self, id: DeviceId) -> Result<Option<UsbSession<B>>, UsbError> {
        self.open(id)
    }
}
