//! Open device session
//!
//! A [`UsbSession`] owns one open native handle and tracks whether an
//! interface is currently claimed. The handle is closed exactly once, and
//! only after a claimed interface has been given a best-effort release.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::backend::HostBackend;
use crate::error::UsbError;

/// Factory for session types constructed from a freshly opened handle
///
/// [`crate::UsbManager::open`] is generic over this trait so callers can
/// build their own session types around the same open/locate/cleanup
/// plumbing. On error the caller retains ownership of `handle` and closes
/// it; implementations must not close it themselves on the failure path.
pub trait FromOpenHandle<B: HostBackend>: Sized {
    fn from_open_handle(
        backend: Rc<B>,
        device: B::DeviceRef,
        handle: B::Handle,
    ) -> Result<Self, UsbError>;
}

/// An opened device
///
/// At most one interface is claimed at a time. Dropping the session
/// releases a still-claimed interface (best effort) and closes the handle.
pub struct UsbSession<B: HostBackend> {
    backend: Rc<B>,
    handle: B::Handle,
    claimed_interface: Option<u8>,
}

impl<B: HostBackend> FromOpenHandle<B> for UsbSession<B> {
    fn from_open_handle(
        backend: Rc<B>,
        device: B::DeviceRef,
        handle: B::Handle,
    ) -> Result<Self, UsbError> {
        log_endpoints(backend.as_ref(), device);
        Ok(UsbSession {
            backend,
            handle,
            claimed_interface: None,
        })
    }
}

impl<B: HostBackend> UsbSession<B> {
    /// Currently active configuration value
    pub fn configuration(&self) -> Result<i32, UsbError> {
        self.backend
            .get_configuration(self.handle)
            .map_err(|code| UsbError::native("get_configuration", code))
    }

    pub fn set_configuration(&mut self, configuration: i32) -> Result<(), UsbError> {
        self.backend
            .set_configuration(self.handle, configuration)
            .map_err(|code| UsbError::native("set_configuration", code))
    }

    /// Whether a kernel driver is bound to `interface`
    pub fn kernel_driver_active(&self, interface: u8) -> Result<bool, UsbError> {
        match self.backend.kernel_driver_active(self.handle, interface) {
            0 => Ok(false),
            1 => Ok(true),
            code => Err(UsbError::native("kernel_driver_active", code)),
        }
    }

    pub fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), UsbError> {
        self.backend
            .detach_kernel_driver(self.handle, interface)
            .map_err(|code| UsbError::native("detach_kernel_driver", code))
    }

    /// Claim `interface` for exclusive access
    ///
    /// On failure the session state is unchanged and further calls remain
    /// valid.
    pub fn claim_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        self.backend
            .claim_interface(self.handle, interface)
            .map_err(|code| UsbError::native("claim_interface", code))?;
        self.claimed_interface = Some(interface);
        Ok(())
    }

    pub fn release_interface(&mut self, interface: u8) -> Result<(), UsbError> {
        self.backend
            .release_interface(self.handle, interface)
            .map_err(|code| UsbError::native("release_interface", code))?;
        if self.claimed_interface == Some(interface) {
            self.claimed_interface = None;
        }
        Ok(())
    }

    /// Interface currently claimed through this session, if any
    pub fn claimed_interface(&self) -> Option<u8> {
        self.claimed_interface
    }

    pub(crate) fn raw_handle(&self) -> B::Handle {
        self.handle
    }
}

impl<B: HostBackend> Drop for UsbSession<B> {
    fn drop(&mut self) {
        // Destruction never fails: a failed release is logged and the
        // handle is closed regardless.
        if let Some(interface) = self.claimed_interface.take()
            && let Err(code) = self.backend.release_interface(self.handle, interface)
        {
            warn!(
                "Failed to release interface {} while closing session (native code {})",
                interface, code
            );
        }
        self.backend.close(self.handle);
    }
}

/// Read-only endpoint enumeration pass, logged for observability
///
/// Mirrors the descriptor layout the session will talk to. Only the
/// single-interface, single-alt-setting case is worth logging; anything
/// else is better read from a full device description. Fetch failures are
/// non-fatal.
fn log_endpoints<B: HostBackend>(backend: &B, device: B::DeviceRef) {
    let config = match backend.config_descriptor(device, 0) {
        Ok(config) => config,
        Err(code) => {
            debug!(
                "Skipping endpoint diagnostics: config descriptor fetch failed (native code {})",
                code
            );
            return;
        }
    };

    if config.num_interfaces == 1
        && let [interface] = config.interfaces.as_slice()
    {
        for endpoint in &interface.endpoints {
            debug!(
                "Endpoint {:#04x}: attributes {:#04x}, max packet size {}, interval {}",
                endpoint.address, endpoint.attributes, endpoint.max_packet_size, endpoint.interval
            );
        }
    }
}
