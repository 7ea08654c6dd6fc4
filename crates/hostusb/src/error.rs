//! Error types for the device lifecycle layer

use thiserror::Error;

/// Errors surfaced by the manager, device, and session layers
///
/// Every variant carries the raw native status code so call sites can
/// diagnose failures without re-querying the native library. This layer
/// performs no retries; callers decide whether an error is worth another
/// attempt (enumeration failures usually are, context init is not).
#[derive(Debug, Error)]
pub enum UsbError {
    /// Native library context failed to initialize
    #[error("Failed to initialize USB context (native code {0})")]
    ContextInit(i32),

    /// Device-list acquisition failed
    #[error("Device enumeration failed (native code {0})")]
    Enumeration(i32),

    /// Descriptor retrieval failed for one device during enumeration
    #[error("Descriptor fetch failed for device at bus {bus} address {address} (native code {code})")]
    DescriptorFetch { bus: u8, address: u8, code: i32 },

    /// A session operation returned a negative native status
    #[error("{operation} failed (native code {code})")]
    NativeCall { operation: &'static str, code: i32 },
}

impl UsbError {
    pub(crate) fn native(operation: &'static str, code: i32) -> Self {
        UsbError::NativeCall { operation, code }
    }
}

/// Type alias for lifecycle-layer results
pub type Result<T> = std::result::Result<T, UsbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_call_display() {
        let err = UsbError::native("claim_interface", -6);
        let msg = format!("{}", err);
        assert!(msg.contains("claim_interface"));
        assert!(msg.contains("-6"));
    }

    #[test]
    fn test_descriptor_fetch_display() {
        let err = UsbError::DescriptorFetch {
            bus: 3,
            address: 7,
            code: -1,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("bus 3"));
        assert!(msg.contains("address 7"));
    }
}
