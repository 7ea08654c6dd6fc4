//! Core type definitions
//!
//! Device identity, descriptor snapshots, and the structured description
//! report produced by [`crate::UsbDevice::describe`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Device identity derived from bus topology
///
/// Encoded as `(bus_number << 8) | device_address`. Unique among attached
/// devices at any instant, but not stable across replug events: the bus may
/// reassign the address. Used as the lookup key when opening a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub u16);

impl DeviceId {
    /// Derive the identity from bus number and device address
    pub fn from_parts(bus: u8, address: u8) -> Self {
        DeviceId((u16::from(bus) << 8) | u16::from(address))
    }

    /// Bus number component
    pub fn bus_number(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Device address component
    pub fn device_address(self) -> u8 {
        (self.0 & 0xff) as u8
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Verbosity passed through to the native library's logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    None,
    Error,
    Warning,
    Info,
    Debug,
}

/// Device descriptor snapshot
///
/// Fetched once from the native library when the device object is
/// constructed; never refreshed. String fields are descriptor indices
/// (0 = absent), resolved lazily by [`crate::UsbDevice::describe`].
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    /// USB specification release number (BCD, e.g. 0x0200)
    pub usb_version: u16,
    /// Device class code
    pub class: u8,
    /// Device subclass code
    pub subclass: u8,
    /// Device protocol code
    pub protocol: u8,
    /// Maximum packet size for endpoint zero
    pub max_packet_size_0: u8,
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Device release number (BCD)
    pub device_version: u16,
    /// Manufacturer string descriptor index (0 = absent)
    pub manufacturer_index: u8,
    /// Product string descriptor index (0 = absent)
    pub product_index: u8,
    /// Serial number string descriptor index (0 = absent)
    pub serial_number_index: u8,
    /// Number of configurations
    pub num_configurations: u8,
}

/// Configuration descriptor snapshot
///
/// Owned copy of the first configuration, taken at device-object
/// construction. Includes the interface/endpoint tree for diagnostics.
#[derive(Debug, Clone)]
pub struct ConfigDescriptor {
    /// Number of interfaces in this configuration
    pub num_interfaces: u8,
    /// Value used to select this configuration
    pub configuration_value: u8,
    /// Configuration string descriptor index (0 = absent)
    pub configuration_index: u8,
    /// Attribute bitmask (bus-powered, self-powered, remote wakeup)
    pub attributes: u8,
    /// Declared maximum power in native units of 2 mA
    pub max_power: u8,
    /// One entry per interface alternate setting
    pub interfaces: Vec<InterfaceDescriptor>,
}

impl ConfigDescriptor {
    /// Maximum power draw in milliamps (native units are 2 mA per count)
    pub fn max_power_milliamps(&self) -> u16 {
        u16::from(self.max_power) * 2
    }
}

/// One interface alternate setting within a configuration
#[derive(Debug, Clone)]
pub struct InterfaceDescriptor {
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub endpoints: Vec<EndpointDescriptor>,
}

/// Endpoint descriptor within an interface alternate setting
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    /// Endpoint address (includes direction bit)
    pub address: u8,
    /// Transfer type attributes
    pub attributes: u8,
    /// Maximum packet size
    pub max_packet_size: u16,
    /// Polling interval
    pub interval: u8,
}

/// Structured device description
///
/// Everything the descriptors report about one device, with string
/// descriptor indices resolved to text where a handle was available.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    /// Device identity key
    pub id: DeviceId,
    /// Bus number on the host
    pub bus_number: u8,
    /// Device address on the bus
    pub device_address: u8,
    /// USB specification release number (BCD)
    pub usb_version: u16,
    /// Device class code
    pub class: u8,
    /// Device subclass code
    pub subclass: u8,
    /// Device protocol code
    pub protocol: u8,
    /// Maximum packet size for endpoint zero
    pub max_packet_size_0: u8,
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Device release number (BCD)
    pub device_version: u16,
    /// Manufacturer string (if present and readable)
    pub manufacturer: Option<String>,
    /// Product string (if present and readable)
    pub product: Option<String>,
    /// Serial number string (if present and readable)
    pub serial_number: Option<String>,
    /// Number of configurations
    pub num_configurations: u8,
    /// Number of interfaces in the first configuration
    pub num_interfaces: u8,
    /// Value used to select the first configuration
    pub configuration_value: u8,
    /// Configuration string (if present and readable)
    pub configuration: Option<String>,
    /// Configuration attribute bitmask
    pub attributes: u8,
    /// Maximum power draw in milliamps
    pub max_power_ma: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_derivation() {
        let id = DeviceId::from_parts(3, 1);
        assert_eq!(id, DeviceId(0x0301));
        assert_eq!(id.bus_number(), 3);
        assert_eq!(id.device_address(), 1);
    }

    #[test]
    fn test_device_id_display() {
        // Bus 1, address 4 => (1 << 8) | 4 = 260
        assert_eq!(DeviceId::from_parts(1, 4).to_string(), "260");
    }

    #[test]
    fn test_max_power_unit_conversion() {
        let config = ConfigDescriptor {
            num_interfaces: 1,
            configuration_value: 1,
            configuration_index: 0,
            attributes: 0x80,
            max_power: 50,
            interfaces: Vec::new(),
        };
        assert_eq!(config.max_power_milliamps(), 100);
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::None < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
    }
}
