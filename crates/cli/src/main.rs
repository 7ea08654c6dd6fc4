//! usbls - list USB devices and their descriptors
//!
//! Constructs one device manager over the native USB context, enumerates
//! attached devices, and prints each one's identity, descriptor fields,
//! and resolved string descriptors.

mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use hostusb::{DeviceReport, LogLevel, UsbManager};
use logging::setup_logging;

#[derive(Parser, Debug)]
#[command(name = "usbls")]
#[command(author, version, about = "List USB devices and their descriptors")]
#[command(long_about = "
Enumerates attached USB devices and prints their descriptors: identity
(derived from bus number and device address), device and configuration
descriptor fields, and string descriptors where the device can be opened
to read them.

EXAMPLES:
    # List all devices with full descriptors
    usbls

    # Identities of one vendor's devices, any product
    usbls --vid 04c5 --ids-only

    # Machine-readable output
    usbls --json

    # Chatty native-library logging
    usbls --usb-log debug
")]
struct Args {
    /// Filter by vendor ID (hex, e.g. 04c5)
    #[arg(long, value_parser = parse_hex_u16, value_name = "VID")]
    vid: Option<u16>,

    /// Filter by product ID (hex, e.g. 11a6)
    #[arg(long, value_parser = parse_hex_u16, value_name = "PID")]
    pid: Option<u16>,

    /// Print identity keys only, without fetching full descriptors
    #[arg(long)]
    ids_only: bool,

    /// Output JSON instead of text
    #[arg(long)]
    json: bool,

    /// Native library verbosity (none, error, warning, info, debug)
    #[arg(long, value_parser = parse_usb_log, default_value = "none", value_name = "LEVEL")]
    usb_log: LogLevel,

    /// Log level for this tool (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    u16::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| format!("not a hex ID: {}", e))
}

fn parse_usb_log(s: &str) -> Result<LogLevel, String> {
    match s {
        "none" => Ok(LogLevel::None),
        "error" => Ok(LogLevel::Error),
        "warning" => Ok(LogLevel::Warning),
        "info" => Ok(LogLevel::Info),
        "debug" => Ok(LogLevel::Debug),
        other => Err(format!("unknown level: {}", other)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(&args.log_level)?;

    let manager = UsbManager::new().context("Failed to initialize USB context")?;
    manager.set_log_level(args.usb_log);

    if args.ids_only || args.vid.is_some() || args.pid.is_some() {
        list_identities(&manager, &args)?;
    } else {
        list_descriptors(&manager, &args)?;
    }

    #[cfg(feature = "probe")]
    probe::run(&manager)?;

    Ok(())
}

/// Print identity keys of matching devices, no descriptor models built
fn list_identities(manager: &UsbManager, args: &Args) -> Result<()> {
    let ids = manager
        .find_devices(args.vid, args.pid)
        .context("Failed to enumerate devices")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&ids)?);
        return Ok(());
    }

    for id in ids {
        println!(
            "id={} bus={:03} address={:03}",
            id,
            id.bus_number(),
            id.device_address()
        );
    }
    Ok(())
}

/// Print the full description of every attached device
fn list_descriptors(manager: &UsbManager, args: &Args) -> Result<()> {
    let devices = manager.list_devices().context("Failed to enumerate devices")?;
    let reports: Vec<DeviceReport> = devices.iter().map(|device| device.describe(None)).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        print_report(report);
    }
    Ok(())
}

fn print_report(report: &DeviceReport) {
    println!("device:");
    println!("  id: {}", report.id);
    println!("  device_descriptor:");
    println!("    bcdUSB: {:#06x}", report.usb_version);
    println!("    bDeviceClass: {}", report.class);
    println!("    bDeviceSubClass: {}", report.subclass);
    println!("    bDeviceProtocol: {}", report.protocol);
    println!("    bMaxPacketSize0: {}", report.max_packet_size_0);
    println!("    idVendor: {:#06x}", report.vendor_id);
    println!("    idProduct: {:#06x}", report.product_id);
    println!("    bcdDevice: {:#06x}", report.device_version);
    if let Some(manufacturer) = &report.manufacturer {
        println!("    iManufacturer: {}", manufacturer);
    }
    if let Some(product) = &report.product {
        println!("    iProduct: {}", product);
    }
    if let Some(serial) = &report.serial_number {
        println!("    iSerialNumber: {}", serial);
    }
    println!("    bNumConfigurations: {}", report.num_configurations);
    println!("  config_descriptor:");
    println!("    bNumInterfaces: {}", report.num_interfaces);
    println!("    bConfigurationValue: {}", report.configuration_value);
    if let Some(configuration) = &report.configuration {
        println!("    iConfiguration: {}", configuration);
    }
    println!("    bmAttributes: {:#04x}", report.attributes);
    println!("    bMaxPower: {}mA", report.max_power_ma);
}

/// Configure/claim/release exercise against a known device
#[cfg(feature = "probe")]
mod probe {
    use super::*;
    use tracing::info;

    const PROBE_VID: u16 = 0x04c5;
    const PROBE_PID: u16 = 0x11a6;

    pub fn run(manager: &UsbManager) -> Result<()> {
        println!();
        println!("probe: {:04x}:{:04x}", PROBE_VID, PROBE_PID);

        let ids = manager
            .find_devices(Some(PROBE_VID), Some(PROBE_PID))
            .context("Failed to enumerate devices for probe")?;
        let Some(&id) = ids.first() else {
            println!("probe: no matching device attached");
            return Ok(());
        };

        let Some(mut session) = manager.open_session(id).context("Failed to open device")? else {
            println!("probe: device {} disappeared before open", id);
            return Ok(());
        };

        if session.kernel_driver_active(0)? {
            info!("Detaching kernel driver from interface 0");
            session.detach_kernel_driver(0)?;
        }

        let configuration = session.configuration()?;
        println!("probe: configuration = {}", configuration);

        // Force a reset: unconfigure, then select configuration 1.
        session.set_configuration(0)?;
        session.set_configuration(1)?;

        session.claim_interface(0)?;
        session.release_interface(0)?;
        println!("probe: claim/release ok");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u16() {
        assert_eq!(parse_hex_u16("04c5").unwrap(), 0x04c5);
        assert_eq!(parse_hex_u16("0x11a6").unwrap(), 0x11a6);
        assert!(parse_hex_u16("usb").is_err());
    }

    #[test]
    fn test_parse_usb_log() {
        assert_eq!(parse_usb_log("debug").unwrap(), LogLevel::Debug);
        assert!(parse_usb_log("loud").is_err());
    }

    #[test]
    fn test_args_parse_filters() {
        let args = Args::parse_from(["usbls", "--vid", "04c5", "--ids-only"]);
        assert_eq!(args.vid, Some(0x04c5));
        assert_eq!(args.pid, None);
        assert!(args.ids_only);
    }
}
