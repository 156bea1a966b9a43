//! Serial endpoint discovery and scoring
//!
//! Picks the endpoint most likely to be the vehicle microcontroller without
//! any user configuration. Each endpoint's descriptor text is matched against
//! a table of keywords for common USB-serial bridges; the best positive score
//! wins, and when nothing matches the first enumerated endpoint is used so a
//! single plugged-in device with generic descriptors still works.
//!
//! This is a heuristic: on hosts with several bridges the wrong one can win.
//! Pin the device in configuration for those setups.

use std::sync::Arc;

use rcfleet_core::api::ScoredEndpoint;
use rcfleet_core::{FleetError, Result, SerialEndpoint};
use tokio_serial::SerialPortType;
use tracing::{debug, error, info};

/// Keyword weights for known microcontroller USB bridges
pub const BRIDGE_KEYWORDS: &[(&str, u32)] = &[
    ("arduino", 10),
    ("ch340", 10),
    ("cp210", 10),
    ("cp210x", 10),
    ("usb-serial", 10),
    ("usb serial", 10),
    ("silicon labs", 10),
    ("wch", 10),
];

/// Vendor token of the target hardware, scored on top of its keyword weight
pub const VENDOR_TOKEN: &str = "arduino";

/// Extra weight when the vendor token appears anywhere in the descriptor text
pub const VENDOR_BONUS: u32 = 20;

/// Score one endpoint by its descriptor text
///
/// Pure function of the metadata; case-insensitive.
pub fn score_endpoint(endpoint: &SerialEndpoint) -> u32 {
    let text = endpoint.search_text();

    let keyword_score: u32 = BRIDGE_KEYWORDS
        .iter()
        .filter(|(keyword, _)| text.contains(keyword))
        .map(|(_, weight)| weight)
        .sum();

    if text.contains(VENDOR_TOKEN) {
        keyword_score + VENDOR_BONUS
    } else {
        keyword_score
    }
}

/// Score and sort endpoints, best first
///
/// The sort is stable, so ties keep the host's enumeration order.
pub fn rank_endpoints(endpoints: Vec<SerialEndpoint>) -> Vec<ScoredEndpoint> {
    let mut ranked: Vec<ScoredEndpoint> = endpoints
        .into_iter()
        .map(|endpoint| ScoredEndpoint {
            score: score_endpoint(&endpoint),
            endpoint,
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Pick an endpoint path from an enumeration
///
/// Fails only when the enumeration is empty.
pub fn choose_endpoint(endpoints: Vec<SerialEndpoint>) -> Result<String> {
    let first = endpoints
        .first()
        .map(|endpoint| endpoint.path.clone())
        .ok_or(FleetError::NoPortFound)?;

    let ranked = rank_endpoints(endpoints);
    match ranked.first() {
        Some(best) if best.score > 0 => {
            debug!(
                "Best endpoint {} scored {}",
                best.endpoint.path, best.score
            );
            Ok(best.endpoint.path.clone())
        }
        _ => {
            debug!("No endpoint matched a bridge keyword, falling back to {}", first);
            Ok(first)
        }
    }
}

/// Source of serial endpoints
///
/// Lets the resolver run against a fake endpoint list in tests.
pub trait EndpointSource: Send + Sync {
    /// Enumerate endpoints in host order
    fn enumerate(&self) -> Result<Vec<SerialEndpoint>>;
}

/// Endpoints reported by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEndpoints;

impl EndpointSource for SystemEndpoints {
    fn enumerate(&self) -> Result<Vec<SerialEndpoint>> {
        let ports = tokio_serial::available_ports().map_err(|e| {
            error!("Failed to enumerate serial ports: {}", e);
            FleetError::LinkUnavailable(format!("Failed to enumerate ports: {}", e))
        })?;

        Ok(ports
            .into_iter()
            .map(|port| endpoint_from_port(port.port_name, port.port_type))
            .collect())
    }
}

/// Build endpoint metadata from the host's port description
fn endpoint_from_port(path: String, port_type: SerialPortType) -> SerialEndpoint {
    let mut endpoint = SerialEndpoint::new(path);
    match port_type {
        SerialPortType::UsbPort(info) => {
            let mut hardware_id = format!("USB VID:PID={:04X}:{:04X}", info.vid, info.pid);
            if let Some(serial) = &info.serial_number {
                hardware_id.push_str(&format!(" SER={}", serial));
            }
            endpoint.hardware_id = Some(hardware_id);
            endpoint.description = info.product;
            endpoint.manufacturer = info.manufacturer;
        }
        SerialPortType::PciPort => {
            endpoint.description = Some("PCI serial port".to_string());
        }
        SerialPortType::BluetoothPort => {
            endpoint.description = Some("Bluetooth serial port".to_string());
        }
        SerialPortType::Unknown => {}
    }
    endpoint
}

/// Resolves the serial endpoint of the vehicle microcontroller
#[derive(Clone)]
pub struct PortResolver {
    source: Arc<dyn EndpointSource>,
}

impl PortResolver {
    /// Resolver over the operating system's serial ports
    pub fn system() -> Self {
        Self::new(Arc::new(SystemEndpoints))
    }

    pub fn new(source: Arc<dyn EndpointSource>) -> Self {
        Self { source }
    }

    /// Resolve the most likely endpoint path
    pub fn resolve(&self) -> Result<String> {
        let endpoints = self.source.enumerate()?;
        debug!("Discovered {} serial endpoint(s)", endpoints.len());

        let path = choose_endpoint(endpoints).map_err(|e| {
            error!("No serial endpoints reported by the host");
            e
        })?;
        info!("Resolved vehicle controller endpoint: {}", path);
        Ok(path)
    }

    /// All endpoints with their scores, best first
    pub fn ranked(&self) -> Result<Vec<ScoredEndpoint>> {
        Ok(rank_endpoints(self.source.enumerate()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::StaticEndpoints;

    fn arduino_uno() -> SerialEndpoint {
        SerialEndpoint::new("COM5")
            .with_description("Arduino Uno (COM5)")
            .with_manufacturer("Arduino LLC (www.arduino.cc)")
            .with_hardware_id("USB VID:PID=2341:0043 SER=7563")
    }

    fn ch340_clone() -> SerialEndpoint {
        SerialEndpoint::new("COM7")
            .with_description("USB-SERIAL CH340 (COM7)")
            .with_manufacturer("wch.cn")
            .with_hardware_id("USB VID:PID=1A86:7523")
    }

    fn bluetooth() -> SerialEndpoint {
        SerialEndpoint::new("COM3").with_description("Standard Serial over Bluetooth link (COM3)")
    }

    #[test]
    fn test_score_arduino_gets_vendor_bonus() {
        // "arduino" keyword (10) + vendor bonus (20)
        assert_eq!(score_endpoint(&arduino_uno()), 30);
    }

    #[test]
    fn test_score_ch340_clone() {
        // ch340 + usb-serial + wch
        assert_eq!(score_endpoint(&ch340_clone()), 30);
    }

    #[test]
    fn test_score_cp210x_counts_both_keywords() {
        let ep = SerialEndpoint::new("/dev/ttyUSB0")
            .with_description("CP2102 USB to UART Bridge Controller")
            .with_manufacturer("Silicon Labs")
            .with_hardware_id("cp210x");
        // cp210 + cp210x + silicon labs
        assert_eq!(score_endpoint(&ep), 30);
    }

    #[test]
    fn test_score_is_case_insensitive() {
        let upper = SerialEndpoint::new("x").with_description("ARDUINO MEGA");
        let lower = SerialEndpoint::new("x").with_description("arduino mega");
        assert_eq!(score_endpoint(&upper), score_endpoint(&lower));
        assert!(score_endpoint(&upper) > 0);
    }

    #[test]
    fn test_score_generic_endpoint_is_zero() {
        assert_eq!(score_endpoint(&bluetooth()), 0);
        assert_eq!(score_endpoint(&SerialEndpoint::new("/dev/ttyS0")), 0);
    }

    #[test]
    fn test_choose_prefers_highest_score() {
        let endpoints = vec![bluetooth(), arduino_uno()];
        assert_eq!(choose_endpoint(endpoints).unwrap(), "COM5");
    }

    #[test]
    fn test_choose_ties_keep_enumeration_order() {
        let endpoints = vec![bluetooth(), ch340_clone(), arduino_uno()];
        // Both bridges score 30; CH340 was enumerated first
        assert_eq!(choose_endpoint(endpoints).unwrap(), "COM7");
    }

    #[test]
    fn test_choose_falls_back_to_first_enumerated() {
        let endpoints = vec![
            SerialEndpoint::new("/dev/ttyS1"),
            SerialEndpoint::new("/dev/ttyS0"),
        ];
        assert_eq!(choose_endpoint(endpoints).unwrap(), "/dev/ttyS1");
    }

    #[test]
    fn test_choose_empty_is_no_port_found() {
        assert!(matches!(
            choose_endpoint(Vec::new()),
            Err(FleetError::NoPortFound)
        ));
    }

    #[test]
    fn test_resolver_with_injected_source() {
        let resolver = PortResolver::new(Arc::new(StaticEndpoints::new(vec![
            bluetooth(),
            arduino_uno(),
        ])));
        assert_eq!(resolver.resolve().unwrap(), "COM5");

        let ranked = resolver.ranked().unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].endpoint.path, "COM5");
        assert_eq!(ranked[0].score, 30);
        assert_eq!(ranked[1].score, 0);
    }

    #[test]
    fn test_resolver_no_endpoints() {
        let resolver = PortResolver::new(Arc::new(StaticEndpoints::new(Vec::new())));
        assert!(matches!(resolver.resolve(), Err(FleetError::NoPortFound)));
    }

    #[test]
    fn test_endpoint_from_usb_port() {
        let info = tokio_serial::UsbPortInfo {
            vid: 0x2341,
            pid: 0x0043,
            serial_number: Some("7563".to_string()),
            manufacturer: Some("Arduino LLC".to_string()),
            product: Some("Arduino Uno".to_string()),
        };
        let ep = endpoint_from_port("/dev/ttyACM0".to_string(), SerialPortType::UsbPort(info));
        assert_eq!(ep.path, "/dev/ttyACM0");
        assert_eq!(ep.hardware_id.as_deref(), Some("USB VID:PID=2341:0043 SER=7563"));
        assert_eq!(ep.description.as_deref(), Some("Arduino Uno"));
        assert_eq!(score_endpoint(&ep), 30);
    }

    #[test]
    fn test_system_enumeration_does_not_panic() {
        // Depends on the host; only verify the call completes
        let _ = SystemEndpoints.enumerate();
    }
}
