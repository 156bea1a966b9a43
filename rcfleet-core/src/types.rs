//! Core types and data structures for rcfleet

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FleetError;

/// Name of the vehicle every identity falls back to
pub const DEFAULT_FALLBACK_VEHICLE: &str = "DefaultCar";

/// Opaque identity (operator account) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub i64);

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Vehicle identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub i64);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Operator,
    Administrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Operator => "operator",
            Role::Administrator => "administrator",
        }
    }
}

impl FromStr for Role {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operator" => Ok(Role::Operator),
            "administrator" => Ok(Role::Administrator),
            other => Err(FleetError::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

/// A registered operator account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub name: String,
    pub role: Role,
}

impl Identity {
    pub fn is_administrator(&self) -> bool {
        self.role == Role::Administrator
    }
}

/// Hardware calibration for one vehicle
///
/// Read-only from the control path; the firmware applies these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    /// Servo signal pin on the microcontroller
    pub servo_pin: u8,
    /// Servo angle for straight-ahead steering
    pub servo_center_deg: u16,
    /// Maximum deflection from center in either direction
    pub servo_deflection_deg: u16,
    /// Motor power ceiling (8-bit PWM)
    pub motor_max_pwm: u16,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            servo_pin: 3,
            servo_center_deg: 90,
            servo_deflection_deg: 45,
            motor_max_pwm: 255,
        }
    }
}

/// A controllable vehicle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub name: String,
    pub calibration: Calibration,
}

/// Access level attached to a grant
///
/// Both levels permit sending steering commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[default]
    Driver,
    Owner,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Driver => "driver",
            AccessLevel::Owner => "owner",
        }
    }
}

impl FromStr for AccessLevel {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "driver" => Ok(AccessLevel::Driver),
            "owner" => Ok(AccessLevel::Owner),
            other => Err(FleetError::InvalidInput(format!(
                "Unknown access level: {}",
                other
            ))),
        }
    }
}

/// Identity-vehicle authorization edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub identity_id: IdentityId,
    pub vehicle_id: VehicleId,
    pub access_level: AccessLevel,
}

/// How grants relate identities to vehicles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Many-to-many grants
    #[default]
    Grants,
    /// At most one vehicle per identity; a new grant replaces the old one
    SingleVehicle,
}

/// Steering commands understood by the vehicle firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SteerCommand {
    #[serde(rename = "STEER:L")]
    Left,
    #[serde(rename = "STEER:R")]
    Right,
    #[serde(rename = "STEER:C")]
    Center,
}

impl SteerCommand {
    pub const ALL: [SteerCommand; 3] = [SteerCommand::Left, SteerCommand::Right, SteerCommand::Center];

    /// Wire form, without the line terminator
    pub fn as_wire(&self) -> &'static str {
        match self {
            SteerCommand::Left => "STEER:L",
            SteerCommand::Right => "STEER:R",
            SteerCommand::Center => "STEER:C",
        }
    }
}

impl fmt::Display for SteerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for SteerCommand {
    type Err = FleetError;

    /// Surrounding whitespace is ignored; the command itself is case-sensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        SteerCommand::ALL
            .into_iter()
            .find(|cmd| cmd.as_wire() == trimmed)
            .ok_or_else(|| FleetError::CommandRejected(trimmed.to_string()))
    }
}

/// A serial endpoint reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SerialEndpoint {
    /// Device path (e.g. "/dev/ttyACM0" or "COM5")
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_id: Option<String>,
}

impl SerialEndpoint {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    pub fn with_hardware_id(mut self, hardware_id: impl Into<String>) -> Self {
        self.hardware_id = Some(hardware_id.into());
        self
    }

    /// Lowercased "description manufacturer hardware_id" text used for scoring
    pub fn search_text(&self) -> String {
        format!(
            "{} {} {}",
            self.description.as_deref().unwrap_or(""),
            self.manufacturer.as_deref().unwrap_or(""),
            self.hardware_id.as_deref().unwrap_or("")
        )
        .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steer_command_parse() {
        assert_eq!("STEER:L".parse::<SteerCommand>().unwrap(), SteerCommand::Left);
        assert_eq!("STEER:R".parse::<SteerCommand>().unwrap(), SteerCommand::Right);
        assert_eq!(" STEER:C\n".parse::<SteerCommand>().unwrap(), SteerCommand::Center);
    }

    #[test]
    fn test_steer_command_rejects_unknown() {
        for input in ["STEER:X", "steer:l", "", "STEER:L;STEER:R", "FORWARD"] {
            let result = input.parse::<SteerCommand>();
            assert!(
                matches!(result, Err(FleetError::CommandRejected(_))),
                "{:?} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_steer_command_serde_uses_wire_form() {
        let json = serde_json::to_string(&SteerCommand::Left).unwrap();
        assert_eq!(json, "\"STEER:L\"");
        let parsed: SteerCommand = serde_json::from_str("\"STEER:C\"").unwrap();
        assert_eq!(parsed, SteerCommand::Center);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("operator".parse::<Role>().unwrap(), Role::Operator);
        assert_eq!("administrator".parse::<Role>().unwrap(), Role::Administrator);
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(Role::Administrator.as_str(), "administrator");
    }

    #[test]
    fn test_access_level_default_is_driver() {
        assert_eq!(AccessLevel::default(), AccessLevel::Driver);
        assert_eq!("owner".parse::<AccessLevel>().unwrap(), AccessLevel::Owner);
        assert!("viewer".parse::<AccessLevel>().is_err());
    }

    #[test]
    fn test_default_calibration() {
        let cal = Calibration::default();
        assert_eq!(cal.servo_pin, 3);
        assert_eq!(cal.servo_center_deg, 90);
        assert_eq!(cal.servo_deflection_deg, 45);
        assert_eq!(cal.motor_max_pwm, 255);
    }

    #[test]
    fn test_endpoint_search_text() {
        let ep = SerialEndpoint::new("COM5")
            .with_description("Arduino Uno (COM5)")
            .with_manufacturer("Arduino LLC")
            .with_hardware_id("USB VID:PID=2341:0043");
        assert_eq!(
            ep.search_text(),
            "arduino uno (com5) arduino llc usb vid:pid=2341:0043"
        );

        let bare = SerialEndpoint::new("/dev/ttyS0");
        assert_eq!(bare.search_text(), "  ");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let vehicle = Vehicle {
            id: VehicleId(4),
            name: "DefaultCar".to_string(),
            calibration: Calibration::default(),
        };
        let json = serde_json::to_value(&vehicle).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["calibration"]["servo_center_deg"], 90);
    }
}
