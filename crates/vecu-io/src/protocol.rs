//! Newline-delimited JSON wire contract between the controller and the
//! operator panel.

use serde::{Deserialize, Serialize};
use vecu_core::{ActuatorStatus, CruiseSetting, Direction, RunState, VehicleState};

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const fn v1() -> Self {
        Self { major: 1, minor: 0 }
    }

    pub fn is_supported(&self) -> bool {
        self.major == 1
    }
}

/// Periodic controller → panel snapshot.
#[derive(Debug, Serialize)]
pub struct StatusMsg {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub protocol_version: ProtocolVersion,
    pub timestamp_us: u64,
    pub lifecycle: &'static str,
    pub speed_kmh: f64,
    pub engine_rpm: f64,
    pub engine_temp_c: f64,
    pub actuators: ActuatorStatus,
    pub motor_duty: u8,
    pub brake_duty: u8,
    pub direction: Direction,
    pub cruise: CruiseSetting,
    pub odometer_km: f64,
    pub cycle_count: u64,
}

impl StatusMsg {
    pub fn from_state(state: &VehicleState, lifecycle: RunState, timestamp_us: u64) -> Self {
        Self {
            msg_type: "status",
            protocol_version: ProtocolVersion::v1(),
            timestamp_us,
            lifecycle: lifecycle.as_str(),
            speed_kmh: state.sensors.speed_kmh,
            engine_rpm: state.sensors.engine_rpm,
            engine_temp_c: state.sensors.engine_temp_c,
            actuators: state.actuators,
            motor_duty: state.propulsion.motor_duty,
            brake_duty: state.propulsion.brake_duty,
            direction: state.propulsion.direction,
            cruise: state.cruise,
            odometer_km: state.odometer_km,
            cycle_count: state.cycle_count,
        }
    }
}

/// Controller → panel termination notice.
#[derive(Debug, Serialize)]
pub struct NoticeMsg {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub protocol_version: ProtocolVersion,
    pub timestamp_us: u64,
    pub reason: &'static str,
}

impl NoticeMsg {
    pub fn terminated(timestamp_us: u64) -> Self {
        Self {
            msg_type: "notice",
            protocol_version: ProtocolVersion::v1(),
            timestamp_us,
            reason: "terminate",
        }
    }
}

/// Panel → controller command envelope. The `action` is one of the
/// fixed command tags; unknown tags are rejected downstream. A missing
/// version means a current-protocol panel.
#[derive(Debug, Deserialize)]
pub struct CommandMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default = "ProtocolVersion::v1")]
    pub protocol_version: ProtocolVersion,
    pub action: String,
}

#[derive(Debug)]
pub enum IncomingMessage {
    Command(CommandMsg),
}

impl IncomingMessage {
    pub fn parse(line: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(line).ok()?;
        let msg_type = value.get("type")?.as_str()?;
        match msg_type {
            "command" => serde_json::from_value(value)
                .ok()
                .map(IncomingMessage::Command),
            _ => None,
        }
    }
}
