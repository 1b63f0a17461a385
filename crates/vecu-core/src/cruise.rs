//! Set-speed hold: nudges the propulsion target toward a stored target
//! speed, one step per control cycle.

use crate::limiter::LimiterPolicy;
use crate::state::{Direction, VehicleState, MOTOR_DUTY_MAX, PEDAL_RPM_STEP};
use serde::Serialize;

/// Speed change per adjust event and per correction cycle [km/h].
pub const CRUISE_STEP_KMH: f64 = 5.0;
/// Highest settable cruise speed [km/h].
pub const CRUISE_MAX_KMH: f64 = 200.0;
/// Within this band of the set speed, hold steady [km/h].
pub const CRUISE_DEADBAND_KMH: f64 = 2.0;

/// Cruise state, stored in [`VehicleState`] so pedal events from any
/// worker can disengage it under the same gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CruiseSetting {
    pub engaged: bool,
    pub set_speed_kmh: f64,
}

/// Engage at the current speed, clamped to the settable range.
pub fn engage(state: &mut VehicleState) {
    state.cruise.engaged = true;
    state.cruise.set_speed_kmh = state.sensors.speed_kmh.clamp(0.0, CRUISE_MAX_KMH);
}

pub fn disengage(state: &mut VehicleState) {
    state.cruise.engaged = false;
}

/// Move the set speed by `delta`. Only meaningful while engaged.
pub fn adjust(state: &mut VehicleState, delta: f64) {
    if state.cruise.engaged {
        state.cruise.set_speed_kmh =
            (state.cruise.set_speed_kmh + delta).clamp(0.0, CRUISE_MAX_KMH);
    }
}

/// One correction cycle: below the set speed add power, above it ease
/// off. Speed moves by at most one cruise step so the limiter always
/// sees gradual changes.
pub fn tick(state: &mut VehicleState, policy: &LimiterPolicy) {
    if !state.cruise.engaged {
        return;
    }

    let error = state.cruise.set_speed_kmh - state.sensors.speed_kmh;
    if error > CRUISE_DEADBAND_KMH {
        state.propulsion.motor_duty = (state.propulsion.motor_duty + 1).min(MOTOR_DUTY_MAX);
        state.propulsion.brake_duty = 0;
        state.propulsion.direction = Direction::Forward;
        state.sensors.speed_kmh += error.min(CRUISE_STEP_KMH);
        state.sensors.engine_rpm += PEDAL_RPM_STEP;
    } else if error < -CRUISE_DEADBAND_KMH {
        state.propulsion.motor_duty = state.propulsion.motor_duty.saturating_sub(1);
        state.sensors.speed_kmh += error.max(-CRUISE_STEP_KMH);
        state.sensors.engine_rpm =
            (state.sensors.engine_rpm - PEDAL_RPM_STEP).max(policy.idle_rpm);
    }
    state.rederive_temperature(policy);
}
