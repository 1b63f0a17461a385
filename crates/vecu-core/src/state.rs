use crate::cruise::CruiseSetting;
use crate::limiter::{engine_temp, LimiterCounters, LimiterPolicy};
use serde::Serialize;
use std::sync::{Mutex, PoisonError};

/// Duty-cycle ceiling for the motor and brake PWM targets.
pub const MOTOR_DUTY_MAX: u8 = 10;
pub const BRAKE_DUTY_MAX: u8 = 10;

/// Speed added/removed by one pedal event [km/h].
pub const PEDAL_SPEED_STEP_KMH: f64 = 10.0;
/// RPM added/removed by one pedal event.
pub const PEDAL_RPM_STEP: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Reverse,
    Brake,
    #[default]
    Neutral,
}

/// Most recent sampled sensor values. Written by the sensor source,
/// corrected and re-derived by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    pub speed_kmh: f64,
    pub engine_rpm: f64,
    pub engine_temp_c: f64,
}

/// Dashboard actuator booleans. All idempotent sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActuatorStatus {
    pub left_turn: bool,
    pub right_turn: bool,
    pub low_beam: bool,
    pub high_beam: bool,
}

/// Drivetrain target consumed by the actuator I/O layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PropulsionTarget {
    pub motor_duty: u8,
    pub brake_duty: u8,
    pub direction: Direction,
}

/// The single shared record of vehicle state. Only ever touched through
/// [`SharedState::with_lock`].
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VehicleState {
    pub sensors: SensorReading,
    pub actuators: ActuatorStatus,
    pub propulsion: PropulsionTarget,
    pub cruise: CruiseSetting,
    pub odometer_km: f64,
    /// Limiter counters mirrored by the control loop for reporting.
    pub counters: LimiterCounters,
    pub cycle_count: u64,
}

impl VehicleState {
    /// Startup defaults: stopped, engine at idle, temperature derived
    /// from those values, everything else off.
    pub fn initial(policy: &LimiterPolicy) -> Self {
        let speed_kmh = 0.0;
        let engine_rpm = policy.idle_rpm;
        Self {
            sensors: SensorReading {
                speed_kmh,
                engine_rpm,
                engine_temp_c: engine_temp(policy, speed_kmh, engine_rpm),
            },
            actuators: ActuatorStatus::default(),
            propulsion: PropulsionTarget::default(),
            cruise: CruiseSetting::default(),
            odometer_km: 0.0,
            counters: LimiterCounters::default(),
            cycle_count: 0,
        }
    }

    /// One accelerator event: one duty step forward, brake released,
    /// speed/rpm stepped and temperature re-derived. Cancels cruise.
    pub fn press_accelerator(&mut self, policy: &LimiterPolicy) {
        self.propulsion.motor_duty = (self.propulsion.motor_duty + 1).min(MOTOR_DUTY_MAX);
        self.propulsion.brake_duty = 0;
        self.propulsion.direction = Direction::Forward;
        self.cruise.engaged = false;
        self.sensors.speed_kmh += PEDAL_SPEED_STEP_KMH;
        self.sensors.engine_rpm += PEDAL_RPM_STEP;
        self.rederive_temperature(policy);
    }

    /// One brake event: one duty step of braking, motor cut, speed/rpm
    /// stepped down to the full-stop floor (speed 0, engine at idle).
    /// Cancels cruise.
    pub fn press_brake(&mut self, policy: &LimiterPolicy) {
        self.propulsion.brake_duty = (self.propulsion.brake_duty + 1).min(BRAKE_DUTY_MAX);
        self.propulsion.motor_duty = 0;
        self.propulsion.direction = Direction::Brake;
        self.cruise.engaged = false;
        self.sensors.speed_kmh = (self.sensors.speed_kmh - PEDAL_SPEED_STEP_KMH).max(0.0);
        self.sensors.engine_rpm = (self.sensors.engine_rpm - PEDAL_RPM_STEP).max(policy.idle_rpm);
        self.rederive_temperature(policy);
    }

    pub fn rederive_temperature(&mut self, policy: &LimiterPolicy) {
        self.sensors.engine_temp_c =
            engine_temp(policy, self.sensors.speed_kmh, self.sensors.engine_rpm);
    }
}

/// The sync gate: a single mutual-exclusion token in front of
/// [`VehicleState`]. There is no reader/writer distinction, and no
/// reference to the state may escape the critical section.
pub struct SharedState {
    gate: Mutex<VehicleState>,
}

impl SharedState {
    pub fn new(initial: VehicleState) -> Self {
        Self {
            gate: Mutex::new(initial),
        }
    }

    /// Run `f` against the live state while holding the gate. The gate
    /// is released on every exit path; a holder that panicked earlier
    /// poisons the mutex but must not wedge the store, so the poison is
    /// stripped here.
    pub fn with_lock<T>(&self, f: impl FnOnce(&mut VehicleState) -> T) -> T {
        let mut state = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Copy of the current state, for observers that only need a
    /// consistent snapshot.
    pub fn snapshot(&self) -> VehicleState {
        self.with_lock(|state| *state)
    }
}
