//! Simulated cab hardware and a ramp-style sensor generator.

use crate::hal::{CabIO, InputLine, Lamp};
use crate::state::Direction;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

fn lamp_index(lamp: Lamp) -> usize {
    match lamp {
        Lamp::LeftTurn => 0,
        Lamp::RightTurn => 1,
        Lamp::LowBeam => 2,
        Lamp::HighBeam => 3,
        Lamp::BrakeLight => 4,
        Lamp::OverheatWarn => 5,
    }
}

fn input_index(line: InputLine) -> usize {
    match line {
        InputLine::Accelerator => 0,
        InputLine::BrakePedal => 1,
        InputLine::LeftTurnSwitch => 2,
        InputLine::RightTurnSwitch => 3,
        InputLine::LowBeamButton => 4,
        InputLine::HighBeamButton => 5,
    }
}

fn direction_code(direction: Direction) -> u8 {
    match direction {
        Direction::Forward => 0,
        Direction::Reverse => 1,
        Direction::Brake => 2,
        Direction::Neutral => 3,
    }
}

fn direction_from_code(code: u8) -> Direction {
    match code {
        0 => Direction::Forward,
        1 => Direction::Reverse,
        2 => Direction::Brake,
        _ => Direction::Neutral,
    }
}

/// In-memory cab. Atomics throughout so it can be shared between
/// workers behind an `Arc` without another lock.
pub struct SimulatedCab {
    lamps: [AtomicBool; 6],
    inputs: [AtomicBool; 6],
    motor_duty: AtomicU8,
    brake_duty: AtomicU8,
    direction: AtomicU8,
}

impl SimulatedCab {
    pub fn new() -> Self {
        Self {
            lamps: Default::default(),
            inputs: Default::default(),
            motor_duty: AtomicU8::new(0),
            brake_duty: AtomicU8::new(0),
            direction: AtomicU8::new(direction_code(Direction::Neutral)),
        }
    }

    /// Drive an input line high (a held button/pedal).
    pub fn press(&self, line: InputLine) {
        self.inputs[input_index(line)].store(true, Ordering::SeqCst);
    }

    pub fn release(&self, line: InputLine) {
        self.inputs[input_index(line)].store(false, Ordering::SeqCst);
    }

    pub fn lamp(&self, lamp: Lamp) -> bool {
        self.lamps[lamp_index(lamp)].load(Ordering::SeqCst)
    }

    pub fn motor_duty(&self) -> u8 {
        self.motor_duty.load(Ordering::SeqCst)
    }

    pub fn brake_duty(&self) -> u8 {
        self.brake_duty.load(Ordering::SeqCst)
    }

    pub fn direction(&self) -> Direction {
        direction_from_code(self.direction.load(Ordering::SeqCst))
    }
}

impl Default for SimulatedCab {
    fn default() -> Self {
        Self::new()
    }
}

impl CabIO for SimulatedCab {
    fn set_lamp(&self, lamp: Lamp, on: bool) {
        self.lamps[lamp_index(lamp)].store(on, Ordering::SeqCst);
    }

    fn set_motor_duty(&self, duty: u8) {
        self.motor_duty.store(duty, Ordering::SeqCst);
    }

    fn set_brake_duty(&self, duty: u8) {
        self.brake_duty.store(duty, Ordering::SeqCst);
    }

    fn set_direction(&self, direction: Direction) {
        self.direction
            .store(direction_code(direction), Ordering::SeqCst);
    }

    fn read_input(&self, line: InputLine) -> bool {
        self.inputs[input_index(line)].load(Ordering::SeqCst)
    }
}

/// Ramping speed/rpm source standing in for wheel and motor pickups:
/// speed climbs 5 km/h per step and wraps to 0 past 200; rpm climbs 100
/// per step and wraps to idle past 8000.
#[derive(Debug, Clone)]
pub struct SensorFeed {
    speed_kmh: f64,
    engine_rpm: f64,
}

impl SensorFeed {
    pub fn new() -> Self {
        Self {
            speed_kmh: 0.0,
            engine_rpm: 800.0,
        }
    }

    pub fn step(&mut self) -> (f64, f64) {
        self.speed_kmh += 5.0;
        if self.speed_kmh > 200.0 {
            self.speed_kmh = 0.0;
        }
        self.engine_rpm += 100.0;
        if self.engine_rpm > 8000.0 {
            self.engine_rpm = 800.0;
        }
        (self.speed_kmh, self.engine_rpm)
    }
}

impl Default for SensorFeed {
    fn default() -> Self {
        Self::new()
    }
}
