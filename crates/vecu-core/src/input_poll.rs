//! Edge-triggered sampling of the discrete cab inputs.

use crate::hal::{CabIO, InputLine, Lamp};
use crate::lifecycle::{Lifecycle, RunState};
use crate::limiter::LimiterPolicy;
use crate::state::{Direction, SharedState};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Samples pedal and toggle lines each period and applies rising-edge
/// mutations under the sync gate. A held pedal fires once per press,
/// not once per poll. While the lifecycle is Paused the lines are still
/// sampled (so stale edges are not replayed on resume) but every
/// mutation path is skipped.
pub struct InputPollWorker<C: CabIO> {
    shared: Arc<SharedState>,
    cab: Arc<C>,
    lifecycle: Arc<Lifecycle>,
    policy: LimiterPolicy,
    period: Duration,
    last_level: [bool; InputLine::ALL.len()],
}

impl<C: CabIO> InputPollWorker<C> {
    pub fn new(
        shared: Arc<SharedState>,
        cab: Arc<C>,
        lifecycle: Arc<Lifecycle>,
        policy: LimiterPolicy,
        period: Duration,
    ) -> Self {
        Self {
            shared,
            cab,
            lifecycle,
            policy,
            period,
            last_level: [false; InputLine::ALL.len()],
        }
    }

    pub fn run(&mut self) {
        loop {
            if self.lifecycle.is_terminating() {
                break;
            }
            self.poll_once();
            if !self.lifecycle.wait_interruptible(self.period) {
                break;
            }
        }
    }

    /// One sampling pass. Public so tests can drive polls directly.
    pub fn poll_once(&mut self) {
        let frozen = self.lifecycle.state() == RunState::Paused;
        for (index, line) in InputLine::ALL.into_iter().enumerate() {
            let level = self.cab.read_input(line);
            let rising = level && !self.last_level[index];
            self.last_level[index] = level;
            if rising && !frozen {
                self.apply_edge(line);
            }
        }
    }

    fn apply_edge(&self, line: InputLine) {
        debug!(?line, "input edge");
        match line {
            InputLine::Accelerator => {
                let duty = self.shared.with_lock(|state| {
                    state.press_accelerator(&self.policy);
                    state.propulsion.motor_duty
                });
                self.cab.set_motor_duty(duty);
                self.cab.set_brake_duty(0);
                self.cab.set_direction(Direction::Forward);
                self.cab.set_lamp(Lamp::BrakeLight, false);
            }
            InputLine::BrakePedal => {
                let duty = self.shared.with_lock(|state| {
                    state.press_brake(&self.policy);
                    state.propulsion.brake_duty
                });
                self.cab.set_brake_duty(duty);
                self.cab.set_motor_duty(0);
                self.cab.set_direction(Direction::Brake);
                self.cab.set_lamp(Lamp::BrakeLight, true);
            }
            InputLine::LeftTurnSwitch => {
                self.shared
                    .with_lock(|state| state.actuators.left_turn = !state.actuators.left_turn);
            }
            InputLine::RightTurnSwitch => {
                self.shared
                    .with_lock(|state| state.actuators.right_turn = !state.actuators.right_turn);
            }
            InputLine::LowBeamButton => {
                let on = self.shared.with_lock(|state| {
                    state.actuators.low_beam = !state.actuators.low_beam;
                    state.actuators.low_beam
                });
                self.cab.set_lamp(Lamp::LowBeam, on);
            }
            InputLine::HighBeamButton => {
                let on = self.shared.with_lock(|state| {
                    state.actuators.high_beam = !state.actuators.high_beam;
                    state.actuators.high_beam
                });
                self.cab.set_lamp(Lamp::HighBeam, on);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal_sim::SimulatedCab;
    use crate::state::VehicleState;

    fn worker() -> (
        InputPollWorker<SimulatedCab>,
        Arc<SharedState>,
        Arc<SimulatedCab>,
        Arc<Lifecycle>,
    ) {
        let policy = LimiterPolicy::default();
        let shared = Arc::new(SharedState::new(VehicleState::initial(&policy)));
        let cab = Arc::new(SimulatedCab::new());
        let lifecycle = Arc::new(Lifecycle::new());
        let worker = InputPollWorker::new(
            Arc::clone(&shared),
            Arc::clone(&cab),
            Arc::clone(&lifecycle),
            policy,
            Duration::from_millis(50),
        );
        (worker, shared, cab, lifecycle)
    }

    #[test]
    fn held_pedal_fires_once() {
        let (mut worker, shared, cab, _lifecycle) = worker();

        cab.press(InputLine::Accelerator);
        worker.poll_once();
        worker.poll_once();
        worker.poll_once();
        assert_eq!(shared.snapshot().propulsion.motor_duty, 1);

        // Release and press again: a second edge.
        cab.release(InputLine::Accelerator);
        worker.poll_once();
        cab.press(InputLine::Accelerator);
        worker.poll_once();
        assert_eq!(shared.snapshot().propulsion.motor_duty, 2);
    }

    #[test]
    fn brake_edge_cuts_motor_and_lights_the_brake_lamp() {
        let (mut worker, shared, cab, _lifecycle) = worker();

        cab.press(InputLine::Accelerator);
        worker.poll_once();
        cab.release(InputLine::Accelerator);
        cab.press(InputLine::BrakePedal);
        worker.poll_once();

        let state = shared.snapshot();
        assert_eq!(state.propulsion.motor_duty, 0);
        assert_eq!(state.propulsion.brake_duty, 1);
        assert_eq!(state.propulsion.direction, Direction::Brake);
        assert!(cab.lamp(Lamp::BrakeLight));
        assert_eq!(cab.motor_duty(), 0);
    }

    #[test]
    fn toggle_switch_flips_the_indicator() {
        let (mut worker, shared, cab, _lifecycle) = worker();

        cab.press(InputLine::LeftTurnSwitch);
        worker.poll_once();
        assert!(shared.snapshot().actuators.left_turn);

        cab.release(InputLine::LeftTurnSwitch);
        worker.poll_once();
        cab.press(InputLine::LeftTurnSwitch);
        worker.poll_once();
        assert!(!shared.snapshot().actuators.left_turn);
    }

    #[test]
    fn beam_button_drives_the_lamp() {
        let (mut worker, shared, cab, _lifecycle) = worker();

        cab.press(InputLine::HighBeamButton);
        worker.poll_once();
        assert!(shared.snapshot().actuators.high_beam);
        assert!(cab.lamp(Lamp::HighBeam));
    }

    #[test]
    fn paused_lifecycle_freezes_mutations() {
        let (mut worker, shared, cab, lifecycle) = worker();

        lifecycle.pause();
        cab.press(InputLine::Accelerator);
        worker.poll_once();
        assert_eq!(shared.snapshot().propulsion.motor_duty, 0);

        // The edge was consumed while paused, not queued: resuming with
        // the pedal still held must not replay it.
        lifecycle.resume();
        worker.poll_once();
        assert_eq!(shared.snapshot().propulsion.motor_duty, 0);
    }
}
