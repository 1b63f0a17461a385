//! Turn-indicator blink workers, one per side.

use crate::hal::{CabIO, Lamp};
use crate::lifecycle::Lifecycle;
use crate::state::SharedState;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn lamp(self) -> Lamp {
        match self {
            Side::Left => Lamp::LeftTurn,
            Side::Right => Lamp::RightTurn,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlinkTiming {
    /// Half-period of the blink (on time == off time).
    pub blink: Duration,
    /// Poll interval while the indicator is off.
    pub idle: Duration,
}

impl Default for BlinkTiming {
    fn default() -> Self {
        Self {
            blink: Duration::from_millis(500),
            idle: Duration::from_millis(200),
        }
    }
}

/// Blinks one turn indicator while its status boolean is set.
///
/// The status is re-read fresh every cycle (the control loop or the
/// input poll worker can change it at any time) and the lifecycle is
/// re-checked at every wait boundary so the worker exits within one
/// wait of termination.
pub struct IndicatorWorker<C: CabIO> {
    side: Side,
    shared: Arc<SharedState>,
    cab: Arc<C>,
    lifecycle: Arc<Lifecycle>,
    timing: BlinkTiming,
}

impl<C: CabIO> IndicatorWorker<C> {
    pub fn new(
        side: Side,
        shared: Arc<SharedState>,
        cab: Arc<C>,
        lifecycle: Arc<Lifecycle>,
        timing: BlinkTiming,
    ) -> Self {
        Self {
            side,
            shared,
            cab,
            lifecycle,
            timing,
        }
    }

    pub fn run(&self) {
        let lamp = self.side.lamp();
        loop {
            if self.lifecycle.is_terminating() {
                break;
            }

            let active = self.shared.with_lock(|state| match self.side {
                Side::Left => state.actuators.left_turn,
                Side::Right => state.actuators.right_turn,
            });

            if active {
                self.cab.set_lamp(lamp, true);
                if !self.lifecycle.wait_interruptible(self.timing.blink) {
                    break;
                }
                self.cab.set_lamp(lamp, false);
                if !self.lifecycle.wait_interruptible(self.timing.blink) {
                    break;
                }
            } else {
                self.cab.set_lamp(lamp, false);
                if !self.lifecycle.wait_interruptible(self.timing.idle) {
                    break;
                }
            }
        }
        // Leave the lamp dark on the way out.
        self.cab.set_lamp(lamp, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal_sim::SimulatedCab;
    use crate::limiter::LimiterPolicy;
    use crate::state::VehicleState;
    use std::thread;
    use std::time::Instant;

    fn fast_timing() -> BlinkTiming {
        BlinkTiming {
            blink: Duration::from_millis(20),
            idle: Duration::from_millis(5),
        }
    }

    fn spawn_worker(
        side: Side,
        shared: &Arc<SharedState>,
        cab: &Arc<SimulatedCab>,
        lifecycle: &Arc<Lifecycle>,
    ) -> thread::JoinHandle<()> {
        let worker = IndicatorWorker::new(
            side,
            Arc::clone(shared),
            Arc::clone(cab),
            Arc::clone(lifecycle),
            fast_timing(),
        );
        thread::spawn(move || worker.run())
    }

    #[test]
    fn blinks_while_active_and_settles_dark() {
        let shared = Arc::new(SharedState::new(VehicleState::initial(
            &LimiterPolicy::default(),
        )));
        let cab = Arc::new(SimulatedCab::new());
        let lifecycle = Arc::new(Lifecycle::new());

        shared.with_lock(|s| s.actuators.left_turn = true);
        let handle = spawn_worker(Side::Left, &shared, &cab, &lifecycle);

        // Sample until we have seen the lamp both on and off.
        let deadline = Instant::now() + Duration::from_secs(2);
        let (mut seen_on, mut seen_off) = (false, false);
        while Instant::now() < deadline && !(seen_on && seen_off) {
            if cab.lamp(Lamp::LeftTurn) {
                seen_on = true;
            } else {
                seen_off = true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert!(seen_on && seen_off, "lamp never blinked");

        // Switch the indicator off: the lamp must settle dark.
        shared.with_lock(|s| s.actuators.left_turn = false);
        thread::sleep(Duration::from_millis(100));
        assert!(!cab.lamp(Lamp::LeftTurn));

        lifecycle.terminate();
        handle.join().unwrap();
    }

    #[test]
    fn terminates_promptly_mid_blink() {
        let shared = Arc::new(SharedState::new(VehicleState::initial(
            &LimiterPolicy::default(),
        )));
        let cab = Arc::new(SimulatedCab::new());
        let lifecycle = Arc::new(Lifecycle::new());

        shared.with_lock(|s| s.actuators.right_turn = true);
        let worker = IndicatorWorker::new(
            Side::Right,
            Arc::clone(&shared),
            Arc::clone(&cab),
            Arc::clone(&lifecycle),
            BlinkTiming {
                blink: Duration::from_secs(10),
                idle: Duration::from_secs(10),
            },
        );
        let handle = thread::spawn(move || worker.run());

        thread::sleep(Duration::from_millis(50));
        let stop_at = Instant::now();
        lifecycle.terminate();
        handle.join().unwrap();
        // Despite the 10 s blink period, exit follows termination fast.
        assert!(stop_at.elapsed() < Duration::from_secs(2));
        assert!(!cab.lamp(Lamp::RightTurn));
    }
}
