//! The periodic control algorithm: snapshot, limit, derive, write back,
//! dispatch one command, tick cruise.

use crate::channel::{CommandChannel, MsgClass};
use crate::command::{Command, CommandKind};
use crate::cruise;
use crate::hal::{CabIO, Lamp};
use crate::lifecycle::Lifecycle;
use crate::limiter::{engine_temp, limit_cycle, LimiterCounters, LimiterPolicy};
use crate::state::{Direction, SharedState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub cycle_time: Duration,
    pub policy: LimiterPolicy,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            cycle_time: Duration::from_secs(1),
            policy: LimiterPolicy::default(),
        }
    }
}

/// Per-run statistics, handed to the report collaborator at shutdown.
#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    pub cycles_executed: u64,
    pub commands_applied: u64,
    pub limits: LimiterCounters,
}

pub struct ControlLoop<C: CabIO> {
    config: ControlConfig,
    shared: Arc<SharedState>,
    channel: Arc<CommandChannel>,
    lifecycle: Arc<Lifecycle>,
    cab: Arc<C>,
    stats: CycleStats,
}

impl<C: CabIO> ControlLoop<C> {
    pub fn new(
        config: ControlConfig,
        shared: Arc<SharedState>,
        channel: Arc<CommandChannel>,
        lifecycle: Arc<Lifecycle>,
        cab: Arc<C>,
    ) -> Self {
        Self {
            config,
            shared,
            channel,
            lifecycle,
            cab,
            stats: CycleStats::default(),
        }
    }

    /// Run until the lifecycle reaches Terminating. While Paused the
    /// loop blocks before touching any state, so a pause/resume pair
    /// leaves the store byte-identical.
    pub fn run(&mut self) {
        loop {
            self.lifecycle.block_while_paused();
            if self.lifecycle.is_terminating() {
                break;
            }

            let started = Instant::now();
            self.cycle();

            if let Some(remaining) = self.config.cycle_time.checked_sub(started.elapsed()) {
                if !self.lifecycle.wait_interruptible(remaining) {
                    break;
                }
            }
        }
    }

    /// One full control cycle. Public so tests can single-step it.
    pub fn cycle(&mut self) {
        let cycle_secs = self.config.cycle_time.as_secs_f64();
        let policy = self.config.policy;

        // Snapshot under the gate, report outside it.
        let snap = self.shared.with_lock(|state| state.sensors);
        debug!(
            speed_kmh = snap.speed_kmh,
            engine_rpm = snap.engine_rpm,
            engine_temp_c = snap.engine_temp_c,
            "sensor snapshot"
        );

        // Limiter pass: pure, no gate held.
        let out = limit_cycle(
            &policy,
            snap.speed_kmh,
            snap.engine_rpm,
            snap.engine_temp_c,
            &mut self.stats.limits,
        );

        if out.overheating {
            warn!(
                engine_temp_c = snap.engine_temp_c,
                limit = policy.max_temp_c,
                "ENGINE TEMPERATURE ALERT"
            );
        }
        self.cab.set_lamp(Lamp::OverheatWarn, out.overheating);

        if out.stalled {
            warn!(engine_rpm = snap.engine_rpm, "engine stalled, shutting down");
            self.begin_shutdown();
        }

        // Temperature is derived exactly once per cycle, from the
        // post-limiter speed and rpm.
        let temp = engine_temp(&policy, out.speed_kmh, out.engine_rpm);

        // Write back, advance the odometer, mirror status for reporting.
        let (actuators, counters) = self.shared.with_lock(|state| {
            state.sensors.speed_kmh = out.speed_kmh;
            state.sensors.engine_rpm = out.engine_rpm;
            state.sensors.engine_temp_c = temp;
            state.odometer_km += out.speed_kmh * cycle_secs / 3600.0;
            state.counters = self.stats.limits;
            state.cycle_count += 1;
            (state.actuators, state.counters)
        });
        debug!(?actuators, limited_total = counters.total(), "cycle written back");

        // At most one pending operator command per cycle.
        if let Some(command) = self.channel.try_receive(MsgClass::Operator) {
            self.dispatch(command);
        }

        // Cruise correction runs on post-command state.
        let duties = self.shared.with_lock(|state| {
            cruise::tick(state, &policy);
            state.cruise.engaged.then_some(state.propulsion)
        });
        if let Some(propulsion) = duties {
            self.cab.set_motor_duty(propulsion.motor_duty);
            self.cab.set_brake_duty(propulsion.brake_duty);
            self.cab.set_direction(propulsion.direction);
        }

        self.stats.cycles_executed += 1;
    }

    fn dispatch(&mut self, command: Command) {
        info!(action = command.kind.as_tag(), origin = ?command.origin, "panel command");
        let policy = self.config.policy;
        match command.kind {
            CommandKind::LeftTurnOn => {
                self.shared.with_lock(|s| s.actuators.left_turn = true);
            }
            CommandKind::LeftTurnOff => {
                self.shared.with_lock(|s| s.actuators.left_turn = false);
            }
            CommandKind::RightTurnOn => {
                self.shared.with_lock(|s| s.actuators.right_turn = true);
            }
            CommandKind::RightTurnOff => {
                self.shared.with_lock(|s| s.actuators.right_turn = false);
            }
            CommandKind::HazardOn => {
                self.shared.with_lock(|s| {
                    s.actuators.left_turn = true;
                    s.actuators.right_turn = true;
                });
            }
            CommandKind::HazardOff => {
                self.shared.with_lock(|s| {
                    s.actuators.left_turn = false;
                    s.actuators.right_turn = false;
                });
            }
            CommandKind::LowBeamOn => {
                self.shared.with_lock(|s| s.actuators.low_beam = true);
                self.cab.set_lamp(Lamp::LowBeam, true);
            }
            CommandKind::LowBeamOff => {
                self.shared.with_lock(|s| s.actuators.low_beam = false);
                self.cab.set_lamp(Lamp::LowBeam, false);
            }
            CommandKind::HighBeamOn => {
                self.shared.with_lock(|s| s.actuators.high_beam = true);
                self.cab.set_lamp(Lamp::HighBeam, true);
            }
            CommandKind::HighBeamOff => {
                self.shared.with_lock(|s| s.actuators.high_beam = false);
                self.cab.set_lamp(Lamp::HighBeam, false);
            }
            CommandKind::BeamsOff => {
                self.shared.with_lock(|s| {
                    s.actuators.low_beam = false;
                    s.actuators.high_beam = false;
                });
                self.cab.set_lamp(Lamp::LowBeam, false);
                self.cab.set_lamp(Lamp::HighBeam, false);
            }
            CommandKind::Accelerate => {
                let duty = self.shared.with_lock(|s| {
                    s.press_accelerator(&policy);
                    s.propulsion.motor_duty
                });
                self.cab.set_motor_duty(duty);
                self.cab.set_brake_duty(0);
                self.cab.set_direction(Direction::Forward);
                self.cab.set_lamp(Lamp::BrakeLight, false);
            }
            CommandKind::Brake => {
                let duty = self.shared.with_lock(|s| {
                    s.press_brake(&policy);
                    s.propulsion.brake_duty
                });
                self.cab.set_brake_duty(duty);
                self.cab.set_motor_duty(0);
                self.cab.set_direction(Direction::Brake);
                self.cab.set_lamp(Lamp::BrakeLight, true);
            }
            CommandKind::CruiseOn => {
                self.shared.with_lock(cruise::engage);
            }
            CommandKind::CruiseOff => {
                self.shared.with_lock(cruise::disengage);
            }
            CommandKind::CruiseFaster => {
                self.shared
                    .with_lock(|s| cruise::adjust(s, cruise::CRUISE_STEP_KMH));
            }
            CommandKind::CruiseSlower => {
                self.shared
                    .with_lock(|s| cruise::adjust(s, -cruise::CRUISE_STEP_KMH));
            }
            CommandKind::Terminate => {
                info!("terminate requested");
                self.begin_shutdown();
            }
        }
        self.stats.commands_applied += 1;
    }

    /// Enter Terminating and, if this call won the transition, notify
    /// the panel. Duplicate calls are harmless.
    fn begin_shutdown(&self) {
        if self.lifecycle.terminate() {
            if let Err(error) = self.channel.send(
                MsgClass::Notice,
                Command::controller(CommandKind::Terminate),
            ) {
                warn!(%error, "failed to queue termination notice");
            }
        }
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }
}
