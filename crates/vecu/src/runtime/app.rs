use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::signals;
use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;
use vecu_core::{
    BlinkTiming, CabIO, Command, CommandChannel, CommandKind, ControlConfig, ControlLoop, CycleStats,
    Direction, IndicatorWorker, InputPollWorker, Lamp, Lifecycle, LimiterPolicy, MsgClass,
    RunState, SensorFeed, SharedState, Side, SimulatedCab, TimeBase, VehicleState,
};
use vecu_io::bridge::{bind_panel_listener, run_panel_bridge, PanelBridgeConfig};
use vecu_io::metrics;

pub fn run_from_args() -> Result<(), Box<dyn Error>> {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return Ok(());
    }
    run(config)
}

pub fn run(config: RuntimeConfig) -> Result<(), Box<dyn Error>> {
    init_tracing(config.json_logs);
    metrics::init_metrics();
    let _metrics_server = config.metrics_addr.clone().map(metrics::serve_metrics);

    let control_config = ControlConfig {
        cycle_time: Duration::from_millis(config.tick_ms),
        policy: LimiterPolicy::default(),
    };
    let policy = control_config.policy;

    let shared = Arc::new(SharedState::new(VehicleState::initial(&policy)));
    let channel = CommandChannel::open(config.channel_key);
    let residue = channel.drain();
    if residue > 0 {
        info!(residue, "discarded residual panel messages from a prior run");
    }
    let lifecycle = Arc::new(Lifecycle::new());
    let cab = Arc::new(SimulatedCab::new());
    let timebase = TimeBase::new();

    // Bind before spawning workers so an unusable address is a startup
    // failure, not a dead thread later.
    let panel_listener = if config.panel_enabled {
        Some(bind_panel_listener(&config.bind_addr)?)
    } else {
        info!("panel bridge disabled");
        None
    };

    let signal_watcher = signals::install(Arc::clone(&lifecycle), Arc::clone(&channel))?;

    info!(
        cycle_ms = config.tick_ms,
        high_speed_kmh = policy.high_speed_kmh,
        high_rpm = policy.high_rpm,
        max_temp_c = policy.max_temp_c,
        "starting vehicle control core"
    );

    let control_handle = {
        let shared = Arc::clone(&shared);
        let channel = Arc::clone(&channel);
        let lifecycle = Arc::clone(&lifecycle);
        let cab = Arc::clone(&cab);
        let control_config = control_config.clone();
        thread::Builder::new().name("control-loop".into()).spawn(move || {
            let mut control = ControlLoop::new(control_config, shared, channel, lifecycle, cab);
            control.run();
            control.stats().clone()
        })?
    };

    let mut worker_handles = Vec::new();

    for side in [Side::Left, Side::Right] {
        let worker = IndicatorWorker::new(
            side,
            Arc::clone(&shared),
            Arc::clone(&cab),
            Arc::clone(&lifecycle),
            BlinkTiming::default(),
        );
        let name = match side {
            Side::Left => "indicator-left",
            Side::Right => "indicator-right",
        };
        worker_handles.push(
            thread::Builder::new()
                .name(name.into())
                .spawn(move || worker.run())?,
        );
    }

    {
        let mut worker = InputPollWorker::new(
            Arc::clone(&shared),
            Arc::clone(&cab),
            Arc::clone(&lifecycle),
            policy,
            Duration::from_millis(50),
        );
        worker_handles.push(
            thread::Builder::new()
                .name("input-poll".into())
                .spawn(move || worker.run())?,
        );
    }

    if config.sensor_feed {
        let shared = Arc::clone(&shared);
        let lifecycle = Arc::clone(&lifecycle);
        worker_handles.push(
            thread::Builder::new()
                .name("sensor-feed".into())
                .spawn(move || run_sensor_feed(shared, lifecycle))?,
        );
    }

    if let Some(listener) = panel_listener {
        let shared = Arc::clone(&shared);
        let channel = Arc::clone(&channel);
        let lifecycle = Arc::clone(&lifecycle);
        worker_handles.push(thread::Builder::new().name("panel-bridge".into()).spawn(
            move || {
                run_panel_bridge(
                    listener,
                    shared,
                    channel,
                    lifecycle,
                    timebase,
                    PanelBridgeConfig::default(),
                );
            },
        )?);
    }

    {
        let shared = Arc::clone(&shared);
        let lifecycle = Arc::clone(&lifecycle);
        worker_handles.push(
            thread::Builder::new()
                .name("metrics-updater".into())
                .spawn(move || run_metrics_updater(shared, lifecycle))?,
        );
    }

    if let Some(seconds) = config.run_seconds {
        info!(seconds, "running for limited duration");
        if lifecycle.wait_interruptible(Duration::from_secs(seconds)) {
            info!("run time elapsed, shutting down");
            if lifecycle.terminate() {
                let _ = channel.send(
                    MsgClass::Notice,
                    Command::controller(CommandKind::Terminate),
                );
            }
        }
    }

    // The control loop outlives everything that matters; its exit means
    // the lifecycle is Terminating and the other workers are on their
    // way out.
    let stats = control_handle
        .join()
        .unwrap_or_else(|_| CycleStats::default());
    for handle in worker_handles {
        let _ = handle.join();
    }
    let _ = signal_watcher.join();

    report(&stats);

    lifecycle.teardown(|| {
        // Same closing moves as the reference cleanup: outputs zeroed,
        // lamps dark, queue emptied.
        cab.set_motor_duty(0);
        cab.set_brake_duty(0);
        cab.set_direction(Direction::Neutral);
        for lamp in [
            Lamp::LeftTurn,
            Lamp::RightTurn,
            Lamp::LowBeam,
            Lamp::HighBeam,
            Lamp::BrakeLight,
            Lamp::OverheatWarn,
        ] {
            cab.set_lamp(lamp, false);
        }
        let dropped = channel.drain();
        info!(dropped, "command channel released");
    });

    info!("vehicle control core shutdown complete");
    Ok(())
}

/// End-of-run limiter report, flushed to the observability collaborator.
fn report(stats: &CycleStats) {
    info!(
        cycles_executed = stats.cycles_executed,
        commands_applied = stats.commands_applied,
        speed_high = stats.limits.speed_high,
        speed_low = stats.limits.speed_low,
        rpm_high = stats.limits.rpm_high,
        rpm_stall = stats.limits.rpm_stall,
        overheat = stats.limits.overheat,
        limited_total = stats.limits.total(),
        "limiter report"
    );
}

/// Ramp generator standing in for the external sensor source. Writes
/// are skipped while paused so the store stays frozen.
fn run_sensor_feed(shared: Arc<SharedState>, lifecycle: Arc<Lifecycle>) {
    let mut feed = SensorFeed::new();
    loop {
        if !lifecycle.wait_interruptible(Duration::from_secs(1)) {
            break;
        }
        if lifecycle.state() == RunState::Paused {
            continue;
        }
        let (speed_kmh, engine_rpm) = feed.step();
        shared.with_lock(|state| {
            state.sensors.speed_kmh = speed_kmh;
            state.sensors.engine_rpm = engine_rpm;
        });
    }
}

/// Mirrors the state store into the Prometheus registry.
fn run_metrics_updater(shared: Arc<SharedState>, lifecycle: Arc<Lifecycle>) {
    let mut last = vecu_core::LimiterCounters::default();
    let mut last_cycles = 0u64;
    loop {
        let state = shared.snapshot();
        metrics::SPEED_KMH.set(state.sensors.speed_kmh);
        metrics::ENGINE_RPM.set(state.sensors.engine_rpm);
        metrics::ENGINE_TEMP_C.set(state.sensors.engine_temp_c);
        metrics::ODOMETER_KM.set(state.odometer_km);
        metrics::LIFECYCLE_STATE.set(match lifecycle.state() {
            RunState::Running => 0.0,
            RunState::Paused => 1.0,
            RunState::Terminating => 2.0,
        });

        metrics::SPEED_HIGH_LIMITED.inc_by(state.counters.speed_high - last.speed_high);
        metrics::SPEED_LOW_LIMITED.inc_by(state.counters.speed_low - last.speed_low);
        metrics::RPM_HIGH_LIMITED.inc_by(state.counters.rpm_high - last.rpm_high);
        metrics::RPM_STALLS.inc_by(state.counters.rpm_stall - last.rpm_stall);
        metrics::OVERHEAT_ALERTS.inc_by(state.counters.overheat - last.overheat);
        metrics::CYCLES_TOTAL.inc_by(state.cycle_count - last_cycles);
        last = state.counters;
        last_cycles = state.cycle_count;

        if !lifecycle.wait_interruptible(Duration::from_millis(200)) {
            break;
        }
    }
}
