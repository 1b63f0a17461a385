pub mod channel;
pub mod command;
pub mod control_loop;
pub mod cruise;
pub mod hal;
#[cfg(feature = "simulation")]
pub mod hal_sim;
pub mod indicators;
pub mod input_poll;
pub mod lifecycle;
pub mod limiter;
pub mod state;
pub mod timebase;

pub use channel::{ChannelError, CommandChannel, MsgClass, MAX_PAYLOAD_BYTES};
pub use command::{Command, CommandKind, Origin};
pub use control_loop::{ControlConfig, ControlLoop, CycleStats};
pub use cruise::CruiseSetting;
pub use hal::{CabIO, InputLine, Lamp};
#[cfg(feature = "simulation")]
pub use hal_sim::{SensorFeed, SimulatedCab};
pub use indicators::{BlinkTiming, IndicatorWorker, Side};
pub use input_poll::InputPollWorker;
pub use lifecycle::{Lifecycle, RunState};
pub use limiter::{engine_temp, limit_cycle, LimiterCounters, LimiterPolicy};
pub use state::{
    ActuatorStatus, Direction, PropulsionTarget, SensorReading, SharedState, VehicleState,
};
pub use timebase::TimeBase;
