pub mod bridge;
pub mod metrics;
pub mod protocol;

pub use bridge::{bind_panel_listener, run_panel_bridge, PanelBridgeConfig};
pub use metrics::{init_metrics, serve_metrics};
pub use protocol::{CommandMsg, IncomingMessage, NoticeMsg, ProtocolVersion, StatusMsg};
