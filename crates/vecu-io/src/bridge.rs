//! TCP adapter between the operator panel and the command channel.
//!
//! Single client, non-blocking socket, newline-delimited JSON both
//! ways. Inbound lines become typed commands on the Operator class;
//! pending Notice messages and a periodic status snapshot flow back.

use crate::metrics::{COMMANDS_DISCARDED, PANEL_CONNECTED};
use crate::protocol::{IncomingMessage, NoticeMsg, StatusMsg};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vecu_core::{
    ChannelError, Command, CommandChannel, CommandKind, Lifecycle, MsgClass, SharedState,
    TimeBase, MAX_PAYLOAD_BYTES,
};

pub struct PanelBridgeConfig {
    pub publish_interval: Duration,
}

impl Default for PanelBridgeConfig {
    fn default() -> Self {
        Self {
            publish_interval: Duration::from_millis(500),
        }
    }
}

/// Bind the panel listener. Kept separate from [`run_panel_bridge`] so
/// a bind failure surfaces as a startup error in the caller instead of
/// killing a worker thread later.
pub fn bind_panel_listener(bind_addr: &str) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(bind_addr)?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

pub fn run_panel_bridge(
    listener: TcpListener,
    shared: Arc<SharedState>,
    channel: Arc<CommandChannel>,
    lifecycle: Arc<Lifecycle>,
    timebase: TimeBase,
    config: PanelBridgeConfig,
) {
    info!(addr = ?listener.local_addr().ok(), "panel bridge listening");

    let mut client: Option<TcpStream> = None;
    let mut recv_buf: Vec<u8> = Vec::with_capacity(4096);
    let mut last_publish = Instant::now() - config.publish_interval;

    loop {
        let terminating = lifecycle.is_terminating();

        if client.is_none() {
            match listener.accept() {
                Ok((stream, addr)) => {
                    info!(client_addr = %addr, "panel connected");
                    if let Err(error) = stream.set_nonblocking(true) {
                        warn!(%error, "failed to set panel socket nonblocking");
                    } else {
                        client = Some(stream);
                        PANEL_CONNECTED.set(1.0);
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(err) => warn!(error = %err, "panel accept error"),
            }
        }

        let mut drop_client = false;
        if let Some(stream) = client.as_mut() {
            // Inbound commands.
            let mut temp = [0u8; 1024];
            match stream.read(&mut temp) {
                Ok(0) => {
                    info!("panel disconnected");
                    drop_client = true;
                }
                Ok(n) => {
                    recv_buf.extend_from_slice(&temp[..n]);
                    while let Some(pos) = recv_buf.iter().position(|b| *b == b'\n') {
                        let line = recv_buf.drain(..=pos).collect::<Vec<u8>>();
                        handle_line(&line, &channel);
                    }
                    // A line that never terminates must not grow without bound.
                    if recv_buf.len() > MAX_PAYLOAD_BYTES {
                        warn!(
                            error = %ChannelError::PayloadTooLarge(recv_buf.len()),
                            "dropping oversized partial line"
                        );
                        COMMANDS_DISCARDED.inc();
                        recv_buf.clear();
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(err) => {
                    warn!(error = %err, "panel read error");
                    drop_client = true;
                }
            }

            // Outbound notices, then the periodic status snapshot.
            while let Some(notice) = channel.try_receive(MsgClass::Notice) {
                debug!(?notice, "forwarding notice to panel");
                let msg = NoticeMsg::terminated(timebase.unix_us());
                if write_line(stream, &serde_json::to_string(&msg).unwrap_or_default()).is_err() {
                    drop_client = true;
                    break;
                }
            }

            if !drop_client && last_publish.elapsed() >= config.publish_interval {
                let state = shared.snapshot();
                let msg = StatusMsg::from_state(&state, lifecycle.state(), timebase.unix_us());
                if let Ok(line) = serde_json::to_string(&msg) {
                    if write_line(stream, &line).is_err() {
                        drop_client = true;
                    }
                }
                last_publish = Instant::now();
            }
        }

        if drop_client {
            client = None;
            recv_buf.clear();
            PANEL_CONNECTED.set(0.0);
        }

        if terminating {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    // The terminating worker may enqueue its notice a beat after the
    // state flips; give it one grace period before the final flush.
    if let Some(stream) = client.as_mut() {
        std::thread::sleep(Duration::from_millis(50));
        while channel.try_receive(MsgClass::Notice).is_some() {
            let msg = NoticeMsg::terminated(timebase.unix_us());
            if write_line(stream, &serde_json::to_string(&msg).unwrap_or_default()).is_err() {
                break;
            }
        }
    }

    PANEL_CONNECTED.set(0.0);
    info!("panel bridge stopped");
}

fn handle_line(line: &[u8], channel: &CommandChannel) {
    if line.len() > MAX_PAYLOAD_BYTES {
        warn!(
            error = %ChannelError::PayloadTooLarge(line.len()),
            "panel line rejected"
        );
        COMMANDS_DISCARDED.inc();
        return;
    }
    let Ok(text) = std::str::from_utf8(line) else {
        warn!("panel line is not UTF-8");
        COMMANDS_DISCARDED.inc();
        return;
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }

    let Some(IncomingMessage::Command(msg)) = IncomingMessage::parse(trimmed) else {
        warn!(line = trimmed, "malformed panel message discarded");
        COMMANDS_DISCARDED.inc();
        return;
    };
    if !msg.protocol_version.is_supported() {
        warn!(
            major = msg.protocol_version.major,
            minor = msg.protocol_version.minor,
            "unsupported panel protocol version"
        );
        COMMANDS_DISCARDED.inc();
        return;
    }
    let Some(kind) = CommandKind::from_tag(&msg.action) else {
        warn!(action = %msg.action, "unknown panel action discarded");
        COMMANDS_DISCARDED.inc();
        return;
    };

    debug!(action = %msg.action, "panel command accepted");
    if let Err(error) = channel.send(MsgClass::Operator, Command::panel(kind)) {
        warn!(%error, action = %msg.action, "panel command dropped");
        COMMANDS_DISCARDED.inc();
    }
}

fn write_line(stream: &mut TcpStream, line: &str) -> std::io::Result<()> {
    stream.write_all(line.as_bytes())?;
    stream.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_line_enqueues_known_actions() {
        let channel = CommandChannel::new();
        handle_line(
            br#"{"type":"command","action":"hazard_on"}"#,
            &channel,
        );
        assert_eq!(
            channel.try_receive(MsgClass::Operator).map(|c| c.kind),
            Some(CommandKind::HazardOn)
        );
    }

    #[test]
    fn handle_line_discards_unknown_and_oversized() {
        let channel = CommandChannel::new();
        handle_line(br#"{"type":"command","action":"afterburner"}"#, &channel);
        handle_line(b"}{ not json", &channel);
        let oversized = vec![b'x'; MAX_PAYLOAD_BYTES + 1];
        handle_line(&oversized, &channel);
        assert_eq!(channel.try_receive(MsgClass::Operator), None);
    }
}
