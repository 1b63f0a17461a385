//! The command mailbox between the operator panel and the controller.
//!
//! A channel is opened by numeric key; opening the same key again
//! returns the same mailbox, so a restarted worker re-attaches to
//! whatever was left pending. Messages are tagged with a class so a
//! receiver can pick out panel commands or controller notices without
//! ever blocking.

use crate::command::Command;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use thiserror::Error;

/// Most messages a channel will hold before senders start failing.
pub const CHANNEL_CAPACITY: usize = 64;

/// Longest accepted wire payload for a single command, in bytes.
/// Enforced at the send site, before a command is ever constructed.
pub const MAX_PAYLOAD_BYTES: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("command channel full ({} pending)", CHANNEL_CAPACITY)]
    Full,
    #[error("command payload of {0} bytes exceeds {} byte limit", MAX_PAYLOAD_BYTES)]
    PayloadTooLarge(usize),
}

/// Logical message class, selectable on receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgClass {
    /// Panel → controller operator commands.
    Operator,
    /// Controller → panel termination notices.
    Notice,
}

#[derive(Debug, Clone, Copy)]
struct Envelope {
    class: MsgClass,
    command: Command,
}

/// FIFO mailbox with class-selective, non-blocking receive.
pub struct CommandChannel {
    queue: Mutex<VecDeque<Envelope>>,
}

static REGISTRY: LazyLock<Mutex<HashMap<u32, Arc<CommandChannel>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

impl CommandChannel {
    /// A fresh, unregistered channel (tests mostly).
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Open the channel registered under `key`, creating it on first
    /// use. All opens of the same key within this machine-local scope
    /// share one mailbox.
    pub fn open(key: u32) -> Arc<CommandChannel> {
        let mut registry = REGISTRY.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            registry
                .entry(key)
                .or_insert_with(|| Arc::new(CommandChannel::new())),
        )
    }

    /// Enqueue a command. Never blocks; a full mailbox is an error
    /// reported to the sender, not a fault of the channel.
    pub fn send(&self, class: MsgClass, command: Command) -> Result<(), ChannelError> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len() >= CHANNEL_CAPACITY {
            return Err(ChannelError::Full);
        }
        queue.push_back(Envelope { class, command });
        Ok(())
    }

    /// Oldest pending message of the given class, if any. Never blocks.
    pub fn try_receive(&self, class: MsgClass) -> Option<Command> {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let index = queue.iter().position(|envelope| envelope.class == class)?;
        queue.remove(index).map(|envelope| envelope.command)
    }

    /// Discard everything, returning how many messages were dropped.
    /// Called once at controller startup to clear residue from a
    /// previous run.
    pub fn drain(&self) -> usize {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let dropped = queue.len();
        queue.clear();
        dropped
    }

    pub fn pending(&self, class: MsgClass) -> usize {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue
            .iter()
            .filter(|envelope| envelope.class == class)
            .count()
    }
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}
