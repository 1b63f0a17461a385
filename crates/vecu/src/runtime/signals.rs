//! OS signal wiring: SIGUSR1 toggles pause/resume, SIGUSR2 and SIGINT
//! request shutdown.
//!
//! The handlers only touch atomics. A watcher thread translates the
//! flags into lifecycle calls, so no lock or channel operation ever
//! happens in signal context.

use nix::libc::c_int;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;
use vecu_core::{Command, CommandChannel, CommandKind, Lifecycle, MsgClass, RunState};

static PAUSE_TOGGLES: AtomicUsize = AtomicUsize::new(0);
static TERMINATE_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigusr1(_signal: c_int) {
    PAUSE_TOGGLES.fetch_add(1, Ordering::Relaxed);
}

extern "C" fn on_sigusr2(_signal: c_int) {
    TERMINATE_REQUESTED.store(true, Ordering::Relaxed);
}

/// Install the handlers and spawn the watcher thread.
pub fn install(
    lifecycle: Arc<Lifecycle>,
    channel: Arc<CommandChannel>,
) -> Result<JoinHandle<()>, Box<dyn std::error::Error>> {
    let usr1 = SigAction::new(
        SigHandler::Handler(on_sigusr1),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    let usr2 = SigAction::new(
        SigHandler::Handler(on_sigusr2),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe {
        sigaction(Signal::SIGUSR1, &usr1)?;
        sigaction(Signal::SIGUSR2, &usr2)?;
    }

    // Ctrl+C takes the same path as SIGUSR2: flag only, the watcher
    // does the rest.
    ctrlc::set_handler(|| {
        TERMINATE_REQUESTED.store(true, Ordering::Relaxed);
    })?;

    let handle = thread::Builder::new()
        .name("signal-watcher".into())
        .spawn(move || watch(lifecycle, channel))?;
    Ok(handle)
}

fn watch(lifecycle: Arc<Lifecycle>, channel: Arc<CommandChannel>) {
    loop {
        if lifecycle.is_terminating() {
            break;
        }

        for _ in 0..PAUSE_TOGGLES.swap(0, Ordering::Relaxed) {
            match lifecycle.state() {
                RunState::Running => {
                    info!("pause signal received");
                    lifecycle.pause();
                }
                RunState::Paused => {
                    info!("resume signal received");
                    lifecycle.resume();
                }
                RunState::Terminating => {}
            }
        }

        if TERMINATE_REQUESTED.swap(false, Ordering::Relaxed) {
            info!("shutdown signal received");
            if lifecycle.terminate() {
                // Best effort: the panel learns we are going away.
                let _ = channel.send(
                    MsgClass::Notice,
                    Command::controller(CommandKind::Terminate),
                );
            }
            break;
        }

        thread::sleep(Duration::from_millis(50));
    }
}
