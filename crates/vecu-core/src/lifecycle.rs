//! RUNNING / PAUSED / TERMINATING coordination for every worker.
//!
//! Signal handlers never call into this directly; they set flags that a
//! watcher translates into the methods below, so no lock is ever taken
//! inside a handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
    Terminating,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Terminating => "terminating",
        }
    }
}

/// Shared lifecycle state machine. Transitions only move forward except
/// Running↔Paused; Terminating is absorbing.
pub struct Lifecycle {
    state: Mutex<RunState>,
    wake: Condvar,
    cleaned: AtomicBool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RunState::Running),
            wake: Condvar::new(),
            cleaned: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_terminating(&self) -> bool {
        self.state() == RunState::Terminating
    }

    /// Running → Paused. No-op in any other state.
    pub fn pause(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == RunState::Running {
            *state = RunState::Paused;
        }
    }

    /// Paused → Running. No-op in any other state.
    pub fn resume(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == RunState::Paused {
            *state = RunState::Running;
            self.wake.notify_all();
        }
    }

    /// Enter Terminating. Returns true only for the caller that made
    /// the transition; that caller owes the panel a termination notice.
    pub fn terminate(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let first = *state != RunState::Terminating;
        *state = RunState::Terminating;
        self.wake.notify_all();
        first
    }

    /// Block the caller for as long as the state is Paused. Returns on
    /// Running or Terminating.
    pub fn block_while_paused(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while *state == RunState::Paused {
            state = self
                .wake
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Sleep for up to `duration`, waking immediately on termination.
    /// Returns false when Terminating; every worker wait goes through
    /// here so shutdown latency stays bounded by one wait.
    pub fn wait_interruptible(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *state == RunState::Terminating {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let (guard, _timeout) = self
                .wake
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    /// Run `f` exactly once across all teardown callers; later calls
    /// are no-ops. Returns whether `f` ran.
    pub fn teardown(&self, f: impl FnOnce()) -> bool {
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return false;
        }
        f();
        true
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn pause_and_resume_round_trip() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), RunState::Running);
        lifecycle.pause();
        assert_eq!(lifecycle.state(), RunState::Paused);
        lifecycle.resume();
        assert_eq!(lifecycle.state(), RunState::Running);
        // Resume while running is a no-op.
        lifecycle.resume();
        assert_eq!(lifecycle.state(), RunState::Running);
    }

    #[test]
    fn terminating_is_absorbing() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.terminate());
        // Only the first caller wins the transition.
        assert!(!lifecycle.terminate());
        lifecycle.pause();
        assert_eq!(lifecycle.state(), RunState::Terminating);
        lifecycle.resume();
        assert_eq!(lifecycle.state(), RunState::Terminating);
    }

    #[test]
    fn block_while_paused_unblocks_on_resume() {
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.pause();

        let blocked = Arc::clone(&lifecycle);
        let handle = thread::spawn(move || {
            blocked.block_while_paused();
            blocked.state()
        });

        thread::sleep(Duration::from_millis(50));
        lifecycle.resume();
        assert_eq!(handle.join().unwrap(), RunState::Running);
    }

    #[test]
    fn block_while_paused_unblocks_on_terminate() {
        let lifecycle = Arc::new(Lifecycle::new());
        lifecycle.pause();

        let blocked = Arc::clone(&lifecycle);
        let handle = thread::spawn(move || {
            blocked.block_while_paused();
            blocked.state()
        });

        thread::sleep(Duration::from_millis(50));
        lifecycle.terminate();
        assert_eq!(handle.join().unwrap(), RunState::Terminating);
    }

    #[test]
    fn wait_is_cut_short_by_termination() {
        let lifecycle = Arc::new(Lifecycle::new());
        let waiter = Arc::clone(&lifecycle);
        let handle = thread::spawn(move || {
            let started = Instant::now();
            let completed = waiter.wait_interruptible(Duration::from_secs(30));
            (completed, started.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        lifecycle.terminate();
        let (completed, waited) = handle.join().unwrap();
        assert!(!completed);
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn full_wait_returns_true_while_running() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.wait_interruptible(Duration::from_millis(10)));
    }

    #[test]
    fn teardown_runs_exactly_once() {
        let lifecycle = Lifecycle::new();
        let mut runs = 0;
        assert!(lifecycle.teardown(|| runs += 1));
        assert!(!lifecycle.teardown(|| runs += 1));
        assert_eq!(runs, 1);
    }
}
