#[cfg(test)]
#[path = "checkpoint_test.rs"]
mod checkpoint_test;

use std::fmt;
use std::time::{Duration, Instant, SystemTime};

/// Why a checkpoint runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CheckpointTrigger {
    Timer,
    SessionConnected,
    SessionFailed,
    Shutdown,
}

impl fmt::Display for CheckpointTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            CheckpointTrigger::Timer => "timer",
            CheckpointTrigger::SessionConnected => "session connected",
            CheckpointTrigger::SessionFailed => "session failed",
            CheckpointTrigger::Shutdown => "shutdown",
        };
        write!(f, "{s}")
    }
}

/// Outcome of the checkpoints run so far.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CheckpointHealth {
    pub checkpoints: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_success: Option<SystemTime>,
}

impl CheckpointHealth {
    pub(crate) fn record_success(&mut self, now: SystemTime) {
        self.checkpoints += 1;
        self.consecutive_failures = 0;
        self.last_success = Some(now);
    }

    /// Returns the number of failures in a row, this one included.
    pub(crate) fn record_failure(&mut self, err: String) -> u32 {
        self.checkpoints += 1;
        self.consecutive_failures += 1;
        self.last_error = Some(err);
        self.consecutive_failures
    }

    pub fn is_healthy(&self) -> bool {
        self.consecutive_failures == 0
    }
}

/// Periodic checkpoint timer for a caller-driven event loop.
#[derive(Debug)]
pub struct CheckpointScheduler {
    interval: Duration,
    next_checkpoint: Instant,
}

impl CheckpointScheduler {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_checkpoint: now + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// When the caller should call [`handle_timeout`](Self::handle_timeout) next.
    pub fn poll_timeout(&self) -> Instant {
        self.next_checkpoint
    }

    /// Returns a trigger when the timer is due and arms the next period. Missed periods
    /// collapse into one checkpoint.
    pub fn handle_timeout(&mut self, now: Instant) -> Option<CheckpointTrigger> {
        if now < self.next_checkpoint {
            return None;
        }
        self.next_checkpoint = now + self.interval;
        Some(CheckpointTrigger::Timer)
    }
}
