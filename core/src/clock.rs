//! Shared, lock-guarded alarm state
//!
//! [`AlarmClock`] is the one container every daemon loop shares. All access
//! goes through a single coarse mutex that is held only for the duration of
//! one read or mutation, never across I/O or a sleep.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::state::{AlarmState, TickReport};
use crate::types::{AlarmPhase, AlarmTimestamp, Command, Snapshot};

/// Thread-safe handle around [`AlarmState`].
#[derive(Debug)]
pub struct AlarmClock {
    state: Mutex<AlarmState>,
}

impl AlarmClock {
    pub fn new(snooze_secs: i64) -> Self {
        Self {
            state: Mutex::new(AlarmState::new(snooze_secs)),
        }
    }

    // Nothing panics while holding the guard, so a poisoned lock still
    // holds a consistent state.
    fn lock(&self) -> MutexGuard<'_, AlarmState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one evaluation tick.
    pub fn tick(&self, now: AlarmTimestamp) -> TickReport {
        self.lock().tick(now)
    }

    /// Record a command intent for the evaluator.
    pub fn request(&self, command: Command) {
        self.lock().request(command);
    }

    /// Translate a raw command line into a flag.
    ///
    /// # Returns
    /// The recognized command, or `None` if the line was discarded.
    pub fn apply_line(&self, line: &str) -> Option<Command> {
        let command = Command::parse(line)?;
        self.request(command);
        Some(command)
    }

    /// Merge remote alarms, discarding any that are not after `now`.
    pub fn merge_remote<I>(&self, timestamps: I, now: AlarmTimestamp) -> usize
    where
        I: IntoIterator<Item = AlarmTimestamp>,
    {
        self.lock().merge_remote(timestamps, now)
    }

    pub fn add_alarm(&self, ts: AlarmTimestamp, now: AlarmTimestamp) -> bool {
        self.lock().add_alarm(ts, now)
    }

    pub fn phase(&self) -> AlarmPhase {
        self.lock().phase()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    /// Pending alarms in ascending order.
    pub fn alarms(&self) -> Vec<AlarmTimestamp> {
        self.lock().alarms().iter().collect()
    }
}
