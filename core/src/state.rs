//! Alarm state machine
//!
//! A single [`AlarmState`] holds the alarm set, the current phase, the
//! snooze deadline and the pending command flags. [`AlarmState::tick`] is
//! the only place phases change. It takes the current time explicitly so
//! the transition rules can be exercised without a real clock.
//!
//! Transitions per tick (due alarms are always drained first):
//! - Idle -> Ringing when an alarm is due
//! - Snoozing -> Ringing when an alarm is due or the snooze deadline passed
//! - Ringing -> Idle on a shut request
//! - Ringing -> Snoozing on a snooze request
//!
//! Pending command flags are cleared at the end of every tick whatever
//! the phase.

use crate::alarm_set::AlarmSet;
use crate::types::{AlarmPhase, AlarmTimestamp, Command, PendingCommands, Snapshot};

/// Why the machine entered [`AlarmPhase::Ringing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingCause {
    /// One or more alarms came due.
    AlarmDue { count: usize },
    /// A snooze ran out with nothing else due.
    SnoozeExpired,
}

/// A phase change produced by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Ring(RingCause),
    Snooze { until: AlarmTimestamp },
    Shut,
}

/// Outcome of one evaluation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Phase after the tick.
    pub phase: AlarmPhase,
    /// Phase change, if any.
    pub transition: Option<Transition>,
    /// Alarms removed from the set during this tick.
    pub consumed: usize,
    /// Command flags that were cleared this tick.
    pub commands: PendingCommands,
}

/// Alarm set, phase, snooze deadline and pending command flags.
#[derive(Debug, Clone)]
pub struct AlarmState {
    alarms: AlarmSet,
    phase: AlarmPhase,
    snooze_deadline: Option<AlarmTimestamp>,
    pending: PendingCommands,
    snooze_secs: i64,
}

impl AlarmState {
    /// Create an idle state with an empty alarm set.
    pub fn new(snooze_secs: i64) -> Self {
        Self {
            alarms: AlarmSet::new(),
            phase: AlarmPhase::Idle,
            snooze_deadline: None,
            pending: PendingCommands::default(),
            snooze_secs,
        }
    }

    pub fn phase(&self) -> AlarmPhase {
        self.phase
    }

    pub fn alarms(&self) -> &AlarmSet {
        &self.alarms
    }

    /// Deadline of the current snooze; `None` unless snoozing.
    pub fn snooze_deadline(&self) -> Option<AlarmTimestamp> {
        self.snooze_deadline
    }

    pub fn pending(&self) -> PendingCommands {
        self.pending
    }

    pub fn snooze_secs(&self) -> i64 {
        self.snooze_secs
    }

    /// Add a single alarm if it is still in the future.
    pub fn add_alarm(&mut self, ts: AlarmTimestamp, now: AlarmTimestamp) -> bool {
        self.alarms.insert_future(ts, now)
    }

    /// Merge alarms from the remote source. Expired entries are dropped here
    /// rather than inserted and drained on the next tick.
    ///
    /// # Returns
    /// Number of newly known alarms.
    pub fn merge_remote<I>(&mut self, timestamps: I, now: AlarmTimestamp) -> usize
    where
        I: IntoIterator<Item = AlarmTimestamp>,
    {
        self.alarms.merge(timestamps, now)
    }

    /// Record a command intent for the next tick.
    pub fn request(&mut self, command: Command) {
        self.pending.set(command);
    }

    /// Run one evaluation step at time `now`.
    pub fn tick(&mut self, now: AlarmTimestamp) -> TickReport {
        let consumed = self.alarms.drain_due(now);
        let commands = self.pending.take();

        let transition = match self.phase {
            AlarmPhase::Idle if consumed > 0 => {
                Some(Transition::Ring(RingCause::AlarmDue { count: consumed }))
            }
            AlarmPhase::Idle => None,
            AlarmPhase::Snoozing if consumed > 0 => {
                Some(Transition::Ring(RingCause::AlarmDue { count: consumed }))
            }
            AlarmPhase::Snoozing => match self.snooze_deadline {
                Some(deadline) if now > deadline => Some(Transition::Ring(RingCause::SnoozeExpired)),
                Some(_) => None,
                // Snoozing without a deadline cannot be produced by `tick`;
                // treat it as expired rather than snoozing forever.
                None => Some(Transition::Ring(RingCause::SnoozeExpired)),
            },
            AlarmPhase::Ringing if commands.shut => Some(Transition::Shut),
            AlarmPhase::Ringing if commands.snooze => Some(Transition::Snooze {
                until: now.saturating_add(self.snooze_secs),
            }),
            AlarmPhase::Ringing => None,
        };

        if let Some(transition) = transition {
            self.apply(transition);
        }

        TickReport {
            phase: self.phase,
            transition,
            consumed,
            commands,
        }
    }

    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Ring(_) => {
                self.phase = AlarmPhase::Ringing;
                self.snooze_deadline = None;
            }
            Transition::Snooze { until } => {
                self.phase = AlarmPhase::Snoozing;
                self.snooze_deadline = Some(until);
            }
            Transition::Shut => {
                self.phase = AlarmPhase::Idle;
                self.snooze_deadline = None;
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            pending_alarms: self.alarms.len(),
            next_alarm: self.alarms.next(),
            snooze_deadline: self.snooze_deadline,
            pending_commands: self.pending,
        }
    }
}
