//! Core data types for Alarmsweet
//!
//! These types are shared between the daemon, the state engine and the CLI.

use std::fmt;

/// Absolute alarm trigger time in whole seconds since the Unix epoch.
pub type AlarmTimestamp = i64;

/// Default snooze duration in seconds.
pub const SNOOZE_TIME_SECONDS: i64 = 10;

/// Current wall-clock time as an [`AlarmTimestamp`].
pub fn now() -> AlarmTimestamp {
    chrono::Utc::now().timestamp()
}

/// Convert a millisecond epoch value (as served by the remote source) to seconds.
pub fn from_millis(millis: i64) -> AlarmTimestamp {
    millis / 1000
}

/// What the ringer should be doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmPhase {
    #[default]
    Idle,
    Snoozing,
    Ringing,
}

impl AlarmPhase {
    /// Return the lowercase string representation used in logs.
    ///
    /// # Returns
    /// String slice for this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmPhase::Idle => "idle",
            AlarmPhase::Snoozing => "snoozing",
            AlarmPhase::Ringing => "ringing",
        }
    }
}

impl fmt::Display for AlarmPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recognized control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Snooze,
    Shut,
}

impl Command {
    /// Parse a received line into a command.
    ///
    /// Surrounding whitespace is ignored; anything other than `snooze` or
    /// `shut` yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "snooze" => Some(Command::Snooze),
            "shut" => Some(Command::Shut),
            _ => None,
        }
    }

    /// Wire representation of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Snooze => "snooze",
            Command::Shut => "shut",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intents set by command consumption and cleared by the evaluator.
///
/// Repeated identical commands collapse into a single flag, so each
/// evaluation tick acts on a command kind at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingCommands {
    pub snooze: bool,
    pub shut: bool,
}

impl PendingCommands {
    /// Record a command intent.
    pub fn set(&mut self, command: Command) {
        match command {
            Command::Snooze => self.snooze = true,
            Command::Shut => self.shut = true,
        }
    }

    /// Take both flags, leaving them cleared.
    pub fn take(&mut self) -> PendingCommands {
        std::mem::take(self)
    }

    /// True if no intent is pending.
    pub fn is_empty(&self) -> bool {
        !self.snooze && !self.shut
    }
}

/// Point-in-time view of the alarm state, for logging and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub phase: AlarmPhase,
    pub pending_alarms: usize,
    pub next_alarm: Option<AlarmTimestamp>,
    pub snooze_deadline: Option<AlarmTimestamp>,
    pub pending_commands: PendingCommands,
}

/// Render an alarm timestamp in local time for log output.
pub fn format_timestamp(ts: AlarmTimestamp) -> String {
    match chrono::DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => ts.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("snooze"), Some(Command::Snooze));
        assert_eq!(Command::parse("shut\r\n"), Some(Command::Shut));
        assert_eq!(Command::parse("  snooze "), Some(Command::Snooze));
        assert_eq!(Command::parse("SNOOZE"), None);
        assert_eq!(Command::parse("shutdown"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_pending_commands_collapse() {
        let mut pending = PendingCommands::default();
        pending.set(Command::Snooze);
        pending.set(Command::Snooze);
        assert!(pending.snooze);
        assert!(!pending.shut);

        let taken = pending.take();
        assert!(taken.snooze);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_from_millis() {
        assert_eq!(from_millis(1_700_000_000_999), 1_700_000_000);
        assert_eq!(from_millis(999), 0);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(AlarmPhase::default(), AlarmPhase::Idle);
        assert_eq!(AlarmPhase::Ringing.to_string(), "ringing");
    }
}
