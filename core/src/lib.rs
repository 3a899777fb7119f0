//! Alarmsweet Core - shared alarm types and the daemon's state engine
//!
//! This crate provides:
//! - Alarm timestamps and the ordered alarm set
//! - The alarm state machine (Idle / Snoozing / Ringing)
//! - The command queue between network handlers and the evaluator
//! - The ringer boundary with scoped start/stop
//! - A small client for sending control commands to the daemon

pub mod alarm_set;
pub mod clock;
pub mod control;
pub mod error;
pub mod queue;
pub mod ringer;
pub mod state;
pub mod types;

pub use alarm_set::AlarmSet;
pub use clock::AlarmClock;
pub use control::{ClientError, ControlClient, DEFAULT_BIND_ADDRESS, DEFAULT_BIND_PORT, ECHO_PREFIX};
pub use error::Error;
pub use queue::CommandQueue;
pub use ringer::{Ringer, RingerError, RingerSlot};
pub use state::{AlarmState, RingCause, TickReport, Transition};
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::clock::AlarmClock;
    pub use crate::error::Error;
    pub use crate::queue::CommandQueue;
    pub use crate::ringer::{Ringer, RingerSlot};
    pub use crate::types::*;
}
