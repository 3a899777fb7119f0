//! Ringer boundary
//!
//! A [`Ringer`] starts continuous playback and returns a handle. Dropping
//! the handle stops playback and frees the device, so a handle can only be
//! released once and a failed start has nothing to release.
//!
//! [`RingerSlot`] ties a ringer to the alarm phase: it holds a handle while
//! the phase is Ringing and drops it on any other phase or on shutdown.

use thiserror::Error;
use tracing::{info, warn};

use crate::types::AlarmPhase;

/// Errors raised while starting a ringer.
#[derive(Error, Debug)]
pub enum RingerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode sound: {0}")]
    Decode(String),

    #[error("Audio device error: {0}")]
    Device(String),
}

/// Something that can make noise until told to stop.
pub trait Ringer: Send {
    /// Playback guard; dropping it stops the ringer.
    type Handle: Send;

    /// Start looped playback.
    fn start(&mut self) -> Result<Self::Handle, RingerError>;
}

/// Owns the ringer and at most one live handle.
pub struct RingerSlot<R: Ringer> {
    ringer: R,
    handle: Option<R::Handle>,
    failing: bool,
}

impl<R: Ringer> RingerSlot<R> {
    pub fn new(ringer: R) -> Self {
        Self {
            ringer,
            handle: None,
            failing: false,
        }
    }

    /// True while a handle is held.
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Bring the ringer in line with `phase`.
    ///
    /// While Ringing without a handle, a start is attempted; a failure is
    /// logged once per failure streak and retried on the next call.
    pub fn reconcile(&mut self, phase: AlarmPhase) {
        match (phase, self.handle.is_some()) {
            (AlarmPhase::Ringing, false) => match self.ringer.start() {
                Ok(handle) => {
                    info!("Ringer started");
                    self.handle = Some(handle);
                    self.failing = false;
                }
                Err(e) => {
                    if !self.failing {
                        warn!("Failed to start ringer: {}. Retrying every tick.", e);
                    }
                    self.failing = true;
                }
            },
            (AlarmPhase::Ringing, true) => {}
            (_, true) => self.release(),
            (_, false) => self.failing = false,
        }
    }

    /// Stop the ringer if it is running.
    pub fn release(&mut self) {
        if self.handle.take().is_some() {
            info!("Ringer stopped");
        }
    }
}

impl<R: Ringer> Drop for RingerSlot<R> {
    fn drop(&mut self) {
        self.release();
    }
}
