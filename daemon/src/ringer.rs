//! Ringer implementations for the daemon
//!
//! The bell ringer writes a terminal bell to stderr until stopped. With the
//! `audio` feature the sound ringer loops a WAV file instead.

use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use alarmsweet_core::{Ringer, RingerError};
use tracing::warn;

use crate::config::{DaemonConfig, RingerKind};

const BELL_PERIOD: Duration = Duration::from_millis(1500);

/// Stops a background playback thread when dropped.
pub struct PlaybackGuard {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackGuard {
    pub fn new(stop: Sender<()>, thread: JoinHandle<()>) -> Self {
        Self {
            stop: Some(stop),
            thread: Some(thread),
        }
    }
}

impl Drop for PlaybackGuard {
    fn drop(&mut self) {
        // Dropping the sender disconnects the channel the thread waits on.
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Playback thread panicked");
            }
        }
    }
}

/// Rings the terminal bell periodically.
pub struct BellRinger {
    period: Duration,
}

impl BellRinger {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Default for BellRinger {
    fn default() -> Self {
        Self::new(BELL_PERIOD)
    }
}

impl Ringer for BellRinger {
    type Handle = PlaybackGuard;

    fn start(&mut self) -> Result<Self::Handle, RingerError> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let period = self.period;

        let thread = thread::Builder::new()
            .name("alarmd-bell".into())
            .spawn(move || loop {
                let mut stderr = std::io::stderr();
                let _ = stderr.write_all(b"\x07");
                let _ = stderr.flush();

                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    _ => break,
                }
            })?;

        Ok(PlaybackGuard::new(stop_tx, thread))
    }
}

/// Ringer selected by configuration.
pub enum AlarmRinger {
    Bell(BellRinger),
    #[cfg(feature = "audio")]
    Sound(crate::audio::SoundRinger),
}

impl AlarmRinger {
    pub fn from_config(config: &DaemonConfig) -> Self {
        match config.ringer {
            RingerKind::Bell => AlarmRinger::Bell(BellRinger::default()),
            #[cfg(feature = "audio")]
            RingerKind::Sound => {
                AlarmRinger::Sound(crate::audio::SoundRinger::new(config.sound_file.clone()))
            }
            #[cfg(not(feature = "audio"))]
            RingerKind::Sound => {
                warn!(
                    "Sound ringer requested but alarmd was built without the `audio` feature; using the terminal bell"
                );
                AlarmRinger::Bell(BellRinger::default())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AlarmRinger::Bell(_) => "bell",
            #[cfg(feature = "audio")]
            AlarmRinger::Sound(_) => "sound",
        }
    }
}

impl Ringer for AlarmRinger {
    type Handle = PlaybackGuard;

    fn start(&mut self) -> Result<Self::Handle, RingerError> {
        match self {
            AlarmRinger::Bell(ringer) => ringer.start(),
            #[cfg(feature = "audio")]
            AlarmRinger::Sound(ringer) => ringer.start(),
        }
    }
}
