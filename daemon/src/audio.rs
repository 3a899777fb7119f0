//! Looping WAV ringer on the default output device
//!
//! The sound file is decoded with hound into interleaved f32 samples. The
//! cpal stream is not `Send`, so it is built and owned by a dedicated
//! playback thread that reports back once playback has started and keeps
//! the stream alive until its stop channel disconnects.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use alarmsweet_core::{Ringer, RingerError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use hound::{SampleFormat, WavReader};
use tracing::{debug, error};

use crate::ringer::PlaybackGuard;

/// Decoded sound, interleaved.
struct Sound {
    samples: Arc<Vec<f32>>,
    channels: u16,
    sample_rate: u32,
}

fn decode(path: &Path) -> Result<Sound, RingerError> {
    let file = File::open(path)?;
    let mut reader =
        WavReader::new(BufReader::new(file)).map_err(|e| RingerError::Decode(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| RingerError::Decode(e.to_string()))?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| RingerError::Decode(e.to_string()))?
        }
    };

    if samples.is_empty() {
        return Err(RingerError::Decode(format!("{:?} contains no samples", path)));
    }

    debug!(
        "Decoded {:?}: {} samples, {} channels @ {} Hz",
        path,
        samples.len(),
        spec.channels,
        spec.sample_rate
    );

    Ok(Sound {
        samples: Arc::new(samples),
        channels: spec.channels,
        sample_rate: spec.sample_rate,
    })
}

fn build_stream(sound: &Sound) -> Result<cpal::Stream, RingerError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| RingerError::Device("no audio output device".into()))?;

    let config = cpal::StreamConfig {
        channels: sound.channels,
        sample_rate: cpal::SampleRate(sound.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let samples = Arc::clone(&sound.samples);
    let mut pos = 0usize;
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for out in data.iter_mut() {
                    *out = samples[pos];
                    pos = (pos + 1) % samples.len();
                }
            },
            |e| error!("Audio stream error: {}", e),
            None,
        )
        .map_err(|e| RingerError::Device(e.to_string()))?;

    stream
        .play()
        .map_err(|e| RingerError::Device(e.to_string()))?;
    Ok(stream)
}

/// Loops a WAV file until stopped.
pub struct SoundRinger {
    path: PathBuf,
}

impl SoundRinger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Ringer for SoundRinger {
    type Handle = PlaybackGuard;

    fn start(&mut self) -> Result<Self::Handle, RingerError> {
        let sound = decode(&self.path)?;

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), RingerError>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("alarmd-sound".into())
            .spawn(move || {
                let stream = match build_stream(&sound) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Blocks until the guard drops the sender.
                let _ = stop_rx.recv();
                drop(stream);
            })?;

        let guard = PlaybackGuard::new(stop_tx, thread);
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(guard),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RingerError::Device("playback thread exited".into())),
        }
    }
}
