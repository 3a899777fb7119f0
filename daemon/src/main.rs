//! Alarmsweet Daemon (alarmd)
//!
//! Long-running service providing:
//! - Alarm evaluation (Idle / Snoozing / Ringing) on a short tick
//! - Snooze and shut commands from controllers over TCP
//! - Periodic alarm sync from the remote calendar source
//!
//! Architecture:
//! - Line-oriented TCP listener (default 127.0.0.1:7777)
//! - One shared `DaemonState` handed to every loop by `Arc`
//! - Evaluator on its own thread owning the ringer; all other loops on the
//!   multi-threaded tokio runtime

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::Notify;
use tracing::{info, warn};

mod background;
mod config;
mod remote;
mod ringer;
mod server;

#[cfg(feature = "audio")]
mod audio;

use alarmsweet_core::{AlarmClock, CommandQueue};
use config::DaemonConfig;
use remote::RemoteSource;
use ringer::AlarmRinger;

/// Shared state for the daemon.
pub struct DaemonState {
    /// When the daemon started
    start_time: Instant,

    /// Recognized commands handled this session
    commands_count: AtomicU64,

    /// Shutdown flag, checked at the top of every loop
    shutdown: AtomicBool,

    /// Wakes loops that are waiting when shutdown is requested
    shutdown_notify: Notify,

    /// Effective configuration
    pub config: DaemonConfig,

    /// Alarm set, phase, snooze deadline and command flags
    pub clock: AlarmClock,

    /// Raw command lines from controllers
    pub commands: CommandQueue,
}

impl DaemonState {
    /// Create a new daemon state with an empty alarm set.
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            start_time: Instant::now(),
            commands_count: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
            clock: AlarmClock::new(config.snooze_seconds),
            commands: CommandQueue::new(),
            config,
        }
    }

    /// Get uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get the number of recognized commands handled this session.
    pub fn commands_count(&self) -> u64 {
        self.commands_count.load(Ordering::Relaxed)
    }

    pub fn increment_commands(&self) {
        self.commands_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Check whether a shutdown has been requested.
    pub fn should_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Request a graceful shutdown.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.shutdown_notify.notify_waiters();
    }

    /// Resolve once shutdown has been requested.
    pub async fn shutdown_requested(&self) {
        let notified = self.shutdown_notify.notified();
        if self.should_shutdown() {
            return;
        }
        notified.await;
    }
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("alarmd=info".parse()?),
        )
        .init();

    info!("Starting alarmd v{}", env!("CARGO_PKG_VERSION"));

    let config = DaemonConfig::load()?;
    let state = Arc::new(DaemonState::new(config));

    // Bind before any loop starts; failure aborts startup.
    let listener = server::bind(&state).await?;

    let source = if state.config.remote.enabled {
        let source = RemoteSource::new(&state.config.remote)
            .context("Failed to create remote source client")?;
        match source.health().await {
            Ok(true) => info!("Remote source {} is reachable", source.base_url()),
            Ok(false) => warn!("Remote source {} reports unhealthy", source.base_url()),
            Err(e) => warn!("Remote source {} unreachable: {}", source.base_url(), e),
        }
        Some(source)
    } else {
        info!("Remote sync disabled");
        None
    };

    let ringer = AlarmRinger::from_config(&state.config);
    info!("Using {} ringer", ringer.name());

    let evaluator = background::spawn_evaluator(Arc::clone(&state), ringer)
        .context("Failed to spawn evaluator thread")?;
    let translator = tokio::spawn(background::command_translation_task(Arc::clone(&state)));
    let sync = source.map(|source| {
        tokio::spawn(background::remote_sync_task(Arc::clone(&state), source))
    });

    let served = server::run(listener, Arc::clone(&state), shutdown_signal()).await;
    state.request_shutdown();

    // Join every unit so the ringer is released exactly once before exit.
    if let Err(e) = translator.await {
        warn!("Command translator ended abnormally: {}", e);
    }
    if let Some(sync) = sync {
        if let Err(e) = sync.await {
            warn!("Remote sync ended abnormally: {}", e);
        }
    }
    match tokio::task::spawn_blocking(move || evaluator.join()).await {
        Ok(Ok(())) => {}
        _ => warn!("Evaluator thread ended abnormally"),
    }

    info!(
        "Daemon stopped (uptime {}s, {} commands handled)",
        state.uptime_secs(),
        state.commands_count()
    );
    served
}
