//! Background loops for the daemon
//!
//! Runs three long-lived units next to the listener:
//! - The evaluator, on its own OS thread, ticking the alarm state and
//!   driving the ringer
//! - The command translator, turning queued lines into command flags
//! - The remote sync, merging alarms from the remote source

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use alarmsweet_core::{format_timestamp, now, RingCause, Ringer, RingerSlot, Transition};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::remote::RemoteSource;
use crate::DaemonState;

/// How long the translator waits on an empty queue before rechecking shutdown
const TRANSLATE_POLL: Duration = Duration::from_millis(100);

/// Spawn the evaluator thread.
///
/// The thread owns the ringer. It is released when the phase leaves
/// Ringing and unconditionally when the loop ends.
pub fn spawn_evaluator<R>(state: Arc<DaemonState>, ringer: R) -> std::io::Result<JoinHandle<()>>
where
    R: Ringer + 'static,
{
    thread::Builder::new()
        .name("alarmd-evaluator".into())
        .spawn(move || run_evaluator(&state, RingerSlot::new(ringer)))
}

fn run_evaluator<R: Ringer>(state: &DaemonState, mut slot: RingerSlot<R>) {
    let tick = Duration::from_millis(state.config.tick_interval_ms);
    info!("Evaluator started (tick: {:?})", tick);

    while !state.should_shutdown() {
        let report = state.clock.tick(now());

        match report.transition {
            Some(Transition::Ring(RingCause::AlarmDue { count })) => {
                info!("Alarm due ({} consumed), ringing", count);
            }
            Some(Transition::Ring(RingCause::SnoozeExpired)) => {
                info!("Snooze expired, ringing again");
            }
            Some(Transition::Snooze { until }) => {
                info!("Snoozing until {}", format_timestamp(until));
            }
            Some(Transition::Shut) => info!("Alarm shut off"),
            None if report.consumed > 0 => {
                debug!("Discarded {} alarms that came due while ringing", report.consumed);
            }
            None => {}
        }

        slot.reconcile(report.phase);
        thread::sleep(tick);
    }

    slot.release();
    info!("Evaluator stopped");
}

/// Turn queued command lines into flags on the alarm clock.
pub async fn command_translation_task(state: Arc<DaemonState>) {
    info!("Command translator started");

    while !state.should_shutdown() {
        let Some(line) = state.commands.pop_timeout(TRANSLATE_POLL).await else {
            continue;
        };

        match state.clock.apply_line(&line) {
            Some(command) => {
                state.increment_commands();
                info!("Command received: {}", command);
            }
            None => debug!("Ignoring unrecognized command: {:?}", line),
        }
    }

    info!("Command translator stopping due to shutdown");
}

/// Periodically merge alarms from the remote source.
///
/// A failed fetch leaves the alarm set untouched; the next interval simply
/// tries again.
pub async fn remote_sync_task(state: Arc<DaemonState>, source: RemoteSource) {
    let period = Duration::from_secs(state.config.sync_interval_secs);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Remote sync started (source: {}, interval: {:?})",
        source.base_url(),
        period
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = state.shutdown_requested() => break,
        }

        if state.should_shutdown() {
            break;
        }

        match source.fetch().await {
            Ok(alarms) => {
                let fetched = alarms.len();
                let added = state.clock.merge_remote(alarms, now());
                if added > 0 {
                    let snapshot = state.clock.snapshot();
                    info!(
                        "Merged {} new alarms ({} pending, next at {})",
                        added,
                        snapshot.pending_alarms,
                        snapshot
                            .next_alarm
                            .map(format_timestamp)
                            .unwrap_or_else(|| "-".into())
                    );
                } else {
                    debug!("No new alarms ({} fetched)", fetched);
                }
            }
            Err(e) => {
                warn!("Remote sync error: {}", e);
            }
        }
    }

    info!("Remote sync stopping due to shutdown");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alarmsweet_core::{AlarmPhase, RingerError};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{DaemonConfig, RemoteConfig};

    struct Guard(Arc<AtomicUsize>);

    impl Drop for Guard {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct TestRinger {
        started: Arc<AtomicUsize>,
        stopped: Arc<AtomicUsize>,
    }

    impl Ringer for TestRinger {
        type Handle = Guard;

        fn start(&mut self) -> Result<Guard, RingerError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(Guard(Arc::clone(&self.stopped)))
        }
    }

    fn test_state() -> Arc<DaemonState> {
        Arc::new(DaemonState::new(DaemonConfig::default()))
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        for _ in 0..300 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_evaluator_rings_and_releases_on_shutdown() {
        let state = test_state();
        let started = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicUsize::new(0));
        let ringer = TestRinger {
            started: Arc::clone(&started),
            stopped: Arc::clone(&stopped),
        };

        let handle = spawn_evaluator(Arc::clone(&state), ringer).unwrap();
        state.clock.add_alarm(now() + 1, now());

        assert!(wait_for(|| state.clock.phase() == AlarmPhase::Ringing).await);
        assert!(wait_for(|| started.load(Ordering::SeqCst) == 1).await);
        assert!(state.clock.alarms().is_empty());

        state.request_shutdown();
        tokio::task::spawn_blocking(move || handle.join())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_translator_sets_flags_and_skips_unknown() {
        let state = test_state();
        let task = tokio::spawn(command_translation_task(Arc::clone(&state)));

        state.commands.push("dance");
        state.commands.push("shut");

        assert!(wait_for(|| state.clock.snapshot().pending_commands.shut).await);
        assert!(!state.clock.snapshot().pending_commands.snooze);
        assert!(wait_for(|| state.commands.is_empty()).await);
        assert_eq!(state.commands_count(), 1);

        state.request_shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_sync_failure_keeps_alarms() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alarms"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "down"})))
            .mount(&server)
            .await;

        let state = test_state();
        let future = now() + 3_600;
        state.clock.add_alarm(future, now());

        let source = RemoteSource::new(&RemoteConfig {
            url: server.uri(),
            ..RemoteConfig::default()
        })
        .unwrap();
        let task = tokio::spawn(remote_sync_task(Arc::clone(&state), source));

        let mut polled = false;
        for _ in 0..300 {
            if server.received_requests().await.is_some_and(|r| !r.is_empty()) {
                polled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(polled);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.clock.alarms(), vec![future]);

        state.request_shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_sync_merges_only_future_alarms() {
        let server = MockServer::start().await;
        let current = now();
        Mock::given(method("GET"))
            .and(path("/alarms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alarms": [(current - 60) * 1000, (current + 3_600) * 1000, (current + 3_600) * 1000]
            })))
            .mount(&server)
            .await;

        let state = test_state();
        let source = RemoteSource::new(&RemoteConfig {
            url: server.uri(),
            ..RemoteConfig::default()
        })
        .unwrap();
        let task = tokio::spawn(remote_sync_task(Arc::clone(&state), source));

        assert!(wait_for(|| !state.clock.alarms().is_empty()).await);
        assert_eq!(state.clock.alarms(), vec![current + 3_600]);

        state.request_shutdown();
        task.await.unwrap();
    }
}
