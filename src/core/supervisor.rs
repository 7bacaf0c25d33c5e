// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Stream supervisor - staleness detection and bounded resubscription

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{ExitReason, HeartbeatSnapshot, HeartbeatStore};
use crate::config::SupervisorConfig;
use crate::error::WatchError;
use crate::streaming::{MessageHandler, StreamSource, Subscription};

/// Supervisor state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Live,
    Stale,
    Resubscribing,
    Fatal,
}

/// Result of one heartbeat evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// No subscription has been established yet
    NotEstablished,
    Live,
    /// Messages stopped arriving
    Silent { elapsed_secs: i64 },
    /// The current subscription never delivered anything
    NeverReceived { elapsed_secs: i64 },
}

impl Liveness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Liveness::Silent { .. } | Liveness::NeverReceived { .. })
    }
}

/// Evaluate heartbeat age against the configured thresholds
pub fn assess(
    snapshot: &HeartbeatSnapshot,
    now: DateTime<Utc>,
    config: &SupervisorConfig,
) -> Liveness {
    match (snapshot.last_message_at, snapshot.connection_start_at) {
        (Some(last), _) => {
            let elapsed = (now - last).num_milliseconds();
            if elapsed > millis(config.stale_threshold_secs) {
                Liveness::Silent {
                    elapsed_secs: elapsed / 1000,
                }
            } else {
                Liveness::Live
            }
        }
        (None, Some(start)) => {
            let elapsed = (now - start).num_milliseconds();
            if elapsed > millis(config.initial_timeout_secs) {
                Liveness::NeverReceived {
                    elapsed_secs: elapsed / 1000,
                }
            } else {
                Liveness::Live
            }
        }
        (None, None) => Liveness::NotEstablished,
    }
}

fn millis(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX).saturating_mul(1000)
}

/// Owns the stream subscription and the reconnection sequence
pub struct StreamSupervisor {
    source: Arc<dyn StreamSource>,
    handler: MessageHandler,
    heartbeat: Arc<HeartbeatStore>,
    config: SupervisorConfig,
    subscription: Option<Subscription>,
    failures: u32,
    state: SupervisorState,
}

impl StreamSupervisor {
    pub fn new(
        source: Arc<dyn StreamSource>,
        handler: MessageHandler,
        heartbeat: Arc<HeartbeatStore>,
        config: SupervisorConfig,
        subscription: Option<Subscription>,
    ) -> Self {
        Self {
            source,
            handler,
            heartbeat,
            config,
            subscription,
            failures: 0,
            state: SupervisorState::Live,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Consecutive failed resubscriptions
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// One periodic check; resubscribes when the stream is stale
    pub async fn check(&mut self, now: DateTime<Utc>) -> SupervisorState {
        if self.state == SupervisorState::Fatal {
            return self.state;
        }

        match assess(&self.heartbeat.snapshot(), now, &self.config) {
            Liveness::NotEstablished => {
                debug!("Stream not established yet, skipping check");
            }
            Liveness::Live => {
                self.state = SupervisorState::Live;
            }
            Liveness::Silent { elapsed_secs } => {
                warn!("Stream appears stale (no messages for {}s). Re-subscribing...", elapsed_secs);
                self.state = SupervisorState::Stale;
                self.resubscribe(now).await;
            }
            Liveness::NeverReceived { elapsed_secs } => {
                warn!("Stream never received messages after {}s. Re-subscribing...", elapsed_secs);
                self.state = SupervisorState::Stale;
                self.resubscribe(now).await;
            }
        }
        self.state
    }

    async fn resubscribe(&mut self, now: DateTime<Utc>) {
        self.state = SupervisorState::Resubscribing;

        if let Some(subscription) = self.subscription.take() {
            if let Err(e) = subscription.unsubscribe() {
                warn!("Error during stream unsubscribe: {}", e);
            }
        }

        if let Err(e) = self.source.refresh_session().await {
            warn!("Error refreshing platform session before resubscribe: {}", e);
        }

        let limit = self.config.subscribe_timeout();
        let attempt = tokio::time::timeout(limit, self.source.subscribe(self.handler.clone()))
            .await
            .unwrap_or_else(|_| {
                Err(WatchError::Platform(format!("subscribe timed out after {:?}", limit)))
            });

        match attempt {
            Ok(subscription) => {
                debug!(id = %subscription.id(), "New stream subscription");
                self.subscription = Some(subscription);
                self.heartbeat.reset(now);
                self.failures = 0;
                self.state = SupervisorState::Live;
                info!("Stream re-subscribed successfully");
            }
            Err(e) => {
                self.failures += 1;
                error!(
                    attempt = self.failures,
                    max = self.config.max_failures,
                    "Failed to re-subscribe stream: {}",
                    e
                );
                if self.failures >= self.config.max_failures {
                    error!(
                        "Stream reconnection failed {} times consecutively. Exiting to trigger a restart",
                        self.failures
                    );
                    self.state = SupervisorState::Fatal;
                } else {
                    self.state = SupervisorState::Stale;
                }
            }
        }
    }

    /// Periodic check loop; returns after requesting process exit on `Fatal`
    pub async fn run(mut self, exit_tx: mpsc::Sender<ExitReason>) {
        let period = self.config.check_interval();
        info!("Stream supervisor checking every {:?}", period);

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.check(Utc::now()).await == SupervisorState::Fatal {
                let reason = ExitReason::ReconnectExhausted {
                    failures: self.failures,
                };
                if exit_tx.send(reason).await.is_err() {
                    error!("Engine no longer listening for exit requests");
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::testing::ScriptedSource;
    use crate::streaming::StreamMessage;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::Ordering;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
    }

    fn supervisor(source: Arc<ScriptedSource>) -> (StreamSupervisor, Arc<HeartbeatStore>) {
        let heartbeat = Arc::new(HeartbeatStore::new());
        let handler: MessageHandler = Arc::new(|_: StreamMessage| {});
        let initial = Subscription::new(|| Ok(()));
        let sup = StreamSupervisor::new(
            source,
            handler,
            heartbeat.clone(),
            SupervisorConfig::default(),
            Some(initial),
        );
        (sup, heartbeat)
    }

    #[test]
    fn test_assess_staleness() {
        let config = SupervisorConfig::default();
        let snap = HeartbeatSnapshot {
            last_message_at: Some(t0()),
            connection_start_at: Some(t0()),
        };

        let fresh = t0() + Duration::seconds(300);
        assert_eq!(assess(&snap, fresh, &config), Liveness::Live);

        let stale = t0() + Duration::seconds(300) + Duration::milliseconds(1);
        assert!(assess(&snap, stale, &config).is_stale());
    }

    #[test]
    fn test_assess_no_heartbeat_yet() {
        let config = SupervisorConfig::default();
        let snap = HeartbeatSnapshot {
            last_message_at: None,
            connection_start_at: Some(t0()),
        };

        assert_eq!(
            assess(&snap, t0() + Duration::seconds(59), &config),
            Liveness::Live
        );
        assert_eq!(
            assess(&snap, t0() + Duration::seconds(61), &config),
            Liveness::NeverReceived { elapsed_secs: 61 }
        );
    }

    #[test]
    fn test_assess_not_established() {
        let config = SupervisorConfig::default();
        let later = t0() + Duration::days(1);
        assert_eq!(
            assess(&HeartbeatSnapshot::default(), later, &config),
            Liveness::NotEstablished
        );
    }

    #[tokio::test]
    async fn test_stale_stream_resubscribes() {
        let source = Arc::new(ScriptedSource::new(&[]));
        let (mut sup, heartbeat) = supervisor(source.clone());
        heartbeat.record(t0());

        assert_eq!(sup.check(t0() + Duration::seconds(100)).await, SupervisorState::Live);
        assert_eq!(source.subscribes.load(Ordering::SeqCst), 0);

        let now = t0() + Duration::seconds(301);
        assert_eq!(sup.check(now).await, SupervisorState::Live);
        assert_eq!(source.subscribes.load(Ordering::SeqCst), 1);
        assert_eq!(source.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(source.unsubscribes.load(Ordering::SeqCst), 0);
        assert_eq!(
            heartbeat.snapshot(),
            HeartbeatSnapshot {
                last_message_at: Some(now),
                connection_start_at: Some(now),
            }
        );

        // the replacement subscription is the one torn down next time
        sup.check(now + Duration::seconds(301)).await;
        assert_eq!(source.unsubscribes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_escalates_after_max_failures() {
        let source = Arc::new(ScriptedSource::new(&[false, false, false]));
        let (mut sup, heartbeat) = supervisor(source.clone());
        heartbeat.record(t0());

        let mut now = t0() + Duration::seconds(301);
        assert_eq!(sup.check(now).await, SupervisorState::Stale);
        assert_eq!(sup.failures(), 1);

        now = now + Duration::seconds(60);
        assert_eq!(sup.check(now).await, SupervisorState::Stale);
        assert_eq!(sup.failures(), 2);

        now = now + Duration::seconds(60);
        assert_eq!(sup.check(now).await, SupervisorState::Fatal);
        assert_eq!(sup.failures(), 3);

        // terminal: no further attempts
        assert_eq!(sup.check(now + Duration::seconds(60)).await, SupervisorState::Fatal);
        assert_eq!(source.subscribes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let source = Arc::new(ScriptedSource::new(&[false, false, true, false]));
        let (mut sup, heartbeat) = supervisor(source.clone());
        heartbeat.record(t0());

        let mut now = t0() + Duration::seconds(301);
        for _ in 0..2 {
            sup.check(now).await;
            now = now + Duration::seconds(60);
        }
        assert_eq!(sup.failures(), 2);

        assert_eq!(sup.check(now).await, SupervisorState::Live);
        assert_eq!(sup.failures(), 0);

        now = now + Duration::seconds(301);
        assert_eq!(sup.check(now).await, SupervisorState::Stale);
        assert_eq!(sup.failures(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_not_fatal() {
        let source = Arc::new(ScriptedSource::new(&[]));
        source.fail_refresh.store(true, Ordering::SeqCst);
        let (mut sup, heartbeat) = supervisor(source.clone());
        heartbeat.mark_connected(t0());

        let state = sup.check(t0() + Duration::seconds(61)).await;
        assert_eq!(state, SupervisorState::Live);
        assert_eq!(sup.failures(), 0);
        assert_eq!(source.subscribes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_subscribe_counts_as_failure() {
        let source = Arc::new(ScriptedSource::new(&[]));
        source.hang_subscribe.store(true, Ordering::SeqCst);
        let (mut sup, heartbeat) = supervisor(source.clone());
        heartbeat.record(t0());

        let mut now = t0() + Duration::seconds(301);
        for attempt in 1..=3u32 {
            let state = tokio::time::timeout(std::time::Duration::from_secs(120), sup.check(now))
                .await
                .expect("check must not hang on subscribe");
            assert_eq!(sup.failures(), attempt);
            if attempt < 3 {
                assert_eq!(state, SupervisorState::Stale);
            } else {
                assert_eq!(state, SupervisorState::Fatal);
            }
            now = now + Duration::seconds(60);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_requests_exit_after_max_failures() {
        let source = Arc::new(ScriptedSource::new(&[false, false, false]));
        let (sup, heartbeat) = supervisor(source.clone());
        heartbeat.record(Utc::now() - Duration::hours(1));

        let (exit_tx, mut exit_rx) = mpsc::channel(1);
        let task = tokio::spawn(sup.run(exit_tx));

        let reason = tokio::time::timeout(std::time::Duration::from_secs(600), exit_rx.recv())
            .await
            .unwrap();
        assert_eq!(reason, Some(ExitReason::ReconnectExhausted { failures: 3 }));
        task.await.unwrap();
        assert_eq!(source.subscribes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_assess_huge_thresholds() {
        let config = SupervisorConfig {
            stale_threshold_secs: u64::MAX,
            initial_timeout_secs: u64::MAX,
            ..SupervisorConfig::default()
        };
        let snap = HeartbeatSnapshot {
            last_message_at: Some(t0()),
            connection_start_at: Some(t0()),
        };
        assert_eq!(assess(&snap, t0() + Duration::days(365), &config), Liveness::Live);
    }
}
