// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Fixed-time loops: status pulse and scheduled restart

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{ClockTime, ExitReason, Zone};
use crate::config::{ScheduleConfig, MAX_WINDOW_SECS};
use crate::streaming::{Notification, Notifier};

/// Longest single sleep; wall-clock deadlines are re-checked after each nap
const MAX_NAP: Duration = Duration::from_secs(15 * 60);

/// Next instant strictly after `now` whose local time is one of `times`
pub fn next_occurrence(now: DateTime<Utc>, zone: Zone, times: &[ClockTime]) -> Option<DateTime<Utc>> {
    let today = zone.local_time(now).date();
    (0..=2u64)
        .filter_map(|d| today.checked_add_days(Days::new(d)))
        .flat_map(|date| {
            times
                .iter()
                .filter_map(move |t| zone.resolve(date.and_time(t.as_naive())))
        })
        .filter(|at| *at > now)
        .min()
}

/// Sleep until a wall-clock instant, tolerating early wake-ups and clock jumps.
///
/// Returns once either the wall clock or the runtime's monotonic clock has covered the
/// distance measured at the start; the wall clock catches time lost in suspend.
pub async fn sleep_until_wall(target: DateTime<Utc>) {
    let remaining = (target - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    let deadline = Instant::now() + remaining;
    loop {
        let now = Instant::now();
        if Utc::now() >= target || now >= deadline {
            return;
        }
        tokio::time::sleep((deadline - now).min(MAX_NAP)).await;
    }
}

/// Runs the status pulse and the optional daily restart
pub struct PeriodicScheduler {
    zone: Zone,
    config: ScheduleConfig,
    notify: bool,
    notifier: Arc<dyn Notifier>,
}

impl PeriodicScheduler {
    pub fn new(zone: Zone, config: ScheduleConfig, notify: bool, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            zone,
            config,
            notify,
            notifier,
        }
    }

    pub fn status_notification(&self) -> Notification {
        Notification {
            message: self.config.status_message.clone(),
            priority: self.config.status_priority,
            title: None,
            attachment: None,
        }
    }

    /// Start the status pulse and, if enabled, the restart timer
    pub fn spawn(
        self: Arc<Self>,
        tasks: &mut JoinSet<&'static str>,
        exit_tx: mpsc::Sender<ExitReason>,
    ) {
        if self.config.status_times.is_empty() {
            warn!("No status times configured, status pulse disabled");
        } else {
            let pulse = self.clone();
            tasks.spawn(async move {
                pulse.run_status_pulse().await;
                "status pulse"
            });
        }
        if self.config.scheduled_restart {
            tasks.spawn(async move {
                self.run_scheduled_restart(exit_tx).await;
                "scheduled restart"
            });
        }
    }

    pub async fn run_status_pulse(self: Arc<Self>) {
        loop {
            let now = Utc::now();
            let Some(next) = next_occurrence(now, self.zone, &self.config.status_times) else {
                error!("Could not compute the next status time");
                return;
            };
            info!(
                "Next status check scheduled for {}",
                self.zone.local_time(next).format("%Y-%m-%d %H:%M:%S")
            );
            sleep_until_wall(next).await;

            if !self.notify {
                debug!("Status pulse reached, notifications disabled");
                continue;
            }
            match self.notifier.dispatch(&self.status_notification()).await {
                Ok(()) => info!("Sent status notification: {}", self.config.status_message),
                Err(e) => error!("Failed to send status notification: {}", e),
            }
        }
    }

    pub async fn run_scheduled_restart(self: Arc<Self>, exit_tx: mpsc::Sender<ExitReason>) {
        let now = Utc::now();
        let Some(next) = next_occurrence(now, self.zone, &[self.config.restart_time]) else {
            error!("Could not compute the scheduled restart time");
            return;
        };
        let grace = self.config.restart_grace_secs.min(MAX_WINDOW_SECS) as i64;
        let deadline = next + chrono::Duration::seconds(grace);
        info!(
            "Scheduled restart at {}",
            self.zone.local_time(deadline).format("%Y-%m-%d %H:%M:%S")
        );

        sleep_until_wall(deadline).await;

        info!("Scheduled restart time reached, exiting");
        if exit_tx.send(ExitReason::ScheduledRestart).await.is_err() {
            error!("Engine no longer listening for exit requests");
        }
    }
}
