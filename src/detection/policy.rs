// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Notification policy: priority, backoff, and person dedupe

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AnalysisOutcome, OutcomeKind};
use crate::config::{PolicyConfig, MAX_WINDOW_SECS};
use crate::core::ClockTime;
use crate::streaming::{CameraInfo, DescriptionComparator, Notification};

pub const PRIORITY_LOWEST: i8 = -2;
pub const PRIORITY_LOW: i8 = -1;
pub const PRIORITY_NORMAL: i8 = 0;
pub const PRIORITY_HIGH: i8 = 1;

/// Clock-time range during which person alarms keep high priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightWindow {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl NightWindow {
    /// Minute-of-day membership; `start > end` wraps past midnight, `start == end` is empty
    pub fn contains(&self, time: ClockTime) -> bool {
        let minute = time.minute_of_day();
        let start = self.start.minute_of_day();
        let end = self.end.minute_of_day();
        if start > end {
            minute >= start || minute < end
        } else {
            start <= minute && minute < end
        }
    }
}

pub fn is_night(local: &NaiveDateTime, window: &NightWindow) -> bool {
    window.contains(ClockTime::of(local))
}

/// Most recent dispatched person event on one camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonSighting {
    pub description: String,
    pub at: DateTime<Utc>,
}

/// In-memory notification history, owned by the event worker.
///
/// Only [`PolicyEngine::decide`] mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyHistory {
    last_alarm_at: Option<DateTime<Utc>>,
    last_notification_at: Option<DateTime<Utc>>,
    person_sightings: HashMap<String, PersonSighting>,
}

impl PolicyHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_alarm_at(&self) -> Option<DateTime<Utc>> {
        self.last_alarm_at
    }

    pub fn last_notification_at(&self) -> Option<DateTime<Utc>> {
        self.last_notification_at
    }

    pub fn sighting(&self, camera_id: &str) -> Option<&PersonSighting> {
        self.person_sightings.get(camera_id)
    }
}

/// Why an event was not sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuppressReason {
    NothingToReport,
    ObservationBackoff,
    DuplicatePerson,
}

/// Per-event outcome of the policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDecision {
    pub dispatch: bool,
    pub priority: i8,
    pub title: String,
    pub message: String,
    pub suppressed: Option<SuppressReason>,
}

impl NotificationDecision {
    fn suppress(mut self, reason: SuppressReason) -> Self {
        self.dispatch = false;
        self.suppressed = Some(reason);
        self
    }

    /// Notification to hand to the dispatcher, if the decision is to send
    pub fn into_notification(self, attachment: Option<String>) -> Option<Notification> {
        self.dispatch.then(|| Notification {
            message: self.message,
            priority: self.priority,
            title: Some(self.title),
            attachment,
        })
    }
}

/// Decides whether and how urgently each classified event is sent
pub struct PolicyEngine {
    alarm_backoff: Duration,
    observation_backoff: Duration,
    person_dedupe: Duration,
    comparator: Arc<dyn DescriptionComparator>,
}

impl PolicyEngine {
    pub fn new(config: &PolicyConfig, comparator: Arc<dyn DescriptionComparator>) -> Self {
        Self {
            alarm_backoff: window_secs(config.alarm_backoff_secs),
            observation_backoff: window_secs(config.observation_backoff_secs),
            person_dedupe: window_secs(config.person_dedupe_secs),
            comparator,
        }
    }

    /// Evaluate one event against the history.
    ///
    /// Rules run in a fixed order: `Nothing` and observation backoff return before the
    /// person dedupe; alarm backoff bookkeeping is kept even when dedupe suppresses.
    pub async fn decide(
        &self,
        outcome: &AnalysisOutcome,
        now: DateTime<Utc>,
        camera: &CameraInfo,
        history: &mut PolicyHistory,
        is_night: bool,
    ) -> NotificationDecision {
        let mut decision = NotificationDecision {
            dispatch: false,
            priority: PRIORITY_LOWEST,
            title: outcome.display_title(),
            message: format!("{}: {}", camera.name, outcome.description),
            suppressed: None,
        };

        decision.priority = match outcome.kind {
            OutcomeKind::Nothing => {
                return decision.suppress(SuppressReason::NothingToReport);
            }
            OutcomeKind::Alarm => {
                if within(history.last_alarm_at, now, self.alarm_backoff) {
                    PRIORITY_NORMAL
                } else {
                    history.last_alarm_at = Some(now);
                    if outcome.is_person() && !is_night {
                        PRIORITY_NORMAL
                    } else {
                        PRIORITY_HIGH
                    }
                }
            }
            OutcomeKind::Observation => {
                if within(history.last_notification_at, now, self.observation_backoff) {
                    debug!(camera = %camera.name, "Observation inside backoff window");
                    return decision.suppress(SuppressReason::ObservationBackoff);
                }
                PRIORITY_LOWEST
            }
        };

        if outcome.is_person() && self.is_repeat_sighting(outcome, now, camera, history).await {
            debug!(camera = %camera.name, "Same person seen again, suppressing");
            return decision.suppress(SuppressReason::DuplicatePerson);
        }

        decision.dispatch = true;
        history.last_notification_at = Some(now);
        if outcome.is_person() {
            history.person_sightings.insert(
                camera.id.clone(),
                PersonSighting {
                    description: outcome.description.clone(),
                    at: now,
                },
            );
        }
        decision
    }

    async fn is_repeat_sighting(
        &self,
        outcome: &AnalysisOutcome,
        now: DateTime<Utc>,
        camera: &CameraInfo,
        history: &PolicyHistory,
    ) -> bool {
        let Some(previous) = history.sighting(&camera.id) else {
            return false;
        };
        if now - previous.at >= self.person_dedupe || outcome.description.is_empty() {
            return false;
        }

        match self
            .comparator
            .same_subject(&previous.description, &outcome.description)
            .await
        {
            Ok(same) => same,
            Err(e) => {
                warn!(camera = %camera.name, "Description compare failed, treating as different: {}", e);
                false
            }
        }
    }
}

/// Windows longer than a day are treated as a day
fn window_secs(secs: u64) -> Duration {
    Duration::seconds(secs.min(MAX_WINDOW_SECS) as i64)
}

fn within(since: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    since.map_or(false, |t| now - t < window)
}
