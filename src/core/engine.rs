// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Main engine - wires the stream, the event worker, the supervisor and the scheduler

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::{EventBus, ExitReason, HeartbeatStore, PeriodicScheduler, StreamSupervisor, Zone};
use crate::config::Config;
use crate::detection::{
    classify, is_night, NightWindow, NotificationDecision, PolicyEngine, PolicyHistory,
};
use crate::error::{Result, WatchError};
use crate::streaming::{
    Analyzer, CameraInfo, DescriptionComparator, MessageAction, Notifier, StreamMessage,
    StreamSource,
};

/// External services the engine drives
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn StreamSource>,
    pub analyzer: Arc<dyn Analyzer>,
    pub comparator: Arc<dyn DescriptionComparator>,
    pub notifier: Arc<dyn Notifier>,
}

/// Single consumer of the inbound queue; sole owner of the policy history
pub struct EventWorker {
    analyzer: Arc<dyn Analyzer>,
    notifier: Arc<dyn Notifier>,
    policy: PolicyEngine,
    history: PolicyHistory,
    night_window: NightWindow,
    zone: Zone,
    camera_filter: Option<String>,
    notify: bool,
    test_mode: bool,
}

impl EventWorker {
    pub fn new(config: &Config, zone: Zone, collaborators: &Collaborators) -> Self {
        Self {
            analyzer: collaborators.analyzer.clone(),
            notifier: collaborators.notifier.clone(),
            policy: PolicyEngine::new(&config.policy, collaborators.comparator.clone()),
            history: PolicyHistory::new(),
            night_window: config.policy.night_window,
            zone,
            camera_filter: config.camera_filter.clone(),
            notify: config.notify,
            test_mode: config.test_mode,
        }
    }

    pub fn history(&self) -> &PolicyHistory {
        &self.history
    }

    /// Camera this message should be analysed for, if any
    fn select(&self, msg: &StreamMessage) -> Option<CameraInfo> {
        match msg.action {
            MessageAction::Update => {}
            MessageAction::Add | MessageAction::Remove => return None,
            MessageAction::Other => {
                debug!("Ignoring stream message with unknown action");
                return None;
            }
        }

        let update = msg.camera_update()?;
        if let Some(filter) = &self.camera_filter {
            if *filter != update.camera.name {
                return None;
            }
        }
        if !(self.test_mode || update.motion_detected || update.smart_detected) {
            return None;
        }
        Some(update.camera)
    }

    pub async fn handle(&mut self, msg: StreamMessage) -> Option<NotificationDecision> {
        self.handle_at(msg, Utc::now()).await
    }

    /// Process one message as of `now`. Returns the policy decision when one was made.
    pub async fn handle_at(
        &mut self,
        msg: StreamMessage,
        now: DateTime<Utc>,
    ) -> Option<NotificationDecision> {
        let camera = self.select(&msg)?;
        info!(camera = %camera.name, "Motion detected, requesting analysis");

        let analysis = match self.analyzer.fetch_analysis(&camera).await {
            Ok(analysis) => analysis,
            Err(e) => {
                error!(camera = %camera.name, "Analysis failed: {}", e);
                return None;
            }
        };
        info!(camera = %camera.name, "Analysis: {}", analysis.text.trim().replace('\n', " | "));

        let outcome = classify(&analysis.text);
        if !self.notify {
            return None;
        }

        let night = is_night(&self.zone.local_time(now), &self.night_window);
        let decision = self
            .policy
            .decide(&outcome, now, &camera, &mut self.history, night)
            .await;

        match decision.clone().into_notification(analysis.image) {
            Some(notification) => match self.notifier.dispatch(&notification).await {
                Ok(()) => info!(
                    camera = %camera.name,
                    priority = notification.priority,
                    "Sent notification: {}",
                    notification.title.as_deref().unwrap_or("")
                ),
                Err(e) => error!(camera = %camera.name, "Failed to send notification: {}", e),
            },
            None => debug!(camera = %camera.name, reason = ?decision.suppressed, "Notification suppressed"),
        }
        Some(decision)
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<StreamMessage>) {
        while let Some(msg) = rx.recv().await {
            self.handle(msg).await;
        }
        debug!("Event queue closed, worker stopping");
    }
}

/// Main nvrwatch engine
pub struct Engine {
    config: Config,
    collaborators: Collaborators,
    zone: Zone,
}

impl Engine {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let zone = Zone::from_name(config.timezone.as_deref());
        Self {
            config,
            collaborators,
            zone,
        }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    /// Subscribe and spawn the background tasks. A failed first subscription is an error.
    pub async fn start(self) -> Result<RunningEngine> {
        info!("Starting {} engine...", self.config.app_name);

        let heartbeat = Arc::new(HeartbeatStore::new());
        let (bus, rx) = EventBus::new(self.config.queue_capacity);
        let handler = bus.handler(heartbeat.clone());

        let limit = self.config.supervisor.subscribe_timeout();
        let first = self.collaborators.source.subscribe(handler.clone());
        let subscription = tokio::time::timeout(limit, first).await.map_err(|_| {
            WatchError::Platform(format!("initial subscribe timed out after {:?}", limit))
        })??;
        heartbeat.mark_connected(Utc::now());
        info!(id = %subscription.id(), "Subscribed to platform stream");

        let (exit_tx, exit_rx) = mpsc::channel(4);
        let mut tasks = JoinSet::new();

        let worker = EventWorker::new(&self.config, self.zone, &self.collaborators);
        tasks.spawn(async move {
            worker.run(rx).await;
            "event worker"
        });

        let supervisor = StreamSupervisor::new(
            self.collaborators.source.clone(),
            handler,
            heartbeat,
            self.config.supervisor.clone(),
            Some(subscription),
        );
        let supervisor_exit = exit_tx.clone();
        tasks.spawn(async move {
            supervisor.run(supervisor_exit).await;
            "stream supervisor"
        });

        let scheduler = Arc::new(PeriodicScheduler::new(
            self.zone,
            self.config.schedule.clone(),
            self.config.notify,
            self.collaborators.notifier.clone(),
        ));
        scheduler.spawn(&mut tasks, exit_tx.clone());

        info!("{} engine started", self.config.app_name);
        Ok(RunningEngine {
            exit_tx,
            exit_rx,
            notifier: self.collaborators.notifier,
            tasks,
        })
    }

    /// Start, then block until an exit is requested
    pub async fn run(self) -> Result<ExitReason> {
        Ok(self.start().await?.wait().await)
    }
}

/// Handle to a started engine
pub struct RunningEngine {
    exit_tx: mpsc::Sender<ExitReason>,
    exit_rx: mpsc::Receiver<ExitReason>,
    notifier: Arc<dyn Notifier>,
    tasks: JoinSet<&'static str>,
}

impl RunningEngine {
    pub fn exit_sender(&self) -> mpsc::Sender<ExitReason> {
        self.exit_tx.clone()
    }

    /// Wait for an exit request, a background task ending, or Ctrl-C. Then stop the
    /// remaining tasks and flush pending notifications.
    pub async fn wait(mut self) -> ExitReason {
        let reason = tokio::select! {
            biased;
            reason = self.exit_rx.recv() => reason.unwrap_or(ExitReason::Interrupted),
            Some(ended) = self.tasks.join_next() => {
                match ended {
                    Ok(task) => error!("Background task {} stopped unexpectedly", task),
                    Err(e) => error!("Background task failed: {}", e),
                }
                ExitReason::TaskFailed
            }
            _ = interrupted() => ExitReason::Interrupted,
        };
        info!("Stopping engine: {:?}", reason);

        self.tasks.abort_all();
        if let Err(e) = self.notifier.flush().await {
            error!("Failed to flush notifications: {}", e);
        }
        reason
    }
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
