// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! In-crate test doubles for the collaborator traits

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::*;
use crate::error::{Result, WatchError};

/// Stream source whose subscribe outcomes are scripted in advance
#[derive(Default)]
pub struct ScriptedSource {
    outcomes: Mutex<VecDeque<bool>>,
    pub subscribes: AtomicUsize,
    pub unsubscribes: std::sync::Arc<AtomicUsize>,
    pub refreshes: AtomicUsize,
    pub fail_refresh: AtomicBool,
    /// Subscribe calls never complete
    pub hang_subscribe: AtomicBool,
    handler: Mutex<Option<MessageHandler>>,
}

impl ScriptedSource {
    /// Each entry decides one subscribe call; calls past the script succeed
    pub fn new(outcomes: &[bool]) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.iter().copied().collect()),
            ..Default::default()
        }
    }

    /// Push a message through the most recently bound handler
    pub fn emit(&self, msg: StreamMessage) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(msg);
        }
    }
}

#[async_trait]
impl StreamSource for ScriptedSource {
    async fn subscribe(&self, handler: MessageHandler) -> Result<Subscription> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        if self.hang_subscribe.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let ok = self.outcomes.lock().pop_front().unwrap_or(true);
        if !ok {
            return Err(WatchError::Platform("scripted subscribe failure".into()));
        }
        *self.handler.lock() = Some(handler);
        let unsubscribes = self.unsubscribes.clone();
        Ok(Subscription::new(move || {
            unsubscribes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }

    async fn refresh_session(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(WatchError::Platform("scripted refresh failure".into()));
        }
        Ok(())
    }
}

/// Comparator returning a fixed verdict, or an error when `None`
pub struct ScriptedComparator {
    verdict: Option<bool>,
    pub calls: AtomicUsize,
}

impl ScriptedComparator {
    pub fn new(verdict: Option<bool>) -> Self {
        Self {
            verdict,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DescriptionComparator for ScriptedComparator {
    async fn same_subject(&self, _a: &str, _b: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict
            .ok_or_else(|| WatchError::Compare("scripted compare failure".into()))
    }
}

/// Analyzer answering every camera with the same text
pub struct StaticAnalyzer {
    text: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl StaticAnalyzer {
    pub fn new(text: Option<&str>) -> Self {
        Self {
            text: Mutex::new(text.map(str::to_string)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_text(&self, text: Option<&str>) {
        *self.text.lock() = text.map(str::to_string);
    }
}

#[async_trait]
impl Analyzer for StaticAnalyzer {
    async fn fetch_analysis(&self, camera: &CameraInfo) -> Result<Analysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = self.text.lock().clone();
        match text {
            Some(text) => Ok(Analysis {
                text,
                image: Some(format!("images/{}.jpg", camera.name)),
            }),
            None => Err(WatchError::Analysis("scripted analysis failure".into())),
        }
    }
}

/// Notifier that keeps everything it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub flushed: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.flushed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
