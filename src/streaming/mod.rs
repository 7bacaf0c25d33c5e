// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Streaming module - platform stream, relay collaborators, and their shared types

mod websocket;
mod relay;

#[cfg(test)]
pub(crate) mod testing;

pub use websocket::*;
pub use relay::*;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

/// Callback invoked by the stream source for every inbound frame.
///
/// May run on a transport task distinct from the event worker; it must not block.
pub type MessageHandler = Arc<dyn Fn(StreamMessage) + Send + Sync>;

/// Action carried by a stream message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageAction {
    Add,
    Update,
    Remove,
    #[serde(other)]
    Other,
}

/// A platform-pushed device state change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMessage {
    pub action: MessageAction,
    #[serde(default)]
    pub model_key: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub new_obj: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CameraObject {
    name: String,
    #[serde(default)]
    is_motion_detected: bool,
    #[serde(default)]
    is_smart_detected: bool,
}

/// Camera state extracted from an update message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraUpdate {
    pub camera: CameraInfo,
    pub motion_detected: bool,
    pub smart_detected: bool,
}

impl StreamMessage {
    /// Decode a text frame. Frames that do not decode still count as traffic.
    pub fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_else(|_| Self::opaque())
    }

    /// Placeholder for frames with no usable payload
    pub fn opaque() -> Self {
        Self {
            action: MessageAction::Other,
            model_key: String::new(),
            id: String::new(),
            new_obj: None,
        }
    }

    /// Camera update carried by this message, if any
    pub fn camera_update(&self) -> Option<CameraUpdate> {
        if self.action != MessageAction::Update || self.model_key != "camera" {
            return None;
        }
        let obj: CameraObject = serde_json::from_value(self.new_obj.clone()?).ok()?;
        Some(CameraUpdate {
            camera: CameraInfo {
                id: self.id.clone(),
                name: obj.name,
            },
            motion_detected: obj.is_motion_detected,
            smart_detected: obj.is_smart_detected,
        })
    }
}

/// Camera identity as seen by the collaborators
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraInfo {
    pub id: String,
    pub name: String,
}

/// Raw analysis text plus a reference to the analysed image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// Outbound notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message: String,
    pub priority: i8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

/// Handle to a live subscription
pub struct Subscription {
    id: Uuid,
    cancel: Option<Box<dyn FnOnce() -> Result<()> + Send>>,
}

impl Subscription {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop delivering messages to the handler
    pub fn unsubscribe(mut self) -> Result<()> {
        match self.cancel.take() {
            Some(cancel) => cancel(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Platform stream lifecycle
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn subscribe(&self, handler: MessageHandler) -> Result<Subscription>;

    /// Re-authenticate or reload platform state before a resubscription
    async fn refresh_session(&self) -> Result<()>;
}

/// Snapshot plus vision-model analysis for one camera
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn fetch_analysis(&self, camera: &CameraInfo) -> Result<Analysis>;
}

/// Judges whether two descriptions refer to the same subject
#[async_trait]
pub trait DescriptionComparator: Send + Sync {
    async fn same_subject(&self, a: &str, b: &str) -> Result<bool>;
}

/// Delivers notifications to a human
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> Result<()>;

    /// Drain anything buffered before the process exits
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Notifier that only writes to the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        info!(
            priority = notification.priority,
            title = notification.title.as_deref().unwrap_or(""),
            "Notification: {}",
            notification.message
        );
        Ok(())
    }
}
