// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! WebSocket client for the platform's device update stream

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::RwLock;
use serde::Deserialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{MessageHandler, StreamMessage, StreamSource, Subscription};
use crate::config::PlatformConfig;
use crate::error::{Result, WatchError};

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
}

/// Stream source backed by a WebSocket connection
pub struct WebSocketSource {
    url: String,
    connect_timeout: Duration,
    session_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    http: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl WebSocketSource {
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            url: config.websocket_url.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            session_url: config.session_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            http,
            token: RwLock::new(None),
        })
    }
}

#[async_trait]
impl StreamSource for WebSocketSource {
    async fn subscribe(&self, handler: MessageHandler) -> Result<Subscription> {
        let mut request = self.url.as_str().into_client_request()?;
        let token = self.token.read().clone();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| WatchError::Platform(format!("invalid session token: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (mut ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| {
                WatchError::Platform(format!(
                    "stream handshake timed out after {:?}",
                    self.connect_timeout
                ))
            })??;
        info!("Stream connected to {}", self.url);

        let task = tokio::spawn(async move {
            while let Some(frame) = ws_stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => handler(StreamMessage::parse(&text)),
                    Ok(Message::Binary(_)) => handler(StreamMessage::opaque()),
                    Ok(Message::Close(_)) => {
                        warn!("Stream closed by platform");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Stream read error: {}", e);
                        break;
                    }
                }
            }
            debug!("Stream reader exited");
        });

        Ok(Subscription::new(move || {
            task.abort();
            Ok(())
        }))
    }

    async fn refresh_session(&self) -> Result<()> {
        let Some(url) = &self.session_url else {
            debug!("No session URL configured, nothing to refresh");
            return Ok(());
        };

        let body = serde_json::json!({
            "username": self.username,
            "password": self.password,
        });
        let session: SessionResponse = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        *self.token.write() = Some(session.token);
        debug!("Platform session refreshed");
        Ok(())
    }
}
