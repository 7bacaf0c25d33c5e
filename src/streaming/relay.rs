// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! HTTP client for the analysis/notification relay
//!
//! The relay owns snapshot capture, vision prompting and push delivery; this side only
//! exchanges small JSON documents with it.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Analysis, Analyzer, CameraInfo, DescriptionComparator, Notification, Notifier};
use crate::config::RelayConfig;
use crate::error::{Result, WatchError};

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    camera_id: &'a str,
    camera_name: &'a str,
}

#[derive(Debug, Serialize)]
struct CompareRequest<'a> {
    a: &'a str,
    b: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    same: bool,
}

/// Relay endpoints used as analyzer, comparator and notifier
pub struct RelayClient {
    http: reqwest::Client,
    analysis_url: Option<String>,
    compare_url: Option<String>,
    notify_url: Option<String>,
    api_token: Option<String>,
}

impl RelayClient {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            analysis_url: config.analysis_url.clone(),
            compare_url: config.compare_url.clone(),
            notify_url: config.notify_url.clone(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn has_notify_endpoint(&self) -> bool {
        self.notify_url.is_some()
    }

    async fn post_json<T, R>(&self, url: &str, body: &T) -> Result<R>
    where
        T: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let mut request = self.http.post(url).json(body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Analyzer for RelayClient {
    async fn fetch_analysis(&self, camera: &CameraInfo) -> Result<Analysis> {
        let url = self
            .analysis_url
            .as_deref()
            .ok_or_else(|| WatchError::Analysis("no analysis endpoint configured".into()))?;

        let analysis: Analysis = self
            .post_json(
                url,
                &AnalyzeRequest {
                    camera_id: &camera.id,
                    camera_name: &camera.name,
                },
            )
            .await?;

        if analysis.text.trim().is_empty() {
            return Err(WatchError::Analysis(format!(
                "no analysis for image from {}",
                camera.name
            )));
        }
        Ok(analysis)
    }
}

#[async_trait]
impl DescriptionComparator for RelayClient {
    async fn same_subject(&self, a: &str, b: &str) -> Result<bool> {
        let url = self
            .compare_url
            .as_deref()
            .ok_or_else(|| WatchError::Compare("no compare endpoint configured".into()))?;

        let response: CompareResponse = self.post_json(url, &CompareRequest { a, b }).await?;
        debug!(same = response.same, "Compared descriptions");
        Ok(response.same)
    }
}

#[async_trait]
impl Notifier for RelayClient {
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        let url = self
            .notify_url
            .as_deref()
            .ok_or_else(|| WatchError::Dispatch("no notify endpoint configured".into()))?;

        let mut request = self.http.post(url).json(notification);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }
}
