// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Error types shared by the collaborators and the engine

/// Result type alias
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors raised at collaborator boundaries
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Stream platform failure (subscribe, unsubscribe, session refresh)
    #[error("Platform error: {0}")]
    Platform(String),

    /// Snapshot or analysis call failed
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Description comparison failed
    #[error("Compare error: {0}")]
    Compare(String),

    /// Notification delivery failed
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
