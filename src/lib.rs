// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! nvrwatch - camera event watcher for NVR motion alerts
//!
//! Subscribes to a surveillance platform's device update stream, asks an
//! analysis relay to describe each motion event, and decides whether and how
//! urgently to notify a human.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        nvrwatch Engine                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────┐   ┌────────────┐  ┌──────────┐ │
//! │  │  Stream  │ → │ Event Bus │ → │   Event    │→ │ Notifier │ │
//! │  │  Source  │   │  (queue)  │   │   Worker   │  │          │ │
//! │  └──────────┘   └───────────┘   └────────────┘  └──────────┘ │
//! │       ↑              ↓           classify + policy     ↑      │
//! │  ┌──────────┐   ┌───────────┐                  ┌──────────┐ │
//! │  │Supervisor│ ← │ Heartbeat │                  │Scheduler │ │
//! │  └──────────┘   └───────────┘                  └──────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod core;
pub mod detection;
pub mod streaming;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use config::Config;
pub use core::{Collaborators, Engine, ExitReason};
pub use detection::{classify, PolicyEngine, PolicyHistory};
pub use error::{Result, WatchError};

/// nvrwatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// nvrwatch name
pub const NAME: &str = "nvrwatch";
