// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Configuration module

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::core::ClockTime;
use crate::detection::{NightWindow, PRIORITY_LOW};

/// Upper bound for every window and threshold given in seconds
pub const MAX_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Directory for rotated log files
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// IANA zone used for schedules and the night window
    pub timezone: Option<String>,

    /// Only process this camera name
    pub camera_filter: Option<String>,

    /// Send notifications
    pub notify: bool,

    /// Analyse every camera update, not just motion events
    pub test_mode: bool,

    /// Inbound message queue depth
    pub queue_capacity: usize,

    /// Platform stream connection
    pub platform: PlatformConfig,

    /// Stream liveness supervision
    pub supervisor: SupervisorConfig,

    /// Notification policy
    pub policy: PolicyConfig,

    /// Periodic status and restart
    pub schedule: ScheduleConfig,

    /// Analysis / compare / notify relay
    pub relay: RelayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "nvrwatch".to_string(),
            log_dir: PathBuf::from("./log"),
            log_level: "info".to_string(),
            timezone: None,
            camera_filter: None,
            notify: false,
            test_mode: false,
            queue_capacity: 256,
            platform: PlatformConfig::default(),
            supervisor: SupervisorConfig::default(),
            policy: PolicyConfig::default(),
            schedule: ScheduleConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("validating {}", path.display()))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("nvrwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Overlay settings from environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut Option<String>, key: &str| {
            if let Some(value) = var(key).filter(|v| !v.is_empty()) {
                *target = Some(value);
            }
        };

        if let Some(url) = var("NVR_WS_URL").filter(|v| !v.is_empty()) {
            self.platform.websocket_url = url;
        }
        set(&mut self.platform.session_url, "NVR_SESSION_URL");
        set(&mut self.platform.username, "NVR_USERNAME");
        set(&mut self.platform.password, "NVR_PASSWORD");
        set(&mut self.camera_filter, "CAMERA_FILTER");
        set(&mut self.timezone, "TIMEZONE");
        set(&mut self.relay.analysis_url, "ANALYSIS_URL");
        set(&mut self.relay.compare_url, "COMPARE_URL");
        set(&mut self.relay.notify_url, "NOTIFY_URL");
        set(&mut self.relay.api_token, "RELAY_API_TOKEN");

        if let Some(v) = var("WEBSOCKET_STALE_SECONDS") {
            self.supervisor.stale_threshold_secs = v
                .trim()
                .parse()
                .with_context(|| format!("WEBSOCKET_STALE_SECONDS={:?}", v))?;
        }
        if let Some(v) = var("WEBSOCKET_INITIAL_TIMEOUT") {
            self.supervisor.initial_timeout_secs = v
                .trim()
                .parse()
                .with_context(|| format!("WEBSOCKET_INITIAL_TIMEOUT={:?}", v))?;
        }
        self.validate()
    }

    /// Reject durations that are zero where a wait is required, or longer than a day
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("supervisor.stale_threshold_secs", self.supervisor.stale_threshold_secs),
            ("supervisor.initial_timeout_secs", self.supervisor.initial_timeout_secs),
            ("supervisor.subscribe_timeout_secs", self.supervisor.subscribe_timeout_secs),
            ("platform.connect_timeout_secs", self.platform.connect_timeout_secs),
            ("policy.alarm_backoff_secs", self.policy.alarm_backoff_secs),
            ("policy.observation_backoff_secs", self.policy.observation_backoff_secs),
            ("policy.person_dedupe_secs", self.policy.person_dedupe_secs),
            ("schedule.restart_grace_secs", self.schedule.restart_grace_secs),
        ];
        for (name, secs) in windows {
            if secs > MAX_WINDOW_SECS {
                bail!("{} = {} exceeds {} seconds", name, secs, MAX_WINDOW_SECS);
            }
        }
        if self.supervisor.subscribe_timeout_secs == 0 || self.platform.connect_timeout_secs == 0 {
            bail!("subscribe and connect timeouts must be at least one second");
        }
        Ok(())
    }

    /// Names of required settings that are not set
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.platform.websocket_url.is_empty() {
            missing.push("NVR_WS_URL");
        }
        if self.relay.analysis_url.is_none() {
            missing.push("ANALYSIS_URL");
        }
        if self.relay.compare_url.is_none() {
            missing.push("COMPARE_URL");
        }
        if self.notify && self.relay.notify_url.is_none() {
            missing.push("NOTIFY_URL");
        }
        missing
    }
}

/// Platform stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Device update stream endpoint
    pub websocket_url: String,

    /// Login endpoint returning a session token
    pub session_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,

    /// Timeout for session requests
    pub request_timeout_secs: u64,

    /// Timeout for the WebSocket handshake
    pub connect_timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            websocket_url: String::new(),
            session_url: None,
            username: None,
            password: None,
            request_timeout_secs: 15,
            connect_timeout_secs: 15,
        }
    }
}

/// Stream supervision configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Heartbeat age that marks the stream stale
    pub stale_threshold_secs: u64,

    /// How long a fresh subscription may stay silent
    pub initial_timeout_secs: u64,

    /// Consecutive failed resubscriptions before exiting
    pub max_failures: u32,

    /// A subscribe call that takes longer counts as failed
    pub subscribe_timeout_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stale_threshold_secs: 300,
            initial_timeout_secs: 60,
            max_failures: 3,
            subscribe_timeout_secs: 30,
        }
    }
}

impl SupervisorConfig {
    /// A third of the stale threshold, kept within 10..=60 seconds
    pub fn check_interval(&self) -> Duration {
        let secs = if self.stale_threshold_secs == 0 {
            30
        } else {
            (self.stale_threshold_secs / 3).clamp(10, 60)
        };
        Duration::from_secs(secs)
    }

    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_secs(self.subscribe_timeout_secs.max(1))
    }
}

/// Notification policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Minimum spacing between high-priority alarms
    pub alarm_backoff_secs: u64,

    /// Observations within this long of any notification are dropped
    pub observation_backoff_secs: u64,

    /// Window for suppressing a repeat person on the same camera
    pub person_dedupe_secs: u64,

    /// Person alarms keep high priority inside this window
    pub night_window: NightWindow,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            alarm_backoff_secs: 60,
            observation_backoff_secs: 10,
            person_dedupe_secs: 600,
            night_window: NightWindow {
                start: ClockTime::at(0, 0),
                end: ClockTime::at(4, 30),
            },
        }
    }
}

/// Periodic task configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local times for the "online" pulse
    pub status_times: Vec<ClockTime>,
    pub status_message: String,
    pub status_priority: i8,

    /// Exit cleanly once a day so the orchestrator restarts us
    pub scheduled_restart: bool,
    pub restart_time: ClockTime,

    /// Delay after the restart time so a pulse at the same time completes first
    pub restart_grace_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            status_times: vec![ClockTime::at(8, 0), ClockTime::at(20, 0)],
            status_message: "System online".to_string(),
            status_priority: PRIORITY_LOW,
            scheduled_restart: false,
            restart_time: ClockTime::at(20, 0),
            restart_grace_secs: 5,
        }
    }
}

/// Relay endpoints for analysis, comparison and delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub analysis_url: Option<String>,
    pub compare_url: Option<String>,
    pub notify_url: Option<String>,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            analysis_url: None,
            compare_url: None,
            notify_url: None,
            api_token: None,
            timeout_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_load_or_create_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.supervisor.max_failures, 3);

        let loaded = Config::load_or_create(&path).unwrap();
        assert_eq!(loaded.schedule.status_times, created.schedule.status_times);
        assert_eq!(loaded.policy.night_window, created.policy.night_window);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
notify = true

[policy.night_window]
start = "23:00"
end = "01:00"

[schedule]
status_times = ["07:30"]
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.notify);
        assert_eq!(config.policy.night_window.start.to_string(), "23:00");
        assert_eq!(config.policy.alarm_backoff_secs, 60);
        assert_eq!(config.schedule.status_times.len(), 1);
        assert_eq!(config.schedule.restart_grace_secs, 5);
    }

    #[test]
    fn test_bad_clock_time_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[schedule]\nrestart_time = \"25:00\"\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NVR_WS_URL", "wss://nvr.local/ws"),
            ("CAMERA_FILTER", "Porch"),
            ("ANALYSIS_URL", "http://relay/analyze"),
            ("WEBSOCKET_STALE_SECONDS", "120"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_vars(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.platform.websocket_url, "wss://nvr.local/ws");
        assert_eq!(config.camera_filter.as_deref(), Some("Porch"));
        assert_eq!(config.supervisor.stale_threshold_secs, 120);
        assert_eq!(config.supervisor.check_interval(), Duration::from_secs(40));

        let mut bad = Config::default();
        assert!(bad
            .apply_vars(|k| (k == "WEBSOCKET_INITIAL_TIMEOUT").then(|| "soon".to_string()))
            .is_err());
    }

    #[test]
    fn test_missing_settings() {
        let mut config = Config::default();
        assert_eq!(
            config.missing_settings(),
            vec!["NVR_WS_URL", "ANALYSIS_URL", "COMPARE_URL"]
        );

        config.notify = true;
        assert!(config.missing_settings().contains(&"NOTIFY_URL"));
    }

    #[test]
    fn test_oversized_windows_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[policy]\nalarm_backoff_secs = 100000000\n").unwrap();
        assert!(Config::load(&path).is_err());

        let mut config = Config::default();
        config.supervisor.subscribe_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut stale = Config::default();
        assert!(stale
            .apply_vars(|k| (k == "WEBSOCKET_STALE_SECONDS").then(|| "99999999999".to_string()))
            .is_err());

        let mut day = Config::default();
        day.policy.person_dedupe_secs = MAX_WINDOW_SECS;
        assert!(day.validate().is_ok());
    }

    #[test]
    fn test_check_interval_clamped() {
        let mut s = SupervisorConfig::default();
        assert_eq!(s.check_interval(), Duration::from_secs(60));
        s.stale_threshold_secs = 12;
        assert_eq!(s.check_interval(), Duration::from_secs(10));
        s.stale_threshold_secs = 0;
        assert_eq!(s.check_interval(), Duration::from_secs(30));
    }
}
