// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Core runtime - heartbeat, supervision, scheduling and the event pipeline

mod clock;
mod heartbeat;
mod supervisor;
mod scheduler;
mod event_bus;
mod engine;

pub use clock::{ClockTime, Zone};
pub use heartbeat::{HeartbeatSnapshot, HeartbeatStore};
pub use supervisor::{assess, Liveness, StreamSupervisor, SupervisorState};
pub use scheduler::{next_occurrence, sleep_until_wall, PeriodicScheduler};
pub use event_bus::EventBus;
pub use engine::{Collaborators, Engine, EventWorker, RunningEngine};

use serde::{Deserialize, Serialize};

/// Why the process is asked to terminate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Daily restart time reached
    ScheduledRestart,
    /// The stream could not be re-established
    ReconnectExhausted { failures: u32 },
    /// Ctrl-C / SIGINT
    Interrupted,
    /// A background task panicked or returned
    TaskFailed,
}

impl ExitReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitReason::ScheduledRestart | ExitReason::Interrupted => 0,
            ExitReason::ReconnectExhausted { .. } | ExitReason::TaskFailed => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitReason::ScheduledRestart.exit_code(), 0);
        assert_eq!(ExitReason::Interrupted.exit_code(), 0);
        assert_eq!(ExitReason::ReconnectExhausted { failures: 3 }.exit_code(), 1);
        assert_eq!(ExitReason::TaskFailed.exit_code(), 1);
    }
}
