// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Detection module - analysis classification and notification policy

mod classification;
mod policy;

pub use classification::*;
pub use policy::*;

use serde::{Deserialize, Serialize};

/// Subject type that gets person-specific handling
pub const PERSON: &str = "PERSON";

/// What the analysis reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    Alarm,
    Observation,
    Nothing,
}

/// Structured form of a two-line analysis result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub kind: OutcomeKind,
    /// Uppercased token following the kind, e.g. `PERSON`
    pub subject_type: Option<String>,
    /// Second line of the analysis, empty if absent
    pub description: String,
    /// First line as received, trimmed
    pub title_line: String,
}

impl AnalysisOutcome {
    pub fn is_person(&self) -> bool {
        self.subject_type.as_deref() == Some(PERSON)
    }

    /// Display title: first line lower-cased with a leading capital, e.g. `Alarm person`
    pub fn display_title(&self) -> String {
        let lower = self.title_line.to_lowercase();
        let mut chars = lower.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}
