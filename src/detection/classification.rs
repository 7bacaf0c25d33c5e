// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/nvrwatch-rs

//! Analysis text classification

use super::{AnalysisOutcome, OutcomeKind};

const PREFIXES: [(&str, OutcomeKind); 2] = [
    ("ALARM", OutcomeKind::Alarm),
    ("OBSERVATION", OutcomeKind::Observation),
];

/// Parse raw analysis output into an outcome.
///
/// Line 1 carries the kind and optional subject type, line 2 the description. Missing
/// lines degrade to empty values; nothing here fails.
pub fn classify(raw: &str) -> AnalysisOutcome {
    let mut lines = raw.trim().lines();
    let title_line = lines.next().unwrap_or("").trim().to_string();
    let description = lines.next().unwrap_or("").to_string();

    let (kind, subject_type) = match match_prefix(&title_line) {
        Some((kind, rest)) => {
            let subject = rest.split_whitespace().next().map(str::to_uppercase);
            (kind, subject)
        }
        None => (OutcomeKind::Nothing, None),
    };

    AnalysisOutcome {
        kind,
        subject_type,
        description,
        title_line,
    }
}

fn match_prefix(line: &str) -> Option<(OutcomeKind, &str)> {
    PREFIXES.iter().find_map(|(prefix, kind)| {
        let head = line.get(..prefix.len())?;
        head.eq_ignore_ascii_case(prefix)
            .then(|| (*kind, &line[prefix.len()..]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_with_subject() {
        let outcome = classify("ALARM PERSON\nMan in dark hoodie at the gate");
        assert_eq!(outcome.kind, OutcomeKind::Alarm);
        assert_eq!(outcome.subject_type.as_deref(), Some("PERSON"));
        assert_eq!(outcome.description, "Man in dark hoodie at the gate");
        assert_eq!(outcome.title_line, "ALARM PERSON");
        assert!(outcome.is_person());
    }

    #[test]
    fn test_case_insensitive_prefix() {
        let outcome = classify("  observation vehicle  \nDelivery van parked");
        assert_eq!(outcome.kind, OutcomeKind::Observation);
        assert_eq!(outcome.subject_type.as_deref(), Some("VEHICLE"));
        assert_eq!(outcome.title_line, "observation vehicle");
    }

    #[test]
    fn test_nothing_to_report() {
        let outcome = classify("NOTHING TO REPORT\nEmpty driveway");
        assert_eq!(outcome.kind, OutcomeKind::Nothing);
        assert_eq!(outcome.subject_type, None);
        assert_eq!(outcome.description, "Empty driveway");
    }

    #[test]
    fn test_missing_lines_degrade() {
        let outcome = classify("ALARM");
        assert_eq!(outcome.kind, OutcomeKind::Alarm);
        assert_eq!(outcome.subject_type, None);
        assert_eq!(outcome.description, "");

        let empty = classify("");
        assert_eq!(empty.kind, OutcomeKind::Nothing);
        assert_eq!(empty.title_line, "");
    }

    #[test]
    fn test_display_title() {
        assert_eq!(classify("ALARM PERSON\nx").display_title(), "Alarm person");
        assert_eq!(classify("").display_title(), "");
    }

    #[test]
    fn test_multibyte_first_line() {
        let outcome = classify("ÄLARM\nx");
        assert_eq!(outcome.kind, OutcomeKind::Nothing);
    }
}
