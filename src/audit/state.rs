//! Cross-run finding state: consecutive counts, auto-remove eligibility, and
//! the unused-check clean streak.

#![allow(missing_docs)]

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audit::finding::{Action, Category, Finding};
use crate::core::errors::Result;
use crate::core::persist::{read_json, write_json_atomic};

/// Consecutive runs an `unused` finding must persist before it is flagged for
/// automatic removal.
pub const AUTO_REMOVE_THRESHOLD: u32 = 2;

/// Persisted between runs of one workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditState {
    /// Signatures of the previous run's findings, in report order.
    pub last_signatures: Vec<String>,
    pub counts: BTreeMap<String, u32>,
    pub unused_clean_streak: u32,
}

impl AuditState {
    /// Load from `path`. A missing file is a fresh state; a malformed one is
    /// an error the caller may choose to degrade.
    pub fn load(path: &Path) -> Result<Self> {
        Ok(read_json(path)?.unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }
}

/// How the unused-symbol check went this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnusedCheckSummary {
    pub blocked: bool,
    pub unused_findings: usize,
}

/// Annotate `findings` in place and compute the next state.
///
/// The next state replaces the previous signatures and counts wholesale, so a
/// finding that disappears for one run starts again at 1.
pub fn apply_consecutive_counts(
    previous: &AuditState,
    findings: &mut [Finding],
    unused: UnusedCheckSummary,
) -> AuditState {
    let seen: HashSet<&str> = previous.last_signatures.iter().map(String::as_str).collect();
    let mut signatures = Vec::with_capacity(findings.len());
    let mut counts = BTreeMap::new();

    for finding in findings.iter_mut() {
        let signature = finding.signature();
        let prior = previous.counts.get(&signature).copied().unwrap_or(0);
        let count = if seen.contains(signature.as_str()) {
            prior + 1
        } else {
            1
        };

        finding.consecutive_count = count;
        finding.auto_remove_candidate =
            finding.category == Category::Unused && count >= AUTO_REMOVE_THRESHOLD;
        if finding.auto_remove_candidate {
            finding.action = Action::Remove;
        }

        counts.insert(signature.clone(), count);
        signatures.push(signature);
    }

    let unused_clean_streak = if !unused.blocked && unused.unused_findings == 0 {
        previous.unused_clean_streak + 1
    } else {
        0
    };

    AuditState {
        last_signatures: signatures,
        counts,
        unused_clean_streak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAN_CLEAN: UnusedCheckSummary = UnusedCheckSummary {
        blocked: false,
        unused_findings: 0,
    };

    fn unused(file: &str) -> Finding {
        Finding::new(Category::Unused, file, 4, "TS6133: 'x' is unused.", Action::Verify)
    }

    #[test]
    fn new_signature_starts_at_one() {
        let mut findings = vec![unused("a.ts")];
        let next = apply_consecutive_counts(&AuditState::default(), &mut findings, RAN_CLEAN);
        assert_eq!(findings[0].consecutive_count, 1);
        assert!(!findings[0].auto_remove_candidate);
        assert_eq!(next.last_signatures, vec![findings[0].signature()]);
    }

    #[test]
    fn repeated_signature_increments_and_flags_unused() {
        let ran = UnusedCheckSummary {
            blocked: false,
            unused_findings: 1,
        };
        let mut state = AuditState::default();
        for expected in 1..=3 {
            let mut findings = vec![unused("a.ts")];
            state = apply_consecutive_counts(&state, &mut findings, ran);
            assert_eq!(findings[0].consecutive_count, expected);
            assert_eq!(findings[0].auto_remove_candidate, expected >= 2);
            if expected >= 2 {
                assert_eq!(findings[0].action, Action::Remove);
            }
        }
    }

    #[test]
    fn gap_resets_count() {
        let mut state = AuditState::default();
        let mut findings = vec![unused("a.ts")];
        state = apply_consecutive_counts(&state, &mut findings, RAN_CLEAN);
        state = apply_consecutive_counts(&state, &mut [], RAN_CLEAN);
        let mut findings = vec![unused("a.ts")];
        apply_consecutive_counts(&state, &mut findings, RAN_CLEAN);
        assert_eq!(findings[0].consecutive_count, 1);
    }

    #[test]
    fn stale_count_without_signature_is_ignored() {
        let finding = unused("a.ts");
        let mut state = AuditState::default();
        state.counts.insert(finding.signature(), 7);
        let mut findings = vec![finding];
        apply_consecutive_counts(&state, &mut findings, RAN_CLEAN);
        assert_eq!(findings[0].consecutive_count, 1);
    }

    #[test]
    fn other_categories_never_become_auto_remove() {
        let mut state = AuditState::default();
        for _ in 0..3 {
            let mut findings = vec![Finding::new(
                Category::LargeModule,
                "big.ts",
                1,
                "Module exceeds 300 lines (301).",
                Action::Refactor,
            )];
            state = apply_consecutive_counts(&state, &mut findings, RAN_CLEAN);
            assert!(!findings[0].auto_remove_candidate);
            assert_eq!(findings[0].action, Action::Refactor);
        }
    }

    #[test]
    fn clean_streak_counts_only_completed_clean_checks() {
        let mut state = AuditState::default();
        state = apply_consecutive_counts(&state, &mut [], RAN_CLEAN);
        state = apply_consecutive_counts(&state, &mut [], RAN_CLEAN);
        assert_eq!(state.unused_clean_streak, 2);

        let blocked = UnusedCheckSummary {
            blocked: true,
            unused_findings: 0,
        };
        state = apply_consecutive_counts(&state, &mut [], blocked);
        assert_eq!(state.unused_clean_streak, 0);

        state = apply_consecutive_counts(&state, &mut [], RAN_CLEAN);
        assert_eq!(state.unused_clean_streak, 1);
        let dirty = UnusedCheckSummary {
            blocked: false,
            unused_findings: 3,
        };
        state = apply_consecutive_counts(&state, &mut [], dirty);
        assert_eq!(state.unused_clean_streak, 0);
    }

    #[test]
    fn state_round_trips_in_camel_case() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs/continuous-audit-state.json");
        let mut findings = vec![unused("a.ts")];
        let state = apply_consecutive_counts(&AuditState::default(), &mut findings, RAN_CLEAN);
        state.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"lastSignatures\""));
        assert!(raw.contains("\"unusedCleanStreak\""));
        assert_eq!(AuditState::load(&path).unwrap(), state);
    }

    #[test]
    fn missing_state_loads_fresh_and_malformed_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        assert_eq!(AuditState::load(&path).unwrap(), AuditState::default());
        std::fs::write(&path, "[]").unwrap();
        assert!(AuditState::load(&path).is_err());
    }

    #[test]
    fn positional_state_document_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(
            &path,
            r#"[["large-module|a|1|m"], {"large-module|a|1|m": 41}, 9]"#,
        )
        .unwrap();
        let err = AuditState::load(&path).unwrap_err();
        assert_eq!(err.code(), "HYG-2002");
    }
}
