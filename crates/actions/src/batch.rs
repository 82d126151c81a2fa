//! Batch policies and per-Action reporting.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::ActionError;

/// How a batch reacts to a failing Action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPolicy {
    /// Apply every Action; failures are reported, successes kept.
    #[default]
    #[serde(rename = "continue", alias = "continue_on_error")]
    ContinueOnError,
    /// Stop at the first failure; earlier successes are kept.
    #[serde(rename = "stop", alias = "stop_on_error")]
    StopOnError,
    /// Roll back already-applied Actions on the first failure.
    Atomic,
}

impl BatchPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "continue" | "continueonerror" | "partial" => Some(Self::ContinueOnError),
            "stop" | "stoponerror" | "failfast" => Some(Self::StopOnError),
            "atomic" | "all" | "allornothing" => Some(Self::Atomic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContinueOnError => "continue",
            Self::StopOnError => "stop",
            Self::Atomic => "atomic",
        }
    }
}

impl fmt::Display for BatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Applied and kept. `history_id` is set when the Action can be undone.
    Applied { history_id: Option<String> },
    Failed(ActionError),
    /// Not attempted because an earlier Action failed.
    Skipped,
    /// Applied, then undone because a later Action failed.
    RolledBack,
    /// Applied, but could not be undone when a later Action failed.
    NotRolledBack { reason: String },
}

impl ActionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Failed(_) => "failed",
            Self::Skipped => "skipped",
            Self::RolledBack => "rolled back",
            Self::NotRolledBack { .. } => "not rolled back",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    /// Position within the applied batch.
    pub index: usize,
    pub action: Action,
    pub outcome: ActionOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub policy: BatchPolicy,
    pub reports: Vec<ActionReport>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, ActionOutcome::Applied { .. } | ActionOutcome::NotRolledBack { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ActionOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ActionOutcome::Skipped))
    }

    pub fn rolled_back(&self) -> usize {
        self.count(|o| matches!(o, ActionOutcome::RolledBack))
    }

    fn count(&self, pred: impl Fn(&ActionOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// History ids of the recorded Actions, in application order.
    pub fn history_ids(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                ActionOutcome::Applied { history_id: Some(id) } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// One line, e.g. "Applied 3 of 4 actions (1 failed)".
    pub fn summary(&self) -> String {
        let total = self.total();
        let noun = if total == 1 { "action" } else { "actions" };
        let mut line = format!("Applied {} of {} {}", self.applied(), total, noun);

        let mut notes = Vec::new();
        if self.failed() > 0 {
            notes.push(format!("{} failed", self.failed()));
        }
        if self.skipped() > 0 {
            notes.push(format!("{} skipped", self.skipped()));
        }
        if self.rolled_back() > 0 {
            notes.push(format!("{} rolled back", self.rolled_back()));
        }
        let stuck = self.count(|o| matches!(o, ActionOutcome::NotRolledBack { .. }));
        if stuck > 0 {
            notes.push(format!("{} could not be rolled back", stuck));
        }
        if !notes.is_empty() {
            line.push_str(&format!(" ({})", notes.join(", ")));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: Vec<ActionOutcome>) -> BatchReport {
        BatchReport {
            policy: BatchPolicy::ContinueOnError,
            reports: outcomes
                .into_iter()
                .enumerate()
                .map(|(index, outcome)| ActionReport { index, action: Action::new("values", "A1", "1"), outcome })
                .collect(),
        }
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(BatchPolicy::parse("continue"), Some(BatchPolicy::ContinueOnError));
        assert_eq!(BatchPolicy::parse("stop-on-error"), Some(BatchPolicy::StopOnError));
        assert_eq!(BatchPolicy::parse("ATOMIC"), Some(BatchPolicy::Atomic));
        assert_eq!(BatchPolicy::parse("sometimes"), None);
        let p: BatchPolicy = serde_json::from_str("\"stop\"").unwrap();
        assert_eq!(p, BatchPolicy::StopOnError);
    }

    #[test]
    fn test_summary_counts() {
        let applied = || ActionOutcome::Applied { history_id: None };
        let r = report(vec![applied(), applied(), ActionOutcome::Failed(ActionError::InvalidTarget), applied()]);
        assert_eq!(r.summary(), "Applied 3 of 4 actions (1 failed)");
        assert!(!r.is_success());

        let r = report(vec![applied()]);
        assert_eq!(r.summary(), "Applied 1 of 1 action");
        assert!(r.is_success());
    }

    #[test]
    fn test_summary_rollback() {
        let r = report(vec![
            ActionOutcome::RolledBack,
            ActionOutcome::NotRolledBack { reason: "no snapshot".into() },
            ActionOutcome::Failed(ActionError::InvalidTarget),
            ActionOutcome::Skipped,
        ]);
        assert_eq!(
            r.summary(),
            "Applied 1 of 4 actions (1 failed, 1 skipped, 1 rolled back, 1 could not be rolled back)"
        );
    }

    #[test]
    fn test_history_ids_in_order() {
        let r = report(vec![
            ActionOutcome::Applied { history_id: Some("01A".into()) },
            ActionOutcome::Applied { history_id: None },
            ActionOutcome::Applied { history_id: Some("01B".into()) },
        ]);
        assert_eq!(r.history_ids(), vec!["01A", "01B"]);
    }
}
