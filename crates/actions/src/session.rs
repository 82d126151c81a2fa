//! One user's working context: executor, history, staged batch and preview.

use log::{info, warn};

use gridpilot_engine::Document;

use crate::action::Action;
use crate::batch::{ActionOutcome, ActionReport, BatchPolicy, BatchReport};
use crate::error::{ActionError, UndoError};
use crate::executor::{Executor, ExecutorConfig};
use crate::history::{HistoryLedger, UndoOutcome, DEFAULT_CAPACITY};
use crate::preview::{selected_subset, PreviewState};
use crate::undo::{self, UndoSnapshot, DEFAULT_MAX_SNAPSHOT_CELLS};

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub history_capacity: usize,
    /// Refuse undo when the region changed after the Action.
    pub verify_before_undo: bool,
    pub max_snapshot_cells: u64,
    pub executor: ExecutorConfig,
    pub batch_policy: BatchPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            verify_before_undo: true,
            max_snapshot_cells: DEFAULT_MAX_SNAPSHOT_CELLS,
            executor: ExecutorConfig::default(),
            batch_policy: BatchPolicy::default(),
        }
    }
}

#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    executor: Executor,
    ledger: HistoryLedger,
    pending: Vec<Action>,
    preview: PreviewState,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            executor: Executor::new(config.executor.clone()),
            ledger: HistoryLedger::with_capacity(config.history_capacity),
            pending: Vec::new(),
            preview: PreviewState::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn pending(&self) -> &[Action] {
        &self.pending
    }

    pub fn preview(&self) -> &PreviewState {
        &self.preview
    }

    pub fn preview_mut(&mut self) -> &mut PreviewState {
        &mut self.preview
    }

    /// Replace the pending batch; every Action starts selected.
    pub fn stage(&mut self, actions: Vec<Action>) {
        self.preview.initialize(actions.len());
        self.pending = actions;
    }

    pub fn discard(&mut self) {
        self.pending.clear();
        self.preview.clear();
    }

    /// Forget history, the pending batch and the preview.
    pub fn clear(&mut self) {
        self.ledger.clear();
        self.discard();
    }

    /// Apply one Action and record it when it is undoable. Returns the
    /// history id of the new entry.
    pub fn apply_action(&mut self, doc: &mut dyn Document, action: &Action) -> Result<Option<String>, ActionError> {
        let snapshot = self.run(doc, action)?;
        Ok(self.ledger.record(action, snapshot))
    }

    /// Apply the selected subset of the pending batch in order, then clear
    /// the batch.
    pub fn apply_selected(&mut self, doc: &mut dyn Document, policy: BatchPolicy) -> BatchReport {
        let actions = selected_subset(&self.pending, self.preview.selections());
        self.discard();
        self.apply_batch(doc, &actions, policy)
    }

    /// Apply `actions` in order under `policy`.
    pub fn apply_batch(&mut self, doc: &mut dyn Document, actions: &[Action], policy: BatchPolicy) -> BatchReport {
        let reports = match policy {
            BatchPolicy::Atomic => self.apply_atomic(doc, actions),
            _ => self.apply_in_order(doc, actions, policy == BatchPolicy::StopOnError),
        };
        let report = BatchReport { policy, reports };
        info!("{} [{}]", report.summary(), policy);
        report
    }

    pub fn undo(&mut self, doc: &mut dyn Document) -> Result<UndoOutcome, UndoError> {
        self.ledger.undo_most_recent(doc, self.config.verify_before_undo)
    }

    /// Plan, capture, commit and seal one Action. A failed commit restores
    /// the snapshot so a half-applied Action does not linger.
    fn run(&self, doc: &mut dyn Document, action: &Action) -> Result<Option<UndoSnapshot>, ActionError> {
        let plan = self.executor.plan(doc, action)?;
        let mut snapshot = match &plan.capture {
            Some(region) => undo::capture(
                doc,
                &region.to_string(),
                plan.kind.undo_policy().with_formats(),
                self.config.max_snapshot_cells,
            ),
            None => None,
        };

        if let Err(err) = self.executor.commit(doc, &plan) {
            if let Some(snapshot) = &snapshot {
                if let Err(undo_err) = undo::restore(doc, snapshot, false) {
                    warn!("could not restore {} after a failed action: {}", snapshot.address, undo_err);
                }
            }
            return Err(err);
        }

        if let Some(snapshot) = snapshot.as_mut() {
            undo::seal(doc, snapshot);
        }
        Ok(snapshot)
    }

    fn apply_in_order(&mut self, doc: &mut dyn Document, actions: &[Action], stop_on_error: bool) -> Vec<ActionReport> {
        let mut reports = Vec::with_capacity(actions.len());
        let mut failed = false;
        for (index, action) in actions.iter().enumerate() {
            let outcome = if failed && stop_on_error {
                ActionOutcome::Skipped
            } else {
                match self.apply_action(doc, action) {
                    Ok(history_id) => ActionOutcome::Applied { history_id },
                    Err(err) => {
                        warn!("action {} ({} on {}) failed: {}", index + 1, action.action_type, action.target, err);
                        failed = true;
                        ActionOutcome::Failed(err)
                    }
                }
            };
            reports.push(ActionReport { index, action: action.clone(), outcome });
        }
        reports
    }

    /// Saga: on the first failure, restore the snapshots of the Actions
    /// already applied, newest first. Nothing reaches the ledger unless the
    /// whole batch succeeds.
    fn apply_atomic(&mut self, doc: &mut dyn Document, actions: &[Action]) -> Vec<ActionReport> {
        let mut applied: Vec<Option<UndoSnapshot>> = Vec::new();
        let mut failure: Option<ActionError> = None;

        for (index, action) in actions.iter().enumerate() {
            match self.run(doc, action) {
                Ok(snapshot) => applied.push(snapshot),
                Err(err) => {
                    warn!("action {} ({} on {}) failed; rolling back", index + 1, action.action_type, action.target);
                    failure = Some(err);
                    break;
                }
            }
        }

        let Some(err) = failure else {
            return actions
                .iter()
                .zip(applied)
                .enumerate()
                .map(|(index, (action, snapshot))| ActionReport {
                    index,
                    action: action.clone(),
                    outcome: ActionOutcome::Applied { history_id: self.ledger.record(action, snapshot) },
                })
                .collect();
        };

        let mut rolled: Vec<ActionOutcome> = Vec::with_capacity(applied.len());
        for snapshot in applied.iter().rev() {
            let outcome = match snapshot {
                None => ActionOutcome::NotRolledBack { reason: "the action cannot be undone".to_string() },
                Some(snapshot) => match undo::restore(doc, snapshot, false) {
                    Ok(()) => ActionOutcome::RolledBack,
                    Err(e) => ActionOutcome::NotRolledBack { reason: e.to_string() },
                },
            };
            rolled.push(outcome);
        }
        rolled.reverse();

        let mut outcomes = rolled;
        outcomes.push(ActionOutcome::Failed(err));
        outcomes.resize(actions.len(), ActionOutcome::Skipped);

        actions
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (action, outcome))| ActionReport { index, action: action.clone(), outcome })
            .collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridpilot_engine::Workbook;

    #[test]
    fn test_stage_initializes_preview() {
        let mut session = Session::default();
        session.stage(vec![Action::new("bold", "A1", ""), Action::new("italic", "A1", "")]);
        assert_eq!(session.preview().selections(), &[true, true]);
        session.discard();
        assert!(session.pending().is_empty());
        assert!(session.preview().is_empty());
    }

    #[test]
    fn test_apply_records_only_undoable() {
        let mut wb = Workbook::new();
        let mut session = Session::default();
        assert!(session.apply_action(&mut wb, &Action::new("values", "A1", "5")).unwrap().is_some());
        assert!(session.apply_action(&mut wb, &Action::new("freezePanes", "B2", "")).unwrap().is_none());
        assert_eq!(session.ledger().len(), 1);
    }

    #[test]
    fn test_failed_action_is_not_recorded() {
        let mut wb = Workbook::new();
        let mut session = Session::default();
        assert!(session.apply_action(&mut wb, &Action::new("copy", "A1", "")).is_err());
        assert!(session.ledger().is_empty());
    }

    #[test]
    fn test_apply_selected_skips_deselected() {
        let mut wb = Workbook::new();
        let mut session = Session::default();
        session.stage(vec![
            Action::new("values", "A1", "1"),
            Action::new("values", "A2", "2"),
            Action::new("values", "A3", "3"),
        ]);
        session.preview_mut().toggle(1);
        let report = session.apply_selected(&mut wb, BatchPolicy::ContinueOnError);
        assert_eq!(report.total(), 2);
        assert_eq!(wb.cell_text("A2"), "");
        assert_eq!(wb.cell_text("A3"), "3");
        assert!(session.pending().is_empty());
        assert!(session.preview().is_empty());
    }

    #[test]
    fn test_continue_and_stop_policies() {
        let batch = vec![
            Action::new("values", "A1", "1"),
            Action::new("values", "", "x"),
            Action::new("values", "A3", "3"),
        ];

        let mut wb = Workbook::new();
        let mut session = Session::default();
        let report = session.apply_batch(&mut wb, &batch, BatchPolicy::ContinueOnError);
        assert_eq!(report.summary(), "Applied 2 of 3 actions (1 failed)");
        assert_eq!(wb.cell_text("A3"), "3");

        let mut wb = Workbook::new();
        let mut session = Session::default();
        let report = session.apply_batch(&mut wb, &batch, BatchPolicy::StopOnError);
        assert_eq!(report.summary(), "Applied 1 of 3 actions (1 failed, 1 skipped)");
        assert_eq!(wb.cell_text("A3"), "");
        assert_eq!(session.ledger().len(), 1);
    }

    #[test]
    fn test_atomic_rolls_back() {
        let mut wb = Workbook::new();
        wb.set_cell("A1", "orig").unwrap();
        let mut session = Session::default();
        let batch = vec![
            Action::new("values", "A1", "new"),
            Action::new("bold", "A1", ""),
            Action::new("copy", "B1", ""),
            Action::new("values", "A3", "3"),
        ];
        let report = session.apply_batch(&mut wb, &batch, BatchPolicy::Atomic);
        let labels: Vec<&str> = report.reports.iter().map(|r| r.outcome.label()).collect();
        assert_eq!(labels, vec!["rolled back", "rolled back", "failed", "skipped"]);
        assert_eq!(wb.cell_text("A1"), "orig");
        assert!(!wb.cell_format("A1").bold);
        assert_eq!(wb.cell_text("A3"), "");
        assert!(session.ledger().is_empty());
    }

    #[test]
    fn test_atomic_reports_unrollbackable() {
        let mut wb = Workbook::new();
        let mut session = Session::default();
        let batch = vec![Action::new("chart", "A1:B2", ""), Action::new("values", "", "x")];
        let report = session.apply_batch(&mut wb, &batch, BatchPolicy::Atomic);
        assert!(matches!(report.reports[0].outcome, ActionOutcome::NotRolledBack { .. }));
        assert_eq!(wb.charts().len(), 1);
    }

    #[test]
    fn test_atomic_success_records_in_order() {
        let mut wb = Workbook::new();
        let mut session = Session::default();
        let batch = vec![Action::new("values", "A1", "1"), Action::new("values", "A2", "2")];
        let report = session.apply_batch(&mut wb, &batch, BatchPolicy::Atomic);
        assert!(report.is_success());
        assert_eq!(session.ledger().len(), 2);
        assert_eq!(session.ledger().latest().unwrap().target, "A2");
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut wb = Workbook::new();
        let mut session = Session::default();
        session.apply_action(&mut wb, &Action::new("values", "A1", "1")).unwrap();
        session.stage(vec![Action::new("bold", "A1", "")]);
        session.clear();
        assert!(session.ledger().is_empty());
        assert!(session.pending().is_empty());
        assert_eq!(session.undo(&mut wb).unwrap(), UndoOutcome::NothingToUndo);
    }
}
