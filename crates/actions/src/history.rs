//! Bounded, newest-first ledger of undoable Actions.

use std::collections::VecDeque;
use std::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use ulid::{Generator, Ulid};

use gridpilot_engine::Document;

use crate::action::Action;
use crate::error::UndoError;
use crate::undo::{self, UndoSnapshot};

pub const DEFAULT_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub target: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub undo_data: UndoSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UndoOutcome {
    NothingToUndo,
    /// The restored entry, now removed from the ledger.
    Undone(HistoryEntry),
}

pub struct HistoryLedger {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    ids: Generator,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            ids: Generator::new(),
        }
    }

    /// Prepend an entry for `action`. Returns the new id, or `None` (and
    /// records nothing) when there is no snapshot.
    pub fn record(&mut self, action: &Action, undo_data: Option<UndoSnapshot>) -> Option<String> {
        let undo_data = undo_data?;
        let id = self.next_id();
        self.entries.push_front(HistoryEntry {
            id: id.clone(),
            action_type: action.action_type.clone(),
            target: action.target.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            undo_data,
        });
        self.evict();
        Some(id)
    }

    fn next_id(&mut self) -> String {
        // The generator only fails when the random part overflows within
        // one millisecond
        self.ids.generate().unwrap_or_else(|_| Ulid::new()).to_string()
    }

    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            if let Some(dropped) = self.entries.pop_back() {
                warn!("history full; dropped undo for {} on {}", dropped.action_type, dropped.target);
            }
        }
    }

    /// Restore the newest entry. It is removed only when the restore
    /// succeeds; on failure it stays at the head.
    pub fn undo_most_recent(&mut self, doc: &mut dyn Document, verify: bool) -> Result<UndoOutcome, UndoError> {
        let Some(entry) = self.entries.front() else {
            return Ok(UndoOutcome::NothingToUndo);
        };
        undo::restore(doc, &entry.undo_data, verify)?;
        match self.entries.pop_front() {
            Some(entry) => {
                info!("undid {} on {}", entry.action_type, entry.target);
                Ok(UndoOutcome::Undone(entry))
            }
            None => Ok(UndoOutcome::NothingToUndo),
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shrinking drops the oldest entries.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.evict();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HistoryLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryLedger")
            .field("entries", &self.entries)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridpilot_engine::Workbook;

    fn snapshot(wb: &mut Workbook, address: &str) -> Option<UndoSnapshot> {
        undo::capture(wb, address, false, 1000)
    }

    #[test]
    fn test_record_without_snapshot_is_noop() {
        let mut ledger = HistoryLedger::new();
        assert!(ledger.record(&Action::new("chart", "A1", ""), None).is_none());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_record_prepends_and_evicts() {
        let mut wb = Workbook::new();
        let mut ledger = HistoryLedger::with_capacity(3);
        let mut ids = Vec::new();
        for i in 0..5 {
            let target = format!("A{}", i + 1);
            let id = ledger.record(&Action::new("values", &target, "1"), snapshot(&mut wb, &target)).unwrap();
            assert_eq!(ledger.latest().unwrap().id, id);
            ids.push(id);
        }
        assert_eq!(ledger.len(), 3);
        let targets: Vec<&str> = ledger.entries().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["A5", "A4", "A3"]);

        // Monotonic ids sort in generation order
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(sorted, ids);
    }

    #[test]
    fn test_undo_empty_ledger() {
        let mut wb = Workbook::new();
        let mut ledger = HistoryLedger::new();
        assert_eq!(ledger.undo_most_recent(&mut wb, true).unwrap(), UndoOutcome::NothingToUndo);
    }

    #[test]
    fn test_undo_removes_only_head() {
        let mut wb = Workbook::new();
        let mut ledger = HistoryLedger::new();
        ledger.record(&Action::new("values", "A1", "1"), snapshot(&mut wb, "A1"));
        wb.set_cell("A1", "first").unwrap();
        let second = ledger.record(&Action::new("values", "B1", "2"), snapshot(&mut wb, "B1")).unwrap();
        wb.set_cell("B1", "second").unwrap();
        let first_id = ledger.get(1).unwrap().id.clone();

        match ledger.undo_most_recent(&mut wb, false).unwrap() {
            UndoOutcome::Undone(entry) => assert_eq!(entry.id, second),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(wb.cell_text("B1"), "");
        assert_eq!(wb.cell_text("A1"), "first");
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.latest().unwrap().id, first_id);
    }

    #[test]
    fn test_failed_undo_keeps_entry() {
        let mut wb = Workbook::new();
        let mut ledger = HistoryLedger::new();
        ledger.record(&Action::new("values", "A1", "1"), snapshot(&mut wb, "A1"));
        wb.set_cell("A1", "1").unwrap();
        wb.enqueue(gridpilot_engine::Mutation::SetProtection { sheet: None, protected: true });
        wb.sync().unwrap();

        assert!(ledger.undo_most_recent(&mut wb, false).is_err());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_set_capacity_shrinks() {
        let mut wb = Workbook::new();
        let mut ledger = HistoryLedger::new();
        for target in ["A1", "A2", "A3"] {
            ledger.record(&Action::new("bold", target, ""), snapshot(&mut wb, target));
        }
        ledger.set_capacity(1);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.latest().unwrap().target, "A3");
        ledger.set_capacity(0);
        assert_eq!(ledger.capacity(), 1);
    }

    #[test]
    fn test_entry_json_field_names() {
        let mut wb = Workbook::new();
        let mut ledger = HistoryLedger::new();
        ledger.record(&Action::new("fillColor", "A1", "yellow"), snapshot(&mut wb, "A1"));
        let json = serde_json::to_value(ledger.latest().unwrap()).unwrap();
        assert_eq!(json["type"], "fillColor");
        assert_eq!(json["target"], "A1");
        assert!(json["timestamp"].as_i64().unwrap() > 0);
        assert_eq!(json["undoData"]["address"], "Sheet1!A1");
        assert_eq!(json["id"].as_str().unwrap().len(), 26);
    }
}
