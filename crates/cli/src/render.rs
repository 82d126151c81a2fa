// Human and JSON renderings of Actions, batch reports and the catalog.
//
// JSON output is exactly one value on stdout.

use serde_json::{json, Value};

use gridpilot_actions::catalog::ActionKind;
use gridpilot_actions::{Action, ActionOutcome, BatchReport, HistoryEntry, TaskType};

/// Numbered preview lines, one per Action, with selection marks.
pub fn action_list(actions: &[Action], selections: &[bool]) -> String {
    let mut out = String::new();
    for (i, action) in actions.iter().enumerate() {
        let mark = if selections.get(i).copied().unwrap_or(true) { "[x]" } else { "[ ]" };
        out.push_str(&format!("{:>3}. {} {}\n", i, mark, action.describe()));
        let data = action.data.trim();
        if !data.is_empty() {
            out.push_str(&format!("        {}\n", truncate(data, 72)));
        }
    }
    out
}

pub fn actions_json(explanation: &str, actions: &[Action], skipped: usize) -> Value {
    json!({
        "explanation": explanation,
        "actions": actions,
        "skipped": skipped,
    })
}

pub fn report_text(report: &BatchReport) -> String {
    let mut out = String::new();
    for r in &report.reports {
        let detail = match &r.outcome {
            ActionOutcome::Failed(err) => format!(": {}", err),
            ActionOutcome::NotRolledBack { reason } => format!(": {}", reason),
            _ => String::new(),
        };
        out.push_str(&format!(
            "{:>3}. {:<15} {}{}\n",
            r.index,
            r.outcome.label(),
            r.action.describe(),
            detail
        ));
    }
    out.push_str(&report.summary());
    out.push('\n');
    out
}

pub fn report_json(report: &BatchReport, undone: &[HistoryEntry], history: &[&HistoryEntry]) -> Value {
    let results: Vec<Value> = report
        .reports
        .iter()
        .map(|r| {
            let mut item = json!({
                "index": r.index,
                "type": r.action.action_type,
                "target": r.action.target,
                "outcome": r.outcome.label(),
            });
            match &r.outcome {
                ActionOutcome::Applied { history_id } => item["historyId"] = json!(history_id),
                ActionOutcome::Failed(err) => item["error"] = json!(err.to_string()),
                ActionOutcome::NotRolledBack { reason } => item["error"] = json!(reason),
                _ => {}
            }
            item
        })
        .collect();

    json!({
        "policy": report.policy,
        "summary": report.summary(),
        "success": report.is_success(),
        "applied": report.applied(),
        "failed": report.failed(),
        "results": results,
        "undone": undone.iter().map(entry_json).collect::<Vec<_>>(),
        "history": history.iter().map(|e| entry_json(e)).collect::<Vec<_>>(),
    })
}

/// History rendering uses id, type, target and time only.
pub fn entry_json(entry: &HistoryEntry) -> Value {
    json!({
        "id": entry.id,
        "type": entry.action_type,
        "target": entry.target,
        "timestamp": entry.timestamp,
    })
}

pub fn entry_line(entry: &HistoryEntry) -> String {
    let when = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(entry.timestamp)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    format!("{} {} {} → {}", when, entry.id, entry.action_type, entry.target)
}

pub fn catalog_text() -> String {
    let mut out = String::new();
    let mut current = None;
    for info in ActionKind::catalog() {
        if current != Some(info.category) {
            out.push_str(&format!("\n{}\n", info.category.label()));
            current = Some(info.category);
        }
        let undo = if info.undo.captures() { "" } else { "  (no undo)" };
        out.push_str(&format!("  {} {:<24} {}{}\n", info.icon, info.tag, info.label, undo));
    }
    out.trim_start().to_string()
}

pub fn catalog_json() -> Value {
    let kinds: Vec<Value> = ActionKind::catalog()
        .iter()
        .map(|info| {
            json!({
                "tag": info.tag,
                "label": info.label,
                "icon": info.icon,
                "category": info.category,
                "undo": info.undo,
                "aliases": info.aliases,
            })
        })
        .collect();
    Value::Array(kinds)
}

pub fn classify_json(task: TaskType) -> Value {
    json!({
        "task": task,
        "guidance": task.guidance(),
    })
}

fn truncate(s: &str, max: usize) -> String {
    let first_line = s.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max && first_line.len() == s.len() {
        return s.to_string();
    }
    let cut: String = first_line.chars().take(max).collect();
    format!("{}…", cut)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_list_marks_selection() {
        let actions = vec![Action::new("bold", "A1", ""), Action::new("values", "B1", "42")];
        let text = action_list(&actions, &[true, false]);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("  0. [x]"));
        assert!(lines[1].starts_with("  1. [ ]"));
        assert_eq!(lines[2].trim(), "42");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 4), "abcd…");
        assert_eq!(truncate("one\ntwo", 10), "one…");
    }

    #[test]
    fn test_catalog_json_has_every_kind() {
        let value = catalog_json();
        let kinds = value.as_array().unwrap();
        assert_eq!(kinds.len(), ActionKind::catalog().len());
        assert!(kinds.iter().any(|k| k["tag"] == "values" && k["undo"] == "cells"));
    }
}
