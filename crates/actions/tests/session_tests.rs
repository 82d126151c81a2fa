// End-to-end: Actions through a Session against the in-memory workbook.

use gridpilot_actions::*;
use gridpilot_engine::{Document, Workbook};

fn texts(wb: &Workbook, cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| wb.cell_text(c)).collect()
}

#[test]
fn values_then_undo_restores_previous_content() {
    let mut wb = Workbook::new();
    wb.set_grid("A1", &[&["old", "=1+1"], &["", "keep"]]).unwrap();
    let before = texts(&wb, &["A1", "B1", "A2", "B2"]);

    let mut session = Session::default();
    let id = session
        .apply_action(&mut wb, &Action::new("values", "A1:B2", r#"[["x",1],["y",2]]"#))
        .unwrap()
        .expect("values is undoable");
    assert_eq!(texts(&wb, &["A1", "B1", "A2", "B2"]), vec!["x", "1", "y", "2"]);
    assert_eq!(session.ledger().latest().unwrap().id, id);

    match session.undo(&mut wb).unwrap() {
        UndoOutcome::Undone(entry) => {
            assert_eq!(entry.id, id);
            assert_eq!(entry.action_type, "values");
            assert_eq!(entry.undo_data.address, "Sheet1!A1:B2");
        }
        other => panic!("expected an undo, got {other:?}"),
    }
    assert_eq!(texts(&wb, &["A1", "B1", "A2", "B2"]), before);
    assert_eq!(session.undo(&mut wb).unwrap(), UndoOutcome::NothingToUndo);
}

#[test]
fn formula_fills_relative_references() {
    let mut wb = Workbook::new();
    let mut session = Session::default();
    session.apply_action(&mut wb, &Action::new("formula", "C1:C3", "=SUM(B1:B9)")).unwrap();
    assert_eq!(texts(&wb, &["C1", "C2", "C3"]), vec!["=SUM(B1:B9)", "=SUM(B2:B10)", "=SUM(B3:B11)"]);

    session.apply_action(&mut wb, &Action::new("formula", "D1:D3", "=SUM($B$1:$B$9)")).unwrap();
    assert_eq!(texts(&wb, &["D1", "D3"]), vec!["=SUM($B$1:$B$9)", "=SUM($B$1:$B$9)"]);
}

#[test]
fn undo_conflicts_after_external_edit() {
    let mut wb = Workbook::new();
    let mut session = Session::default();
    session.apply_action(&mut wb, &Action::new("values", "A1", "mine")).unwrap();
    wb.set_cell("A1", "theirs").unwrap();

    let err = session.undo(&mut wb).unwrap_err();
    assert!(matches!(err, UndoError::Conflict { .. }));
    assert_eq!(session.ledger().len(), 1);
    assert_eq!(wb.cell_text("A1"), "theirs");

    // Without verification the same entry restores
    let mut relaxed = Session::new(SessionConfig { verify_before_undo: false, ..SessionConfig::default() });
    relaxed.apply_action(&mut wb, &Action::new("values", "B1", "mine")).unwrap();
    wb.set_cell("B1", "theirs").unwrap();
    assert!(matches!(relaxed.undo(&mut wb).unwrap(), UndoOutcome::Undone(_)));
    assert_eq!(wb.cell_text("B1"), "");
}

#[test]
fn formatting_undo_restores_formats() {
    let mut wb = Workbook::new();
    wb.set_cell("A1", "title").unwrap();
    let mut session = Session::default();
    session
        .apply_action(&mut wb, &Action::new("format", "A1", r##"{"bold":true,"fillColor":"#FFFF00"}"##))
        .unwrap();
    assert!(wb.cell_format("A1").bold);
    session.undo(&mut wb).unwrap();
    let f = wb.cell_format("A1");
    assert!(!f.bold);
    assert!(f.fill_color.is_none());
    assert_eq!(wb.cell_text("A1"), "title");
}

#[test]
fn history_is_bounded_newest_first() {
    let mut wb = Workbook::new();
    let mut session = Session::new(SessionConfig { history_capacity: 2, ..SessionConfig::default() });
    for (i, target) in ["A1", "A2", "A3"].iter().enumerate() {
        session.apply_action(&mut wb, &Action::new("values", *target, i.to_string())).unwrap();
    }
    let targets: Vec<&str> = session.ledger().entries().map(|e| e.target.as_str()).collect();
    assert_eq!(targets, vec!["A3", "A2"]);

    session.undo(&mut wb).unwrap();
    session.undo(&mut wb).unwrap();
    assert_eq!(session.undo(&mut wb).unwrap(), UndoOutcome::NothingToUndo);
    // The evicted Action stays applied
    assert_eq!(texts(&wb, &["A1", "A2", "A3"]), vec!["0", "", ""]);
}

#[test]
fn markup_to_applied_batch() {
    let reply = r#"Adding a header and a chart.
<action type="values" target="A1:B3">[["Region","Sales"],["East",10],["West",5]]</action>
<action type="bold" target="A1:B1"></action>
<action type="chart" target="A1:B3" chartType="pie" title="Sales"/>
<action type="mystery" target="D1">hello</action>"#;
    let parsed = parse_response(reply);
    assert_eq!(parsed.explanation, "Adding a header and a chart.");

    let mut wb = Workbook::new();
    let mut session = Session::default();
    session.stage(parsed.actions);
    assert_eq!(session.preview().selected_count(), 4);

    let report = session.apply_selected(&mut wb, BatchPolicy::ContinueOnError);
    assert_eq!(report.summary(), "Applied 4 of 4 actions");
    assert!(wb.cell_format("A1").bold);
    assert_eq!(wb.charts().len(), 1);
    // Unknown kinds write the data literally
    assert_eq!(wb.cell_text("D1"), "hello");
    // values, bold and the literal write are undoable; the chart is not
    assert_eq!(report.history_ids().len(), 3);
}

#[test]
fn atomic_batch_rolls_back_on_failure() {
    let mut wb = Workbook::new();
    wb.set_grid("A1", &[&["a"], &["b"]]).unwrap();
    let mut session = Session::default();
    let batch = vec![
        Action::new("upperCase", "A1:A2", ""),
        Action::new("fillColor", "A1:A2", "yellow"),
        Action::new("transpose", "C1", ""),
    ];
    let report = session.apply_batch(&mut wb, &batch, BatchPolicy::Atomic);
    assert!(!report.is_success());
    assert_eq!(report.rolled_back(), 2);
    assert_eq!(texts(&wb, &["A1", "A2"]), vec!["a", "b"]);
    assert!(wb.cell_format("A1").fill_color.is_none());
    assert!(session.ledger().is_empty());
}

#[test]
fn failure_leaves_document_and_history_alone() {
    let mut wb = Workbook::new();
    wb.set_cell("A1", "1").unwrap();
    let mut session = Session::default();
    let err = session.apply_action(&mut wb, &Action::new("fontSize", "A1", "huge")).unwrap_err();
    assert!(matches!(err, ActionError::PayloadDecode { .. }));
    assert_eq!(wb.pending(), 0);
    assert!(session.ledger().is_empty());
}
