// Property-based tests for selection, history and formula fan-out.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;

use gridpilot_actions::executor::fan_out;
use gridpilot_actions::undo;
use gridpilot_actions::*;
use gridpilot_core::shift_formula;
use gridpilot_engine::Workbook;

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn config_64() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Cell input: numbers, words, formulas, blanks, and text that looks numeric.
fn arb_input() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => r"-?[0-9]{1,6}(\.[0-9]{1,2})?",
        2 => r"[a-zA-Z ]{1,12}",
        1 => r"=SUM\([A-D][1-9]:[A-D][1-9]\)",
        1 => r"0[0-9]{1,4}",
        1 => Just(String::new()),
    ]
}

/// A relative or absolute reference with optional `$` markers.
fn arb_reference() -> impl Strategy<Value = (String, bool, bool)> {
    (prop::bool::ANY, "[A-H]", prop::bool::ANY, 1usize..50).prop_map(|(abs_col, col, abs_row, row)| {
        let text = format!("{}{}{}{}", if abs_col { "$" } else { "" }, col, if abs_row { "$" } else { "" }, row);
        (text, abs_col, abs_row)
    })
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn subset_length_matches_true_count(mask in prop::collection::vec(prop::bool::ANY, 0..40)) {
        let items: Vec<usize> = (0..mask.len()).collect();
        let subset = selected_subset(&items, &mask);
        prop_assert_eq!(subset.len(), mask.iter().filter(|s| **s).count());
        prop_assert_eq!(has_any_selected(&mask), !subset.is_empty());
    }

    #[test]
    fn subset_preserves_order(mask in prop::collection::vec(prop::bool::ANY, 0..40)) {
        let items: Vec<usize> = (0..mask.len()).collect();
        let subset = selected_subset(&items, &mask);
        prop_assert!(subset.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(subset.iter().all(|i| mask[*i]));
    }

    #[test]
    fn toggles_never_grow_the_mask(n in 0usize..20, toggles in prop::collection::vec(0usize..30, 0..30)) {
        let mut state = PreviewState::new();
        state.initialize(n);
        for t in toggles {
            state.toggle(t);
            state.toggle_expanded(t);
        }
        prop_assert_eq!(state.len(), n);
        prop_assert!(state.selected_count() <= n);
        prop_assert!(state.expanded().map_or(true, |e| e < n));
    }
}

// ---------------------------------------------------------------------------
// History ledger
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_64())]

    #[test]
    fn record_prepends_and_stays_bounded(capacity in 1usize..8, count in 0usize..20) {
        let mut wb = Workbook::new();
        let mut ledger = HistoryLedger::with_capacity(capacity);
        for i in 0..count {
            let target = format!("A{}", i + 1);
            let snap = undo::capture(&mut wb, &target, false, 10);
            let id = ledger.record(&Action::new("values", target.as_str(), "1"), snap);
            let id = id.expect("snapshot was captured");
            prop_assert_eq!(&ledger.latest().unwrap().id, &id);
            prop_assert!(ledger.len() <= capacity);
        }
        prop_assert_eq!(ledger.len(), count.min(capacity));
    }

    #[test]
    fn undo_removes_exactly_the_head(count in 1usize..8) {
        let mut wb = Workbook::new();
        let mut ledger = HistoryLedger::new();
        for i in 0..count {
            let target = format!("B{}", i + 1);
            let snap = undo::capture(&mut wb, &target, false, 10);
            ledger.record(&Action::new("values", target.as_str(), "x"), snap);
        }
        let second = ledger.get(1).map(|e| e.id.clone());
        let outcome = ledger.undo_most_recent(&mut wb, true).unwrap();
        prop_assert!(matches!(outcome, UndoOutcome::Undone(_)));
        prop_assert_eq!(ledger.len(), count - 1);
        prop_assert_eq!(ledger.latest().map(|e| e.id.clone()), second);
    }

    #[test]
    fn capture_write_restore_is_identity(grid in prop::collection::vec(prop::collection::vec(arb_input(), 3), 1..5)) {
        let mut wb = Workbook::new();
        let rows: Vec<Vec<&str>> = grid.iter().map(|r| r.iter().map(String::as_str).collect()).collect();
        let refs: Vec<&[&str]> = rows.iter().map(Vec::as_slice).collect();
        wb.set_grid("A1", &refs).unwrap();
        let address = format!("A1:C{}", grid.len());
        let cells: Vec<String> = (1..=grid.len())
            .flat_map(|r| ["A", "B", "C"].map(|c| format!("{c}{r}")))
            .collect();
        let before: Vec<String> = cells.iter().map(|c| wb.cell_text(c)).collect();

        let mut session = Session::default();
        session.apply_action(&mut wb, &Action::new("values", address.as_str(), "\"overwritten\"")).unwrap();
        session.apply_action(&mut wb, &Action::new("clear", address.as_str(), "")).unwrap();
        session.undo(&mut wb).unwrap();
        session.undo(&mut wb).unwrap();

        let after: Vec<String> = cells.iter().map(|c| wb.cell_text(c)).collect();
        prop_assert_eq!(before, after);
    }
}

// ---------------------------------------------------------------------------
// Formula fan-out
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    #[test]
    fn fan_out_shape_and_anchor(rows in 1usize..6, cols in 1usize..6, (reference, _, _) in arb_reference()) {
        let template = format!("={reference}*2");
        let grid = fan_out(&template, rows, cols);
        prop_assert_eq!(grid.len(), rows);
        prop_assert!(grid.iter().all(|r| r.len() == cols));
        prop_assert_eq!(&grid[0][0], &template);
    }

    #[test]
    fn fan_out_shifts_only_relative_parts(offset in 1usize..5, (reference, abs_col, abs_row) in arb_reference()) {
        let template = format!("={reference}");
        let down = fan_out(&template, offset + 1, 1);
        let across = fan_out(&template, 1, offset + 1);
        prop_assert_eq!(down[offset][0] == template, abs_row);
        prop_assert_eq!(across[0][offset] == template, abs_col);
        prop_assert_eq!(&down[offset][0], &shift_formula(&template, offset as i64, 0));

        let block = fan_out(&template, offset + 1, 3);
        for (i, row) in block.iter().enumerate() {
            let expected = shift_formula(&template, i as i64, 0);
            prop_assert!(row.iter().all(|cell| *cell == expected));
        }
    }
}
