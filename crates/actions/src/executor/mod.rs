//! Action executor.
//!
//! [`Executor::plan`] validates an Action, performs every read it needs and
//! decodes its payload into host mutations; [`Executor::commit`] enqueues
//! them and syncs. Planning never mutates the document, so a caller can
//! capture undo state between the two.

mod content;
mod objects;
mod structure;
mod style;

pub use content::fan_out;

use log::debug;

use gridpilot_core::Region;
use gridpilot_engine::{Document, HostError, Mutation, RangeData};

use crate::action::Action;
use crate::catalog::ActionKind;
use crate::error::ActionError;

/// Regions above this many cells are narrowed to the populated area before
/// they are read or captured.
pub const LARGE_REGION_CELLS: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Default top-left anchor for charts without a `position`.
    pub chart_anchor: String,
    /// Reject malformed `values` payloads instead of writing them literally.
    pub strict_payloads: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            chart_anchor: "H2".to_string(),
            strict_payloads: false,
        }
    }
}

/// The mutations for one Action and the region whose prior state undo
/// needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub kind: ActionKind,
    /// Resolved, sheet-qualified target.
    pub target: Region,
    pub mutations: Vec<Mutation>,
    /// Cells the mutations write. `None` when the kind is not undoable or
    /// nothing is written.
    pub capture: Option<Region>,
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Handler output before the undo policy is applied.
pub(crate) struct Staged {
    mutations: Vec<Mutation>,
    written: Option<Region>,
}

impl Staged {
    /// Mutations that write the cells of `region`.
    fn write(region: Region, mutations: Vec<Mutation>) -> Self {
        Self { mutations, written: Some(region) }
    }

    /// Mutations with no cell footprint worth capturing.
    fn effect(mutations: Vec<Mutation>) -> Self {
        Self { mutations, written: None }
    }

    fn noop() -> Self {
        Self { mutations: Vec::new(), written: None }
    }
}

/// Everything a handler may consult while planning.
pub(crate) struct Ctx<'a> {
    pub doc: &'a mut dyn Document,
    pub action: &'a Action,
    pub kind: &'a ActionKind,
    pub target: Region,
    pub config: &'a ExecutorConfig,
}

impl<'a> Ctx<'a> {
    pub fn tag(&self) -> &'a str {
        self.kind.tag()
    }

    pub fn data(&self) -> &'a str {
        &self.action.data
    }

    pub fn payload_error(&self, reason: impl Into<String>) -> ActionError {
        ActionError::payload(self.kind.tag(), reason)
    }

    pub fn resolve(&self, address: &str) -> Result<Region, ActionError> {
        resolve(&*self.doc, address)
    }

    /// Resolve `address`, binding it to the target's sheet when it names none.
    pub fn resolve_near_target(&self, address: &str) -> Result<Region, ActionError> {
        let region = self.resolve(address)?;
        if address.contains('!') {
            Ok(region)
        } else {
            Ok(region.with_sheet(self.target.sheet.clone()))
        }
    }

    /// The `source` region; an error when the action carries none.
    pub fn source(&self) -> Result<Region, ActionError> {
        match self.optional_source()? {
            Some(source) => Ok(source),
            None => Err(ActionError::MissingSource { kind: self.tag().to_string() }),
        }
    }

    pub fn optional_source(&self) -> Result<Option<Region>, ActionError> {
        match self.action.source.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => self.resolve(address).map(Some),
            _ => Ok(None),
        }
    }

    pub fn load(&mut self, region: &Region) -> Result<RangeData, ActionError> {
        self.doc.load(region).map_err(execution)
    }

    /// Narrow a large region to the sheet's populated area. `None` when the
    /// sheet has nothing populated inside it.
    pub fn footprint(&mut self, region: &Region) -> Result<Option<Region>, ActionError> {
        if region.cell_count() <= LARGE_REGION_CELLS {
            return Ok(Some(region.clone()));
        }
        let used = self.doc.used_range(region.sheet.as_deref()).map_err(execution)?;
        Ok(used.and_then(|used| region.intersect(&used)))
    }

    /// [`Ctx::footprint`] of the target.
    pub fn target_footprint(&mut self) -> Result<Option<Region>, ActionError> {
        let target = self.target.clone();
        self.footprint(&target)
    }

    /// Anchor a block of `rows` × `cols` at the target's first cell.
    pub fn anchored(&self, rows: usize, cols: usize) -> Result<Region, ActionError> {
        let region = self.target.first_cell().resized(rows, cols);
        if region.rows() != rows || region.cols() != cols {
            return Err(self.payload_error(format!(
                "a {rows}x{cols} block does not fit at {}",
                self.target.first_cell()
            )));
        }
        Ok(region)
    }
}

pub(crate) fn execution(err: HostError) -> ActionError {
    ActionError::Execution(err.to_string())
}

pub(crate) fn resolve(doc: &dyn Document, address: &str) -> Result<Region, ActionError> {
    doc.resolve(address).map_err(|err| ActionError::RegionResolution {
        address: address.trim().to_string(),
        reason: match err {
            HostError::InvalidAddress { reason, .. } => reason,
            other => other.to_string(),
        },
    })
}

#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Validate `action`, read what it needs and produce its mutations.
    /// The document is read (and its queue flushed) but not modified.
    pub fn plan(&self, doc: &mut dyn Document, action: &Action) -> Result<Plan, ActionError> {
        let address = action.target.trim();
        if address.is_empty() {
            return Err(ActionError::InvalidTarget);
        }
        let target = resolve(&*doc, address)?;
        let kind = action.kind();

        let mut ctx = Ctx {
            doc,
            action,
            kind: &kind,
            target: target.clone(),
            config: &self.config,
        };
        let staged = dispatch(&mut ctx)?;

        let capture = match staged.written {
            Some(region) if kind.undo_policy().captures() && !staged.mutations.is_empty() => Some(region),
            _ => None,
        };
        debug!(
            "planned {} on {}: {} mutation(s), capture {:?}",
            kind,
            target,
            staged.mutations.len(),
            capture.as_ref().map(|r| r.to_string())
        );
        Ok(Plan {
            kind,
            target,
            mutations: staged.mutations,
            capture,
        })
    }

    /// Enqueue the plan's mutations and sync. Host failures carry the host
    /// message verbatim.
    pub fn commit(&self, doc: &mut dyn Document, plan: &Plan) -> Result<(), ActionError> {
        if plan.is_noop() {
            return Ok(());
        }
        for mutation in &plan.mutations {
            doc.enqueue(mutation.clone());
        }
        doc.sync().map_err(execution)?;
        debug!("committed {} on {}", plan.kind, plan.target);
        Ok(())
    }

    /// Plan and commit one Action.
    pub fn execute(&self, doc: &mut dyn Document, action: &Action) -> Result<(), ActionError> {
        let plan = self.plan(doc, action)?;
        self.commit(doc, &plan)
    }
}

fn dispatch(ctx: &mut Ctx<'_>) -> Result<Staged, ActionError> {
    use gridpilot_engine::{Axis, ClearScope};

    let kind = ctx.kind.clone();
    match kind {
        ActionKind::Formula => content::formula(ctx),
        ActionKind::Values => content::values(ctx),
        ActionKind::FillDown => content::fill_copy(ctx, Axis::Rows),
        ActionKind::FillRight => content::fill_copy(ctx, Axis::Columns),
        ActionKind::Autofill => content::autofill(ctx),
        ActionKind::FillSeries => content::fill_series(ctx),
        ActionKind::Transpose => content::transpose(ctx),
        ActionKind::FindReplace => content::find_replace(ctx),
        ActionKind::RemoveDuplicates => content::remove_duplicates(ctx),
        ActionKind::Trim => content::transform_text(ctx, content::collapse_whitespace),
        ActionKind::UpperCase => content::transform_text(ctx, |s| s.to_uppercase()),
        ActionKind::LowerCase => content::transform_text(ctx, |s| s.to_lowercase()),
        ActionKind::ProperCase => content::transform_text(ctx, content::proper_case),
        ActionKind::SplitText => content::split_text(ctx),
        ActionKind::ClearContents => style::clear(ctx, ClearScope::Contents),
        ActionKind::Hyperlink => content::hyperlink(ctx),
        ActionKind::Sort => content::sort(ctx),

        ActionKind::Copy => style::copy(ctx),
        ActionKind::Clear => style::clear(ctx, ClearScope::All),
        ActionKind::ClearFormats => style::clear(ctx, ClearScope::Formats),
        ActionKind::Format => style::format(ctx),
        ActionKind::Bold
        | ActionKind::Italic
        | ActionKind::Underline
        | ActionKind::Strikethrough
        | ActionKind::WrapText => style::toggle(ctx),
        ActionKind::FillColor | ActionKind::FontColor => style::color(ctx),
        ActionKind::FontSize => style::font_size(ctx),
        ActionKind::FontName => style::font_name(ctx),
        ActionKind::NumberFormat
        | ActionKind::CurrencyFormat
        | ActionKind::PercentFormat
        | ActionKind::DateFormat => style::number_format(ctx),
        ActionKind::Border => style::border(ctx),
        ActionKind::Align | ActionKind::VerticalAlign => style::align(ctx),

        ActionKind::ConditionalFormat => objects::conditional_format(ctx),
        ActionKind::ColorScale => objects::color_scale(ctx),
        ActionKind::DataBar => objects::data_bar(ctx),
        ActionKind::IconSet => objects::icon_set(ctx),
        ActionKind::ClearConditionalFormats => objects::clear_conditional_formats(ctx),

        ActionKind::Chart => objects::chart(ctx),
        ActionKind::Table => objects::table(ctx),
        ActionKind::Pivot => objects::pivot(ctx),
        ActionKind::NamedRange => objects::named_range(ctx),
        ActionKind::Validation => objects::list_validation(ctx),
        ActionKind::NumberValidation => objects::number_validation(ctx),
        ActionKind::ClearValidation => objects::clear_validation(ctx),
        ActionKind::Filter => objects::filter(ctx),
        ActionKind::ClearFilter => objects::clear_filter(ctx),
        ActionKind::Comment => objects::comment(ctx),

        ActionKind::InsertRows => structure::insert(ctx, Axis::Rows),
        ActionKind::InsertColumns => structure::insert(ctx, Axis::Columns),
        ActionKind::DeleteRows => structure::delete(ctx, Axis::Rows),
        ActionKind::DeleteColumns => structure::delete(ctx, Axis::Columns),
        ActionKind::HideRows => structure::hidden(ctx, Axis::Rows, true),
        ActionKind::HideColumns => structure::hidden(ctx, Axis::Columns, true),
        ActionKind::UnhideRows => structure::hidden(ctx, Axis::Rows, false),
        ActionKind::UnhideColumns => structure::hidden(ctx, Axis::Columns, false),
        ActionKind::ColumnWidth => structure::size(ctx, Axis::Columns),
        ActionKind::RowHeight => structure::size(ctx, Axis::Rows),
        ActionKind::AutoFit => structure::auto_fit(ctx),
        ActionKind::Merge => structure::merge(ctx, true),
        ActionKind::Unmerge => structure::merge(ctx, false),
        ActionKind::FreezePanes => structure::freeze(ctx),
        ActionKind::Unfreeze => structure::unfreeze(ctx),

        ActionKind::Protect => structure::protect(ctx, true),
        ActionKind::Unprotect => structure::protect(ctx, false),
        ActionKind::TabColor => structure::tab_color(ctx),

        ActionKind::Unknown(_) => content::literal(ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridpilot_engine::Workbook;

    fn run(wb: &mut Workbook, action: Action) -> Result<(), ActionError> {
        Executor::default().execute(wb, &action)
    }

    #[test]
    fn test_empty_target_is_invalid() {
        let mut wb = Workbook::new();
        for target in ["", "   "] {
            let err = run(&mut wb, Action::new("values", target, "1")).unwrap_err();
            assert_eq!(err, ActionError::InvalidTarget);
        }
    }

    #[test]
    fn test_unresolvable_target() {
        let mut wb = Workbook::new();
        let err = run(&mut wb, Action::new("values", "ZZZZ99", "1")).unwrap_err();
        assert!(matches!(err, ActionError::RegionResolution { ref address, .. } if address == "ZZZZ99"));

        let err = run(&mut wb, Action::new("values", "Missing!A1", "1")).unwrap_err();
        assert!(matches!(err, ActionError::RegionResolution { .. }));
    }

    #[test]
    fn test_host_failure_is_execution_with_host_message() {
        let mut wb = Workbook::new();
        run(&mut wb, Action::new("protect", "A1", "")).unwrap();
        let err = run(&mut wb, Action::new("values", "A1", "5")).unwrap_err();
        assert_eq!(err, ActionError::Execution("sheet \"Sheet1\" is protected".into()));
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let mut wb = Workbook::new();
        let plan = Executor::default().plan(&mut wb, &Action::new("values", "A1", "[1,2]")).unwrap();
        assert_eq!(wb.cell_text("A1"), "");
        assert_eq!(wb.pending(), 0);
        assert_eq!(plan.capture.unwrap().to_string(), "Sheet1!A1:B1");
        assert_eq!(plan.mutations.len(), 1);
    }

    #[test]
    fn test_capture_only_for_undoable_kinds() {
        let mut wb = Workbook::new();
        wb.set_grid("A1", &[&["a", "1"], &["b", "2"]]).unwrap();
        let executor = Executor::default();
        let chart = executor.plan(&mut wb, &Action::new("chart", "A1:B2", "")).unwrap();
        assert!(chart.capture.is_none());
        assert!(!chart.is_noop());
        let bold = executor.plan(&mut wb, &Action::new("bold", "A1:B2", "")).unwrap();
        assert_eq!(bold.capture.unwrap().a1(), "A1:B2");
    }

    #[test]
    fn test_footprint_narrows_whole_columns() {
        let mut wb = Workbook::new();
        wb.set_grid("A1", &[&["x"], &["y"], &["z"]]).unwrap();
        let plan = Executor::default().plan(&mut wb, &Action::new("upperCase", "A:A", "")).unwrap();
        assert_eq!(plan.capture.unwrap().a1(), "A1:A3");
    }
}
