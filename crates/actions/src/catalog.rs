//! The closed set of action kinds.
//!
//! Every kind carries a canonical tag, the aliases models tend to emit, a
//! label and icon for previews, a category and an undo policy.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    // Content
    Formula,
    Values,
    FillDown,
    FillRight,
    Autofill,
    FillSeries,
    Transpose,
    FindReplace,
    RemoveDuplicates,
    Trim,
    UpperCase,
    LowerCase,
    ProperCase,
    SplitText,
    ClearContents,
    Hyperlink,
    Sort,
    // Formatting
    Copy,
    Clear,
    ClearFormats,
    Format,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    FillColor,
    FontColor,
    FontSize,
    FontName,
    NumberFormat,
    CurrencyFormat,
    PercentFormat,
    DateFormat,
    Border,
    Align,
    VerticalAlign,
    WrapText,
    // Conditional formatting
    ConditionalFormat,
    ColorScale,
    DataBar,
    IconSet,
    ClearConditionalFormats,
    // Objects
    Chart,
    Table,
    Pivot,
    NamedRange,
    Validation,
    NumberValidation,
    ClearValidation,
    Filter,
    ClearFilter,
    Comment,
    // Structure
    InsertRows,
    DeleteRows,
    InsertColumns,
    DeleteColumns,
    HideRows,
    HideColumns,
    UnhideRows,
    UnhideColumns,
    ColumnWidth,
    RowHeight,
    AutoFit,
    Merge,
    Unmerge,
    FreezePanes,
    Unfreeze,
    // Sheet
    Protect,
    Unprotect,
    TabColor,
    /// A tag the catalog does not know; keeps the original text.
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Content,
    Formatting,
    Conditional,
    Objects,
    Structure,
    Sheet,
    Other,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Content => "Content",
            Category::Formatting => "Formatting",
            Category::Conditional => "Conditional formatting",
            Category::Objects => "Objects",
            Category::Structure => "Structure",
            Category::Sheet => "Sheet",
            Category::Other => "Other",
        }
    }
}

/// What undo capture records before a kind runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoPolicy {
    /// Values and formulas of the written region.
    Cells,
    /// Values, formulas and formats of the written region.
    CellsAndFormats,
    /// Not undoable; nothing is captured or recorded.
    None,
}

impl UndoPolicy {
    pub fn captures(&self) -> bool {
        !matches!(self, UndoPolicy::None)
    }

    pub fn with_formats(&self) -> bool {
        matches!(self, UndoPolicy::CellsAndFormats)
    }
}

pub struct KindInfo {
    pub kind: ActionKind,
    pub tag: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    pub category: Category,
    pub undo: UndoPolicy,
    pub aliases: &'static [&'static str],
}

macro_rules! kind {
    ($kind:ident, $tag:literal, $label:literal, $icon:literal, $cat:ident, $undo:ident, [$($alias:literal),*]) => {
        KindInfo {
            kind: ActionKind::$kind,
            tag: $tag,
            label: $label,
            icon: $icon,
            category: Category::$cat,
            undo: UndoPolicy::$undo,
            aliases: &[$($alias),*],
        }
    };
}

static CATALOG: [KindInfo; 70] = [
    kind!(Formula, "formula", "Write formula", "ƒ", Content, Cells, ["formulas", "setFormula", "insertFormula"]),
    kind!(Values, "values", "Write values", "✎", Content, Cells, ["value", "setValue", "setValues", "writeValues", "data"]),
    kind!(FillDown, "fillDown", "Fill down", "⤓", Content, CellsAndFormats, []),
    kind!(FillRight, "fillRight", "Fill right", "⇥", Content, CellsAndFormats, []),
    kind!(Autofill, "autofill", "Auto-fill", "⇊", Content, CellsAndFormats, ["autoFillRange", "fill"]),
    kind!(FillSeries, "fillSeries", "Fill series", "№", Content, Cells, ["series"]),
    kind!(Transpose, "transpose", "Transpose", "⤡", Content, Cells, []),
    kind!(FindReplace, "findReplace", "Find and replace", "⇄", Content, Cells, ["replace", "findAndReplace"]),
    kind!(RemoveDuplicates, "removeDuplicates", "Remove duplicates", "⧉", Content, Cells, ["dedupe", "deduplicate"]),
    kind!(Trim, "trim", "Trim whitespace", "✂", Content, Cells, ["trimWhitespace", "cleanWhitespace"]),
    kind!(UpperCase, "upperCase", "Upper case", "A", Content, Cells, ["upper"]),
    kind!(LowerCase, "lowerCase", "Lower case", "a", Content, Cells, ["lower"]),
    kind!(ProperCase, "properCase", "Proper case", "Aa", Content, Cells, ["proper", "titleCase"]),
    kind!(SplitText, "splitText", "Split text to columns", "⫼", Content, Cells, ["textToColumns", "split"]),
    kind!(ClearContents, "clearContents", "Clear contents", "⌫", Content, Cells, ["clearValues"]),
    kind!(Hyperlink, "hyperlink", "Add hyperlink", "🔗", Content, Cells, ["link", "addHyperlink"]),
    kind!(Sort, "sort", "Sort", "⇅", Content, CellsAndFormats, ["sortRange"]),
    kind!(Copy, "copy", "Copy range", "⎘", Formatting, CellsAndFormats, ["copyRange", "paste"]),
    kind!(Clear, "clear", "Clear all", "🧹", Formatting, CellsAndFormats, ["clearAll", "clearRange"]),
    kind!(ClearFormats, "clearFormats", "Clear formats", "⌧", Formatting, CellsAndFormats, ["clearFormatting"]),
    kind!(Format, "format", "Format cells", "🎨", Formatting, CellsAndFormats, ["formatting", "style", "setFormat"]),
    kind!(Bold, "bold", "Bold", "B", Formatting, CellsAndFormats, []),
    kind!(Italic, "italic", "Italic", "I", Formatting, CellsAndFormats, []),
    kind!(Underline, "underline", "Underline", "U", Formatting, CellsAndFormats, []),
    kind!(Strikethrough, "strikethrough", "Strikethrough", "S", Formatting, CellsAndFormats, ["strike"]),
    kind!(FillColor, "fillColor", "Fill color", "▩", Formatting, CellsAndFormats, ["backgroundColor", "background", "highlight"]),
    kind!(FontColor, "fontColor", "Font color", "🖍", Formatting, CellsAndFormats, ["textColor"]),
    kind!(FontSize, "fontSize", "Font size", "⇕", Formatting, CellsAndFormats, ["textSize"]),
    kind!(FontName, "fontName", "Font", "𝔉", Formatting, CellsAndFormats, ["font", "fontFamily"]),
    kind!(NumberFormat, "numberFormat", "Number format", "#", Formatting, CellsAndFormats, ["numFormat"]),
    kind!(CurrencyFormat, "currencyFormat", "Currency format", "$", Formatting, CellsAndFormats, ["currency"]),
    kind!(PercentFormat, "percentFormat", "Percent format", "%", Formatting, CellsAndFormats, ["percent", "percentage"]),
    kind!(DateFormat, "dateFormat", "Date format", "📅", Formatting, CellsAndFormats, ["date"]),
    kind!(Border, "border", "Borders", "▢", Formatting, CellsAndFormats, ["borders"]),
    kind!(Align, "align", "Horizontal alignment", "≡", Formatting, CellsAndFormats, ["alignment", "horizontalAlign", "horizontalAlignment"]),
    kind!(VerticalAlign, "verticalAlign", "Vertical alignment", "⇳", Formatting, CellsAndFormats, ["verticalAlignment"]),
    kind!(WrapText, "wrapText", "Wrap text", "↩", Formatting, CellsAndFormats, ["wrap"]),
    kind!(ConditionalFormat, "conditionalFormat", "Conditional format", "◐", Conditional, None, ["conditionalFormatting", "highlightCells"]),
    kind!(ColorScale, "colorScale", "Color scale", "🌈", Conditional, None, []),
    kind!(DataBar, "dataBar", "Data bars", "▭", Conditional, None, ["dataBars"]),
    kind!(IconSet, "iconSet", "Icon set", "⬆", Conditional, None, ["icons"]),
    kind!(ClearConditionalFormats, "clearConditionalFormats", "Clear conditional formats", "◌", Conditional, None, ["clearConditionalFormatting"]),
    kind!(Chart, "chart", "Insert chart", "📊", Objects, None, ["createChart", "insertChart"]),
    kind!(Table, "table", "Format as table", "▦", Objects, None, ["createTable", "formatAsTable"]),
    kind!(Pivot, "pivot", "Pivot table", "⊞", Objects, None, ["pivotTable", "createPivot"]),
    kind!(NamedRange, "namedRange", "Define name", "🏷", Objects, None, ["defineName", "name"]),
    kind!(Validation, "validation", "Dropdown list", "▾", Objects, None, ["dropdown", "listValidation", "dataValidation"]),
    kind!(NumberValidation, "numberValidation", "Number validation", "✓", Objects, None, []),
    kind!(ClearValidation, "clearValidation", "Clear validation", "✗", Objects, None, ["removeValidation"]),
    kind!(Filter, "filter", "Auto-filter", "⏷", Objects, None, ["autoFilter"]),
    kind!(ClearFilter, "clearFilter", "Clear filter", "⏶", Objects, None, ["removeFilter"]),
    kind!(Comment, "comment", "Add comment", "💬", Objects, None, ["note", "addComment"]),
    kind!(InsertRows, "insertRows", "Insert rows", "⊕", Structure, None, ["insertRow"]),
    kind!(DeleteRows, "deleteRows", "Delete rows", "⊖", Structure, None, ["deleteRow"]),
    kind!(InsertColumns, "insertColumns", "Insert columns", "⊕", Structure, None, ["insertColumn", "insertCols"]),
    kind!(DeleteColumns, "deleteColumns", "Delete columns", "⊖", Structure, None, ["deleteColumn", "deleteCols"]),
    kind!(HideRows, "hideRows", "Hide rows", "◠", Structure, None, ["hideRow"]),
    kind!(HideColumns, "hideColumns", "Hide columns", "◠", Structure, None, ["hideColumn", "hideCols"]),
    kind!(UnhideRows, "unhideRows", "Unhide rows", "◡", Structure, None, ["unhideRow", "showRows"]),
    kind!(UnhideColumns, "unhideColumns", "Unhide columns", "◡", Structure, None, ["unhideColumn", "showColumns"]),
    kind!(ColumnWidth, "columnWidth", "Column width", "↔", Structure, None, ["colWidth", "setColumnWidth"]),
    kind!(RowHeight, "rowHeight", "Row height", "↕", Structure, None, ["setRowHeight"]),
    kind!(AutoFit, "autoFit", "Auto-fit columns", "⇔", Structure, None, ["autoFitColumns"]),
    kind!(Merge, "merge", "Merge cells", "⊔", Structure, None, ["mergeCells"]),
    kind!(Unmerge, "unmerge", "Unmerge cells", "⊓", Structure, None, ["unmergeCells"]),
    kind!(FreezePanes, "freezePanes", "Freeze panes", "❄", Structure, None, ["freeze"]),
    kind!(Unfreeze, "unfreeze", "Unfreeze panes", "☀", Structure, None, ["unfreezePanes"]),
    kind!(Protect, "protect", "Protect sheet", "🔒", Sheet, None, ["protectSheet", "lock"]),
    kind!(Unprotect, "unprotect", "Unprotect sheet", "🔓", Sheet, None, ["unprotectSheet", "unlock"]),
    kind!(TabColor, "tabColor", "Tab color", "🏳", Sheet, None, ["sheetTabColor"]),
];

/// Lowercase and drop `_`, `-` and spaces.
fn normalize(tag: &str) -> String {
    tag.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

impl ActionKind {
    /// Match a tag against the catalog, case-insensitively and ignoring
    /// `_`, `-` and spaces. Aliases are accepted.
    pub fn from_tag(tag: &str) -> ActionKind {
        let wanted = normalize(tag);
        CATALOG
            .iter()
            .find(|info| normalize(info.tag) == wanted || info.aliases.iter().any(|a| normalize(a) == wanted))
            .map(|info| info.kind.clone())
            .unwrap_or_else(|| ActionKind::Unknown(tag.trim().to_string()))
    }

    /// Catalog entries in display order.
    pub fn catalog() -> &'static [KindInfo] {
        &CATALOG
    }

    pub fn all() -> impl Iterator<Item = &'static ActionKind> {
        CATALOG.iter().map(|info| &info.kind)
    }

    pub fn info(&self) -> Option<&'static KindInfo> {
        CATALOG.iter().find(|info| info.kind == *self)
    }

    pub fn tag(&self) -> &str {
        match self {
            ActionKind::Unknown(tag) => tag,
            known => known.info().map(|i| i.tag).unwrap_or_default(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.info().map(|i| i.label).unwrap_or("Write literal")
    }

    pub fn icon(&self) -> &'static str {
        self.info().map(|i| i.icon).unwrap_or("?")
    }

    pub fn category(&self) -> Category {
        self.info().map(|i| i.category).unwrap_or(Category::Other)
    }

    /// Unknown kinds write a literal into one cell, which is undoable.
    pub fn undo_policy(&self) -> UndoPolicy {
        self.info().map(|i| i.undo).unwrap_or(UndoPolicy::Cells)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ActionKind::Unknown(_))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}
