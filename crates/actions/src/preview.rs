//! Which proposed Actions the user has selected before applying.

/// Selection mask and expanded row of the preview list. Out-of-range
/// indices are ignored everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewState {
    selections: Vec<bool>,
    expanded: Option<usize>,
}

impl PreviewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select all of `count` Actions and collapse any expanded row.
    pub fn initialize(&mut self, count: usize) {
        self.selections = vec![true; count];
        self.expanded = None;
    }

    pub fn toggle(&mut self, index: usize) {
        if let Some(selected) = self.selections.get_mut(index) {
            *selected = !*selected;
        }
    }

    /// Deselect everything when all are selected, otherwise select all.
    pub fn toggle_all(&mut self) {
        let all = self.selections.iter().all(|s| *s);
        self.selections.iter_mut().for_each(|s| *s = !all);
    }

    /// Expand `index`, or collapse it when it is already expanded.
    pub fn toggle_expanded(&mut self, index: usize) {
        if index >= self.selections.len() {
            return;
        }
        self.expanded = if self.expanded == Some(index) { None } else { Some(index) };
    }

    pub fn expanded(&self) -> Option<usize> {
        self.expanded
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selections.get(index).copied().unwrap_or(false)
    }

    pub fn selections(&self) -> &[bool] {
        &self.selections
    }

    pub fn selected_count(&self) -> usize {
        self.selections.iter().filter(|s| **s).count()
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn clear(&mut self) {
        self.selections.clear();
        self.expanded = None;
    }
}

/// Items whose mask entry is `true`, in order. Items past the end of the
/// mask are not selected.
pub fn selected_subset<T: Clone>(items: &[T], mask: &[bool]) -> Vec<T> {
    items
        .iter()
        .zip(mask)
        .filter(|(_, selected)| **selected)
        .map(|(item, _)| item.clone())
        .collect()
}

pub fn has_any_selected(mask: &[bool]) -> bool {
    mask.iter().any(|s| *s)
}
