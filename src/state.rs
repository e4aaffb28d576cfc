use std::collections::HashSet;

use crate::document::Document;
use crate::types::{NodeId, Path, VisibleRow};

/// Session state for the tree view: which paths are expanded, what is
/// selected, how far the view is scrolled, and the current row projection.
/// Rows are always rebuilt wholesale, never patched.
pub struct TreeState {
    /// Expanded paths, keyed by display string. The root is implicitly
    /// always expanded and never stored here.
    expanded: HashSet<String>,
    /// Index of the selected row in `rows`, clamped on every rebuild.
    pub selected_index: usize,
    /// Identity mirror of the selection, used to re-resolve it across
    /// rebuilds when the row list changes shape.
    pub selected: Option<NodeId>,
    /// Topmost visible row index.
    pub scroll_offset: usize,
    pub rows: Vec<VisibleRow>,
}

impl TreeState {
    pub fn new(root: NodeId) -> Self {
        TreeState {
            expanded: HashSet::new(),
            selected_index: 0,
            selected: Some(root),
            scroll_offset: 0,
            rows: Vec::new(),
        }
    }

    pub fn is_expanded(&self, path: &Path) -> bool {
        path.is_root() || self.expanded.contains(&path.to_string())
    }

    pub fn set_expanded(&mut self, path: &Path, expanded: bool) {
        if path.is_root() {
            return; // the root cannot be collapsed
        }
        if expanded {
            self.expanded.insert(path.to_string());
        } else {
            self.expanded.remove(&path.to_string());
        }
    }

    /// Flips the expansion state, returning the resulting state.
    pub fn toggle_expanded(&mut self, path: &Path) -> bool {
        if path.is_root() {
            return true;
        }
        let display = path.to_string();
        if self.expanded.remove(&display) {
            false
        } else {
            self.expanded.insert(display);
            true
        }
    }

    /// Marks every expandable node with children as expanded.
    pub fn expand_all(&mut self, doc: &Document) {
        for entry in doc.entries() {
            let node = doc.node(entry.node);
            if !entry.path.is_root() && node.is_expandable() && node.has_children() {
                self.expanded.insert(entry.display.clone());
            }
        }
    }

    /// Drops the whole expansion set in one step.
    pub fn collapse_all(&mut self) {
        self.expanded = HashSet::new();
    }

    /// Expands every ancestor of a node so it is reachable in tree mode.
    pub fn expand_to(&mut self, doc: &Document, id: NodeId) {
        for ancestor in doc.ancestors(id) {
            let path = doc.node(ancestor).path.clone();
            self.set_expanded(&path, true);
        }
    }

    /// Moves the selection by `delta` rows, clamped to the valid range.
    /// Returns whether the index actually changed, so callers can decide
    /// whether to propagate side effects.
    pub fn move_selection(&mut self, delta: isize) -> bool {
        if self.rows.is_empty() {
            return false;
        }
        let last = self.rows.len() - 1;
        let new_index = self
            .selected_index
            .saturating_add_signed(delta)
            .min(last);
        if new_index == self.selected_index {
            return false;
        }
        self.selected_index = new_index;
        self.selected = Some(self.rows[new_index].node);
        true
    }

    /// Selects a specific node if it is currently visible.
    pub fn select_node(&mut self, id: NodeId) -> bool {
        for (i, row) in self.rows.iter().enumerate() {
            if row.node == id {
                self.selected_index = i;
                self.selected = Some(id);
                return true;
            }
        }
        false
    }

    /// Selects the visible row whose node sits at `path`.
    pub fn select_by_path(&mut self, doc: &Document, path: &Path) -> bool {
        for (i, row) in self.rows.iter().enumerate() {
            if doc.node(row.node).path == *path {
                self.selected_index = i;
                self.selected = Some(row.node);
                return true;
            }
        }
        false
    }

    pub fn selected_row(&self) -> Option<&VisibleRow> {
        self.rows.get(self.selected_index)
    }

    /// Clamps the selection into range and resyncs the node mirror from the
    /// clamped position. Called after every row rebuild.
    pub fn clamp_selection(&mut self) {
        if self.rows.is_empty() {
            self.selected_index = 0;
            self.selected = None;
            return;
        }
        if self.selected_index >= self.rows.len() {
            self.selected_index = self.rows.len() - 1;
        }
        self.selected = Some(self.rows[self.selected_index].node);
    }
}
