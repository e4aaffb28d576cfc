use std::collections::HashSet;

use crate::document::Document;
use crate::search::SearchEngine;
use crate::state::TreeState;
use crate::types::{NodeId, VisibleRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// Nested structure with expand/collapse.
    Tree,
    /// Every node as a full path, no nesting.
    Flat,
}

impl ViewMode {
    pub fn toggled(self) -> ViewMode {
        match self {
            ViewMode::Tree => ViewMode::Flat,
            ViewMode::Flat => ViewMode::Tree,
        }
    }
}

/// Rebuilds the visible rows from scratch for the given mode, applies the
/// search overlay, then clamps the selection into the new list.
pub fn recompute(doc: &Document, state: &mut TreeState, mode: ViewMode, search: &SearchEngine) {
    let mut rows = match mode {
        ViewMode::Tree => project_tree(doc, state),
        ViewMode::Flat => project_flat(doc),
    };
    apply_search_overlay(doc, &mut rows, mode, search);
    state.rows = rows;
    state.clamp_selection();
}

// Pre-order walk that only descends into expanded nodes with children; a
// collapsed subtree's descendants are absent from the rows, not hidden.
fn project_tree(doc: &Document, state: &TreeState) -> Vec<VisibleRow> {
    let mut rows = Vec::new();
    visit(doc, state, doc.root(), &mut rows);
    rows
}

fn visit(doc: &Document, state: &TreeState, id: NodeId, rows: &mut Vec<VisibleRow>) {
    let node = doc.node(id);
    let expanded = state.is_expanded(&node.path);
    rows.push(VisibleRow::new(id, node, expanded, rows.len()));
    if expanded && node.has_children() {
        for &child in &node.children {
            visit(doc, state, child, rows);
        }
    }
}

// Linear pass over the document index; the root has no meaningful display
// path and is skipped, and every row renders at depth 0.
fn project_flat(doc: &Document) -> Vec<VisibleRow> {
    let mut rows = Vec::new();
    for entry in doc.entries() {
        if entry.path.depth() == 0 {
            continue;
        }
        let mut row = VisibleRow::new(entry.node, doc.node(entry.node), false, rows.len());
        row.depth = 0;
        rows.push(row);
    }
    rows
}

// With matches: keep matches plus, in tree mode, their ancestors for
// context (ancestors render dimmed). With a non-empty query and zero
// matches: dim everything but keep the full structure, signalling
// "searching, no results" without collapsing the view.
fn apply_search_overlay(
    doc: &Document,
    rows: &mut Vec<VisibleRow>,
    mode: ViewMode,
    search: &SearchEngine,
) {
    if !search.overlay_active() {
        return;
    }
    let match_set = search.match_nodes(doc);
    if match_set.is_empty() {
        for row in rows.iter_mut() {
            row.dimmed = true;
        }
        return;
    }

    let mut keep: HashSet<NodeId> = match_set.clone();
    if mode == ViewMode::Tree {
        for &id in &match_set {
            keep.extend(doc.ancestors(id));
        }
    }
    rows.retain(|row| keep.contains(&row.node));
    for (i, row) in rows.iter_mut().enumerate() {
        row.index = i;
        row.search_match = match_set.contains(&row.node);
        row.dimmed = !row.search_match;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_str;
    use pretty_assertions::assert_eq;

    fn displays(doc: &Document, rows: &[VisibleRow]) -> Vec<String> {
        rows.iter()
            .map(|row| doc.node(row.node).path.to_string())
            .collect()
    }

    #[test]
    fn collapsed_root_shows_a_single_row() {
        let doc = parse_str("a:\n  b: 1\n", "<test>").unwrap();
        let mut state = TreeState::new(doc.root());
        recompute(&doc, &mut state, ViewMode::Tree, &SearchEngine::new());
        // root is expanded implicitly; "a" is collapsed
        assert_eq!(displays(&doc, &state.rows), vec!["(root)", "a"]);
    }

    #[test]
    fn collapsing_a_map_removes_exactly_its_descendants() {
        let doc = parse_str("a:\n  b: 1\n  c: 2\nd: 3\n", "<test>").unwrap();
        let mut state = TreeState::new(doc.root());
        state.expand_all(&doc);
        recompute(&doc, &mut state, ViewMode::Tree, &SearchEngine::new());
        assert_eq!(
            displays(&doc, &state.rows),
            vec!["(root)", "a", "a.b", "a.c", "d"]
        );

        let a = doc.node(doc.find_by_path("a").unwrap()).path.clone();
        state.set_expanded(&a, false);
        recompute(&doc, &mut state, ViewMode::Tree, &SearchEngine::new());
        assert_eq!(displays(&doc, &state.rows), vec!["(root)", "a", "d"]);
    }

    #[test]
    fn toggling_twice_restores_the_row_set() {
        let doc = parse_str("a:\n  b: 1\n  c: 2\nd: 3\n", "<test>").unwrap();
        let mut state = TreeState::new(doc.root());
        state.expand_all(&doc);
        recompute(&doc, &mut state, ViewMode::Tree, &SearchEngine::new());
        let before = displays(&doc, &state.rows);

        let a = doc.node(doc.find_by_path("a").unwrap()).path.clone();
        state.toggle_expanded(&a);
        recompute(&doc, &mut state, ViewMode::Tree, &SearchEngine::new());
        assert_ne!(displays(&doc, &state.rows), before);

        state.toggle_expanded(&a);
        recompute(&doc, &mut state, ViewMode::Tree, &SearchEngine::new());
        assert_eq!(displays(&doc, &state.rows), before);
    }

    #[test]
    fn flat_mode_lists_full_paths_without_root_or_indentation() {
        let doc = parse_str("a:\n  b: 1\nitems:\n  - x\n", "<test>").unwrap();
        let mut state = TreeState::new(doc.root());
        // expansion state is irrelevant in flat mode
        recompute(&doc, &mut state, ViewMode::Flat, &SearchEngine::new());
        assert_eq!(
            displays(&doc, &state.rows),
            vec!["a", "a.b", "items", "items[0]"]
        );
        assert!(state.rows.iter().all(|row| row.depth == 0));
    }

    #[test]
    fn row_positions_match_list_order() {
        let doc = parse_str("a:\n  b: 1\n  c: 2\n", "<test>").unwrap();
        let mut state = TreeState::new(doc.root());
        state.expand_all(&doc);
        recompute(&doc, &mut state, ViewMode::Tree, &SearchEngine::new());
        for (i, row) in state.rows.iter().enumerate() {
            assert_eq!(row.index, i);
        }
    }

    #[test]
    fn tree_search_keeps_matches_and_their_ancestors_only() {
        let doc = parse_str("a:\n  b: 1\n  c: 2\nother: 3\n", "<test>").unwrap();
        let mut state = TreeState::new(doc.root());
        state.expand_all(&doc);
        let mut search = SearchEngine::new();
        search.activate();
        search.set_query(&doc, "b");
        recompute(&doc, &mut state, ViewMode::Tree, &search);

        assert_eq!(displays(&doc, &state.rows), vec!["(root)", "a", "a.b"]);
        // every non-matching row is a strict ancestor of some match
        let match_path = doc.node(doc.find_by_path("a.b").unwrap()).path.clone();
        for row in &state.rows {
            let node = doc.node(row.node);
            if !row.search_match {
                assert!(node.path.is_ancestor_of(&match_path));
                assert!(row.dimmed);
            } else {
                assert!(!row.dimmed);
            }
        }
    }

    #[test]
    fn flat_search_filters_to_matches_only() {
        let doc = parse_str("a:\n  b: 1\n  broad: 2\nother: 3\n", "<test>").unwrap();
        let mut state = TreeState::new(doc.root());
        let mut search = SearchEngine::new();
        search.activate();
        search.set_query(&doc, "b");
        recompute(&doc, &mut state, ViewMode::Flat, &search);

        assert_eq!(displays(&doc, &state.rows), vec!["a.b", "a.broad"]);
        assert!(state.rows.iter().all(|row| row.search_match));
    }

    #[test]
    fn zero_matches_dims_everything_without_filtering() {
        let doc = parse_str("a:\n  b: 1\n", "<test>").unwrap();
        let mut state = TreeState::new(doc.root());
        state.expand_all(&doc);
        let mut search = SearchEngine::new();
        search.activate();
        search.set_query(&doc, "zzz");
        recompute(&doc, &mut state, ViewMode::Tree, &search);

        assert_eq!(state.rows.len(), 3);
        assert!(state.rows.iter().all(|row| row.dimmed));
    }

    #[test]
    fn selection_clamps_when_rows_shrink() {
        let doc = parse_str("a:\n  b: 1\n  c: 2\n", "<test>").unwrap();
        let mut state = TreeState::new(doc.root());
        state.expand_all(&doc);
        recompute(&doc, &mut state, ViewMode::Tree, &SearchEngine::new());
        state.move_selection(3);
        assert_eq!(state.selected_index, 3);

        let a = doc.node(doc.find_by_path("a").unwrap()).path.clone();
        state.set_expanded(&a, false);
        recompute(&doc, &mut state, ViewMode::Tree, &SearchEngine::new());
        assert_eq!(state.selected_index, state.rows.len() - 1);
        assert_eq!(state.selected, Some(state.rows[state.selected_index].node));
    }

    #[test]
    fn selection_survives_a_view_mode_round_trip_by_path() {
        let doc = parse_str("a:\n  b: 1\n  c: 2\n", "<test>").unwrap();
        let mut state = TreeState::new(doc.root());
        state.expand_all(&doc);
        let search = SearchEngine::new();
        recompute(&doc, &mut state, ViewMode::Tree, &search);

        let target = doc.node(doc.find_by_path("a.c").unwrap()).path.clone();
        assert!(state.select_by_path(&doc, &target));

        // tree -> flat -> tree, restoring by path at each step as the app does
        let saved = target.clone();
        recompute(&doc, &mut state, ViewMode::Flat, &search);
        assert!(state.select_by_path(&doc, &saved));
        recompute(&doc, &mut state, ViewMode::Tree, &search);
        assert!(state.select_by_path(&doc, &saved));
        assert_eq!(
            state.selected.map(|id| doc.node(id).path.to_string()),
            Some("a.c".to_string())
        );
    }
}
