use std::collections::HashSet;

use rayon::prelude::*;

use crate::document::Document;
use crate::types::NodeId;

/// Live search over the document index: the query, the ordered match list,
/// a cyclic cursor into it, and whether the overlay is active ("currently
/// typing" and "confirmed but still highlighted" both count as active).
pub struct SearchEngine {
    query: String,
    /// Indices into the document index, in index (pre-order) order.
    matches: Vec<usize>,
    cursor: usize,
    active: bool,
}

impl SearchEngine {
    pub fn new() -> Self {
        SearchEngine {
            query: String::new(),
            matches: Vec::new(),
            cursor: 0,
            active: false,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the projector should filter or dim rows.
    pub fn overlay_active(&self) -> bool {
        self.active && !self.query.is_empty()
    }

    /// Entering search mode: an existing query is kept for editing.
    pub fn activate(&mut self) {
        self.active = true;
    }

    /// Confirming search keeps the overlay only if something matched.
    pub fn confirm(&mut self) {
        self.active = !self.matches.is_empty();
    }

    /// Canceling search clears everything.
    pub fn clear(&mut self) {
        self.query.clear();
        self.matches.clear();
        self.cursor = 0;
        self.active = false;
    }

    pub fn push_char(&mut self, doc: &Document, c: char) {
        self.query.push(c);
        self.refresh(doc);
    }

    pub fn pop_char(&mut self, doc: &Document) {
        self.query.pop();
        self.refresh(doc);
    }

    pub fn set_query(&mut self, doc: &Document, query: impl Into<String>) {
        self.query = query.into();
        self.refresh(doc);
    }

    /// Re-runs matching against the index. Matching is a case-insensitive
    /// substring test on the node *key* only — not the full path and not the
    /// scalar value — so search finds structural names, not incidental
    /// values. An empty query clears all matches.
    fn refresh(&mut self, doc: &Document) {
        if self.query.is_empty() {
            self.matches.clear();
            self.cursor = 0;
            return;
        }
        let needle = self.query.to_lowercase();
        self.matches = doc
            .entries()
            .par_iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                let key = doc.node(entry.node).key.as_deref()?;
                key.to_lowercase().contains(&needle).then_some(i)
            })
            .collect();
        if self.cursor >= self.matches.len() {
            self.cursor = 0;
        }
    }

    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    pub fn has_matches(&self) -> bool {
        !self.matches.is_empty()
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Document-index position of the current match.
    pub fn current(&self) -> Option<usize> {
        self.matches.get(self.cursor).copied()
    }

    /// Advances the cursor cyclically (+1 next, -1 previous) and returns the
    /// new current match.
    pub fn advance(&mut self, delta: isize) -> Option<usize> {
        if self.matches.is_empty() {
            return None;
        }
        let len = self.matches.len() as isize;
        let cursor = self.cursor as isize + delta;
        self.cursor = cursor.rem_euclid(len) as usize;
        self.current()
    }

    /// Node ids of all matches, for the projector's filter pass.
    pub fn match_nodes(&self, doc: &Document) -> HashSet<NodeId> {
        self.matches
            .iter()
            .filter_map(|&i| doc.entry_at(i))
            .map(|entry| entry.node)
            .collect()
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        SearchEngine::new()
    }
}
