use crate::types::{Node, NodeId, Path};

/// Flattened entry in the search index. The display string is precomputed
/// once at build time so search never re-renders paths.
#[derive(Debug, Clone)]
pub struct PathEntry {
    pub path: Path,
    pub display: String,
    pub node: NodeId,
}

/// A parsed document: the node arena plus its pre-order path index.
/// Both are built once per load and read-only afterwards.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    index: Vec<PathEntry>,
    pub file_path: String,
}

impl Document {
    pub(crate) fn new(nodes: Vec<Node>, root: NodeId, file_path: impl Into<String>) -> Self {
        let mut doc = Document {
            nodes,
            root,
            index: Vec::new(),
            file_path: file_path.into(),
        };
        doc.index = Vec::with_capacity(doc.nodes.len());
        doc.build_index(doc.root);
        doc
    }

    // Pre-order depth-first walk, root first. Traversal order is the
    // contract search and positional lookup rely on.
    fn build_index(&mut self, id: NodeId) {
        let (path, children) = {
            let node = &self.nodes[id.0];
            (node.path.clone(), node.children.clone())
        };
        self.index.push(PathEntry {
            display: path.to_string(),
            path,
            node: id,
        });
        for child in children {
            self.build_index(child);
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Total number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    pub fn entries(&self) -> &[PathEntry] {
        &self.index
    }

    pub fn entry_at(&self, i: usize) -> Option<&PathEntry> {
        self.index.get(i)
    }

    pub fn display_strings(&self) -> impl Iterator<Item = &str> {
        self.index.iter().map(|entry| entry.display.as_str())
    }

    /// Linear scan on the precomputed display string. Only used for
    /// external jump requests, never on the keystroke path.
    pub fn find_by_path(&self, display: &str) -> Option<NodeId> {
        self.index
            .iter()
            .find(|entry| entry.display == display)
            .map(|entry| entry.node)
    }

    /// Parent chain of a node, nearest first, root last.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.nodes[id.0].parent,
        }
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use crate::parse::parse_str;
    use pretty_assertions::assert_eq;

    #[test]
    fn index_is_a_preorder_walk_root_first() {
        let doc = parse_str("a:\n  b: 1\n  c: 2\nd: 3\n", "<test>").unwrap();
        let displays: Vec<_> = doc.display_strings().collect();
        assert_eq!(displays, vec!["(root)", "a", "a.b", "a.c", "d"]);
        assert_eq!(doc.node_count(), 5);
    }

    #[test]
    fn index_length_counts_every_node_including_root() {
        let doc = parse_str("a:\n  b: 1\n  c: 2\n", "<test>").unwrap();
        assert_eq!(doc.node_count(), 4);
    }

    #[test]
    fn find_by_path_resolves_display_strings() {
        let doc = parse_str("items:\n  - x\n  - y\n", "<test>").unwrap();
        let id = doc.find_by_path("items[1]").expect("path should resolve");
        assert_eq!(doc.node(id).scalar_value(), Some("y"));
        assert!(doc.find_by_path("items[9]").is_none());
    }

    #[test]
    fn ancestors_walk_to_the_root() {
        let doc = parse_str("a:\n  b:\n    c: 1\n", "<test>").unwrap();
        let c = doc.find_by_path("a.b.c").unwrap();
        let chain: Vec<_> = doc
            .ancestors(c)
            .map(|id| doc.node(id).path.to_string())
            .collect();
        assert_eq!(chain, vec!["a.b", "a", "(root)"]);
    }

    #[test]
    fn parent_and_path_invariants_hold_for_every_node() {
        let doc = parse_str(
            "meta:\n  labels:\n    - name: app\n      value: web\n  count: 2\nflag: true\n",
            "<test>",
        )
        .unwrap();
        for entry in doc.entries() {
            let node = doc.node(entry.node);
            if let Some(parent) = node.parent {
                let parent_node = doc.node(parent);
                assert_eq!(node.depth, parent_node.depth + 1);
                assert_eq!(node.path.parent(), parent_node.path);
                assert_eq!(node.path.depth(), parent_node.path.depth() + 1);
            } else {
                assert_eq!(entry.node, doc.root());
                assert_eq!(node.depth, 0);
            }
        }
    }
}
