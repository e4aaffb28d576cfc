use std::fmt;

/// Index of a node in the document arena. Parent links and visible rows
/// refer to nodes by id so the arena stays the single owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    String,
    Int,
    Float,
    Bool,
    Null,
    Timestamp,
}

impl ScalarType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Bool => "bool",
            ScalarType::Null => "null",
            ScalarType::Timestamp => "timestamp",
        }
    }
}

/// Node payload, tagged by kind. Scalars carry their rendered value and
/// inferred type; containers carry nothing here (children live on `Node`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Scalar { value: String, scalar_type: ScalarType },
    Map,
    List,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Scalar { .. } => "scalar",
            NodeKind::Map => "map",
            NodeKind::List => "list",
        }
    }
}

/// One value in the document tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    /// Key under a parent map; `None` for the root and for list items.
    pub key: Option<String>,
    /// Position within a parent list; `None` for non-list-item nodes.
    pub index: Option<usize>,
    /// Nesting level, 0 for the root.
    pub depth: usize,
    pub path: Path,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Originating source line (1-based); `None` if the locator gave up.
    pub line: Option<usize>,
}

impl Node {
    pub fn is_expandable(&self) -> bool {
        matches!(self.kind, NodeKind::Map | NodeKind::List)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn display_key(&self) -> String {
        if let Some(key) = &self.key {
            return key.clone();
        }
        if let Some(index) = self.index {
            return format!("[{index}]");
        }
        "(root)".to_string()
    }

    pub fn scalar_value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        match &self.kind {
            NodeKind::Scalar { scalar_type, .. } => Some(*scalar_type),
            _ => None,
        }
    }
}

/// One step in a path: a map key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// Location of a node as the sequence of segments from the root. Paths are
/// never mutated after construction; appending clones, so ancestors can be
/// shared freely between nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    pub fn root() -> Self {
        Path::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn append_key(&self, key: &str) -> Path {
        self.append(Segment::Key(key.to_string()))
    }

    pub fn append_index(&self, index: usize) -> Path {
        self.append(Segment::Index(index))
    }

    fn append(&self, segment: Segment) -> Path {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Path { segments }
    }

    /// Path without the last segment; the root's parent is the root itself.
    pub fn parent(&self) -> Path {
        if self.segments.is_empty() {
            return Path::root();
        }
        Path {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }

    /// Strict-prefix test: a path is never an ancestor of itself.
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        if self.segments.len() >= other.segments.len() {
            return false;
        }
        self.segments == other.segments[..self.segments.len()]
    }
}

impl fmt::Display for Path {
    /// Dot notation with bracketed indices, e.g. `metadata.labels[0].name`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("(root)");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Index(index) => write!(f, "[{index}]")?,
                Segment::Key(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
            }
        }
        Ok(())
    }
}

/// One renderable line, derived fresh from a node each time rows are
/// recomputed. Never survives a rebuild.
#[derive(Debug, Clone)]
pub struct VisibleRow {
    pub node: NodeId,
    /// Indentation level; forced to 0 in flat mode.
    pub depth: usize,
    pub expanded: bool,
    pub expandable: bool,
    pub has_children: bool,
    pub child_count: usize,
    /// Position in the visible rows list.
    pub index: usize,
    pub dimmed: bool,
    pub search_match: bool,
}

impl VisibleRow {
    pub fn new(id: NodeId, node: &Node, expanded: bool, index: usize) -> Self {
        VisibleRow {
            node: id,
            depth: node.depth,
            expanded,
            expandable: node.is_expandable(),
            has_children: node.has_children(),
            child_count: node.child_count(),
            index,
            dimmed: false,
            search_match: false,
        }
    }
}
