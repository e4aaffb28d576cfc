use std::path::Path as FsPath;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;
use thiserror::Error;

use crate::document::Document;
use crate::types::{Node, NodeId, NodeKind, Path, ScalarType};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// ISO-8601 date, optionally with a time part. serde_yaml reports these as
// plain strings, so timestamp classification happens here.
static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}([Tt ]\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}(:\d{2})?)?)?$")
        .expect("timestamp pattern")
});

pub fn parse_file(path: &FsPath) -> Result<Document, ParseError> {
    let data = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_str(&data, path.to_string_lossy())
}

pub fn parse_str(src: &str, source_name: impl Into<String>) -> Result<Document, ParseError> {
    let value: Value = serde_yaml::from_str(src)?;
    let mut builder = TreeBuilder {
        nodes: Vec::new(),
        locator: LineLocator::new(src),
    };
    let root = match value {
        // An empty or null-bodied document degrades to an empty root map
        // instead of surfacing a null root.
        Value::Null => builder.push(Node {
            kind: NodeKind::Map,
            key: None,
            index: None,
            depth: 0,
            path: Path::root(),
            parent: None,
            children: Vec::new(),
            line: None,
        }),
        other => builder.convert(&other, None, None, 0, &Path::root(), None),
    };
    Ok(Document::new(builder.nodes, root, source_name.into()))
}

struct TreeBuilder<'a> {
    nodes: Vec<Node>,
    locator: LineLocator<'a>,
}

impl TreeBuilder<'_> {
    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn convert(
        &mut self,
        value: &Value,
        key: Option<String>,
        index: Option<usize>,
        depth: usize,
        parent_path: &Path,
        parent: Option<NodeId>,
    ) -> NodeId {
        // Unwrap tag wrappers; an explicit !!timestamp tag forces the type.
        let mut value = value;
        let mut tagged_timestamp = false;
        while let Value::Tagged(tagged) = value {
            if tagged.tag.to_string().contains("timestamp") {
                tagged_timestamp = true;
            }
            value = &tagged.value;
        }

        // Locate before descending so children scan forward from here. Map
        // children take the key's line, as in the source document.
        let line = match (&key, index) {
            (Some(k), _) => self.locator.locate_key(k),
            (None, Some(_)) => self.locator.locate_item(),
            (None, None) => None,
        };
        let path = match (&key, index) {
            (Some(k), _) => parent_path.append_key(k),
            (None, Some(i)) => parent_path.append_index(i),
            (None, None) => parent_path.clone(),
        };

        let kind = match value {
            Value::Mapping(_) => NodeKind::Map,
            Value::Sequence(_) => NodeKind::List,
            Value::Null => NodeKind::Scalar {
                value: "null".to_string(),
                scalar_type: ScalarType::Null,
            },
            Value::Bool(b) => NodeKind::Scalar {
                value: b.to_string(),
                scalar_type: ScalarType::Bool,
            },
            Value::Number(n) => NodeKind::Scalar {
                value: n.to_string(),
                scalar_type: if n.is_f64() {
                    ScalarType::Float
                } else {
                    ScalarType::Int
                },
            },
            Value::String(s) => NodeKind::Scalar {
                value: s.clone(),
                scalar_type: if tagged_timestamp || TIMESTAMP_RE.is_match(s) {
                    ScalarType::Timestamp
                } else {
                    ScalarType::String
                },
            },
            Value::Tagged(_) => unreachable!("tags unwrapped above"),
        };

        let id = self.push(Node {
            kind,
            key,
            index,
            depth,
            path: path.clone(),
            parent,
            children: Vec::new(),
            line,
        });

        let children = match value {
            Value::Mapping(map) => map
                .iter()
                .map(|(k, v)| {
                    self.convert(v, Some(key_to_string(k)), None, depth + 1, &path, Some(id))
                })
                .collect(),
            Value::Sequence(seq) => seq
                .iter()
                .enumerate()
                .map(|(i, item)| self.convert(item, None, Some(i), depth + 1, &path, Some(id)))
                .collect(),
            _ => Vec::new(),
        };
        self.nodes[id.0].children = children;
        id
    }
}

// Mapping keys are not guaranteed to be strings in YAML.
fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Best-effort recovery of source lines: the parser exposes no locations,
/// so keys and sequence items are matched against the raw source in
/// document order. A miss yields no line, which disables cursor sync for
/// that node only.
struct LineLocator<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> LineLocator<'a> {
    fn new(src: &'a str) -> Self {
        LineLocator {
            lines: src.lines().collect(),
            pos: 0,
        }
    }

    /// 1-based line of the next occurrence of `key:` at or after the
    /// current position. The position stays on the hit so siblings in flow
    /// style resolve to the same line.
    fn locate_key(&mut self, key: &str) -> Option<usize> {
        for i in self.pos..self.lines.len() {
            if line_has_key(self.lines[i], key) {
                self.pos = i;
                return Some(i + 1);
            }
        }
        None
    }

    /// 1-based line of the next block-sequence item marker. Flow-style
    /// sequences have no marker and report no line.
    fn locate_item(&mut self) -> Option<usize> {
        for i in self.pos..self.lines.len() {
            let trimmed = self.lines[i].trim_start();
            if trimmed == "-" || trimmed.starts_with("- ") {
                self.pos = i;
                return Some(i + 1);
            }
        }
        None
    }
}

fn line_has_key(line: &str, key: &str) -> bool {
    let plain = format!("{key}:");
    let double = format!("\"{key}\":");
    let single = format!("'{key}':");
    for needle in [&plain, &double, &single] {
        let mut from = 0;
        while let Some(offset) = line[from..].find(needle.as_str()) {
            let at = from + offset;
            let before = line[..at].chars().next_back();
            if matches!(before, None | Some(' ') | Some('\t') | Some('{') | Some(',')) {
                return true;
            }
            from = at + 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_a_simple_mapping() {
        let doc = parse_str("name: John\nage: 30\nactive: true\n", "<test>").unwrap();
        let root = doc.node(doc.root());
        assert_eq!(root.kind, NodeKind::Map);
        assert_eq!(root.child_count(), 3);

        let name = doc.node(root.children[0]);
        assert_eq!(name.key.as_deref(), Some("name"));
        assert_eq!(name.scalar_value(), Some("John"));
        assert_eq!(name.scalar_type(), Some(ScalarType::String));

        let age = doc.node(root.children[1]);
        assert_eq!(age.key.as_deref(), Some("age"));
        assert_eq!(age.scalar_type(), Some(ScalarType::Int));

        let active = doc.node(root.children[2]);
        assert_eq!(active.scalar_type(), Some(ScalarType::Bool));
    }

    #[test]
    fn nested_mappings_build_dotted_paths() {
        let doc = parse_str("database:\n  host: localhost\n  port: 5432\n", "<test>").unwrap();
        let root = doc.node(doc.root());
        assert_eq!(root.child_count(), 1);

        let db = doc.node(root.children[0]);
        assert_eq!(db.key.as_deref(), Some("database"));
        assert_eq!(db.kind, NodeKind::Map);
        assert_eq!(db.path.to_string(), "database");

        let host = doc.node(db.children[0]);
        assert_eq!(host.path.to_string(), "database.host");
        assert_eq!(host.depth, 2);
    }

    #[test]
    fn sequences_carry_indices_and_bracketed_paths() {
        let doc = parse_str("items:\n  - first\n  - second\n  - third\n", "<test>").unwrap();
        let items = doc.node(doc.node(doc.root()).children[0]);
        assert_eq!(items.kind, NodeKind::List);
        assert_eq!(items.child_count(), 3);

        for (i, &child) in items.children.iter().enumerate() {
            let node = doc.node(child);
            assert_eq!(node.index, Some(i));
            assert_eq!(node.path.to_string(), format!("items[{i}]"));
        }
    }

    #[test]
    fn index_is_built_alongside_the_tree() {
        let doc = parse_str("name: test\nvalue: 42\n", "<test>").unwrap();
        // root + 2 children
        assert_eq!(doc.node_count(), 3);
        let displays: Vec<_> = doc.display_strings().collect();
        assert!(displays.contains(&"name"));
        assert!(displays.contains(&"value"));
    }

    #[test]
    fn scalar_type_inference() {
        let cases = [
            ("value: hello", ScalarType::String),
            ("value: 42", ScalarType::Int),
            ("value: 3.14", ScalarType::Float),
            ("value: true", ScalarType::Bool),
            ("value: false", ScalarType::Bool),
            ("value: null", ScalarType::Null),
            ("value: ~", ScalarType::Null),
            // YAML 1.2: yes/no are plain strings, not booleans
            ("value: yes", ScalarType::String),
            ("value: no", ScalarType::String),
            // quoting forces a string
            ("value: \"42\"", ScalarType::String),
            ("value: 2023-01-15", ScalarType::Timestamp),
            ("value: 2023-01-15T10:30:00Z", ScalarType::Timestamp),
            ("value: 2023-01-15 10:30:00", ScalarType::Timestamp),
        ];
        for (src, expected) in cases {
            let doc = parse_str(src, "<test>").unwrap();
            let child = doc.node(doc.node(doc.root()).children[0]);
            assert_eq!(child.scalar_type(), Some(expected), "source: {src}");
        }
    }

    #[test]
    fn empty_document_degrades_to_an_empty_root_map() {
        let doc = parse_str("", "<test>").unwrap();
        let root = doc.node(doc.root());
        assert_eq!(root.kind, NodeKind::Map);
        assert!(!root.has_children());
        assert_eq!(doc.node_count(), 1);
    }

    #[test]
    fn malformed_input_is_a_structured_failure() {
        let err = parse_str("a: [unclosed", "<test>").unwrap_err();
        assert!(matches!(err, ParseError::Yaml(_)));
    }

    #[test]
    fn map_children_report_the_key_line() {
        let src = "name: John\nnested:\n  inner: 1\nlist:\n  - a\n  - b\n";
        let doc = parse_str(src, "<test>").unwrap();

        let name = doc.find_by_path("name").unwrap();
        assert_eq!(doc.node(name).line, Some(1));

        let inner = doc.find_by_path("nested.inner").unwrap();
        assert_eq!(doc.node(inner).line, Some(3));

        let first = doc.find_by_path("list[0]").unwrap();
        assert_eq!(doc.node(first).line, Some(5));
        let second = doc.find_by_path("list[1]").unwrap();
        assert_eq!(doc.node(second).line, Some(6));
    }

    #[test]
    fn quoted_keys_are_still_located() {
        let src = "\"first key\": 1\nother: 2\n";
        let doc = parse_str(src, "<test>").unwrap();
        let first = doc.find_by_path("first key").unwrap();
        assert_eq!(doc.node(first).line, Some(1));
        let other = doc.find_by_path("other").unwrap();
        assert_eq!(doc.node(other).line, Some(2));
    }

    #[test]
    fn aliases_resolve_through_their_anchor() {
        let src = "base: &b\n  x: 1\ncopy: *b\n";
        let doc = parse_str(src, "<test>").unwrap();
        let copy_x = doc.find_by_path("copy.x").unwrap();
        assert_eq!(doc.node(copy_x).scalar_value(), Some("1"));
    }
}
