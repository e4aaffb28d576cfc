use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

use crate::config::Theme;
use crate::document::Document;
use crate::types::{NodeKind, ScalarType, VisibleRow};

/// Glyphs used for expand markers and node type icons.
pub struct IconSet {
    pub expanded: &'static str,
    pub collapsed: &'static str,
    pub leaf: &'static str,
    pub map: &'static str,
    pub list: &'static str,
    pub string: &'static str,
    pub number: &'static str,
    pub boolean: &'static str,
    pub null: &'static str,
    pub timestamp: &'static str,
}

impl IconSet {
    pub fn nerd_font() -> IconSet {
        IconSet {
            expanded: "▾",
            collapsed: "▸",
            leaf: " ",
            map: "",
            list: "",
            string: "",
            number: "󰎠",
            boolean: "󰨙",
            null: "󰟢",
            timestamp: "",
        }
    }

    pub fn ascii() -> IconSet {
        IconSet {
            expanded: "v",
            collapsed: ">",
            leaf: " ",
            map: "{}",
            list: "[]",
            string: "\"",
            number: "#",
            boolean: "?",
            null: "~",
            timestamp: "@",
        }
    }

    pub fn expand_icon(&self, expanded: bool, expandable: bool) -> &'static str {
        if !expandable {
            return self.leaf;
        }
        if expanded {
            self.expanded
        } else {
            self.collapsed
        }
    }

    pub fn type_icon(&self, kind: &NodeKind) -> &'static str {
        match kind {
            NodeKind::Map => self.map,
            NodeKind::List => self.list,
            NodeKind::Scalar { scalar_type, .. } => match scalar_type {
                ScalarType::String => self.string,
                ScalarType::Int | ScalarType::Float => self.number,
                ScalarType::Bool => self.boolean,
                ScalarType::Null => self.null,
                ScalarType::Timestamp => self.timestamp,
            },
        }
    }
}

pub struct Styles {
    pub key: Style,
    pub selected_row: Style,
    pub selection_accent: Style,
    pub dimmed: Style,
    pub expand_icon: Style,
    pub type_icon: Style,
    pub child_count: Style,
    pub string_value: Style,
    pub number_value: Style,
    pub bool_value: Style,
    pub null_value: Style,
    pub timestamp_value: Style,
    pub match_key: Style,
    pub status_bar: Style,
    pub status_mode: Style,
    pub status_info: Style,
    pub search_prompt: Style,
    pub match_count: Style,
    pub error: Style,
}

impl Styles {
    pub fn for_theme(theme: Theme) -> Styles {
        match theme {
            Theme::Auto | Theme::Dark => Styles::dark(),
            Theme::Mono => Styles::mono(),
        }
    }

    fn dark() -> Styles {
        Styles {
            key: Style::new().fg(Color::Cyan),
            selected_row: Style::new().bg(Color::DarkGray),
            selection_accent: Style::new().fg(Color::Magenta),
            dimmed: Style::new().fg(Color::DarkGray),
            expand_icon: Style::new().fg(Color::Gray),
            type_icon: Style::new().fg(Color::Blue),
            child_count: Style::new().fg(Color::DarkGray),
            string_value: Style::new().fg(Color::Green),
            number_value: Style::new().fg(Color::Yellow),
            bool_value: Style::new().fg(Color::Magenta),
            null_value: Style::new().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            timestamp_value: Style::new().fg(Color::Blue),
            match_key: Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            status_bar: Style::new().bg(Color::Black).fg(Color::Gray),
            status_mode: Style::new().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD),
            status_info: Style::new().fg(Color::Gray),
            search_prompt: Style::new().fg(Color::Yellow),
            match_count: Style::new().fg(Color::Yellow),
            error: Style::new().fg(Color::Red).add_modifier(Modifier::BOLD),
        }
    }

    fn mono() -> Styles {
        let plain = Style::new();
        Styles {
            key: plain.add_modifier(Modifier::BOLD),
            selected_row: plain.add_modifier(Modifier::REVERSED),
            selection_accent: plain.add_modifier(Modifier::BOLD),
            dimmed: plain.add_modifier(Modifier::DIM),
            expand_icon: plain,
            type_icon: plain,
            child_count: plain.add_modifier(Modifier::DIM),
            string_value: plain,
            number_value: plain,
            bool_value: plain,
            null_value: plain.add_modifier(Modifier::ITALIC),
            timestamp_value: plain,
            match_key: plain.add_modifier(Modifier::UNDERLINED),
            status_bar: plain.add_modifier(Modifier::REVERSED),
            status_mode: plain.add_modifier(Modifier::BOLD | Modifier::REVERSED),
            status_info: plain,
            search_prompt: plain.add_modifier(Modifier::BOLD),
            match_count: plain.add_modifier(Modifier::BOLD),
            error: plain.add_modifier(Modifier::BOLD | Modifier::REVERSED),
        }
    }

    fn value_style(&self, scalar_type: ScalarType) -> Style {
        match scalar_type {
            ScalarType::String => self.string_value,
            ScalarType::Int | ScalarType::Float => self.number_value,
            ScalarType::Bool => self.bool_value,
            ScalarType::Null => self.null_value,
            ScalarType::Timestamp => self.timestamp_value,
        }
    }
}

pub struct RowRenderer {
    pub icons: IconSet,
    pub styles: Styles,
    /// Spaces per indent level.
    pub indent: usize,
}

impl RowRenderer {
    pub fn new(icons: IconSet, styles: Styles) -> RowRenderer {
        RowRenderer {
            icons,
            styles,
            indent: 2,
        }
    }

    /// Formats one visible row for display. `width` is used to pad selected
    /// rows so the highlight covers the full line.
    pub fn format_row(
        &self,
        doc: &Document,
        row: &VisibleRow,
        selected: bool,
        flat: bool,
        width: usize,
    ) -> Line<'static> {
        let node = doc.node(row.node);
        let key_style = if row.search_match {
            self.styles.match_key
        } else if row.dimmed {
            self.styles.dimmed
        } else {
            self.styles.key
        };
        let deco_style = if row.dimmed {
            self.styles.dimmed
        } else {
            self.styles.expand_icon
        };

        let mut spans: Vec<Span<'static>> = Vec::new();
        if flat {
            // full path instead of indentation
            spans.push(Span::styled(node.path.to_string(), key_style));
            if let NodeKind::Scalar { value, scalar_type } = &node.kind {
                spans.push(Span::raw(": "));
                spans.push(self.value_span(value, *scalar_type, row.dimmed));
            }
        } else {
            if selected {
                spans.push(Span::styled("▌", self.styles.selection_accent));
            } else {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::raw(" ".repeat(row.depth * self.indent)));
            spans.push(Span::styled(
                self.icons.expand_icon(row.expanded, row.expandable),
                deco_style,
            ));
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                self.icons.type_icon(&node.kind),
                if row.dimmed {
                    self.styles.dimmed
                } else {
                    self.styles.type_icon
                },
            ));
            spans.push(Span::raw(" "));
            spans.push(Span::styled(node.display_key(), key_style));

            match &node.kind {
                NodeKind::Scalar { value, scalar_type } => {
                    spans.push(Span::raw(": "));
                    spans.push(self.value_span(value, *scalar_type, row.dimmed));
                }
                NodeKind::Map | NodeKind::List => {
                    if row.has_children {
                        spans.push(Span::styled(
                            format!(" ({})", row.child_count),
                            if row.dimmed {
                                self.styles.dimmed
                            } else {
                                self.styles.child_count
                            },
                        ));
                    }
                }
            }
        }

        if selected {
            let used: usize = spans.iter().map(|s| s.content.chars().count()).sum();
            if used < width {
                spans.push(Span::raw(" ".repeat(width - used)));
            }
            Line::from(spans).style(self.styles.selected_row)
        } else {
            Line::from(spans)
        }
    }

    fn value_span(&self, value: &str, scalar_type: ScalarType, dimmed: bool) -> Span<'static> {
        let display = format_scalar_value(value, scalar_type);
        let style = if dimmed {
            self.styles.dimmed
        } else {
            self.styles.value_style(scalar_type)
        };
        Span::styled(display, style)
    }
}

/// Inline display form of a scalar: multiline values collapse to a line
/// count, long values truncate, control characters are escaped.
pub fn format_scalar_value(value: &str, scalar_type: ScalarType) -> String {
    if scalar_type == ScalarType::Null {
        return "null".to_string();
    }

    let mut display = value.to_string();
    // multiline check comes before truncation
    if display.contains('\n') {
        let count = display.split('\n').count();
        if count > 1 {
            display = format!("[{count} lines]");
        } else {
            display = display.trim().to_string();
        }
    }

    const MAX_LEN: usize = 50;
    if display.chars().count() > MAX_LEN {
        display = format!("{}...", truncate_chars(&display, MAX_LEN - 3));
    }

    display.replace('\n', "\\n").replace('\t', "\\t")
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &s[..byte_index],
        None => s,
    }
}

/// Middle-ellipsis truncation for path strings in the status bar: keeps the
/// first segment and the last two, e.g.
/// `metadata.spec.containers[0].env[2].name` → `metadata...[2].name`.
pub fn truncate_path_middle(path: &str, max_width: usize) -> String {
    if path.chars().count() <= max_width {
        return path.to_string();
    }
    if max_width < 4 {
        return truncate_chars(path, max_width).to_string();
    }

    let segments = split_path_segments(path);
    if segments.len() <= 3 {
        return format!("{}...", truncate_chars(path, max_width - 3));
    }

    let first = segments[0].as_str();
    let last_two: String = segments[segments.len() - 2..].concat();
    let result = format!("{first}...{last_two}");
    if result.chars().count() <= max_width {
        return result;
    }

    // still too long: keep the tail end of the last segments
    let first_len = first.chars().count();
    if max_width <= first_len + 3 {
        return format!("{}...", truncate_chars(path, max_width - 3));
    }
    let available = max_width - first_len - 3;
    let tail_chars = last_two.chars().count();
    let tail: String = last_two
        .chars()
        .skip(tail_chars.saturating_sub(available))
        .collect();
    format!("{first}...{tail}")
}

// Splits a path into segments keeping delimiters attached,
// e.g. "a.b[0].c" → ["a", ".b", "[0]", ".c"].
fn split_path_segments(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    for (i, c) in path.chars().enumerate() {
        if c == '.' || c == '[' {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            if (c == '.' && i > 0) || c == '[' {
                current.push(c);
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn multiline_values_collapse_to_a_line_count() {
        let cases = [
            ("Line 1\nLine 2\nLine 3", "[3 lines]"),
            ("#!/bin/bash\nset -e\necho hello", "[3 lines]"),
            ("single\\nline", "single\\nline"), // escaped, not a real newline
            ("simple value", "simple value"),
            ("just one\n", "[2 lines]"),
            ("a\nb\nc\nd\ne\nf", "[6 lines]"),
        ];
        for (value, expected) in cases {
            let got = format_scalar_value(value, ScalarType::String);
            assert_eq!(got, expected);
            assert!(!got.contains('\n'));
        }
    }

    #[test]
    fn long_values_truncate_with_an_ellipsis() {
        let long = "a".repeat(100);
        let got = format_scalar_value(&long, ScalarType::String);
        assert!(got.ends_with("..."));
        assert_eq!(got.chars().count(), 50);

        assert_eq!(format_scalar_value("short", ScalarType::String), "short");

        let unicode = "日本語".repeat(20);
        let got = format_scalar_value(&unicode, ScalarType::String);
        assert!(got.ends_with("..."));
    }

    #[test]
    fn typed_values_render_their_literal_form() {
        assert_eq!(format_scalar_value("", ScalarType::Null), "null");
        assert_eq!(format_scalar_value("true", ScalarType::Bool), "true");
        assert_eq!(format_scalar_value("42", ScalarType::Int), "42");
        assert_eq!(format_scalar_value("3.14", ScalarType::Float), "3.14");
    }

    #[test]
    fn truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("日本語", 2), "日本");
        assert_eq!(truncate_chars("hello日本語", 7), "hello日本");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn path_segments_keep_their_delimiters() {
        assert_eq!(
            split_path_segments("a.b[0].c"),
            vec!["a", ".b", "[0]", ".c"]
        );
        assert_eq!(split_path_segments("single"), vec!["single"]);
    }

    #[test]
    fn path_middle_truncation_keeps_head_and_tail() {
        let path = "metadata.spec.containers[0].env[2].name";
        let got = truncate_path_middle(path, 25);
        assert!(got.starts_with("metadata..."));
        assert!(got.ends_with(".name"));
        assert!(got.chars().count() <= 25);

        // short paths pass through untouched
        assert_eq!(truncate_path_middle("a.b", 25), "a.b");
    }
}
