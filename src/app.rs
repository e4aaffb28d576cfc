use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::{DefaultTerminal, Frame};
use tracing::debug;

use crate::config::Config;
use crate::document::Document;
use crate::render::{truncate_path_middle, IconSet, RowRenderer, Styles};
use crate::search::SearchEngine;
use crate::state::TreeState;
use crate::sync::SyncClient;
use crate::types::{NodeId, NodeKind, ScalarType};
use crate::view::{self, ViewMode};

const STATUS_BAR_HEIGHT: u16 = 1;
const SEARCH_BAR_HEIGHT: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Search,
}

pub struct App {
    doc: Document,
    state: TreeState,
    mode: Mode,
    view_mode: ViewMode,
    search: SearchEngine,
    renderer: RowRenderer,
    sync: Option<SyncClient>,
    width: u16,
    height: u16,
    error: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new(doc: Document, config: &Config, sync: Option<SyncClient>) -> App {
        let icons = if config.use_icons {
            IconSet::nerd_font()
        } else {
            IconSet::ascii()
        };
        let mut state = TreeState::new(doc.root());
        state.expand_all(&doc);

        let mut app = App {
            doc,
            state,
            mode: Mode::Normal,
            view_mode: ViewMode::Tree,
            search: SearchEngine::new(),
            renderer: RowRenderer::new(icons, Styles::for_theme(config.theme)),
            sync,
            width: 0,
            height: 0,
            error: None,
            should_quit: false,
        };
        app.recompute();
        app
    }

    pub fn run(mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        while !self.should_quit {
            self.drain_sync();
            terminal.draw(|frame| self.render(frame))?;
            if event::poll(Duration::from_millis(50))? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
                    Event::Resize(width, height) => {
                        self.width = width;
                        self.height = height;
                    }
                    _ => {}
                }
            }
        }
        if let Some(sync) = &self.sync {
            sync.close();
        }
        Ok(())
    }

    fn recompute(&mut self) {
        view::recompute(&self.doc, &mut self.state, self.view_mode, &self.search);
    }

    // ----- input ---------------------------------------------------------

    fn handle_key(&mut self, key: KeyEvent) {
        self.error = None;
        match self.mode {
            Mode::Search => self.handle_search_key(key),
            Mode::Normal => self.handle_normal_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('j') | KeyCode::Down => self.move_down(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_up(1),

            KeyCode::Char('h') | KeyCode::Left => {
                if self.view_mode == ViewMode::Tree {
                    self.collapse_selected();
                }
            }
            KeyCode::Char('l') | KeyCode::Right => {
                if self.view_mode == ViewMode::Tree {
                    self.expand_selected();
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                if self.view_mode == ViewMode::Tree {
                    self.toggle_expand();
                }
            }

            KeyCode::Char('z') => {
                if self.view_mode == ViewMode::Tree {
                    self.collapse_all();
                }
            }
            KeyCode::Char('Z') => {
                if self.view_mode == ViewMode::Tree {
                    self.expand_all();
                }
            }

            KeyCode::Char('d') if ctrl => self.page_down(),
            KeyCode::Char('u') if ctrl => self.page_up(),
            KeyCode::Char('g') => self.go_to_top(),
            KeyCode::Char('G') => self.go_to_bottom(),

            // match navigation works outside search mode too
            KeyCode::Char('n') => self.next_match(),
            KeyCode::Char('N') => self.prev_match(),

            KeyCode::Char('/') => self.enter_search(),
            KeyCode::Tab => self.toggle_view_mode(),
            KeyCode::Esc => self.clear_search(),

            KeyCode::Char('y') => self.copy_path(),
            KeyCode::Char('Y') => self.copy_value(),

            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.cancel_search(),
            KeyCode::Enter => self.confirm_search(),
            KeyCode::Down => self.next_match(),
            KeyCode::Up => self.prev_match(),
            KeyCode::Char('n') if ctrl => self.next_match(),
            KeyCode::Char('p') if ctrl => self.prev_match(),
            KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Backspace => {
                self.search.pop_char(&self.doc);
                self.after_query_change();
            }
            KeyCode::Char(c) if !ctrl => {
                self.search.push_char(&self.doc, c);
                self.after_query_change();
            }
            _ => {}
        }
    }

    // ----- navigation ----------------------------------------------------

    fn move_down(&mut self, n: usize) {
        if self.state.move_selection(n as isize) {
            self.ensure_selected_visible();
            self.notify_line_change();
        }
    }

    fn move_up(&mut self, n: usize) {
        if self.state.move_selection(-(n as isize)) {
            self.ensure_selected_visible();
            self.notify_line_change();
        }
    }

    fn page_down(&mut self) {
        self.move_down(self.content_height());
    }

    fn page_up(&mut self) {
        self.move_up(self.content_height());
    }

    fn go_to_top(&mut self) {
        if self.state.rows.is_empty() {
            return;
        }
        let changed = self.state.selected_index != 0;
        self.state.selected_index = 0;
        self.state.selected = Some(self.state.rows[0].node);
        self.state.scroll_offset = 0;
        if changed {
            self.notify_line_change();
        }
    }

    fn go_to_bottom(&mut self) {
        if self.state.rows.is_empty() {
            return;
        }
        let last = self.state.rows.len() - 1;
        let changed = self.state.selected_index != last;
        self.state.selected_index = last;
        self.state.selected = Some(self.state.rows[last].node);
        self.ensure_selected_visible();
        if changed {
            self.notify_line_change();
        }
    }

    // ----- expand / collapse ---------------------------------------------

    fn expand_selected(&mut self) {
        let Some(row) = self.state.selected_row() else {
            return;
        };
        if !row.expandable {
            return;
        }
        if row.expanded {
            // already expanded: step into the first child
            if self.move_to_first_child() {
                self.notify_line_change();
            }
            return;
        }
        let path = self.doc.node(row.node).path.clone();
        self.state.set_expanded(&path, true);
        self.recompute();
    }

    fn collapse_selected(&mut self) {
        let Some(row) = self.state.selected_row() else {
            return;
        };
        if row.expandable && row.expanded {
            let path = self.doc.node(row.node).path.clone();
            self.state.set_expanded(&path, false);
            self.recompute();
            return;
        }
        // leaf or already collapsed: go to the parent instead
        if self.move_to_parent() {
            self.notify_line_change();
        }
    }

    fn toggle_expand(&mut self) {
        let Some(row) = self.state.selected_row() else {
            return;
        };
        if !row.expandable {
            return;
        }
        let path = self.doc.node(row.node).path.clone();
        self.state.toggle_expanded(&path);
        self.recompute();
    }

    fn move_to_parent(&mut self) -> bool {
        let Some(row) = self.state.selected_row() else {
            return false;
        };
        let Some(parent) = self.doc.node(row.node).parent else {
            return false;
        };
        if self.state.select_node(parent) {
            self.ensure_selected_visible();
            return true;
        }
        false
    }

    fn move_to_first_child(&mut self) -> bool {
        let Some(row) = self.state.selected_row() else {
            return false;
        };
        if !row.has_children || !row.expanded {
            return false;
        }
        // the first child is the next visible row
        if self.state.move_selection(1) {
            self.ensure_selected_visible();
            return true;
        }
        false
    }

    fn expand_all(&mut self) {
        self.state.expand_all(&self.doc);
        self.recompute();
    }

    fn collapse_all(&mut self) {
        let selected_path = self.state.selected.map(|id| self.doc.node(id).path.clone());
        self.state.collapse_all();
        self.recompute();

        // keep the selection, or fall back to the nearest visible ancestor
        if let Some(path) = selected_path {
            if !self.state.select_by_path(&self.doc, &path) {
                let mut current = path.parent();
                loop {
                    if self.state.select_by_path(&self.doc, &current) || current.is_root() {
                        break;
                    }
                    current = current.parent();
                }
            }
        }
        self.ensure_selected_visible();
    }

    // ----- search --------------------------------------------------------

    fn enter_search(&mut self) {
        self.mode = Mode::Search;
        // an active query is kept for editing; otherwise start fresh
        if !self.search.is_active() {
            self.search.clear();
        }
        self.search.activate();
        self.recompute();
    }

    fn after_query_change(&mut self) {
        self.recompute();
        if let Some(entry_index) = self.search.current() {
            self.preview_match(entry_index);
        }
    }

    fn preview_match(&mut self, entry_index: usize) {
        let Some(entry) = self.doc.entry_at(entry_index) else {
            return;
        };
        let node = entry.node;
        if self.view_mode == ViewMode::Tree {
            self.state.expand_to(&self.doc, node);
            self.recompute();
        }
        if self.state.select_node(node) {
            self.ensure_selected_visible();
        }
    }

    fn next_match(&mut self) {
        if let Some(entry_index) = self.search.advance(1) {
            self.jump_to_match(entry_index);
        }
    }

    fn prev_match(&mut self) {
        if let Some(entry_index) = self.search.advance(-1) {
            self.jump_to_match(entry_index);
        }
    }

    fn jump_to_match(&mut self, entry_index: usize) {
        let Some(entry) = self.doc.entry_at(entry_index) else {
            return;
        };
        let node = entry.node;
        if self.view_mode == ViewMode::Tree {
            self.state.expand_to(&self.doc, node);
        }
        self.recompute();
        if self.state.select_node(node) {
            self.center_selected();
            self.notify_line_change();
        }
    }

    fn confirm_search(&mut self) {
        self.mode = Mode::Normal;
        self.search.confirm();
        if let Some(entry_index) = self.search.current() {
            self.jump_to_match(entry_index);
        } else {
            self.recompute();
        }
    }

    fn cancel_search(&mut self) {
        self.mode = Mode::Normal;
        self.search.clear();
        self.recompute();
    }

    fn clear_search(&mut self) {
        self.search.clear();
        self.recompute();
    }

    fn toggle_view_mode(&mut self) {
        let selected_path = self.state.selected.map(|id| self.doc.node(id).path.clone());
        self.view_mode = self.view_mode.toggled();
        self.recompute();

        if let Some(path) = selected_path {
            if !self.state.select_by_path(&self.doc, &path) {
                self.state.selected_index = 0;
                self.state.clamp_selection();
            }
        }
        self.ensure_selected_visible();
        self.notify_line_change();
    }

    // ----- scrolling -----------------------------------------------------

    fn search_bar_visible(&self) -> bool {
        self.mode == Mode::Search || self.search.is_active()
    }

    fn content_height(&self) -> usize {
        let mut height = self.height.saturating_sub(STATUS_BAR_HEIGHT);
        if self.search_bar_visible() {
            height = height.saturating_sub(SEARCH_BAR_HEIGHT);
        }
        height.max(1) as usize
    }

    fn ensure_selected_visible(&mut self) {
        if self.state.rows.is_empty() {
            return;
        }
        let height = self.content_height();
        if self.state.selected_index < self.state.scroll_offset {
            self.state.scroll_offset = self.state.selected_index;
        }
        if self.state.selected_index >= self.state.scroll_offset + height {
            self.state.scroll_offset = self.state.selected_index - height + 1;
        }
    }

    fn center_selected(&mut self) {
        if self.state.rows.is_empty() {
            return;
        }
        let height = self.content_height();
        let max_offset = self.state.rows.len().saturating_sub(height);
        self.state.scroll_offset = self
            .state
            .selected_index
            .saturating_sub(height / 2)
            .min(max_offset);
    }

    // ----- cursor sync ---------------------------------------------------

    fn notify_line_change(&mut self) {
        let Some(sync) = &self.sync else {
            return;
        };
        let Some(row) = self.state.selected_row() else {
            return;
        };
        if let Some(line) = self.doc.node(row.node).line {
            // failures are non-fatal; the UI keeps going
            if let Err(err) = sync.send_cursor(line) {
                debug!(?err, "cursor sync send failed");
            }
        }
    }

    fn drain_sync(&mut self) {
        let mut latest = None;
        if let Some(sync) = &self.sync {
            while let Some(line) = sync.try_recv_cursor() {
                latest = Some(line);
            }
        }
        if let Some(line) = latest {
            self.jump_to_source_line(line);
        }
    }

    // Selects the last indexed node whose recorded line is at or before the
    // peer's line: the deepest structure starting at that position.
    fn jump_to_source_line(&mut self, line: usize) {
        let mut best: Option<(usize, NodeId)> = None;
        for entry in self.doc.entries() {
            if let Some(node_line) = self.doc.node(entry.node).line {
                if node_line <= line && best.is_none_or(|(best_line, _)| node_line >= best_line) {
                    best = Some((node_line, entry.node));
                }
            }
        }
        let Some((_, id)) = best else {
            return;
        };
        if self.view_mode == ViewMode::Tree {
            self.state.expand_to(&self.doc, id);
        }
        self.recompute();
        // no notify here: the peer already knows where its own cursor is
        if self.state.select_node(id) {
            self.ensure_selected_visible();
        }
    }

    // ----- clipboard -----------------------------------------------------

    fn copy_path(&mut self) {
        let Some(row) = self.state.selected_row() else {
            return;
        };
        let text = self.doc.node(row.node).path.to_string();
        self.copy_to_clipboard(text);
    }

    fn copy_value(&mut self) {
        let Some(row) = self.state.selected_row() else {
            return;
        };
        match serde_yaml::to_string(&node_to_yaml(&self.doc, row.node)) {
            Ok(text) => self.copy_to_clipboard(text),
            Err(err) => self.error = Some(format!("copy failed: {err}")),
        }
    }

    fn copy_to_clipboard(&mut self, text: String) {
        let result = arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text));
        if let Err(err) = result {
            self.error = Some(format!("clipboard: {err}"));
        }
    }

    // ----- rendering -----------------------------------------------------

    fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        self.width = area.width;
        self.height = area.height;

        if self.search_bar_visible() {
            let [rows, search, status] = Layout::vertical([
                Constraint::Min(1),
                Constraint::Length(SEARCH_BAR_HEIGHT),
                Constraint::Length(STATUS_BAR_HEIGHT),
            ])
            .areas(area);
            self.render_rows(frame, rows);
            self.render_search_bar(frame, search);
            self.render_status_bar(frame, status);
        } else {
            let [rows, status] =
                Layout::vertical([Constraint::Min(1), Constraint::Length(STATUS_BAR_HEIGHT)])
                    .areas(area);
            self.render_rows(frame, rows);
            self.render_status_bar(frame, status);
        }
    }

    fn render_rows(&mut self, frame: &mut Frame, area: Rect) {
        let height = area.height as usize;
        let max_offset = self.state.rows.len().saturating_sub(height);
        if self.state.scroll_offset > max_offset {
            self.state.scroll_offset = max_offset;
        }
        let start = self.state.scroll_offset;
        let end = (start + height).min(self.state.rows.len());
        let flat = self.view_mode == ViewMode::Flat;

        let lines: Vec<Line> = (start..end)
            .map(|i| {
                self.renderer.format_row(
                    &self.doc,
                    &self.state.rows[i],
                    i == self.state.selected_index,
                    flat,
                    area.width as usize,
                )
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn render_search_bar(&self, frame: &mut Frame, area: Rect) {
        let styles = &self.renderer.styles;
        let mut spans = vec![
            Span::styled("/", styles.search_prompt),
            Span::raw(self.search.query().to_string()),
        ];
        if self.mode == Mode::Search {
            spans.push(Span::styled(" ", styles.selected_row));
        }
        if self.search.has_matches() {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                format!("[{}/{}]", self.search.cursor() + 1, self.search.match_count()),
                styles.match_count,
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let styles = &self.renderer.styles;
        let mode_label = match (self.mode, self.view_mode) {
            (Mode::Search, _) => " SEARCH ",
            (Mode::Normal, ViewMode::Tree) => " TREE ",
            (Mode::Normal, ViewMode::Flat) => " FLAT ",
        };
        let help = "j/k:nav h/l:fold n/N:match /:search tab:view q:quit";

        let mut path_str = if let Some(err) = &self.error {
            err.clone()
        } else {
            self.state
                .selected_row()
                .map(|row| self.doc.node(row.node).path.to_string())
                .unwrap_or_default()
        };
        let available = (area.width as usize)
            .saturating_sub(mode_label.chars().count() + help.chars().count() + 2);
        if path_str.chars().count() > available && available > 0 {
            path_str = truncate_path_middle(&path_str, available);
        }

        let path_style = if self.error.is_some() {
            styles.error
        } else {
            styles.status_info
        };
        let used = mode_label.chars().count() + 1 + path_str.chars().count();
        let padding = (area.width as usize)
            .saturating_sub(used + help.chars().count())
            .max(1);

        let line = Line::from(vec![
            Span::styled(mode_label, styles.status_mode),
            Span::raw(" "),
            Span::styled(path_str, path_style),
            Span::raw(" ".repeat(padding)),
            Span::styled(help, styles.status_info),
        ])
        .style(styles.status_bar);
        frame.render_widget(Paragraph::new(line), area);
    }
}

// Rebuilds a plain YAML value from a subtree, for clipboard export.
fn node_to_yaml(doc: &Document, id: NodeId) -> serde_yaml::Value {
    let node = doc.node(id);
    match &node.kind {
        NodeKind::Map => serde_yaml::Value::Mapping(
            node.children
                .iter()
                .map(|&child| {
                    let key = doc.node(child).key.clone().unwrap_or_default();
                    (serde_yaml::Value::String(key), node_to_yaml(doc, child))
                })
                .collect(),
        ),
        NodeKind::List => serde_yaml::Value::Sequence(
            node.children
                .iter()
                .map(|&child| node_to_yaml(doc, child))
                .collect(),
        ),
        NodeKind::Scalar { value, scalar_type } => match scalar_type {
            ScalarType::Null => serde_yaml::Value::Null,
            ScalarType::Bool => value
                .parse::<bool>()
                .map(serde_yaml::Value::Bool)
                .unwrap_or_else(|_| serde_yaml::Value::String(value.clone())),
            ScalarType::Int => value
                .parse::<i64>()
                .map(|n| serde_yaml::Value::Number(n.into()))
                .unwrap_or_else(|_| serde_yaml::Value::String(value.clone())),
            ScalarType::Float => value
                .parse::<f64>()
                .map(|n| serde_yaml::Value::Number(n.into()))
                .unwrap_or_else(|_| serde_yaml::Value::String(value.clone())),
            ScalarType::String | ScalarType::Timestamp => {
                serde_yaml::Value::String(value.clone())
            }
        },
    }
}
