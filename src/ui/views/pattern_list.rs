use crate::api::{PatternApi, ProxyPattern};
use crate::cache::{CacheSource, CacheStorage};
use crate::query::QueryState;
use crate::store::PatternStore;
use crate::ui::components::{
  AddPatternModal, KeyResult, ModalEvent, PatternRow, RowEvent, SearchEvent, SearchInput,
};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{enabled_color, enabled_marker, truncate};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::PatternDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use tracing::debug;

/// The pattern table. Root view; owns the store.
pub struct PatternListView<A: PatternApi, S: CacheStorage> {
  store: PatternStore<A, S>,
  table_state: TableState,
  search: SearchInput,
  row: PatternRow,
  modal: AddPatternModal,
  /// Mutation errors since the last key
  status: Option<String>,
}

impl<A: PatternApi, S: CacheStorage> PatternListView<A, S> {
  pub fn new(mut store: PatternStore<A, S>) -> Self {
    // Start fetching immediately
    store.load();

    Self {
      store,
      table_state: TableState::default(),
      search: SearchInput::new(),
      row: PatternRow::new(),
      modal: AddPatternModal::new(),
      status: None,
    }
  }

  /// Patterns matching the search filter, in server order
  fn visible(&self) -> Vec<&ProxyPattern> {
    let needle = self.search.query().to_lowercase();
    self
      .store
      .patterns()
      .iter()
      .filter(|p| needle.is_empty() || p.pattern.to_lowercase().contains(&needle))
      .collect()
  }

  fn selected_pattern(&self) -> Option<&ProxyPattern> {
    let idx = self.table_state.selected()?;
    self.visible().get(idx).copied()
  }

  /// Select the row showing `id`, if visible
  fn select_id(&mut self, id: i64) {
    if let Some(idx) = self.visible().iter().position(|p| p.id == id) {
      self.table_state.select(Some(idx));
    }
  }

  fn move_selection(&mut self, delta: isize) {
    let len = self.visible().len();
    if len == 0 {
      return;
    }
    let current = self.table_state.selected().unwrap_or(0) as isize;
    let next = (current + delta).rem_euclid(len as isize) as usize;
    self.table_state.select(Some(next));
  }

  fn apply_row_event(&mut self, event: RowEvent) {
    match event {
      RowEvent::Update { id, body } => self.store.update(id, body),
      RowEvent::Delete(id) => self.store.delete(id),
    }
  }

  fn title(&self) -> String {
    let count = self.store.patterns().len();
    let mut title = match self.store.list().state() {
      QueryState::Idle | QueryState::Loading => " Patterns (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Patterns (error: {}) ", e),
      QueryState::Success(_) => format!(" Patterns ({}) ", count),
    };

    match (self.store.source(), self.store.list().error()) {
      (Some(CacheSource::Offline), _) => title.push_str("[offline] "),
      (_, Some(error)) if self.store.list().data().is_some() => {
        title.push_str(&format!("[refresh failed: {}] ", error));
      }
      (Some(CacheSource::Snapshot), _) => title.push_str("[cached] "),
      _ => {}
    }
    if !self.search.query().is_empty() {
      title.push_str(&format!("[/{}] ", self.search.query()));
    }
    let pending = self.store.pending_mutations();
    if pending > 0 {
      title.push_str(&format!("[saving {}] ", pending));
    }
    title
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.table_state, len);

    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 {
      let content = if self.store.list().is_loading() {
        "Loading patterns..."
      } else if self.store.list().is_error() && self.store.patterns().is_empty() {
        "Failed to load patterns. Press 'r' to retry."
      } else if !self.search.query().is_empty() {
        "No patterns match the filter."
      } else {
        "No patterns yet. Press 'a' to add one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let pattern_width = area.width.saturating_sub(24) as usize;
    let rows: Vec<Row> = self
      .visible()
      .into_iter()
      .map(|p| {
        let style = Style::default().fg(enabled_color(p.enabled));
        match self.row.draft().filter(|_| self.row.editing_id() == Some(p.id)) {
          Some((draft, enabled)) => Row::new(vec![
            Cell::from(p.id.to_string()),
            Cell::from(enabled_marker(enabled)).style(Style::default().fg(enabled_color(enabled))),
            Cell::from(p.pattern_type.label()),
            Cell::from(Line::from(draft.spans(Style::default().fg(Color::Yellow)))),
          ]),
          None => Row::new(vec![
            Cell::from(p.id.to_string()),
            Cell::from(enabled_marker(p.enabled)),
            Cell::from(p.pattern_type.label()),
            Cell::from(truncate(&p.pattern, pattern_width)),
          ])
          .style(style),
        }
      })
      .collect();

    let header = Row::new(vec!["ID", "ON", "TYPE", "PATTERN"])
      .style(Style::default().fg(Color::Cyan).bold());

    let table = Table::new(
      rows,
      [
        Constraint::Length(6),
        Constraint::Length(4),
        Constraint::Length(6),
        Constraint::Min(10),
      ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
  }

  /// Append every error the store reported since the last poll
  fn report_errors(&mut self) {
    let errors = self.store.take_errors();
    if errors.is_empty() {
      return;
    }
    let mut lines: Vec<String> = self.status.take().into_iter().collect();
    lines.extend(errors.iter().map(ToString::to_string));
    self.status = Some(lines.join("; "));
  }

  fn render_status(&self, frame: &mut Frame, area: Rect) {
    let Some(status) = &self.status else {
      return;
    };
    if area.height < 3 || area.width < 3 {
      return;
    }
    let line_area = Rect::new(area.x + 1, area.y + area.height - 2, area.width - 2, 1);
    let paragraph = Paragraph::new(status.as_str()).style(Style::default().fg(Color::Red));
    frame.render_widget(paragraph, line_area);
  }
}

impl<A: PatternApi, S: CacheStorage + 'static> View for PatternListView<A, S> {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.modal.is_active() {
      if let KeyResult::Event(ModalEvent::Submitted(body)) = self.modal.handle_key(key) {
        self.store.create(body);
      }
      return ViewAction::None;
    }

    // While editing, `/` is just another character
    if !self.row.is_editing() {
      match self.search.handle_key(key) {
        KeyResult::Event(SearchEvent::Changed) => {
          self.table_state.select(Some(0));
          let len = self.visible().len();
          ensure_valid_selection(&mut self.table_state, len);
          return ViewAction::None;
        }
        KeyResult::Event(SearchEvent::Submitted) | KeyResult::Handled => {
          return ViewAction::None;
        }
        KeyResult::NotHandled => {}
      }
      self.status = None;
    }

    let selected = self.selected_pattern().cloned();
    match self.row.handle_key(key, selected.as_ref()) {
      KeyResult::Event(event) => {
        self.apply_row_event(event);
        return ViewAction::None;
      }
      KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
      KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
      KeyCode::Char('g') | KeyCode::Home => self.table_state.select(Some(0)),
      KeyCode::Char('G') | KeyCode::End => {
        let len = self.visible().len();
        self.table_state.select(len.checked_sub(1));
      }
      KeyCode::Char('a') => self.modal.open(),
      KeyCode::Char('r') => self.store.refresh(),
      KeyCode::Enter => {
        if let Some(pattern) = selected {
          return ViewAction::Push(Box::new(PatternDetailView::new(
            pattern.id,
            pattern.pattern,
            self.store.api(),
          )));
        }
      }
      KeyCode::Esc if !self.search.query().is_empty() => {
        let id = selected.map(|p| p.id);
        self.search.clear();
        if let Some(id) = id {
          self.select_id(id);
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_table(frame, area);
    self.render_status(frame, area);
    self.search.render_overlay(frame, area);
    self.modal.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Patterns".to_string()
  }

  fn is_capturing_input(&self) -> bool {
    self.modal.is_active() || self.search.is_active() || self.row.is_editing()
  }

  fn handle_command(&mut self, cmd: &str) -> bool {
    match cmd {
      "add" => {
        self.row.cancel();
        self.modal.open();
        true
      }
      "refresh" => {
        self.store.refresh();
        true
      }
      _ => false,
    }
  }

  fn tick(&mut self) {
    if self.store.poll() {
      self.report_errors();

      // Drop an edit whose pattern went away underneath it
      if let Some(id) = self.row.editing_id() {
        if self.store.get(id).is_none() {
          debug!(id, "edited pattern disappeared, leaving edit mode");
          self.row.cancel();
        }
      }
    }

    // Keys act on the selection, so it must not wait for a draw
    let len = self.visible().len();
    ensure_valid_selection(&mut self.table_state, len);
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    if self.row.is_editing() {
      return vec![
        Shortcut::new("enter", "save").with_priority(10),
        Shortcut::new("tab", "toggle").with_priority(20),
        Shortcut::new("esc", "cancel").with_priority(30),
      ];
    }
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("/", "search").with_priority(20),
      Shortcut::new("a", "add").with_priority(30),
      Shortcut::new("e", "edit").with_priority(40),
      Shortcut::new("space", "toggle").with_priority(50),
      Shortcut::new("d", "delete").with_priority(60),
      Shortcut::new("r", "refresh").with_priority(70),
      Shortcut::new("q", "quit").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{ProxyPatternCreate, ProxyPatternUpdate};
  use crate::cache::NoopStorage;
  use crate::store::memory::{Call, MemoryApi};
  use crate::store::StoreOptions;
  use crossterm::event::KeyModifiers;
  use ratatui::backend::TestBackend;
  use ratatui::Terminal;
  use std::sync::Arc;
  use std::time::Duration;

  type TestView = PatternListView<MemoryApi, NoopStorage>;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn press(view: &mut TestView, code: KeyCode) -> ViewAction {
    view.handle_key(key(code))
  }

  fn type_str(view: &mut TestView, s: &str) {
    for c in s.chars() {
      press(view, KeyCode::Char(c));
    }
  }

  async fn settle(view: &mut TestView) {
    for _ in 0..200 {
      view.tick();
      if view.store.pending_mutations() == 0 && !view.store.list().is_fetching() {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("view did not settle");
  }

  async fn loaded(patterns: Vec<ProxyPattern>) -> (Arc<MemoryApi>, TestView) {
    let api = Arc::new(MemoryApi::with_patterns(patterns));
    let store = PatternStore::new(Arc::clone(&api), NoopStorage, StoreOptions::default());
    let mut view = PatternListView::new(store);
    settle(&mut view).await;
    api.clear_calls();
    (api, view)
  }

  fn teams() -> Vec<ProxyPattern> {
    vec![
      ProxyPattern::new(1, "patriots", true),
      ProxyPattern::new(2, "celtics", false),
      ProxyPattern::new(3, "bruins", true),
    ]
  }

  fn rendered(view: &mut TestView) -> String {
    let mut terminal = Terminal::new(TestBackend::new(60, 10)).unwrap();
    terminal.draw(|frame| view.render(frame, frame.area())).unwrap();
    terminal
      .backend()
      .buffer()
      .content()
      .iter()
      .map(|cell| cell.symbol())
      .collect()
  }

  #[tokio::test]
  async fn test_renders_rows_and_count() {
    let (_api, mut view) = loaded(teams()).await;
    let screen = rendered(&mut view);
    assert!(screen.contains("Patterns (3)"));
    assert!(screen.contains("patriots"));
    assert!(screen.contains("bruins"));
  }

  #[tokio::test]
  async fn test_space_toggles_selected_row() {
    let (api, mut view) = loaded(teams()).await;
    press(&mut view, KeyCode::Down);
    press(&mut view, KeyCode::Char(' '));
    settle(&mut view).await;

    assert_eq!(api.calls(), vec![Call::Update(2, ProxyPatternUpdate::enabled(true))]);
    assert!(view.store.get(2).unwrap().enabled);
  }

  #[tokio::test]
  async fn test_edit_and_confirm_sends_one_full_update() {
    let (api, mut view) = loaded(teams()).await;
    press(&mut view, KeyCode::Char('e'));
    assert!(view.is_capturing_input());
    type_str(&mut view, " fc");
    press(&mut view, KeyCode::Enter);
    settle(&mut view).await;

    assert_eq!(
      api.calls(),
      vec![Call::Update(1, ProxyPatternUpdate::full("patriots fc", true))]
    );
    assert_eq!(view.store.get(1).unwrap().pattern, "patriots fc");
    assert!(!view.is_capturing_input());
  }

  #[tokio::test]
  async fn test_edit_and_cancel_sends_nothing() {
    let (api, mut view) = loaded(teams()).await;
    press(&mut view, KeyCode::Char('e'));
    type_str(&mut view, "xyz");
    press(&mut view, KeyCode::Esc);
    settle(&mut view).await;

    assert!(api.calls().is_empty());
    assert!(!view.is_capturing_input());
    let screen = rendered(&mut view);
    assert!(screen.contains("patriots"));
    assert!(!screen.contains("xyz"));
  }

  #[tokio::test]
  async fn test_delete_selected_row() {
    let (api, mut view) = loaded(teams()).await;
    press(&mut view, KeyCode::Char('G'));
    press(&mut view, KeyCode::Char('d'));
    settle(&mut view).await;

    assert_eq!(api.calls(), vec![Call::Delete(3)]);
    assert_eq!(view.store.patterns().len(), 2);
  }

  #[tokio::test]
  async fn test_add_modal_creates_pattern() {
    let (api, mut view) = loaded(teams()).await;
    press(&mut view, KeyCode::Char('a'));
    assert!(view.is_capturing_input());
    type_str(&mut view, "eagles");
    press(&mut view, KeyCode::Enter);
    settle(&mut view).await;

    assert_eq!(api.calls(), vec![Call::Create(ProxyPatternCreate::enabled("eagles"))]);
    assert_eq!(view.store.patterns()[3], ProxyPattern::new(4, "eagles", true));
  }

  #[tokio::test]
  async fn test_add_command_opens_modal() {
    let (_api, mut view) = loaded(teams()).await;
    assert!(view.handle_command("add"));
    assert!(view.modal.is_active());
    assert!(!view.handle_command("bogus"));
  }

  #[tokio::test]
  async fn test_search_filters_and_resolves_selection() {
    let (api, mut view) = loaded(teams()).await;
    type_str(&mut view, "/BRU");
    press(&mut view, KeyCode::Enter);

    assert_eq!(view.visible().len(), 1);
    press(&mut view, KeyCode::Char(' '));
    settle(&mut view).await;
    assert_eq!(api.calls(), vec![Call::Update(3, ProxyPatternUpdate::enabled(false))]);

    // Esc drops the filter and keeps the row selected
    press(&mut view, KeyCode::Esc);
    assert_eq!(view.visible().len(), 3);
    assert_eq!(view.selected_pattern().map(|p| p.id), Some(3));
  }

  #[tokio::test]
  async fn test_failed_mutation_shows_status() {
    let (api, mut view) = loaded(teams()).await;
    api.fail_next(422, "pattern must be unique");
    press(&mut view, KeyCode::Char('a'));
    type_str(&mut view, "patriots");
    press(&mut view, KeyCode::Enter);
    settle(&mut view).await;

    assert_eq!(
      view.status.as_deref(),
      Some("create failed: server returned 422: pattern must be unique")
    );
    assert_eq!(view.store.patterns().len(), 3);

    // Cleared by the next key
    press(&mut view, KeyCode::Down);
    assert!(view.status.is_none());
  }

  #[tokio::test]
  async fn test_failures_in_one_poll_are_all_reported() {
    let (api, mut view) = loaded(teams()).await;
    // Both rows vanish on the server before the user acts on them
    api.delete(1).await.unwrap();
    api.delete(3).await.unwrap();
    api.clear_calls();

    press(&mut view, KeyCode::Char(' '));
    press(&mut view, KeyCode::Char('G'));
    press(&mut view, KeyCode::Char('d'));
    tokio::time::sleep(Duration::from_millis(50)).await;
    view.tick();

    let status = view.status.clone().unwrap_or_default();
    assert!(status.contains("update of pattern 1 failed: proxy pattern 1 not found"));
    assert!(status.contains("delete of pattern 3 failed: proxy pattern 3 not found"));
  }

  #[tokio::test]
  async fn test_keys_act_before_first_draw() {
    let (api, mut view) = loaded(teams()).await;
    assert_eq!(view.table_state.selected(), Some(0));

    press(&mut view, KeyCode::Char(' '));
    settle(&mut view).await;
    assert_eq!(api.calls(), vec![Call::Update(1, ProxyPatternUpdate::enabled(false))]);
  }

  #[tokio::test]
  async fn test_failed_refresh_shows_in_title() {
    let (api, mut view) = loaded(teams()).await;
    api.fail_next(503, "database unavailable");
    press(&mut view, KeyCode::Char('r'));
    settle(&mut view).await;

    assert_eq!(
      view.title(),
      " Patterns (3) [refresh failed: server returned 503: database unavailable] "
    );
    assert!(rendered(&mut view).contains("patriots"));

    // The next good fetch clears it
    press(&mut view, KeyCode::Char('r'));
    settle(&mut view).await;
    assert_eq!(view.title(), " Patterns (3) ");
  }

  #[tokio::test]
  async fn test_edit_dropped_when_pattern_deleted_elsewhere() {
    let (api, mut view) = loaded(teams()).await;
    press(&mut view, KeyCode::Char('e'));
    assert_eq!(view.row.editing_id(), Some(1));

    api.delete(1).await.unwrap();
    view.handle_command("refresh");
    settle(&mut view).await;

    assert!(!view.row.is_editing());
    assert_eq!(api.patterns().len(), 2);
  }

  #[tokio::test]
  async fn test_enter_opens_detail() {
    let (_api, mut view) = loaded(teams()).await;
    let action = press(&mut view, KeyCode::Enter);
    match action {
      ViewAction::Push(detail) => assert_eq!(detail.breadcrumb_label(), "patriots"),
      _ => panic!("expected detail view"),
    }
  }

  #[tokio::test]
  async fn test_q_pops() {
    let (_api, mut view) = loaded(teams()).await;
    assert!(matches!(press(&mut view, KeyCode::Char('q')), ViewAction::Pop));
  }
}
