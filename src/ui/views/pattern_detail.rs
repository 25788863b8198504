use crate::api::{ApiError, PatternApi, ProxyPattern};
use crate::query::{Query, QueryState};
use crate::ui::renderfns::enabled_color;
use crate::ui::view::{Shortcut, View, ViewAction};
use chrono::{DateTime, Local, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use std::sync::Arc;

pub const PATTERN_GONE: &str = "Pattern no longer exists";

/// Fresh read of a single pattern
pub struct PatternDetailView {
  id: i64,
  label: String,
  query: Query<ProxyPattern>,
}

impl PatternDetailView {
  pub fn new<A: PatternApi>(id: i64, label: String, api: Arc<A>) -> Self {
    let mut query = Query::new(move || {
      let api = Arc::clone(&api);
      async move {
        api.read(id).await.map_err(|e| match e {
          ApiError::NotFound { .. } => PATTERN_GONE.to_string(),
          e => e.to_string(),
        })
      }
    });

    // Start fetching immediately
    query.fetch();

    Self { id, label, query }
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let title = match self.query.state() {
      QueryState::Loading => format!(" Pattern #{} (loading...) ", self.id),
      _ => format!(" Pattern #{} ", self.id),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let Some(error) = self.query.error() {
      let paragraph = Paragraph::new(format!("{}\n\nPress 'r' to retry.", error))
        .style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, inner);
      return;
    }

    let Some(pattern) = self.query.data() else {
      let paragraph =
        Paragraph::new("Loading pattern...").style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, inner);
      return;
    };

    let lines = vec![
      field("Pattern", Span::raw(pattern.pattern.as_str())),
      field(
        "Enabled",
        Span::styled(
          if pattern.enabled { "yes" } else { "no" },
          Style::default().fg(enabled_color(pattern.enabled)),
        ),
      ),
      field("Type", Span::raw(pattern.pattern_type.label())),
      field("Created", Span::raw(timestamp(pattern.created_at))),
      field("Updated", Span::raw(timestamp(pattern.updated_at))),
    ];

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
  }
}

fn field<'a>(name: &'a str, value: Span<'a>) -> Line<'a> {
  Line::from(vec![
    Span::styled(format!("{:<9}", format!("{}:", name)), Style::default().fg(Color::DarkGray)),
    value,
  ])
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
  at.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
    .unwrap_or_else(|| "-".to_string())
}

impl View for PatternDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.query.refetch();
        ViewAction::None
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.label.clone()
  }

  fn handle_command(&mut self, cmd: &str) -> bool {
    if cmd == "refresh" {
      self.query.refetch();
      return true;
    }
    false
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new(":", "command").with_priority(10),
      Shortcut::new("r", "refresh").with_priority(20),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::memory::{Call, MemoryApi};
  use crossterm::event::KeyModifiers;
  use std::time::Duration;

  async fn settle(view: &mut PatternDetailView) {
    for _ in 0..200 {
      view.tick();
      if !view.query.is_fetching() {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("detail did not settle");
  }

  #[tokio::test]
  async fn test_reads_pattern() {
    let api = Arc::new(MemoryApi::with_patterns(vec![ProxyPattern::new(7, "eagles", true)]));
    let mut view = PatternDetailView::new(7, "eagles".to_string(), Arc::clone(&api));
    settle(&mut view).await;

    assert_eq!(view.query.data(), Some(&ProxyPattern::new(7, "eagles", true)));
    assert_eq!(api.calls(), vec![Call::Read(7)]);
  }

  #[tokio::test]
  async fn test_missing_pattern_message() {
    let api = Arc::new(MemoryApi::with_patterns(Vec::new()));
    let mut view = PatternDetailView::new(7, "eagles".to_string(), api);
    settle(&mut view).await;

    assert_eq!(view.query.error(), Some(PATTERN_GONE));
  }

  #[tokio::test]
  async fn test_r_rereads() {
    let api = Arc::new(MemoryApi::with_patterns(vec![ProxyPattern::new(7, "eagles", true)]));
    let mut view = PatternDetailView::new(7, "eagles".to_string(), Arc::clone(&api));
    settle(&mut view).await;

    view.handle_key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE));
    settle(&mut view).await;
    assert_eq!(api.calls(), vec![Call::Read(7), Call::Read(7)]);
  }

  #[test]
  fn test_timestamp_placeholder() {
    assert_eq!(timestamp(None), "-");
  }
}
