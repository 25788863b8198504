use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::api::ProxyPatternCreate;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

pub const PATTERN_REQUIRED: &str = "Pattern is required";

/// Events emitted by the add modal that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalEvent {
  Submitted(ProxyPatternCreate),
  Cancelled,
}

/// Centered form with a single pattern field. New patterns start enabled.
#[derive(Debug, Clone, Default)]
pub struct AddPatternModal {
  active: bool,
  input: TextInput,
  error: Option<&'static str>,
}

impl AddPatternModal {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open with an empty field
  pub fn open(&mut self) {
    self.active = true;
    self.input.clear();
    self.error = None;
  }

  fn close(&mut self) {
    self.active = false;
    self.input.clear();
    self.error = None;
  }

  pub fn error(&self) -> Option<&str> {
    self.error
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<ModalEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(_) if self.input.is_empty() => {
        self.error = Some(PATTERN_REQUIRED);
        KeyResult::Handled
      }
      InputResult::Submitted(pattern) => {
        self.close();
        KeyResult::Event(ModalEvent::Submitted(ProxyPatternCreate::enabled(pattern)))
      }
      InputResult::Cancelled => {
        self.close();
        KeyResult::Event(ModalEvent::Cancelled)
      }
      InputResult::Consumed => {
        self.error = None;
        KeyResult::Handled
      }
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(40.min(area.width), 70);
    let height = 6.min(area.height);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let overlay_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Add Pattern ")
      .title_bottom(Line::from(" Enter: save  Esc: cancel ").right_aligned());

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    let mut field = vec![Span::styled("Pattern: ", Style::default().fg(Color::DarkGray))];
    field.extend(self.input.spans(Style::default().fg(Color::White)));

    let mut lines = vec![Line::from(field)];
    if let Some(error) = self.error() {
      lines.push(Line::from(""));
      lines.push(Line::styled(error, Style::default().fg(Color::Red)));
    }

    frame.render_widget(Paragraph::new(lines), inner);
  }
}
