use crate::ui::view::Shortcut;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with app name, service title and the view's shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, title: &str, shortcuts: &[Shortcut]) {
  let mut spans = vec![
    Span::styled(" pxp ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::Yellow).bold()),
    Span::raw(" "),
  ];
  spans.extend(shortcut_spans(shortcuts));

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

/// Shortcuts by priority: keys highlighted, descriptions dimmed
fn shortcut_spans(shortcuts: &[Shortcut]) -> Vec<Span<'static>> {
  let mut sorted: Vec<&Shortcut> = shortcuts.iter().collect();
  sorted.sort_by_key(|s| s.priority);

  sorted
    .into_iter()
    .flat_map(|s| {
      [
        Span::raw("  "),
        Span::styled(format!("<{}>", s.key), Style::default().fg(Color::Cyan)),
        Span::styled(format!(" {}", s.label), Style::default().fg(Color::DarkGray)),
      ]
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn text(spans: &[Span]) -> String {
    spans.iter().map(|s| s.content.as_ref()).collect()
  }

  #[test]
  fn test_shortcuts_sorted_by_priority() {
    let shortcuts = [
      Shortcut::new("q", "back").with_priority(90),
      Shortcut::new("a", "add").with_priority(20),
      Shortcut::new(":", "command").with_priority(10),
    ];
    assert_eq!(
      text(&shortcut_spans(&shortcuts)),
      "  <:> command  <a> add  <q> back"
    );
  }

  #[test]
  fn test_no_shortcuts() {
    assert!(shortcut_spans(&[]).is_empty());
  }
}
