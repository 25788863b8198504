use ratatui::prelude::Color;

/// Truncate a string to at most `max_len` chars, ending in "..." if cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Row color for a pattern's enabled flag
pub fn enabled_color(enabled: bool) -> Color {
  if enabled {
    Color::Green
  } else {
    Color::DarkGray
  }
}

pub fn enabled_marker(enabled: bool) -> &'static str {
  if enabled {
    "[x]"
  } else {
    "[ ]"
  }
}
