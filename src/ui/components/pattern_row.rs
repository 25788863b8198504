use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::api::{ProxyPattern, ProxyPatternUpdate};
use crossterm::event::{KeyCode, KeyEvent};

/// Requests a row makes of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowEvent {
  Update { id: i64, body: ProxyPatternUpdate },
  Delete(i64),
}

#[derive(Debug, Clone, Default)]
enum RowMode {
  #[default]
  Viewing,
  Editing {
    id: i64,
    draft: TextInput,
    enabled: bool,
  },
}

/// Edit state of the selected table row.
///
/// In Viewing, `space` toggles the enabled flag, `e` starts editing and `d`
/// deletes. In Editing, every key goes to the draft except:
/// - Enter saves the draft text together with the draft flag
/// - Tab flips the flag and saves just the flag right away
/// - Esc throws the draft away
///
/// So a flag change is persisted immediately in both modes while text
/// changes wait for Enter.
#[derive(Debug, Clone, Default)]
pub struct PatternRow {
  mode: RowMode,
}

impl PatternRow {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_editing(&self) -> bool {
    matches!(self.mode, RowMode::Editing { .. })
  }

  /// Id of the pattern being edited
  pub fn editing_id(&self) -> Option<i64> {
    match &self.mode {
      RowMode::Editing { id, .. } => Some(*id),
      RowMode::Viewing => None,
    }
  }

  /// Draft text input and flag while editing
  pub fn draft(&self) -> Option<(&TextInput, bool)> {
    match &self.mode {
      RowMode::Editing { draft, enabled, .. } => Some((draft, *enabled)),
      RowMode::Viewing => None,
    }
  }

  /// Start editing `pattern`, seeding the draft from its current values
  pub fn begin_edit(&mut self, pattern: &ProxyPattern) {
    self.mode = RowMode::Editing {
      id: pattern.id,
      draft: TextInput::with_value(&pattern.pattern),
      enabled: pattern.enabled,
    };
  }

  /// Leave editing without emitting anything
  pub fn cancel(&mut self) {
    self.mode = RowMode::Viewing;
  }

  /// Handle a key for the row. `selected` is the pattern under the cursor,
  /// used in Viewing mode.
  pub fn handle_key(
    &mut self,
    key: KeyEvent,
    selected: Option<&ProxyPattern>,
  ) -> KeyResult<RowEvent> {
    match &mut self.mode {
      RowMode::Viewing => {
        let Some(pattern) = selected else {
          return KeyResult::NotHandled;
        };
        match key.code {
          KeyCode::Char('e') => {
            self.begin_edit(pattern);
            KeyResult::Handled
          }
          KeyCode::Char(' ') => KeyResult::Event(RowEvent::Update {
            id: pattern.id,
            body: ProxyPatternUpdate::enabled(!pattern.enabled),
          }),
          KeyCode::Char('d') => KeyResult::Event(RowEvent::Delete(pattern.id)),
          _ => KeyResult::NotHandled,
        }
      }
      RowMode::Editing { id, draft, enabled } => match key.code {
        KeyCode::Tab => {
          *enabled = !*enabled;
          KeyResult::Event(RowEvent::Update {
            id: *id,
            body: ProxyPatternUpdate::enabled(*enabled),
          })
        }
        _ => match draft.handle_key(key) {
          InputResult::Submitted(text) => {
            let event = RowEvent::Update {
              id: *id,
              body: ProxyPatternUpdate::full(text, *enabled),
            };
            self.mode = RowMode::Viewing;
            KeyResult::Event(event)
          }
          InputResult::Cancelled => {
            self.mode = RowMode::Viewing;
            KeyResult::Handled
          }
          InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
        },
      },
    }
  }
}
