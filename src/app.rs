use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{View, ViewAction};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::{stdout, Stdout};
use std::time::Duration;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(100);

/// Main application state
pub struct App {
  /// Navigation stack, the pattern table is always at index 0
  views: Vec<Box<dyn View>>,

  /// `:` prompt, owned here so it works over any view
  command: CommandInput,

  /// Header title
  title: String,

  /// Transient message for the footer (e.g. unknown command)
  status: Option<String>,

  should_quit: bool,
}

impl App {
  pub fn new(title: String, root: Box<dyn View>) -> Self {
    Self {
      views: vec![root],
      command: CommandInput::new(),
      title,
      status: None,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Restore the terminal even if the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    info!("exiting");
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {
        // Every view polls, so work started by a covered view still lands
        for view in &mut self.views {
          view.tick();
        }
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let capturing = self.current_view().is_some_and(|v| v.is_capturing_input());

    if self.command.is_active() || !capturing {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(cmd)) => {
          self.execute_command(&cmd);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => {
          self.status = None;
          return;
        }
        KeyResult::NotHandled => {}
      }
    }

    self.status = None;
    let action = match self.views.last_mut() {
      Some(view) => view.handle_key(key),
      None => return,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => {
        debug!(view = %view.breadcrumb_label(), "push view");
        self.views.push(view);
      }
      ViewAction::Pop => {
        if self.views.len() > 1 {
          self.views.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  fn execute_command(&mut self, cmd: &str) {
    debug!(cmd, "command");
    match cmd {
      "quit" => self.should_quit = true,
      "patterns" => self.views.truncate(1),
      "add" => {
        self.views.truncate(1);
        if let Some(root) = self.views.first_mut() {
          root.handle_command(cmd);
        }
      }
      "" => {}
      _ => {
        let handled = self
          .views
          .last_mut()
          .is_some_and(|view| view.handle_command(cmd));
        if !handled {
          self.status = Some(format!("Unknown command: {}", cmd));
        }
      }
    }
  }

  // Accessors for UI rendering
  pub fn current_view(&self) -> Option<&dyn View> {
    self.views.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.views.last_mut()
  }

  pub fn command(&self) -> &CommandInput {
    &self.command
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn status(&self) -> Option<&str> {
    self.status.as_deref()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self.views.iter().map(|v| v.breadcrumb_label()).collect()
  }
}
