use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{ApiError, AuthService, DreamService};
use crate::db::SessionStash;
use crate::navigation::Route;
use crate::notify::{ErrorRoute, Notifier};

/// When a shortcut should be shown in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortcutVisibility {
  #[default]
  Always,
  /// Only listed in help, not the header
  WhenActive,
}

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub visibility: ShortcutVisibility,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      visibility: ShortcutVisibility::Always,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }

  pub const fn when_active(mut self) -> Self {
    self.visibility = ShortcutVisibility::WhenActive;
    self
  }
}

pub type Shortcut = ShortcutInfo;

/// Everything a view needs from the rest of the app.
#[derive(Clone)]
pub struct Context {
  pub dreams: DreamService,
  pub auth: AuthService,
  pub notifier: Notifier,
  pub stash: Arc<SessionStash>,
  /// Language requested for interpretations
  pub language: String,
  /// Where narration audio is written
  pub audio_dir: PathBuf,
}

impl Context {
  /// Toast what should be toasted; returns the message to show inline, if
  /// the error belongs next to a form field.
  pub fn report(&self, error: &ApiError) -> Option<String> {
    match self.notifier.report(error) {
      ErrorRoute::Inline(message) => Some(message),
      _ => None,
    }
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  None,
  /// Push a view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
  /// Go to a route; the app decides whether it stacks or replaces
  Navigate(Route),
}

/// Trait for view behavior
///
/// Views handle their own input modes (search, edit, forms) and return
/// actions for the App to execute: App → View → Components.
///
/// Views that load data own `Query`/`Mutation` values and poll them in
/// `tick()`.
pub trait View {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  fn breadcrumb_label(&self) -> String;

  /// Route this view shows, used as the return path after a login
  fn route(&self) -> Route;

  /// Poll queries and mutations; a finished mutation may navigate.
  fn tick(&mut self) -> ViewAction {
    ViewAction::None
  }

  /// True while a text field has focus, so `:` and `q` are typed, not run
  fn captures_input(&self) -> bool {
    false
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
