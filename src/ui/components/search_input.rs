use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by search input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Query changed (each keystroke; empty string on cancel)
  Changed(String),
  /// Overlay closed, query kept
  Submitted(String),
}

/// `/`-activated search overlay
#[derive(Debug, Clone)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
  title: &'static str,
  /// Shorter queries show a hint instead of searching
  min_chars: usize,
}

impl Default for SearchInput {
  fn default() -> Self {
    Self::new(" Search ")
  }
}

impl SearchInput {
  pub fn new(title: &'static str) -> Self {
    Self {
      input: TextInput::new(),
      active: false,
      title,
      min_chars: 0,
    }
  }

  pub fn with_min_chars(mut self, min_chars: usize) -> Self {
    self.min_chars = min_chars;
    self
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn query(&self) -> &str {
    self.input.value()
  }

  /// Open the overlay, keeping the previous query for editing
  pub fn activate(&mut self) {
    self.active = true;
  }

  pub fn clear(&mut self) {
    self.input.clear();
  }

  /// Call this regardless of active state - it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.activate();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(query) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted(query))
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(SearchEvent::Changed(String::new()))
      }
      InputResult::Consumed => KeyResult::Event(SearchEvent::Changed(self.input.value().to_string())),
      // Swallow everything else while the overlay is open
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  fn too_short(&self) -> bool {
    let len = self.input.value().trim().chars().count();
    len > 0 && len < self.min_chars
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let height = if self.too_short() { 4 } else { 3 };
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, height.min(area.height));

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(self.title);

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let mut lines = vec![Line::from(vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ])];
    if self.too_short() {
      lines.push(Line::styled(
        format!("type at least {} characters", self.min_chars),
        Style::default().fg(Color::DarkGray),
      ));
    }
    frame.render_widget(Paragraph::new(lines), inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_activation_and_changes() {
    let mut search = SearchInput::new(" Search ").with_min_chars(3);
    assert_eq!(search.handle_key(key(KeyCode::Char('x'))), KeyResult::NotHandled);
    assert_eq!(search.handle_key(key(KeyCode::Char('/'))), KeyResult::Handled);
    assert!(search.is_active());

    assert_eq!(
      search.handle_key(key(KeyCode::Char('s'))),
      KeyResult::Event(SearchEvent::Changed("s".into()))
    );
    assert!(search.too_short());
    assert_eq!(
      search.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(SearchEvent::Submitted("s".into()))
    );
    assert!(!search.is_active());
    assert_eq!(search.query(), "s");
  }

  #[test]
  fn test_cancel_clears_query() {
    let mut search = SearchInput::default();
    search.activate();
    search.handle_key(key(KeyCode::Char('a')));
    assert_eq!(
      search.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(SearchEvent::Changed(String::new()))
    );
    assert_eq!(search.query(), "");
  }
}
