use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::catalog::{self, Category, Symbol};
use crate::navigation::Route;
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::view::{Shortcut, View, ViewAction};

/// Browsable list of common dream symbols.
pub struct CatalogView {
  filter: SearchInput,
  category: Option<Category>,
  list_state: ListState,
}

impl CatalogView {
  pub fn new() -> Self {
    Self {
      filter: SearchInput::new(" Filter symbols "),
      category: None,
      list_state: ListState::default(),
    }
  }

  fn symbols(&self) -> Vec<&'static Symbol> {
    catalog::filter(self.filter.query(), self.category)
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let symbols = self.symbols();
    ensure_valid_selection(&mut self.list_state, symbols.len());

    let category = self.category.map_or("All", |c| c.label());
    let title = if self.filter.query().is_empty() {
      format!(" Symbols [{}] ({}) ", category, symbols.len())
    } else {
      format!(
        " Symbols [{}] \"{}\" ({}) ",
        category,
        self.filter.query(),
        symbols.len()
      )
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if symbols.is_empty() {
      let paragraph = Paragraph::new("No symbols match. Press c to change category.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = symbols
      .iter()
      .map(|symbol| {
        ListItem::new(Line::from(vec![
          Span::raw(format!("{} ", symbol.emoji)),
          Span::styled(format!("{:<12}", symbol.name), Style::default().fg(Color::Magenta)),
          Span::styled(format!("{:<10}", symbol.category.label()), Style::default().fg(Color::DarkGray)),
          Span::raw(symbol.description),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl Default for CatalogView {
  fn default() -> Self {
    Self::new()
  }
}

impl View for CatalogView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.filter.handle_key(key) {
      KeyResult::Handled | KeyResult::Event(SearchEvent::Submitted(_)) => return ViewAction::None,
      KeyResult::Event(SearchEvent::Changed(_)) => {
        self.list_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('c') => {
        self.category = Category::cycle(self.category);
        self.list_state.select(Some(0));
      }
      KeyCode::Enter => {
        let selected = self.list_state.selected().and_then(|i| self.symbols().get(i).copied());
        if let Some(symbol) = selected {
          return ViewAction::Navigate(Route::Symbol(symbol.slug.to_string()));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
    self.filter.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Catalog".to_string()
  }

  fn route(&self) -> Route {
    Route::Catalog
  }

  fn captures_input(&self) -> bool {
    self.filter.is_active()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("/", "filter").with_priority(10),
      Shortcut::new("c", "category").with_priority(20),
      Shortcut::new(":", "command").with_priority(30),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ui::views::test_support::{key, type_str};

  #[test]
  fn test_filter_then_open_symbol() {
    let mut view = CatalogView::new();
    view.handle_key(key(KeyCode::Char('/')));
    type_str(&mut view, "snake");
    view.handle_key(key(KeyCode::Enter));
    assert!(!view.captures_input());

    match view.handle_key(key(KeyCode::Enter)) {
      ViewAction::Navigate(route) => assert_eq!(route, Route::Symbol("snake".into())),
      _ => panic!("expected navigation"),
    }
  }

  #[test]
  fn test_category_cycle_narrows_list() {
    let mut view = CatalogView::new();
    assert_eq!(view.symbols().len(), catalog::SYMBOLS.len());
    view.handle_key(key(KeyCode::Char('c')));
    assert_eq!(view.category, Some(Category::Nature));
    assert!(view.symbols().iter().all(|s| s.category == Category::Nature));
  }
}
