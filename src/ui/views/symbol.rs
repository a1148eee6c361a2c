use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::catalog::{self, Symbol};
use crate::navigation::Route;
use crate::ui::ensure_valid_selection;
use crate::ui::view::{Shortcut, View, ViewAction};

/// One catalog symbol with its readings and related symbols.
pub struct SymbolView {
  slug: String,
  symbol: Option<&'static Symbol>,
  related: ListState,
}

impl SymbolView {
  pub fn new(slug: String) -> Self {
    Self {
      symbol: catalog::find(&slug),
      slug,
      related: ListState::default(),
    }
  }

  fn related(&self) -> Vec<&'static Symbol> {
    self
      .symbol
      .map(|s| s.related.iter().filter_map(|slug| catalog::find(slug)).collect())
      .unwrap_or_default()
  }
}

impl View for SymbolView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.related.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.related.select_previous(),
      KeyCode::Enter => {
        let selected = self.related.selected().and_then(|i| self.related().get(i).copied());
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
    let symbol = match self.symbol {
      Some(symbol) => symbol,
      None => {
        let paragraph = Paragraph::new(format!("Unknown symbol \"{}\".", self.slug))
          .style(Style::default().fg(Color::DarkGray))
          .block(Block::default().title(" Symbol ").borders(Borders::ALL));
        frame.render_widget(paragraph, area);
        return;
      }
    };

    let related = self.related();
    ensure_valid_selection(&mut self.related, related.len());

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(5),
        Constraint::Length(related.len().min(6) as u16 + 2),
      ])
      .split(area);

    let mut lines = vec![
      Line::styled(symbol.description, Style::default().bold()),
      Line::styled(symbol.category.label(), Style::default().fg(Color::DarkGray)),
      Line::raw(""),
    ];
    if symbol.readings.is_empty() {
      lines.push(Line::styled(
        "No detailed readings yet.",
        Style::default().fg(Color::DarkGray),
      ));
    }
    for reading in symbol.readings {
      lines.push(Line::raw(format!("• {}", reading)));
    }

    let block = Block::default()
      .title(format!(" {} {} ", symbol.emoji, symbol.name))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      chunks[0],
    );

    let items: Vec<ListItem> = related
      .iter()
      .map(|s| ListItem::new(format!("{} {}", s.emoji, s.name)))
      .collect();
    let list = List::new(items)
      .block(Block::default().title(" Related ").borders(Borders::ALL))
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");
    frame.render_stateful_widget(list, chunks[1], &mut self.related);
  }

  fn breadcrumb_label(&self) -> String {
    self.symbol.map_or_else(|| self.slug.clone(), |s| s.name.to_string())
  }

  fn route(&self) -> Route {
    Route::Symbol(self.slug.clone())
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("enter", "open related").with_priority(10),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ui::views::test_support::key;

  #[test]
  fn test_related_navigation() {
    let mut view = SymbolView::new("water".into());
    assert_eq!(view.breadcrumb_label(), "Water");
    view.related.select(Some(1));
    match view.handle_key(key(KeyCode::Enter)) {
      ViewAction::Navigate(route) => assert_eq!(route, Route::Symbol("rain".into())),
      _ => panic!("expected navigation"),
    }
  }

  #[test]
  fn test_unknown_symbol() {
    let mut view = SymbolView::new("unicorn".into());
    assert!(view.related().is_empty());
    assert!(matches!(view.handle_key(key(KeyCode::Enter)), ViewAction::None));
  }
}
