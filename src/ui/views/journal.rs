use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::api::dreams::DeleteDream;
use crate::api::types::{Dream, ListParams, Page};
use crate::api::validation::MIN_SEARCH_LENGTH;
use crate::mutation::{Mutation, MutationState};
use crate::navigation::Route;
use crate::query::{Query, QueryStatus};
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{first_line, format_date, truncate};
use crate::ui::view::{Context, Shortcut, View, ViewAction};

/// Paged list of the user's dreams, with server-side search.
pub struct JournalView {
  ctx: Context,
  params: ListParams,
  list: Query<Page<Dream>>,
  /// Only set for terms long enough to send
  search: Option<Query<Page<Dream>>>,
  search_input: SearchInput,
  list_state: ListState,
  delete: Mutation<DeleteDream>,
  /// Dream awaiting a y/n confirmation
  confirm_delete: Option<String>,
}

impl JournalView {
  pub fn new(ctx: Context) -> Self {
    let params = ListParams::default();
    let mut list = ctx.dreams.list(params.clone());
    list.fetch();

    Self {
      params,
      list,
      search: None,
      search_input: SearchInput::new(" Search dreams ").with_min_chars(MIN_SEARCH_LENGTH),
      list_state: ListState::default(),
      delete: ctx.dreams.delete(),
      confirm_delete: None,
      ctx,
    }
  }

  fn active_query(&self) -> &Query<Page<Dream>> {
    self.search.as_ref().unwrap_or(&self.list)
  }

  fn dreams(&self) -> &[Dream] {
    self
      .active_query()
      .data()
      .map(|page| page.items.as_slice())
      .unwrap_or(&[])
  }

  fn selected(&self) -> Option<&Dream> {
    self.list_state.selected().and_then(|i| self.dreams().get(i))
  }

  fn set_search(&mut self, term: &str) {
    let term = term.trim();
    if term.chars().count() < MIN_SEARCH_LENGTH {
      self.search = None;
      return;
    }

    let query = self.ctx.dreams.search(term);
    if self.search.as_ref().is_some_and(|q| q.key() == query.key()) {
      return;
    }
    let mut query = query;
    query.fetch();
    self.search = Some(query);
    self.list_state.select(Some(0));
  }

  fn go_to_page(&mut self, page: Option<u32>) {
    if self.search.is_some() {
      return;
    }
    if let Some(page) = page {
      self.params = self.params.clone().with_page(page);
      self.ctx.dreams.rebind_list(&mut self.list, self.params.clone());
      self.list_state.select(Some(0));
    }
  }

  fn title(&self) -> String {
    let query = self.active_query();
    let what = match (&self.search, query.data()) {
      (Some(_), Some(page)) => format!("Search \"{}\" ({})", self.search_input.query().trim(), page.total),
      (Some(_), None) => format!("Search \"{}\"", self.search_input.query().trim()),
      (None, Some(page)) => format!("Journal ({}) page {}/{}", page.total, page.page, page.pages.max(1)),
      (None, None) => "Journal".to_string(),
    };
    match query.status() {
      QueryStatus::Loading => format!(" {} (loading...) ", what),
      QueryStatus::Error(e) => format!(" {} (error: {}) ", what, e),
      _ => format!(" {} ", what),
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.dreams().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 {
      let query = self.active_query();
      let content = if query.is_loading() {
        "Loading..."
      } else if query.error().is_some() {
        "Failed to load dreams. Press 'r' to retry."
      } else if self.search.is_some() {
        "No dreams match this search."
      } else {
        "No dreams yet. Use :home to describe one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let text_width = (area.width as usize).saturating_sub(40).max(20);
    let items: Vec<ListItem> = self
      .dreams()
      .iter()
      .map(|dream| {
        let symbol = dream
          .interpretation
          .as_ref()
          .map(|i| {
            format!(
              "{} {}",
              i.main_symbol_emoji.as_deref().unwrap_or(" "),
              truncate(&i.main_symbol, 14)
            )
          })
          .unwrap_or_default();
        ListItem::new(Line::from(vec![
          Span::styled(format_date(&dream.created_at), Style::default().fg(Color::DarkGray)),
          Span::raw("  "),
          Span::styled(format!("{:<17}", symbol), Style::default().fg(Color::Magenta)),
          Span::raw(truncate(first_line(&dream.text), text_width)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    if let Some(id) = self.confirm_delete.take() {
      if key.code == KeyCode::Char('y') {
        self.delete.mutate(id);
      }
      return Some(ViewAction::None);
    }

    match self.search_input.handle_key(key) {
      KeyResult::Handled => Some(ViewAction::None),
      KeyResult::Event(SearchEvent::Changed(term)) | KeyResult::Event(SearchEvent::Submitted(term)) => {
        self.set_search(&term);
        Some(ViewAction::None)
      }
      KeyResult::NotHandled => None,
    }
  }

  fn handle_list_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('n') | KeyCode::Right => {
        let next = self.list.data().and_then(Page::next_page);
        self.go_to_page(next);
      }
      KeyCode::Char('p') | KeyCode::Left => {
        let prev = self.list.data().and_then(Page::prev_page);
        self.go_to_page(prev);
      }
      KeyCode::Char('r') => match &mut self.search {
        Some(search) => search.refetch(),
        None => self.list.refetch(),
      },
      KeyCode::Char('d') => self.confirm_delete = self.selected().map(|d| d.id.clone()),
      KeyCode::Enter => {
        if let Some(dream) = self.selected() {
          return ViewAction::Navigate(Route::Dream(dream.id.clone()));
        }
      }
      KeyCode::Esc if self.search.is_some() => {
        self.search = None;
        self.search_input.clear();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }
}

impl View for JournalView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .unwrap_or_else(|| self.handle_list_key(key))
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(3), Constraint::Length(1)])
      .split(area);

    self.render_list(frame, chunks[0]);

    let status = if self.confirm_delete.is_some() {
      Line::styled(" Delete this dream? y/n", Style::default().fg(Color::Red).bold())
    } else if self.delete.is_pending() {
      Line::styled(" Deleting...", Style::default().fg(Color::Yellow))
    } else {
      Line::raw("")
    };
    frame.render_widget(Paragraph::new(status), chunks[1]);

    self.search_input.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Journal".to_string()
  }

  fn route(&self) -> Route {
    Route::Journal
  }

  fn tick(&mut self) -> ViewAction {
    if self.delete.poll() {
      match self.delete.state().clone() {
        MutationState::Success(()) => {
          self.ctx.notifier.success("Dream deleted");
        }
        MutationState::Error(e) => {
          self.ctx.report(&e);
        }
        _ => {}
      }
      self.delete.reset();
    }

    self.list.poll();
    if let Some(search) = &mut self.search {
      search.poll();
    }
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.search_input.is_active() || self.confirm_delete.is_some()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("/", "search").with_priority(10),
      Shortcut::new("n/p", "page").with_priority(20),
      Shortcut::new("d", "delete").with_priority(30),
      Shortcut::new("r", "refresh").with_priority(40).when_active(),
      Shortcut::new(":", "command").with_priority(50),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::fixtures;
  use crate::query::test_support::poll_until;
  use crate::ui::views::test_support::{context, key, type_str};
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  async fn server_with_list(ids: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/dreams"))
      .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::page(ids)))
      .mount(&server)
      .await;
    server
  }

  #[tokio::test]
  async fn test_short_search_terms_are_not_sent() {
    let server = server_with_list(&["a", "b"]).await;
    Mock::given(method("GET"))
      .and(path("/api/v1/dreams/search"))
      .and(query_param("q", "sea"))
      .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::page(&["b"])))
      .expect(1)
      .mount(&server)
      .await;

    let mut view = JournalView::new(context(&server, Some("token")));
    poll_until(&mut view.list, |q| q.is_success()).await;
    assert_eq!(view.dreams().len(), 2);

    view.handle_key(key(KeyCode::Char('/')));
    type_str(&mut view, "se");
    assert!(view.search.is_none());

    type_str(&mut view, "a");
    let search = view.search.as_mut().unwrap();
    poll_until(search, |q| q.is_success()).await;
    assert_eq!(view.dreams().len(), 1);
    assert_eq!(view.dreams()[0].id, "b");

    // Esc in the overlay clears the search and shows the list again
    view.handle_key(key(KeyCode::Esc));
    assert!(view.search.is_none());
    assert_eq!(view.dreams().len(), 2);
  }

  #[tokio::test]
  async fn test_confirmed_delete_removes_row_immediately() {
    let server = server_with_list(&["a", "b"]).await;
    Mock::given(method("DELETE"))
      .and(path("/api/v1/dreams/a"))
      .respond_with(ResponseTemplate::new(204).set_delay(std::time::Duration::from_millis(200)))
      .mount(&server)
      .await;

    let ctx = context(&server, Some("token"));
    let mut view = JournalView::new(ctx.clone());
    poll_until(&mut view.list, |q| q.is_success()).await;

    view.handle_key(key(KeyCode::Char('d')));
    assert_eq!(view.confirm_delete.as_deref(), Some("a"));
    view.handle_key(key(KeyCode::Char('y')));
    assert!(view.delete.is_pending());

    // the optimistic patch is visible on the next tick, before the server answers
    view.tick();
    assert_eq!(view.dreams().len(), 1);
    assert_eq!(view.list.data().unwrap().total, 1);
  }

  #[tokio::test]
  async fn test_declined_delete_does_nothing() {
    let server = server_with_list(&["a"]).await;
    let mut view = JournalView::new(context(&server, Some("token")));
    poll_until(&mut view.list, |q| q.is_success()).await;

    view.handle_key(key(KeyCode::Char('d')));
    view.handle_key(key(KeyCode::Char('n')));
    assert!(view.confirm_delete.is_none());
    assert!(!view.delete.is_pending());
  }

  #[tokio::test]
  async fn test_enter_opens_selected_dream() {
    let server = server_with_list(&["a", "b"]).await;
    let mut view = JournalView::new(context(&server, Some("token")));
    poll_until(&mut view.list, |q| q.is_success()).await;

    let len = view.dreams().len();
    ensure_valid_selection(&mut view.list_state, len);
    view.handle_key(key(KeyCode::Char('j')));
    match view.handle_key(key(KeyCode::Enter)) {
      ViewAction::Navigate(route) => assert_eq!(route, Route::Dream("b".into())),
      _ => panic!("expected navigation"),
    }
  }
}
