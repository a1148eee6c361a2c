use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tracing::warn;

use super::{follow_session, DreamResultView};
use crate::api::dreams::InterpretDream;
use crate::api::types::{InterpretRequest, User};
use crate::api::validation::{dream_length, validate_dream_text, MAX_DREAM_LENGTH, MIN_DREAM_LENGTH};
use crate::api::ApiError;
use crate::mutation::{Mutation, MutationState};
use crate::navigation::{LoginReason, LoginRedirect, Route};
use crate::query::Query;
use crate::ui::components::{InputResult, TextInput};
use crate::ui::view::{Context, Shortcut, View, ViewAction};

/// Landing screen: describe a dream and get it interpreted.
pub struct HomeView {
  ctx: Context,
  input: TextInput,
  editing: bool,
  /// Inline validation message
  error: Option<String>,
  interpret: Mutation<InterpretDream>,
  user: Query<User>,
}

impl HomeView {
  pub fn new(ctx: Context) -> Self {
    let mut user = ctx.auth.current_user();
    user.fetch();

    let mut view = Self {
      interpret: ctx.dreams.interpret(),
      input: TextInput::new().with_max_chars(MAX_DREAM_LENGTH),
      editing: true,
      error: None,
      user,
      ctx,
    };

    // A draft carried across the login redirect is resumed right away
    match view.ctx.stash.take_pending_dream() {
      Ok(Some(text)) => {
        view.input.set_value(text);
        if view.ctx.auth.is_authenticated() {
          view.submit();
        }
      }
      Ok(None) => {}
      Err(e) => warn!(error = %e, "could not read pending dream"),
    }

    view
  }

  fn submit(&mut self) -> ViewAction {
    if self.interpret.is_pending() {
      return ViewAction::None;
    }

    let text = self.input.value().to_string();
    if let Err(e) = validate_dream_text(&text) {
      self.error = self.ctx.report(&e);
      return ViewAction::None;
    }
    self.error = None;

    if !self.ctx.auth.is_authenticated() {
      self.keep_draft(&text);
      let redirect = LoginRedirect::new(LoginReason::DreamAnalysis, Route::Home.to_string());
      return ViewAction::Navigate(Route::Login(Some(redirect)));
    }

    self.editing = false;
    self
      .interpret
      .mutate(InterpretRequest::new(text, self.ctx.language.clone()));
    ViewAction::None
  }

  fn keep_draft(&self, text: &str) {
    if let Err(e) = self.ctx.stash.put_pending_dream(text) {
      warn!(error = %e, "could not keep dream draft");
    }
  }

  fn limit_line(&self) -> Line<'static> {
    let dim = Style::default().fg(Color::DarkGray);
    if !self.ctx.auth.is_authenticated() {
      return Line::styled("Sign in to get interpretations (:login)", dim);
    }
    match self.user.data().map(|u| (u.remaining_today(), u.subscription_type.label())) {
      Some((None, plan)) => Line::styled(format!("Unlimited interpretations ({})", plan), dim),
      Some((Some(0), _)) => Line::styled(
        "No interpretations left today",
        Style::default().fg(Color::Yellow),
      ),
      Some((Some(left), _)) => Line::styled(format!("{} interpretation(s) left today", left), dim),
      None => Line::styled("", dim),
    }
  }
}

impl View for HomeView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.editing {
      match self.input.handle_key(key) {
        InputResult::Submitted(_) => return self.submit(),
        InputResult::Cancelled => self.editing = false,
        InputResult::Consumed => self.error = None,
        InputResult::NotHandled => {}
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('i') | KeyCode::Enter => {
        if !self.interpret.is_pending() {
          self.editing = true;
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(5),    // Dream text
        Constraint::Length(1), // Counter / hint
        Constraint::Length(1), // Error or progress
        Constraint::Length(1), // Daily limit
      ])
      .split(area);

    let border = if self.editing { Color::Magenta } else { Color::Blue };
    let block = Block::default()
      .title(" Describe your dream ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border));

    let body = if self.input.is_empty() && !self.editing {
      Text::styled(
        "Press i to start writing. Enter sends, Esc stops editing.",
        Style::default().fg(Color::DarkGray),
      )
    } else {
      let mut line = vec![Span::raw(self.input.value().to_string())];
      if self.editing {
        line.push(Span::styled("_", Style::default().fg(Color::Magenta)));
      }
      Text::from(Line::from(line))
    };
    frame.render_widget(
      Paragraph::new(body).block(block).wrap(Wrap { trim: false }),
      chunks[0],
    );

    let len = dream_length(self.input.value());
    let counter_style = if len < MIN_DREAM_LENGTH {
      Style::default().fg(Color::DarkGray)
    } else {
      Style::default().fg(Color::Green)
    };
    let mut counter = vec![Span::styled(format!(" {}/{}", len, MAX_DREAM_LENGTH), counter_style)];
    if len < MIN_DREAM_LENGTH {
      counter.push(Span::styled(
        format!("  at least {} characters", MIN_DREAM_LENGTH),
        Style::default().fg(Color::DarkGray),
      ));
    }
    frame.render_widget(Paragraph::new(Line::from(counter)), chunks[1]);

    let status = if self.interpret.is_pending() {
      Line::styled(" Interpreting your dream...", Style::default().fg(Color::Yellow))
    } else if let Some(error) = &self.error {
      Line::styled(format!(" {}", error), Style::default().fg(Color::Red))
    } else {
      Line::raw("")
    };
    frame.render_widget(Paragraph::new(status), chunks[2]);

    let mut limit = self.limit_line();
    limit.spans.insert(0, Span::raw(" "));
    frame.render_widget(Paragraph::new(limit), chunks[3]);
  }

  fn breadcrumb_label(&self) -> String {
    "New dream".to_string()
  }

  fn route(&self) -> Route {
    Route::Home
  }

  fn tick(&mut self) -> ViewAction {
    follow_session(&mut self.user, &self.ctx);
    self.user.poll();

    if !self.interpret.poll() {
      return ViewAction::None;
    }

    match self.interpret.state().clone() {
      MutationState::Success(response) => {
        self.interpret.reset();
        self.input.clear();
        self.user.refetch();
        match self.ctx.stash.put_last_interpretation(&response) {
          Ok(()) => ViewAction::Navigate(Route::Result),
          Err(e) => {
            warn!(error = %e, "could not stash interpretation");
            ViewAction::Push(Box::new(DreamResultView::from_response(response)))
          }
        }
      }
      MutationState::Error(error) => {
        if matches!(error, ApiError::Unauthenticated { .. }) {
          // resumed after the session-expired login
          self.keep_draft(self.input.value());
        }
        self.error = self.ctx.report(&error);
        self.editing = true;
        ViewAction::None
      }
      _ => ViewAction::None,
    }
  }

  fn captures_input(&self) -> bool {
    self.editing
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    if self.editing {
      vec![
        Shortcut::new("enter", "interpret").with_priority(10),
        Shortcut::new("esc", "stop editing").with_priority(20),
      ]
    } else {
      vec![
        Shortcut::new("i", "write").with_priority(10),
        Shortcut::new(":", "command").with_priority(20),
        Shortcut::new("q", "quit").with_priority(90),
      ]
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::fixtures;
  use crate::ui::views::test_support::{context, key, tick_until_navigate, type_str};
  use serde_json::json;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  const DREAM: &str = "I was flying over a calm sea at night";

  fn interpret_body() -> serde_json::Value {
    json!({
      "dream_id": "d1",
      "interpretation": fixtures::interpretation("d1"),
      "similar_dreams": [],
      "daily_limit_remaining": 0,
      "is_saved": true
    })
  }

  #[tokio::test]
  async fn test_short_text_is_rejected_inline_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/v1/dreams/interpret"))
      .respond_with(ResponseTemplate::new(200).set_body_json(interpret_body()))
      .expect(0)
      .mount(&server)
      .await;

    let ctx = context(&server, Some("token"));
    let mut view = HomeView::new(ctx.clone());
    type_str(&mut view, "too short");
    view.handle_key(key(KeyCode::Enter));

    assert_eq!(view.error.as_deref(), Some("Dream must be at least 20 characters"));
    assert!(!view.interpret.is_pending());
    assert!(ctx.notifier.snapshot().is_empty());
  }

  #[tokio::test]
  async fn test_signed_out_submit_stashes_draft_and_redirects() {
    let server = MockServer::start().await;
    let ctx = context(&server, None);
    let mut view = HomeView::new(ctx.clone());
    type_str(&mut view, DREAM);

    match view.handle_key(key(KeyCode::Enter)) {
      ViewAction::Navigate(route) => {
        assert_eq!(route.to_string(), "/login?reason=dream_analysis&redirect=%2F");
      }
      _ => panic!("expected a redirect to login"),
    }
    assert_eq!(ctx.stash.take_pending_dream().unwrap().as_deref(), Some(DREAM));
  }

  #[tokio::test]
  async fn test_pending_draft_is_resumed_after_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/v1/dreams/interpret"))
      .respond_with(ResponseTemplate::new(200).set_body_json(interpret_body()))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/api/v1/users/me"))
      .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::user()))
      .mount(&server)
      .await;

    let ctx = context(&server, Some("token"));
    ctx.stash.put_pending_dream(DREAM).unwrap();

    let mut view = HomeView::new(ctx.clone());
    assert!(view.interpret.is_pending());

    assert_eq!(tick_until_navigate(&mut view).await, Route::Result);
    let stashed = ctx.stash.take_last_interpretation().unwrap().unwrap();
    assert_eq!(stashed.dream_id, "d1");
    assert!(view.input.is_empty());
  }

  #[tokio::test]
  async fn test_quota_error_is_toasted_and_text_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/v1/dreams/interpret"))
      .respond_with(
        ResponseTemplate::new(429)
          .set_body_json(json!({ "error": "rate_limited", "message": "Daily limit reached." })),
      )
      .mount(&server)
      .await;

    let ctx = context(&server, Some("token"));
    let mut view = HomeView::new(ctx.clone());
    type_str(&mut view, DREAM);
    view.handle_key(key(KeyCode::Enter));

    for _ in 0..200 {
      view.tick();
      if !view.interpret.is_pending() {
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let toasts = ctx.notifier.snapshot();
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].kind, crate::notify::ToastKind::Warning);
    assert_eq!(view.input.value(), DREAM);
    assert!(view.error.is_none());
  }
}
