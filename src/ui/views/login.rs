use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use tracing::warn;

use crate::api::auth::{Credentials, Login};
use crate::api::types::{EmailAuthData, TelegramAuthData};
use crate::api::validation::validate_email;
use crate::api::ApiError;
use crate::mutation::{Mutation, MutationState};
use crate::navigation::{LoginRedirect, Route};
use crate::ui::centered_rect;
use crate::ui::components::{InputResult, TextInput};
use crate::ui::view::{Context, Shortcut, View, ViewAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Email,
  Password,
  /// JSON payload from the Telegram login widget
  Telegram,
}

impl Field {
  fn next(self) -> Self {
    match self {
      Field::Email => Field::Password,
      Field::Password => Field::Telegram,
      Field::Telegram => Field::Email,
    }
  }

  fn prev(self) -> Self {
    match self {
      Field::Email => Field::Telegram,
      Field::Password => Field::Email,
      Field::Telegram => Field::Password,
    }
  }
}

/// Sign-in form. Remembers why the user was sent here and where to go back.
pub struct LoginView {
  ctx: Context,
  redirect: Option<LoginRedirect>,
  email: TextInput,
  password: TextInput,
  telegram: TextInput,
  focus: Field,
  error: Option<String>,
  login: Mutation<Login>,
}

impl LoginView {
  pub fn new(ctx: Context, redirect: Option<LoginRedirect>) -> Self {
    Self {
      login: ctx.auth.login(),
      redirect,
      email: TextInput::new(),
      password: TextInput::new(),
      telegram: TextInput::new(),
      focus: Field::Email,
      error: None,
      ctx,
    }
  }

  fn focused_input(&mut self) -> &mut TextInput {
    match self.focus {
      Field::Email => &mut self.email,
      Field::Password => &mut self.password,
      Field::Telegram => &mut self.telegram,
    }
  }

  fn credentials(&self) -> Result<Credentials, String> {
    if self.focus == Field::Telegram {
      let data: TelegramAuthData = serde_json::from_str(self.telegram.value().trim())
        .map_err(|_| "Paste the JSON produced by the Telegram login widget".to_string())?;
      return Ok(Credentials::Telegram(data));
    }

    let email = self.email.value().trim().to_string();
    validate_email(&email).map_err(|e| e.to_string())?;
    if self.password.is_empty() {
      return Err("Password is required".to_string());
    }
    Ok(Credentials::Email(EmailAuthData {
      email,
      password: self.password.value().to_string(),
    }))
  }

  fn submit(&mut self) {
    if self.login.is_pending() {
      return;
    }
    match self.credentials() {
      Ok(credentials) => {
        self.error = None;
        self.login.mutate(credentials);
      }
      Err(message) => self.error = Some(message),
    }
  }

  /// After signing in: a waiting draft first, then the return path, then home.
  fn destination(&self) -> Route {
    match self.ctx.stash.has_pending_dream() {
      Ok(true) => return Route::Home,
      Ok(false) => {}
      Err(e) => warn!(error = %e, "could not check for a pending dream"),
    }
    self
      .redirect
      .as_ref()
      .map(LoginRedirect::destination)
      .unwrap_or(Route::Home)
  }

  fn field_lines(&self, field: Field, label: &'static str, value: String) -> Vec<Line<'static>> {
    let focused = self.focus == field;
    let label_style = if focused {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::DarkGray)
    };
    let mut input = vec![Span::raw(format!("  {}", value))];
    if focused {
      input.push(Span::styled("_", Style::default().fg(Color::Cyan)));
    }
    vec![Line::styled(label, label_style), Line::from(input)]
  }
}

impl View for LoginView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Tab | KeyCode::Down => self.focus = self.focus.next(),
      KeyCode::BackTab | KeyCode::Up => self.focus = self.focus.prev(),
      KeyCode::Enter if self.focus == Field::Email => self.focus = Field::Password,
      _ => match self.focused_input().handle_key(key) {
        InputResult::Submitted(_) => self.submit(),
        InputResult::Cancelled => return ViewAction::Pop,
        InputResult::Consumed => self.error = None,
        InputResult::NotHandled => {}
      },
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let rect = centered_rect(64, 18, area);
    frame.render_widget(Clear, rect);

    let mut lines = Vec::new();
    if let Some(redirect) = &self.redirect {
      lines.push(Line::styled(
        redirect.reason.message(),
        Style::default().fg(Color::Yellow),
      ));
      lines.push(Line::raw(""));
    }

    lines.extend(self.field_lines(Field::Email, "Email", self.email.value().to_string()));
    lines.extend(self.field_lines(
      Field::Password,
      "Password",
      "•".repeat(self.password.char_count()),
    ));
    lines.push(Line::raw(""));
    lines.extend(self.field_lines(
      Field::Telegram,
      "or paste Telegram login data",
      self.telegram.value().to_string(),
    ));
    lines.push(Line::raw(""));

    if self.login.is_pending() {
      lines.push(Line::styled("Signing in...", Style::default().fg(Color::Yellow)));
    } else if let Some(error) = &self.error {
      lines.push(Line::styled(error.clone(), Style::default().fg(Color::Red)));
    }

    let block = Block::default()
      .title(" Sign in ")
      .title_alignment(Alignment::Center)
      .title_bottom(" tab: next field  enter: sign in  esc: back ")
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
      rect,
    );
  }

  fn breadcrumb_label(&self) -> String {
    "Sign in".to_string()
  }

  fn route(&self) -> Route {
    Route::Login(self.redirect.clone())
  }

  fn tick(&mut self) -> ViewAction {
    if !self.login.poll() {
      return ViewAction::None;
    }

    match self.login.state().clone() {
      MutationState::Success(response) => {
        self
          .ctx
          .notifier
          .success(format!("Welcome, {}", response.user.display_name()));
        ViewAction::Navigate(self.destination())
      }
      MutationState::Error(ApiError::Unauthenticated { message }) => {
        // wrong credentials: the form is the right place for it
        self.error = Some(message);
        self.password.clear();
        ViewAction::None
      }
      MutationState::Error(e) => {
        self.error = self.ctx.report(&e);
        ViewAction::None
      }
      _ => ViewAction::None,
    }
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("tab", "next field").with_priority(10),
      Shortcut::new("enter", "sign in").with_priority(20),
      Shortcut::new("esc", "back").with_priority(90),
    ]
  }
}
