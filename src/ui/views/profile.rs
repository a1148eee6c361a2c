use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use super::follow_session;
use crate::api::auth::{Logout, UpdateProfile};
use crate::api::types::{ProfileUpdate, User};
use crate::mutation::{Mutation, MutationState};
use crate::navigation::Route;
use crate::query::{Query, QueryStatus};
use crate::ui::view::{Context, Shortcut, View, ViewAction};

/// Account details, plan and today's usage.
pub struct ProfileView {
  ctx: Context,
  user: Query<User>,
  logout: Mutation<Logout>,
  update: Mutation<UpdateProfile>,
}

impl ProfileView {
  pub fn new(ctx: Context) -> Self {
    let mut user = ctx.auth.current_user();
    user.fetch();
    Self {
      user,
      logout: ctx.auth.logout(),
      update: ctx.auth.update_profile(),
      ctx,
    }
  }

  /// Flip between the two interpretation languages the service speaks.
  fn toggle_language(&mut self) {
    if self.update.is_pending() {
      return;
    }
    let Some(user) = self.user.data() else {
      return;
    };
    let next = if user.language_code == "ru" { "en" } else { "ru" };
    self.update.mutate(ProfileUpdate {
      language_code: Some(next.to_string()),
      ..ProfileUpdate::default()
    });
  }

  fn lines(user: &User) -> Vec<Line<'static>> {
    let field = |name: &str, value: String| {
      Line::from(vec![
        Span::styled(format!("{:<14}", name), Style::default().fg(Color::DarkGray)),
        Span::raw(value),
      ])
    };
    let or_dash = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

    let usage = match user.remaining_today() {
      None => format!("{} today, unlimited", user.dreams_today),
      Some(left) => format!("{} today, {} left", user.dreams_today, left),
    };

    vec![
      field("Name", user.display_name()),
      field("Username", user.username.as_ref().map_or("-".to_string(), |u| format!("@{}", u))),
      field("Email", or_dash(&user.email)),
      field("Language", user.language_code.clone()),
      field("Timezone", or_dash(&user.timezone)),
      Line::raw(""),
      field("Plan", user.subscription_type.label().to_string()),
      field("Interpretations", usage),
    ]
  }
}

impl View for ProfileView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => self.user.refetch(),
      KeyCode::Char('l') => self.toggle_language(),
      KeyCode::Char('o') => {
        if !self.logout.is_pending() {
          self.logout.mutate(());
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.user.status() {
      QueryStatus::Loading => " Profile (loading...) ".to_string(),
      QueryStatus::Error(e) => format!(" Profile (error: {}) ", e),
      _ => " Profile ".to_string(),
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let mut lines = match self.user.data() {
      Some(user) => Self::lines(user),
      None => vec![Line::styled("Loading...", Style::default().fg(Color::DarkGray))],
    };
    if self.logout.is_pending() {
      lines.push(Line::raw(""));
      lines.push(Line::styled("Signing out...", Style::default().fg(Color::Yellow)));
    } else if self.update.is_pending() {
      lines.push(Line::raw(""));
      lines.push(Line::styled("Saving...", Style::default().fg(Color::Yellow)));
    }

    frame.render_widget(Paragraph::new(lines).block(block), area);
  }

  fn breadcrumb_label(&self) -> String {
    "Profile".to_string()
  }

  fn route(&self) -> Route {
    Route::Profile
  }

  fn tick(&mut self) -> ViewAction {
    // the session is over locally whether or not the server agreed
    if self.logout.poll() {
      self.ctx.notifier.info("Signed out");
      return ViewAction::Navigate(Route::Home);
    }

    if self.update.poll() {
      match self.update.state() {
        MutationState::Success(user) => {
          let message = format!("Language set to {}", user.language_code);
          self.ctx.notifier.success(message);
        }
        MutationState::Error(e) => {
          self.ctx.report(e);
        }
        _ => {}
      }
      self.update.reset();
    }

    follow_session(&mut self.user, &self.ctx);
    self.user.poll();
    ViewAction::None
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("o", "sign out").with_priority(10),
      Shortcut::new("l", "language").with_priority(20),
      Shortcut::new("r", "refresh").with_priority(30).when_active(),
      Shortcut::new(":", "command").with_priority(40),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::fixtures;
  use crate::query::test_support::poll_until;
  use crate::ui::views::test_support::{context, key, tick_until_navigate};
  use wiremock::matchers::{body_partial_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[test]
  fn test_usage_line_for_free_plan() {
    let text: Vec<String> = ProfileView::lines(&fixtures::user())
      .iter()
      .map(|l| l.to_string())
      .collect();
    assert!(text.iter().any(|l| l.ends_with("0 today, 1 left")));
    assert!(text.iter().any(|l| l.ends_with("@dreamer")));
  }

  #[tokio::test]
  async fn test_language_toggle_updates_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/users/me"))
      .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::user()))
      .mount(&server)
      .await;
    let mut updated = fixtures::user();
    updated.language_code = "ru".to_string();
    Mock::given(method("PATCH"))
      .and(path("/api/v1/users/me"))
      .and(body_partial_json(serde_json::json!({ "language_code": "ru" })))
      .respond_with(ResponseTemplate::new(200).set_body_json(&updated))
      .expect(1)
      .mount(&server)
      .await;

    let ctx = context(&server, Some("token"));
    let mut view = ProfileView::new(ctx.clone());
    poll_until(&mut view.user, |q| q.is_success()).await;

    view.handle_key(key(KeyCode::Char('l')));
    for _ in 0..200 {
      view.tick();
      if view.user.data().is_some_and(|u| u.language_code == "ru") {
        break;
      }
      tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    assert_eq!(view.user.data().map(|u| u.language_code.as_str()), Some("ru"));
    assert!(ctx
      .notifier
      .snapshot()
      .iter()
      .any(|t| t.message == "Language set to ru"));
  }

  #[tokio::test]
  async fn test_sign_out_goes_home_even_if_server_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/users/me"))
      .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::user()))
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .and(path("/api/v1/auth/logout"))
      .respond_with(ResponseTemplate::new(500))
      .mount(&server)
      .await;

    let ctx = context(&server, Some("token"));
    let mut view = ProfileView::new(ctx.clone());
    poll_until(&mut view.user, |q| q.is_success()).await;

    view.handle_key(key(KeyCode::Char('o')));
    assert_eq!(tick_until_navigate(&mut view).await, Route::Home);
    assert!(!ctx.auth.is_authenticated());
    assert!(ctx.dreams.cache().is_empty());
  }
}
