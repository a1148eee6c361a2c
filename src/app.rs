use crate::api::types::User;
use crate::api::{auth::Logout, SessionEvent};
use crate::commands::{self, CommandAction};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::mutation::Mutation;
use crate::navigation::{LoginReason, LoginRedirect, Route};
use crate::notify::{Toast, ToastKind};
use crate::query::Query;
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{Context, ShortcutInfo, View, ViewAction};
use crate::ui::views::{self, follow_session, HomeView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);

/// Sweep unobserved cache entries roughly every ten seconds
const GC_EVERY_TICKS: u64 = 40;

/// Main application state
pub struct App {
  config: Config,
  ctx: Context,

  /// Navigation stack - root is always at index 0
  views: Vec<Box<dyn View>>,

  /// `:` prompt
  command: CommandInput,

  /// Signed-in user for the header
  user: Query<User>,

  /// `:logout` runs here so it outlives whatever view is on screen
  logout: Mutation<Logout>,

  session_events: mpsc::UnboundedReceiver<SessionEvent>,

  should_quit: bool,
  tick_count: u64,
}

impl App {
  pub fn new(
    config: Config,
    ctx: Context,
    session_events: mpsc::UnboundedReceiver<SessionEvent>,
  ) -> Self {
    let mut user = ctx.auth.current_user();
    user.fetch();

    Self {
      views: vec![Box::new(HomeView::new(ctx.clone()))],
      command: CommandInput::new(),
      logout: ctx.auth.logout(),
      user,
      config,
      ctx,
      session_events,
      should_quit: false,
      tick_count: 0,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let result = self.event_loop().await;

    // restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(TICK_RATE);

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => self.tick(),
        Some(Event::Resize) => {}
        None => break,
      }
    }

    info!("shutting down");
    Ok(())
  }

  fn tick(&mut self) {
    while let Ok(event) = self.session_events.try_recv() {
      match event {
        SessionEvent::Unauthenticated => self.on_session_expired(),
      }
    }

    self.ctx.notifier.expire();

    self.tick_count += 1;
    if self.tick_count % GC_EVERY_TICKS == 0 {
      let removed = self.ctx.dreams.cache().collect_garbage();
      if removed > 0 {
        debug!(removed, "collected unused cache entries");
      }
    }

    follow_session(&mut self.user, &self.ctx);
    self.user.poll();

    if self.logout.poll() {
      self.logout.reset();
      self.ctx.notifier.info("Signed out");
      self.reset_to(Route::Home);
      return;
    }

    let action = match self.views.last_mut() {
      Some(view) => view.tick(),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  /// The server rejected our token. Send the user to login once, remembering
  /// where they were.
  fn on_session_expired(&mut self) {
    let current = self.current_route();
    if matches!(current, Route::Login(_)) {
      return;
    }

    warn!(route = %current, "session expired");
    let redirect = LoginRedirect::new(LoginReason::SessionExpired, current.to_string());
    self.reset_to(Route::Login(Some(redirect)));
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // The command prompt owns the keyboard while open
    if self.command.is_active() {
      if let KeyResult::Event(CommandEvent::Submitted(name)) = self.command.handle_key(key) {
        self.execute_command(&name);
      }
      return;
    }

    if key.code == KeyCode::Esc && self.ctx.notifier.dismiss_latest() {
      return;
    }

    let captured = self.views.last().is_some_and(|v| v.captures_input());
    if !captured && key.code == KeyCode::Char(':') {
      self.command.activate();
      return;
    }

    let action = match self.views.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.views.push(view),
      ViewAction::Pop => self.pop(),
      ViewAction::Navigate(route) => self.navigate(route),
    }
  }

  fn pop(&mut self) {
    if self.views.len() > 1 {
      self.views.pop();
    } else if self.current_route() != Route::Home {
      self.reset_to(Route::Home);
    } else {
      self.should_quit = true;
    }
  }

  /// Detail-style routes stack on top of the current view, everything else
  /// starts a fresh stack.
  fn navigate(&mut self, route: Route) {
    let route = if route.requires_auth() && !self.ctx.auth.is_authenticated() {
      Route::Login(Some(LoginRedirect::new(LoginReason::GetStarted, route.to_string())))
    } else {
      route
    };
    debug!(route = %route, "navigate");

    match route {
      Route::Dream(_) | Route::Symbol(_) | Route::Result => {
        let view = views::open(route, &self.ctx);
        self.views.push(view);
      }
      other => self.reset_to(other),
    }
  }

  fn reset_to(&mut self, route: Route) {
    let view = views::open(route, &self.ctx);
    self.views.clear();
    self.views.push(view);
  }

  fn execute_command(&mut self, name: &str) {
    match commands::action_for(name) {
      Some(CommandAction::Open(route)) => self.navigate(route),
      Some(CommandAction::Logout) => {
        if !self.ctx.auth.is_authenticated() {
          self.ctx.notifier.info("Not signed in");
        } else if !self.logout.is_pending() {
          self.logout.mutate(());
        }
      }
      Some(CommandAction::Quit) => self.should_quit = true,
      None => {
        self
          .ctx
          .notifier
          .push(ToastKind::Warning, format!("Unknown command: {}", name));
      }
    }
  }

  fn current_route(&self) -> Route {
    self
      .views
      .last()
      .map(|v| v.route())
      .unwrap_or(Route::Home)
  }

  // Accessors for UI rendering

  pub fn title(&self) -> &str {
    self.config.title.as_deref().unwrap_or("dreambook")
  }

  pub fn api_url(&self) -> &str {
    &self.config.api.url
  }

  pub fn user(&self) -> Option<&User> {
    if self.ctx.auth.is_authenticated() {
      self.user.data()
    } else {
      None
    }
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.views.last_mut()
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self
      .views
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default()
  }

  pub fn view_breadcrumb(&self) -> Vec<String> {
    self.views.iter().map(|v| v.breadcrumb_label()).collect()
  }

  pub fn command(&self) -> &CommandInput {
    &self.command
  }

  pub fn toasts(&self) -> Vec<Toast> {
    self.ctx.notifier.snapshot()
  }
}
