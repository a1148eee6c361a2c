use color_eyre::{eyre::eyre, Result};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::api::dreams::{DeleteDream, DreamChanges, GenerateNarration, NarrationRequest, UpdateDream};
use crate::api::types::{Dream, DreamUpdate, TtsResponse, Voice};
use crate::api::validation::{validate_dream_text, MAX_DREAM_LENGTH};
use crate::mutation::{Mutation, MutationState};
use crate::navigation::Route;
use crate::notify::ToastKind;
use crate::query::{Query, QueryStatus};
use crate::ui::components::{InputResult, TextInput};
use crate::ui::renderfns::{format_date, intensity_color};
use crate::ui::view::{Context, Shortcut, View, ViewAction};

/// One journal entry with its interpretation.
pub struct DreamDetailView {
  ctx: Context,
  id: String,
  query: Query<Dream>,
  update: Mutation<UpdateDream>,
  delete: Mutation<DeleteDream>,
  narrate: Mutation<GenerateNarration>,
  /// Set while the text is being edited
  editor: Option<TextInput>,
  error: Option<String>,
  confirm_delete: bool,
  scroll: u16,
}

impl DreamDetailView {
  pub fn new(ctx: Context, id: String) -> Self {
    let mut query = ctx.dreams.detail(Some(id.clone()));
    query.fetch();

    Self {
      query,
      update: ctx.dreams.update(),
      delete: ctx.dreams.delete(),
      narrate: ctx.dreams.narrate(),
      editor: None,
      error: None,
      confirm_delete: false,
      scroll: 0,
      id,
      ctx,
    }
  }

  fn start_editing(&mut self) {
    if let Some(dream) = self.query.data() {
      let mut editor = TextInput::new().with_max_chars(MAX_DREAM_LENGTH);
      editor.set_value(dream.text.clone());
      self.editor = Some(editor);
      self.error = None;
    }
  }

  fn save(&mut self, text: String) {
    if let Err(e) = validate_dream_text(&text) {
      self.error = self.ctx.report(&e);
      return;
    }
    self.update.mutate(DreamChanges {
      dream_id: self.id.clone(),
      changes: DreamUpdate {
        text: Some(text),
        ..DreamUpdate::default()
      },
    });
  }

  fn handle_editor(&mut self, key: KeyEvent) -> bool {
    let editor = match &mut self.editor {
      Some(editor) => editor,
      None => return false,
    };
    match editor.handle_key(key) {
      InputResult::Submitted(text) => self.save(text),
      InputResult::Cancelled => {
        self.editor = None;
        self.error = None;
      }
      InputResult::Consumed | InputResult::NotHandled => {}
    }
    true
  }

  fn lines(dream: &Dream) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);
    let heading = Style::default().fg(Color::Magenta).bold();

    let mut lines = vec![
      Line::styled(format_date(&dream.created_at), label),
      Line::raw(""),
      Line::raw(dream.text.clone()),
      Line::raw(""),
    ];

    if !dream.tags.is_empty() {
      lines.push(Line::styled(format!("Tags: {}", dream.tags.join(", ")), label));
      lines.push(Line::raw(""));
    }

    match &dream.interpretation {
      Some(interp) => {
        lines.push(Line::styled(
          format!(
            "{} {}",
            interp.main_symbol_emoji.as_deref().unwrap_or("✨"),
            interp.main_symbol
          ),
          heading,
        ));
        lines.push(Line::raw(interp.interpretation.clone()));
        for emotion in &interp.emotions {
          lines.push(Line::from(vec![
            Span::raw("  "),
            Span::raw(emotion.name.clone()),
            Span::styled(
              format!(" ({})", emotion.intensity),
              Style::default().fg(intensity_color(&emotion.intensity)),
            ),
          ]));
        }
        if let Some(advice) = &interp.advice {
          lines.push(Line::raw(""));
          lines.push(Line::styled("Advice", heading));
          lines.push(Line::raw(advice.clone()));
        }
      }
      None => lines.push(Line::styled("Not interpreted yet.", label)),
    }

    if dream.similar_dreams_count > 0 {
      lines.push(Line::raw(""));
      lines.push(Line::styled(
        format!("{} similar dream(s) in your journal", dream.similar_dreams_count),
        label,
      ));
    }
    lines
  }

  fn status_line(&self) -> Line<'static> {
    if self.confirm_delete {
      Line::styled(" Delete this dream? y/n", Style::default().fg(Color::Red).bold())
    } else if let Some(error) = &self.error {
      Line::styled(format!(" {}", error), Style::default().fg(Color::Red))
    } else if self.narrate.is_pending() {
      Line::styled(" Generating narration...", Style::default().fg(Color::Yellow))
    } else if self.update.is_pending() {
      Line::styled(" Saving...", Style::default().fg(Color::Yellow))
    } else if self.delete.is_pending() {
      Line::styled(" Deleting...", Style::default().fg(Color::Yellow))
    } else {
      Line::raw("")
    }
  }
}

/// Write narration audio to `dir/<dream id>.<format>`.
pub fn save_narration(dir: &Path, dream_id: &str, narration: &TtsResponse) -> Result<PathBuf> {
  let audio = narration
    .decode_audio()
    .map_err(|e| eyre!("Failed to decode narration: {}", e))?;

  let ext: String = narration
    .format
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .collect();
  let ext = if ext.is_empty() { "mp3".to_string() } else { ext };
  let name: String = dream_id
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
    .collect();

  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create {}: {}", dir.display(), e))?;
  let path = dir.join(format!("{}.{}", name, ext));
  std::fs::write(&path, audio).map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;

  info!(path = %path.display(), "narration saved");
  Ok(path)
}

impl View for DreamDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.handle_editor(key) {
      return ViewAction::None;
    }

    if self.confirm_delete {
      self.confirm_delete = false;
      if key.code == KeyCode::Char('y') {
        self.delete.mutate(self.id.clone());
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('e') => self.start_editing(),
      KeyCode::Char('d') => self.confirm_delete = self.query.data().is_some(),
      KeyCode::Char('a') => {
        if !self.narrate.is_pending() {
          self.narrate.mutate(NarrationRequest {
            dream_id: self.id.clone(),
            voice: Voice::default(),
          });
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = match self.query.status() {
      QueryStatus::Loading => " Dream (loading...) ".to_string(),
      QueryStatus::Error(e) => format!(" Dream (error: {}) ", e),
      _ => " Dream ".to_string(),
    };

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Min(3), Constraint::Length(1)])
      .split(area);

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if let Some(editor) = &self.editor {
      let text = Line::from(vec![
        Span::raw(editor.value().to_string()),
        Span::styled("_", Style::default().fg(Color::Magenta)),
      ]);
      let paragraph = Paragraph::new(text)
        .block(block.title_bottom(" enter: save  esc: cancel "))
        .wrap(Wrap { trim: false });
      frame.render_widget(paragraph, chunks[0]);
    } else {
      let body = match self.query.data() {
        Some(dream) => Text::from(Self::lines(dream)),
        None if self.query.error().is_some() => Text::styled(
          "Failed to load the dream. Press 'r' to retry.",
          Style::default().fg(Color::DarkGray),
        ),
        None => Text::styled("Loading...", Style::default().fg(Color::DarkGray)),
      };
      let paragraph = Paragraph::new(body)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((self.scroll, 0));
      frame.render_widget(paragraph, chunks[0]);
    }

    frame.render_widget(Paragraph::new(self.status_line()), chunks[1]);
  }

  fn breadcrumb_label(&self) -> String {
    match self.query.data().and_then(|d| d.interpretation.as_ref()) {
      Some(interp) => interp.main_symbol.clone(),
      None => "Dream".to_string(),
    }
  }

  fn route(&self) -> Route {
    Route::Dream(self.id.clone())
  }

  fn tick(&mut self) -> ViewAction {
    // the detail entry is removed on delete, so leave before re-reading it
    if self.delete.poll() {
      match self.delete.state().clone() {
        MutationState::Success(()) => {
          self.ctx.notifier.success("Dream deleted");
          return ViewAction::Pop;
        }
        MutationState::Error(e) => {
          self.ctx.report(&e);
        }
        _ => {}
      }
    }

    if self.update.poll() {
      match self.update.state().clone() {
        MutationState::Success(_) => {
          self.editor = None;
          self.ctx.notifier.success("Dream updated");
        }
        MutationState::Error(e) => self.error = self.ctx.report(&e),
        _ => {}
      }
    }

    if self.narrate.poll() {
      match self.narrate.state().clone() {
        MutationState::Success(narration) => {
          match save_narration(&self.ctx.audio_dir, &self.id, &narration) {
            Ok(path) => {
              self
                .ctx
                .notifier
                .success(format!("Narration saved to {}", path.display()));
            }
            Err(e) => {
              self.ctx.notifier.push(ToastKind::Error, e.to_string());
            }
          }
        }
        MutationState::Error(e) => {
          self.ctx.report(&e);
        }
        _ => {}
      }
      self.narrate.reset();
    }

    self.query.poll();
    ViewAction::None
  }

  fn captures_input(&self) -> bool {
    self.editor.is_some() || self.confirm_delete
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("e", "edit").with_priority(10),
      Shortcut::new("a", "narrate").with_priority(20),
      Shortcut::new("d", "delete").with_priority(30),
      Shortcut::new("r", "refresh").with_priority(40).when_active(),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}
