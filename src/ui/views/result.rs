use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tracing::warn;

use crate::api::types::{Interpretation, InterpretResponse};
use crate::navigation::Route;
use crate::ui::renderfns::{format_date, intensity_color, truncate};
use crate::ui::view::{Context, Shortcut, View, ViewAction};

/// The interpretation that was just computed.
pub struct DreamResultView {
  response: Option<InterpretResponse>,
  scroll: u16,
}

impl DreamResultView {
  /// Takes the stashed interpretation; it is shown once.
  pub fn new(ctx: Context) -> Self {
    let response = ctx.stash.take_last_interpretation().unwrap_or_else(|e| {
      warn!(error = %e, "could not read last interpretation");
      None
    });
    Self { response, scroll: 0 }
  }

  pub fn from_response(response: InterpretResponse) -> Self {
    Self {
      response: Some(response),
      scroll: 0,
    }
  }

  fn lines(response: &InterpretResponse) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);
    let heading = Style::default().fg(Color::Magenta).bold();
    let Interpretation {
      interpretation,
      emotions,
      advice,
      ..
    } = &response.interpretation;

    let mut lines = vec![Line::raw(interpretation.clone()), Line::raw("")];

    if !emotions.is_empty() {
      lines.push(Line::styled("Emotions", heading));
      for emotion in emotions {
        lines.push(Line::from(vec![
          Span::raw("  "),
          Span::styled(emotion.name.clone(), Style::default().bold()),
          Span::raw(" "),
          Span::styled(
            format!("({})", emotion.intensity),
            Style::default().fg(intensity_color(&emotion.intensity)),
          ),
          Span::styled(format!("  {}", emotion.meaning), label),
        ]));
      }
      lines.push(Line::raw(""));
    }

    if let Some(advice) = advice {
      lines.push(Line::styled("Advice", heading));
      lines.push(Line::raw(advice.clone()));
      lines.push(Line::raw(""));
    }

    if !response.similar_dreams.is_empty() {
      lines.push(Line::styled("Similar dreams", heading));
      for similar in &response.similar_dreams {
        lines.push(Line::from(vec![
          Span::styled(format!("  {:>3.0}% ", similar.similarity * 100.0), label),
          Span::styled(format!("{} ", format_date(&similar.created_at)), label),
          Span::raw(truncate(&similar.text, 60)),
        ]));
      }
      lines.push(Line::raw(""));
    }

    if response.daily_limit_remaining >= 0 {
      lines.push(Line::styled(
        format!("Interpretations left today: {}", response.daily_limit_remaining),
        label,
      ));
    }
    if !response.is_saved {
      lines.push(Line::styled(
        "This interpretation was not saved to your journal.",
        Style::default().fg(Color::Yellow),
      ));
    }
    lines
  }
}

impl View for DreamResultView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.scroll = self.scroll.saturating_add(1),
      KeyCode::Char('k') | KeyCode::Up => self.scroll = self.scroll.saturating_sub(1),
      KeyCode::Char('n') => return ViewAction::Navigate(Route::Home),
      KeyCode::Enter => {
        if let Some(response) = self.response.as_ref().filter(|r| r.is_saved) {
          return ViewAction::Navigate(Route::Dream(response.dream_id.clone()));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let response = match &self.response {
      Some(response) => response,
      None => {
        let paragraph = Paragraph::new("Nothing to show. Press n to describe a dream.")
          .style(Style::default().fg(Color::DarkGray))
          .block(Block::default().title(" Interpretation ").borders(Borders::ALL));
        frame.render_widget(paragraph, area);
        return;
      }
    };

    let symbol = &response.interpretation;
    let title = format!(
      " {} {} ",
      symbol.main_symbol_emoji.as_deref().unwrap_or("✨"),
      symbol.main_symbol
    );
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Magenta));

    let paragraph = Paragraph::new(Self::lines(response))
      .block(block)
      .wrap(Wrap { trim: false })
      .scroll((self.scroll, 0));
    frame.render_widget(paragraph, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Interpretation".to_string()
  }

  fn route(&self) -> Route {
    Route::Result
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("enter", "open in journal").with_priority(10),
      Shortcut::new("n", "new dream").with_priority(20),
      Shortcut::new("j/k", "scroll").with_priority(30).when_active(),
      Shortcut::new("q", "back").with_priority(90),
    ]
  }
}
