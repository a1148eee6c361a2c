use crate::notify::{Toast, ToastKind};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

const TOAST_WIDTH: u16 = 44;
const TOAST_HEIGHT: u16 = 4;

fn kind_style(kind: ToastKind) -> (Color, &'static str) {
  match kind {
    ToastKind::Success => (Color::Green, " ok "),
    ToastKind::Error => (Color::Red, " error "),
    ToastKind::Warning => (Color::Yellow, " warning "),
    ToastKind::Info => (Color::Blue, " info "),
  }
}

/// Stack toasts in the bottom-right corner of `area`, newest at the bottom.
pub fn draw_toasts(frame: &mut Frame, area: Rect, toasts: &[Toast]) {
  let width = TOAST_WIDTH.min(area.width);
  let fit = (area.height / TOAST_HEIGHT) as usize;
  let skip = toasts.len().saturating_sub(fit);

  let mut y = area.bottom();
  for toast in toasts.iter().skip(skip).rev() {
    y = y.saturating_sub(TOAST_HEIGHT);
    if y < area.y {
      break;
    }
    let rect = Rect::new(area.right().saturating_sub(width), y, width, TOAST_HEIGHT);
    let (color, title) = kind_style(toast.kind);

    frame.render_widget(Clear, rect);
    let paragraph = Paragraph::new(toast.message.as_str())
      .wrap(Wrap { trim: true })
      .block(
        Block::default()
          .borders(Borders::ALL)
          .border_style(Style::default().fg(color))
          .title(title),
      );
    frame.render_widget(paragraph, rect);
  }
}
