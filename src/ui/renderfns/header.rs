use crate::api::types::User;
use crate::ui::view::{ShortcutInfo, ShortcutVisibility};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar: title, API host, signed-in user and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  api_url: &str,
  user: Option<&User>,
  shortcuts: &[ShortcutInfo],
) {
  let sep = || Span::styled("│", Style::default().fg(Color::DarkGray));

  let account = match user {
    Some(user) => Span::styled(
      format!(" {} ", user.display_name()),
      Style::default().fg(Color::Yellow).bold(),
    ),
    None => Span::styled(" signed out ", Style::default().fg(Color::DarkGray)),
  };

  let mut spans = vec![
    Span::styled(format!(" {} ", title), Style::default().fg(Color::Magenta).bold()),
    sep(),
    Span::styled(format!(" {} ", extract_host(api_url)), Style::default().fg(Color::White)),
    sep(),
    account,
    Span::raw("  "),
  ];

  let mut visible: Vec<&ShortcutInfo> = shortcuts
    .iter()
    .filter(|s| s.visibility == ShortcutVisibility::Always)
    .collect();
  visible.sort_by_key(|s| s.priority);

  for (i, shortcut) in visible.iter().enumerate() {
    if i > 0 {
      spans.push(Span::raw("   "));
    }
    spans.push(Span::styled(format!("<{}>", shortcut.key), Style::default().fg(Color::Cyan)));
    spans.push(Span::styled(format!(" {}", shortcut.label), Style::default().fg(Color::DarkGray)));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Host (and port) part of the API URL
fn extract_host(url: &str) -> &str {
  let rest = url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url);
  rest.split('/').next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_host() {
    assert_eq!(extract_host("https://dreams.example.com"), "dreams.example.com");
    assert_eq!(extract_host("https://dreams.example.com/api/v1"), "dreams.example.com");
    assert_eq!(extract_host("http://localhost:8000"), "localhost:8000");
  }
}
