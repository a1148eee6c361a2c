use chrono::{DateTime, Local, Utc};
use ratatui::prelude::Color;

/// Truncate to `max_len` characters, ending in "..." if anything was cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// First line of a dream text, for list rows
pub fn first_line(s: &str) -> &str {
  s.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

pub fn format_date(at: &DateTime<Utc>) -> String {
  at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Color for an emotion's reported intensity
pub fn intensity_color(intensity: &str) -> Color {
  match intensity.to_lowercase().as_str() {
    "high" | "высокая" | "сильная" => Color::Red,
    "medium" | "средняя" => Color::Yellow,
    "low" | "низкая" | "слабая" => Color::Green,
    _ => Color::White,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate() {
    assert_eq!(truncate("hello", 10), "hello");
    assert_eq!(truncate("hello", 5), "hello");
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_counts_characters() {
    assert_eq!(truncate("летал над водой", 8), "летал...");
  }

  #[test]
  fn test_first_line_skips_blank_lines() {
    assert_eq!(first_line("\n  \n I was flying\nover water"), "I was flying");
    assert_eq!(first_line(""), "");
  }

  #[test]
  fn test_intensity_color() {
    assert_eq!(intensity_color("High"), Color::Red);
    assert_eq!(intensity_color("средняя"), Color::Yellow);
    assert_eq!(intensity_color("low"), Color::Green);
    assert_eq!(intensity_color("unclear"), Color::White);
  }
}
