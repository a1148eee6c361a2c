//! Static catalog of common dream symbols.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
  Nature,
  Animals,
  People,
  Objects,
  Places,
  Actions,
  Concepts,
  Events,
  Body,
}

impl Category {
  pub const ALL: [Category; 9] = [
    Category::Nature,
    Category::Animals,
    Category::People,
    Category::Objects,
    Category::Places,
    Category::Actions,
    Category::Concepts,
    Category::Events,
    Category::Body,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      Category::Nature => "Nature",
      Category::Animals => "Animals",
      Category::People => "People",
      Category::Objects => "Objects",
      Category::Places => "Places",
      Category::Actions => "Actions",
      Category::Concepts => "Concepts",
      Category::Events => "Events",
      Category::Body => "Body",
    }
  }

  /// Next category in the cycle `all -> nature -> ... -> body -> all`.
  pub fn cycle(current: Option<Category>) -> Option<Category> {
    match current {
      None => Some(Category::ALL[0]),
      Some(c) => {
        let idx = Category::ALL.iter().position(|x| *x == c).unwrap_or(0);
        Category::ALL.get(idx + 1).copied()
      }
    }
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.label())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
  pub slug: &'static str,
  pub name: &'static str,
  pub emoji: &'static str,
  pub description: &'static str,
  pub category: Category,
  /// Common readings of the symbol in context
  pub readings: &'static [&'static str],
  pub related: &'static [&'static str],
}

const fn symbol(
  slug: &'static str,
  name: &'static str,
  emoji: &'static str,
  description: &'static str,
  category: Category,
) -> Symbol {
  Symbol {
    slug,
    name,
    emoji,
    description,
    category,
    readings: &[],
    related: &[],
  }
}

pub static SYMBOLS: &[Symbol] = &[
  Symbol {
    readings: &[
      "Swimming in clear water: success and well-being",
      "Drowning: fear of losing control of a situation",
      "Drinking water: thirst for knowledge or spiritual growth",
      "Wading across water: overcoming obstacles",
    ],
    related: &["sea", "rain"],
    ..symbol("water", "Water", "💧", "Emotions and the subconscious", Category::Nature)
  },
  Symbol {
    readings: &[
      "Flying high: ambition and self-confidence",
      "Flying low: caution and a realistic approach",
      "Learning to fly: mastering new skills or roles",
      "Flying with someone: shared plans and projects",
    ],
    related: &["falling"],
    ..symbol("flight", "Flight", "🦅", "Freedom and ambition", Category::Actions)
  },
  symbol("falling", "Falling", "📉", "Loss of control", Category::Actions),
  symbol("snake", "Snake", "🐍", "Transformation and wisdom", Category::Animals),
  symbol("money", "Money", "💰", "Values and success", Category::Objects),
  symbol("fire", "Fire", "🔥", "Passion and energy", Category::Nature),
  symbol("house", "House", "🏠", "Safety and family", Category::Places),
  symbol("sea", "Sea", "🌊", "The unconscious", Category::Nature),
  symbol("death", "Death", "💀", "An ending and a new beginning", Category::Concepts),
  symbol("pregnancy", "Pregnancy", "🤰", "New beginnings", Category::Concepts),
  symbol("wedding", "Wedding", "💒", "Union and commitment", Category::Events),
  symbol("teeth", "Teeth", "🦷", "Confidence and strength", Category::Body),
  symbol("car", "Car", "🚗", "Control and direction", Category::Objects),
  symbol("dog", "Dog", "🐕", "Loyalty and friendship", Category::Animals),
  symbol("cat", "Cat", "🐈", "Independence and intuition", Category::Animals),
  symbol("baby", "Baby", "👶", "Fresh starts and innocence", Category::People),
  symbol("mother", "Mother", "👩", "Care and protection", Category::People),
  symbol("father", "Father", "👨", "Authority and support", Category::People),
  symbol("rain", "Rain", "🌧️", "Cleansing and renewal", Category::Nature),
  symbol("sun", "Sun", "☀️", "Vitality and optimism", Category::Nature),
];

/// Symbols whose name or description contains `query` (case-insensitive),
/// optionally limited to one category.
pub fn filter(query: &str, category: Option<Category>) -> Vec<&'static Symbol> {
  let query = query.trim().to_lowercase();
  SYMBOLS
    .iter()
    .filter(|s| category.map_or(true, |c| s.category == c))
    .filter(|s| {
      query.is_empty()
        || s.name.to_lowercase().contains(&query)
        || s.description.to_lowercase().contains(&query)
    })
    .collect()
}

pub fn find(slug: &str) -> Option<&'static Symbol> {
  SYMBOLS.iter().find(|s| s.slug == slug)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_slugs_are_unique() {
    let mut slugs: Vec<_> = SYMBOLS.iter().map(|s| s.slug).collect();
    slugs.sort_unstable();
    slugs.dedup();
    assert_eq!(slugs.len(), SYMBOLS.len());
  }

  #[test]
  fn test_filter_by_text_matches_name_and_description() {
    let names: Vec<_> = filter("SEA", None).iter().map(|s| s.slug).collect();
    assert_eq!(names, vec!["sea"]);

    let names: Vec<_> = filter("loyalty", None).iter().map(|s| s.slug).collect();
    assert_eq!(names, vec!["dog"]);
  }

  #[test]
  fn test_filter_by_category() {
    let animals: Vec<_> = filter("", Some(Category::Animals)).iter().map(|s| s.slug).collect();
    assert_eq!(animals, vec!["snake", "dog", "cat"]);
    assert!(filter("snake", Some(Category::Nature)).is_empty());
    assert_eq!(filter("", None).len(), SYMBOLS.len());
  }

  #[test]
  fn test_related_symbols_exist() {
    for symbol in SYMBOLS {
      for related in symbol.related {
        assert!(find(related).is_some(), "{} -> {}", symbol.slug, related);
      }
    }
  }

  #[test]
  fn test_category_cycle_returns_to_all() {
    let mut current = None;
    let mut seen = 0;
    loop {
      current = Category::cycle(current);
      if current.is_none() {
        break;
      }
      seen += 1;
    }
    assert_eq!(seen, Category::ALL.len());
  }
}
