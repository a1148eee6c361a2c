//! `:` commands and their autocomplete ranking.

use crate::navigation::Route;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// What running a command does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandAction {
  Open(Route),
  Logout,
  Quit,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "home",
    aliases: &["h", "new", "interpret"],
    description: "Describe a new dream",
  },
  Command {
    name: "journal",
    aliases: &["j", "dreams", "history"],
    description: "Your dream journal",
  },
  Command {
    name: "catalog",
    aliases: &["c", "symbols", "dictionary"],
    description: "Dream symbol catalog",
  },
  Command {
    name: "profile",
    aliases: &["p", "me", "account"],
    description: "Account and daily limit",
  },
  Command {
    name: "login",
    aliases: &["l", "signin"],
    description: "Sign in",
  },
  Command {
    name: "logout",
    aliases: &["signout"],
    description: "Sign out and forget cached data",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit dreambook",
  },
];

/// Map a resolved command name to its action.
pub fn action_for(name: &str) -> Option<CommandAction> {
  let action = match name {
    "home" => CommandAction::Open(Route::Home),
    "journal" => CommandAction::Open(Route::Journal),
    "catalog" => CommandAction::Open(Route::Catalog),
    "profile" => CommandAction::Open(Route::Profile),
    "login" => CommandAction::Open(Route::Login(None)),
    "logout" => CommandAction::Logout,
    "quit" => CommandAction::Quit,
    _ => return None,
  };
  Some(action)
}

/// Suggestions for `input`, best first: exact name, exact alias, name
/// prefix, alias prefix, then substring matches.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();

  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (cmd, r)))
    .collect();

  // stable, so equal ranks keep declaration order
  matches.sort_by_key(|(_, rank)| *rank);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

fn rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn first(input: &str) -> &'static str {
    get_suggestions(input)[0].name
  }

  #[test]
  fn test_empty_input_returns_all() {
    assert_eq!(get_suggestions("").len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let names: Vec<_> = get_suggestions("login").iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["login"]);
    assert_eq!(first("logout"), "logout");
  }

  #[test]
  fn test_alias_match() {
    assert_eq!(first("j"), "journal");
    assert_eq!(first("me"), "profile");
  }

  #[test]
  fn test_alias_beats_name_prefix() {
    assert_eq!(first("c"), "catalog");
    // alias, then name prefix, then names merely containing "l"
    let names: Vec<_> = get_suggestions("l").iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["login", "logout", "journal", "catalog", "profile"]);
  }

  #[test]
  fn test_prefix_and_fuzzy_match() {
    assert_eq!(first("jour"), "journal");
    assert_eq!(first("alog"), "catalog");
    assert!(get_suggestions("zzz").is_empty());
  }

  #[test]
  fn test_every_command_has_an_action() {
    for cmd in COMMANDS {
      assert!(action_for(cmd.name).is_some(), "{}", cmd.name);
    }
    assert_eq!(action_for("journal"), Some(CommandAction::Open(Route::Journal)));
    assert_eq!(action_for("nope"), None);
  }
}
