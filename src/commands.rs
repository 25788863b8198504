/// Available commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "patterns",
    aliases: &["p", "pattern", "list"],
    description: "Show the pattern table",
  },
  Command {
    name: "add",
    aliases: &["a", "new", "create"],
    description: "Add a proxy pattern",
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    description: "Refetch from the service",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit pxp",
  },
];

/// Get autocomplete suggestions for a given input, best match first
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_priority(cmd, &input_lower).map(|p| (cmd, p)))
    .collect();

  // Stable, so ties keep declaration order
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Lower is better; `None` if the command does not match at all
fn match_priority(cmd: &Command, input: &str) -> Option<u32> {
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

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("refresh");
    assert_eq!(suggestions[0].name, "refresh");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("a");
    assert_eq!(suggestions[0].name, "add");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("pat");
    assert_eq!(suggestions[0].name, "patterns");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("tern");
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].name, "patterns");
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }
}
