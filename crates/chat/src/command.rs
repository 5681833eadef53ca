//! The user-facing command surface.

use std::collections::HashSet;

use chatbridge_channels::CommandInvocation;

/// A recognised command with its raw argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Start,
    History,
    Clear,
    Rollback(String),
    Translate(String),
    FixGrammar(String),
    Enhance(String),
    Imagine(String),
    Temperature(String),
    AddUser(String),
    RemoveUser(String),
    Reload,
    Unknown(String),
}

impl Command {
    pub fn parse(invocation: &CommandInvocation) -> Self {
        let args = invocation.args.clone();
        match invocation.name.to_ascii_lowercase().as_str() {
            "help" => Self::Help,
            "start" => Self::Start,
            "history" => Self::History,
            "clear" => Self::Clear,
            "rollback" => Self::Rollback(args),
            "tr" | "translate" => Self::Translate(args),
            "fixgrammar" | "grammar" | "gramar" => Self::FixGrammar(args),
            "enhance" => Self::Enhance(args),
            "imagine" | "pap" => Self::Imagine(args),
            "temperature" => Self::Temperature(args),
            "adduser" => Self::AddUser(args),
            "removeuser" => Self::RemoveUser(args),
            "reload" => Self::Reload,
            _ => Self::Unknown(invocation.name.clone()),
        }
    }

    /// Commands honoured only for the administrator.
    #[must_use]
    pub fn is_admin_only(&self) -> bool {
        matches!(self, Self::AddUser(_) | Self::RemoveUser(_) | Self::Reload)
    }

    /// Canonical name, used for logging.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Help => "help",
            Self::Start => "start",
            Self::History => "history",
            Self::Clear => "clear",
            Self::Rollback(_) => "rollback",
            Self::Translate(_) => "tr",
            Self::FixGrammar(_) => "fixgrammar",
            Self::Enhance(_) => "enhance",
            Self::Imagine(_) => "imagine",
            Self::Temperature(_) => "temperature",
            Self::AddUser(_) => "adduser",
            Self::RemoveUser(_) => "removeuser",
            Self::Reload => "reload",
            Self::Unknown(name) => name,
        }
    }
}

/// Command menu entries: name and short description.
pub const COMMAND_DESCRIPTIONS: &[(&str, &str)] = &[
    ("help", "Show the available commands"),
    ("start", "Show the greeting"),
    ("history", "Show the conversation history"),
    ("clear", "Clear the conversation history"),
    ("rollback", "Remove the last n messages from the history"),
    ("tr", "Translate text into English"),
    ("fixgrammar", "Correct the grammar of a text"),
    ("enhance", "Improve a text"),
    ("imagine", "Generate an image from a description"),
    ("temperature", "Show or set the creativity (0.0 - 1.2)"),
    ("adduser", "Allow a user id (administrator only)"),
    ("removeuser", "Remove a user id (administrator only)"),
    ("reload", "Reload the configuration (administrator only)"),
];

/// Commands registered with the platform when no override is configured.
pub const DEFAULT_MENU: &[&str] = &[
    "help",
    "start",
    "history",
    "clear",
    "rollback",
    "tr",
    "fixgrammar",
    "enhance",
    "imagine",
    "temperature",
];

/// Resolve the command menu to register: configured names that are known
/// commands, in configured order and each listed once, or [`DEFAULT_MENU`]
/// when none qualify.
pub fn command_menu(configured: &[String]) -> Vec<(&'static str, &'static str)> {
    let known = |name: &str| {
        COMMAND_DESCRIPTIONS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.trim().trim_start_matches('/')))
            .copied()
    };

    let mut seen = HashSet::new();
    let mut menu: Vec<_> = configured
        .iter()
        .filter_map(|name| known(name))
        .filter(|(name, _)| seen.insert(*name))
        .collect();
    if menu.is_empty() {
        menu = DEFAULT_MENU.iter().filter_map(|name| known(name)).collect();
    }
    menu
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    fn invocation(name: &str, args: &str) -> CommandInvocation {
        CommandInvocation {
            name: name.into(),
            args: args.into(),
        }
    }

    #[rstest]
    #[case("help", "", Command::Help)]
    #[case("rollback", "3", Command::Rollback("3".into()))]
    #[case("tr", "hola", Command::Translate("hola".into()))]
    #[case("gramar", "teh", Command::FixGrammar("teh".into()))]
    #[case("Imagine", "cat", Command::Imagine("cat".into()))]
    #[case("reload", "ignored", Command::Reload)]
    #[case("frobnicate", "", Command::Unknown("frobnicate".into()))]
    fn parses_known_and_unknown(#[case] name: &str, #[case] args: &str, #[case] expected: Command) {
        assert_eq!(Command::parse(&invocation(name, args)), expected);
    }

    #[test]
    fn admin_only_set() {
        assert!(Command::AddUser(String::new()).is_admin_only());
        assert!(Command::Reload.is_admin_only());
        assert!(!Command::Clear.is_admin_only());
    }

    #[test]
    fn menu_defaults_when_unconfigured() {
        let menu = command_menu(&[]);
        assert_eq!(menu.len(), DEFAULT_MENU.len());
        assert_eq!(menu[0].0, "help");
    }

    #[test]
    fn menu_keeps_known_in_configured_order() {
        let menu = command_menu(&["/imagine".into(), "bogus".into(), "clear".into()]);
        let names: Vec<_> = menu.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["imagine", "clear"]);
    }

    #[test]
    fn menu_lists_repeated_names_once() {
        let menu = command_menu(&["help".into(), "clear".into(), "/HELP".into()]);
        let names: Vec<_> = menu.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["help", "clear"]);
    }

    #[test]
    fn menu_of_only_unknown_falls_back() {
        let menu = command_menu(&["bogus".into()]);
        assert_eq!(menu.len(), DEFAULT_MENU.len());
    }
}
