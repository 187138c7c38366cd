//! Slash commands typed at the chat prompt.

use crate::core::app::AppAction;
use crate::core::tools::Mood;

#[derive(Debug)]
pub enum CommandResult {
    ProcessAsMessage(String),
    Action(AppAction),
    ListSessions,
    Help,
    Quit,
    /// Recognised command with bad arguments, or an unknown command.
    Invalid(String),
}

pub struct CommandUsage {
    pub syntax: &'static str,
    pub description: &'static str,
}

pub fn all_commands() -> &'static [CommandUsage] {
    &[
        CommandUsage {
            syntax: "/new",
            description: "Start a new conversation",
        },
        CommandUsage {
            syntax: "/sessions",
            description: "List conversations, newest first",
        },
        CommandUsage {
            syntax: "/switch <n>",
            description: "Make conversation <n> the active one",
        },
        CommandUsage {
            syntax: "/delete <n>",
            description: "Delete conversation <n>",
        },
        CommandUsage {
            syntax: "/mood <light|dark>",
            description: "Set the interface mood",
        },
        CommandUsage {
            syntax: "/key",
            description: "Choose a different API key",
        },
        CommandUsage {
            syntax: "/help",
            description: "Show this list",
        },
        CommandUsage {
            syntax: "/quit",
            description: "Leave the chat",
        },
    ]
}

pub fn process_input(input: &str) -> CommandResult {
    let trimmed = input.trim();

    let Some(rest) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(input.to_string());
    };

    let mut parts = rest.splitn(2, ' ');
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    match command_name {
        "new" => CommandResult::Action(AppAction::NewSession),
        "sessions" => CommandResult::ListSessions,
        "switch" => match parse_position(args) {
            Some(index) => CommandResult::Action(AppAction::SwitchSession { index }),
            None => CommandResult::Invalid("Usage: /switch <n>".into()),
        },
        "delete" => match parse_position(args) {
            Some(index) => CommandResult::Action(AppAction::DeleteSession { index }),
            None => CommandResult::Invalid("Usage: /delete <n>".into()),
        },
        "mood" => match args.parse::<Mood>() {
            Ok(mood) => CommandResult::Action(AppAction::SetMood { mood }),
            Err(_) => CommandResult::Invalid("Usage: /mood <light|dark>".into()),
        },
        "key" => CommandResult::Action(AppAction::ReselectCredential),
        "help" => CommandResult::Help,
        "quit" | "exit" => CommandResult::Quit,
        other => CommandResult::Invalid(format!("Unknown command: /{other}")),
    }
}

/// `/switch 1` addresses the first listed session.
fn parse_position(args: &str) -> Option<usize> {
    args.parse::<usize>().ok()?.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert!(matches!(
            process_input("hello there"),
            CommandResult::ProcessAsMessage(text) if text == "hello there"
        ));
        assert!(matches!(
            process_input("/"),
            CommandResult::ProcessAsMessage(_)
        ));
    }

    #[test]
    fn positions_are_one_based() {
        assert!(matches!(
            process_input("/switch 2"),
            CommandResult::Action(AppAction::SwitchSession { index: 1 })
        ));
        assert!(matches!(
            process_input("/delete 1"),
            CommandResult::Action(AppAction::DeleteSession { index: 0 })
        ));
        assert!(matches!(process_input("/switch 0"), CommandResult::Invalid(_)));
        assert!(matches!(process_input("/delete x"), CommandResult::Invalid(_)));
    }

    #[test]
    fn mood_requires_a_known_value() {
        assert!(matches!(
            process_input("/mood light"),
            CommandResult::Action(AppAction::SetMood { mood: Mood::Light })
        ));
        assert!(matches!(process_input("/mood"), CommandResult::Invalid(_)));
    }

    #[test]
    fn unknown_commands_are_reported() {
        match process_input("/frobnicate now") {
            CommandResult::Invalid(msg) => assert!(msg.contains("/frobnicate")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(process_input("/exit"), CommandResult::Quit));
    }
}
