//! Slash command parsing for the terminal front end.
//!
//! Input that starts with `/` controls the session instead of being sent to the server.

use crate::render::FollowUpId;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Send the follow-up with this id as if it had been typed.
    FollowUp(FollowUpId),

    /// List the follow-ups rendered so far.
    ListFollowUps,

    /// Show the session identifier.
    Session,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it should be sent as a
/// message. Follow-ups are numbered from 1 on screen, so `/2` selects [`FollowUpId::new(1)`].
///
/// # Examples
///
/// ```
/// # use streamchat::commands::{parse_command, ChatCommand};
/// # use streamchat::render::FollowUpId;
/// assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("/1"), Some(ChatCommand::FollowUp(FollowUpId::new(0))));
/// assert!(parse_command("배송은 언제 오나요?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "session" => ChatCommand::Session,
        "followups" => ChatCommand::ListFollowUps,
        "followup" | "f" => match argument {
            Some(arg) => parse_follow_up_number(arg, "/followup"),
            None => ChatCommand::Invalid("/followup requires a number".to_string()),
        },
        number if number.starts_with(|c: char| c.is_ascii_digit()) => {
            parse_follow_up_number(number, &format!("/{number}"))
        }
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_follow_up_number(arg: &str, name: &str) -> ChatCommand {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => ChatCommand::FollowUp(FollowUpId::new(n - 1)),
        _ => ChatCommand::Invalid(format!("{} expects a follow-up number from 1", name)),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /<n>                   Send follow-up number n (same as /followup <n>)
  /followup <n>          Send follow-up number n
  /followups             List the follow-ups offered so far
  /session               Show the session id
  /help                  Show this help message
  /quit                  Exit the chat"#
}
