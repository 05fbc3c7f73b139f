use std::sync::LazyLock;

use regex::Regex;

/// A platform mention: `<@123>` or the nickname form `<@!123>`.
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<@!?(\d+)>$").expect("static regex is valid"));

pub const CHALLENGE: &str = "!challenge";
pub const CHECKSCORE: &str = "!checkscore";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a challenge against the author of the replied-to message.
    Challenge,
    /// Show a user's record. `None` when the argument is missing or not a mention.
    CheckScore(Option<String>),
}

/// Recognize a bot command. Command words match case-insensitively;
/// anything else is ordinary chat and yields `None`.
pub fn parse(content: &str) -> Option<Command> {
    let mut words = content.split_whitespace();
    let word = words.next()?;

    if word.eq_ignore_ascii_case(CHALLENGE) {
        Some(Command::Challenge)
    } else if word.eq_ignore_ascii_case(CHECKSCORE) {
        let target = match (words.next(), words.next()) {
            (Some(arg), None) => mentioned_user(arg),
            _ => None,
        };
        Some(Command::CheckScore(target))
    } else {
        None
    }
}

pub fn mentioned_user(arg: &str) -> Option<String> {
    MENTION
        .captures(arg)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_is_case_insensitive() {
        assert_eq!(parse("!challenge"), Some(Command::Challenge));
        assert_eq!(parse("  !CHALLENGE "), Some(Command::Challenge));
        assert_eq!(parse("!Challenge you're wrong"), Some(Command::Challenge));
    }

    #[test]
    fn checkscore_takes_one_mention() {
        assert_eq!(
            parse("!checkscore <@123456>"),
            Some(Command::CheckScore(Some("123456".into())))
        );
        assert_eq!(
            parse("!CheckScore <@!42>"),
            Some(Command::CheckScore(Some("42".into())))
        );
        assert_eq!(parse("!checkscore"), Some(Command::CheckScore(None)));
        assert_eq!(parse("!checkscore gabe"), Some(Command::CheckScore(None)));
        assert_eq!(parse("!checkscore <@1> <@2>"), Some(Command::CheckScore(None)));
    }

    #[test]
    fn ordinary_chat_is_ignored() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("challenge accepted"), None);
        assert_eq!(parse("!challenger"), None);
        assert_eq!(mentioned_user("<@abc>"), None);
    }
}
