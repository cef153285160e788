//! Message parser - Recognizes command prefixes and tokenizes invocations

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::domain::traits::BotInfo;

static MENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<@!?(\d+)>$").expect("mention pattern is valid"));

/// A command invocation extracted from message text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Lowercased command name
    pub name: String,
    pub args: Vec<String>,
}

/// Parses message text into command invocations
#[derive(Debug, Clone)]
pub struct MessageParser {
    command_prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Returns `None` when the text does not start with the literal prefix
    /// or a mention of the bot, or when nothing follows the prefix.
    pub fn parse(&self, text: &str, bot: Option<&BotInfo>) -> Option<ParsedCommand> {
        let text = text.trim_start();
        let first = text.split_whitespace().next()?;

        let remainder = if bot.map_or(false, |b| Self::is_mention(first, b)) {
            &text[first.len()..]
        } else if !self.command_prefix.is_empty() && text.starts_with(&self.command_prefix) {
            &text[self.command_prefix.len()..]
        } else {
            return None;
        };

        let mut tokens = remainder.split_whitespace();
        let name = tokens.next()?.to_lowercase();
        let args = tokens.map(str::to_string).collect();
        Some(ParsedCommand { name, args })
    }

    fn is_mention(token: &str, bot: &BotInfo) -> bool {
        if let Some(caps) = MENTION.captures(token) {
            return caps.get(1).map_or(false, |id| id.as_str() == bot.id);
        }
        match token.strip_prefix('@') {
            Some(name) => !bot.username.is_empty() && name.eq_ignore_ascii_case(&bot.username),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> BotInfo {
        BotInfo {
            id: "42".to_string(),
            name: "Ultimate".to_string(),
            username: "ultimate_bot".to_string(),
        }
    }

    #[test]
    fn test_literal_prefix() {
        let parser = MessageParser::new("!");
        let parsed = parser.parse("!PING  a   b", Some(&bot())).unwrap();
        assert_eq!(parsed.name, "ping");
        assert_eq!(parsed.args, vec!["a", "b"]);
    }

    #[test]
    fn test_space_after_prefix() {
        let parser = MessageParser::new("!");
        assert_eq!(parser.parse("! ping", None).unwrap().name, "ping");
    }

    #[test]
    fn test_mention_prefix() {
        let parser = MessageParser::new("!");
        for text in ["<@42> help level", "<@!42> help level", "@Ultimate_Bot help level"] {
            let parsed = parser.parse(text, Some(&bot())).unwrap();
            assert_eq!(parsed.name, "help");
            assert_eq!(parsed.args, vec!["level"]);
        }
    }

    #[test]
    fn test_mention_of_someone_else_is_ignored() {
        let parser = MessageParser::new("!");
        assert!(parser.parse("<@7> help", Some(&bot())).is_none());
        assert!(parser.parse("@someone help", Some(&bot())).is_none());
    }

    #[test]
    fn test_no_prefix_or_no_name() {
        let parser = MessageParser::new("!");
        assert!(parser.parse("hello there", Some(&bot())).is_none());
        assert!(parser.parse("!", Some(&bot())).is_none());
        assert!(parser.parse("<@42>", Some(&bot())).is_none());
        assert!(parser.parse("", Some(&bot())).is_none());
    }
}
