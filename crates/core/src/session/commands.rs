//! Chat command parsing.
//!
//! Commands that only read or switch state run immediately. Notes go
//! through the message queue.

/// One line of chat input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Quit,
    Status,
    Clear,
    /// `/list` or `/projects`.
    List,
    /// `/use <project>`; the name may be empty.
    Use(String),
    /// `/read [project]`.
    Read(Option<String>),
    /// `/<project>` without a note.
    Switch(String),
    /// `/<project> <note>`.
    Note { project: String, note: String },
    /// Text without a command.
    Plain(String),
}

impl ChatCommand {
    /// Parse one line of input. Command names are case-insensitive.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let Some(command) = trimmed.strip_prefix('/') else {
            return ChatCommand::Plain(trimmed.to_string());
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        let lower = name.to_lowercase();

        match (lower.as_str(), rest.is_empty()) {
            ("quit", true) => ChatCommand::Quit,
            ("status", true) => ChatCommand::Status,
            ("clear", true) => ChatCommand::Clear,
            ("list" | "projects", true) => ChatCommand::List,
            ("use", _) => ChatCommand::Use(rest.to_string()),
            ("read", true) => ChatCommand::Read(None),
            ("read", false) => ChatCommand::Read(Some(rest.to_string())),
            ("", _) => ChatCommand::Plain(trimmed.to_string()),
            (_, true) => ChatCommand::Switch(name.to_string()),
            (_, false) => ChatCommand::Note {
                project: name.to_string(),
                note: rest.to_string(),
            },
        }
    }

    /// True for commands that bypass the queue.
    pub fn is_immediate(&self) -> bool {
        !matches!(self, ChatCommand::Note { .. } | ChatCommand::Plain(_))
    }
}

/// Whether `input` should run immediately instead of being queued.
pub fn is_immediate(input: &str) -> bool {
    ChatCommand::parse(input).is_immediate()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_immediate_commands() {
        assert_eq!(ChatCommand::parse("/quit"), ChatCommand::Quit);
        assert_eq!(ChatCommand::parse(" /STATUS "), ChatCommand::Status);
        assert_eq!(ChatCommand::parse("/projects"), ChatCommand::List);
        assert_eq!(ChatCommand::parse("/use garden"), ChatCommand::Use("garden".to_string()));
        assert_eq!(ChatCommand::parse("/read"), ChatCommand::Read(None));
        assert_eq!(
            ChatCommand::parse("/read garden"),
            ChatCommand::Read(Some("garden".to_string()))
        );
        assert_eq!(ChatCommand::parse("/garden"), ChatCommand::Switch("garden".to_string()));
    }

    #[test]
    fn test_parse_notes() {
        assert_eq!(
            ChatCommand::parse("/garden water the tomatoes"),
            ChatCommand::Note {
                project: "garden".to_string(),
                note: "water the tomatoes".to_string(),
            }
        );
        assert_eq!(
            ChatCommand::parse("water the tomatoes"),
            ChatCommand::Plain("water the tomatoes".to_string())
        );
        // A command name followed by text is a note for that project
        assert!(matches!(ChatCommand::parse("/list everything"), ChatCommand::Note { .. }));
    }

    #[test]
    fn test_is_immediate() {
        assert!(is_immediate("/list"));
        assert!(is_immediate("/use garden"));
        assert!(is_immediate("/garden"));
        assert!(!is_immediate("/garden water"));
        assert!(!is_immediate("plain text"));
        assert!(!is_immediate("/"));
    }
}
