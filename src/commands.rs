use regex::Regex;

use crate::models::CreateCommand;

/// Extracts token-creation commands from mention text.
pub struct CommandParser {
    create: Regex,
}

impl CommandParser {
    pub fn new() -> Self {
        // Two alphanumeric/underscore words after "create", anywhere in the text.
        let create = Regex::new(r"(?i)create\s+([A-Za-z0-9_]+)\s+([A-Za-z0-9_]+)")
            .expect("create command pattern should compile");
        CommandParser { create }
    }

    pub fn parse(&self, text: &str) -> Option<CreateCommand> {
        let caps = self.create.captures(text)?;
        Some(CreateCommand {
            token_name: caps[1].to_string(),
            token_symbol: caps[2].to_string(),
        })
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        CommandParser::new()
    }
}
