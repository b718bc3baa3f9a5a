//! Line commands.

/// What a stdin line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Append the text and a newline to the buffer.
    Append(String),
    /// Replace the whole buffer.
    Set(String),
    Show,
    Clear,
    Help,
    Quit,
}

impl Command {
    /// Parse one line. Anything not starting with `:` is appended as-is;
    /// `::text` appends a line that starts with `:`.
    pub fn parse(line: &str) -> Command {
        let Some(rest) = line.strip_prefix(':') else {
            return Command::Append(line.to_string());
        };
        if rest.starts_with(':') {
            return Command::Append(rest.to_string());
        }

        let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
        match name {
            "set" => Command::Set(arg.replace("\\n", "\n")),
            "show" | "p" => Command::Show,
            "clear" => Command::Clear,
            "q" | "quit" => Command::Quit,
            _ => Command::Help,
        }
    }

    /// Buffer after applying an editing command to `buffer`. `None` for
    /// commands that don't edit.
    pub fn apply(&self, buffer: &str) -> Option<String> {
        match self {
            Command::Append(text) => Some(format!("{buffer}{text}\n")),
            Command::Set(text) => Some(text.clone()),
            Command::Clear => Some(String::new()),
            Command::Show | Command::Help | Command::Quit => None,
        }
    }
}

pub const HELP: &str = "\
lines are appended to the page
  :set TEXT   replace the page (\\n for newlines)
  :show       print the page
  :clear      empty the page
  :quit       leave (unsaved edits are dropped)";
