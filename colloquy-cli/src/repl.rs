//! REPL input parsing

/// One line of REPL input
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Plain text to send to the assistant
    Chat(String),
    /// Slash command
    Command(Command),
    /// Blank line
    Empty,
}

/// Slash commands understood by the REPL
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Persona(String),
    Custom(String),
    Clear,
    Temperature(f32),
    Budget(usize),
    MaxTokens(usize),
    History,
    Tokens,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  /persona NAME     switch persona (see `colloquy personas`)
  /custom TEXT      set and activate a custom persona
  /clear            clear the conversation
  /temperature T    default sampling temperature (0.0-2.0)
  /budget N         token budget for the retained history
  /max-tokens N     maximum tokens per reply
  /history          print the conversation
  /tokens           show tokens used against the budget
  /help             show this help
  /quit             exit";

/// Parse a REPL line. Errors carry a message for the user.
pub fn parse(line: &str) -> Result<Input, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Input::Chat(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "persona" => Command::Persona(required(name, arg)?.to_string()),
        // Empty custom text is passed through so the store reports the validation error
        "custom" => Command::Custom(arg.to_string()),
        "clear" => Command::Clear,
        "temperature" | "temp" => Command::Temperature(number(name, arg)?),
        "budget" => Command::Budget(number(name, arg)?),
        "max-tokens" => Command::MaxTokens(number(name, arg)?),
        "history" => Command::History,
        "tokens" => Command::Tokens,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("Unknown command: /{other}. Type /help for commands.")),
    };

    Ok(Input::Command(command))
}

fn required<'a>(name: &str, arg: &'a str) -> Result<&'a str, String> {
    if arg.is_empty() {
        return Err(format!("/{name} needs an argument"));
    }
    Ok(arg)
}

fn number<T: std::str::FromStr>(name: &str, arg: &str) -> Result<T, String> {
    required(name, arg)?
        .parse()
        .map_err(|_| format!("/{name}: '{arg}' is not a valid number"))
}
