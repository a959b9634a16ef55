//! Parsing of the lines typed into the terminal front end.

use std::error::Error;
use std::fmt::{self, Display};

use folio_api::ConversationId;

/// A parsed input line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Plain text, sent as a code-generation prompt.
    Prompt(String),
    /// `/new`
    New,
    /// `/list`
    List,
    /// `/select <id>`
    Select(ConversationId),
    /// `/delete <id>`
    Delete(ConversationId),
    /// `/clear`
    Clear,
    /// `/history`
    History,
    /// `/login <token>`
    Login(String),
    /// `/logout`
    Logout,
    /// `/chat <text>`
    Chat(String),
    /// `/ask <text>`
    Ask(String),
    /// `/captcha <token>`
    Captcha(String),
    /// `/image <prompt>`
    Image(String),
    /// `/projects`
    Projects,
    /// `/help`
    Help,
    /// `/quit`
    Quit,
}

/// The help text listing every command.
pub const HELP: &str = "\
Type a prompt to generate code in the active conversation.

  /new               start a new conversation
  /list              list your conversations
  /select <id>       switch to a conversation
  /delete <id>       delete a conversation
  /clear             forget the active conversation
  /history           reload the active conversation
  /login <token>     sign in with an ID token
  /logout            sign out
  /chat <text>       ask the general assistant
  /captcha <token>   provide a solved reCAPTCHA token
  /ask <text>        ask the custom AI model
  /image <prompt>    generate an image
  /projects          list the portfolio projects
  /help              show this help
  /quit              exit";

/// Error returned when a line cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The command doesn't exist.
    UnknownCommand(String),
    /// The command needs an argument.
    MissingArgument(&'static str),
    /// The argument is not a conversation id.
    InvalidId(String),
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownCommand(name) => {
                write!(f, "unknown command /{name}, try /help")
            }
            ParseError::MissingArgument(usage) => write!(f, "usage: {usage}"),
            ParseError::InvalidId(raw) => {
                write!(f, "{raw:?} is not a conversation id")
            }
        }
    }
}

impl Error for ParseError {}

/// Parses a line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Prompt(line.to_owned())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let command = match name {
        "new" => Command::New,
        "list" | "ls" => Command::List,
        "select" => Command::Select(parse_id(arg, "/select <id>")?),
        "delete" | "rm" => Command::Delete(parse_id(arg, "/delete <id>")?),
        "clear" => Command::Clear,
        "history" => Command::History,
        "login" => Command::Login(required(arg, "/login <token>")?),
        "logout" => Command::Logout,
        "chat" => Command::Chat(required(arg, "/chat <text>")?),
        "ask" => Command::Ask(required(arg, "/ask <text>")?),
        "captcha" => Command::Captcha(required(arg, "/captcha <token>")?),
        "image" => Command::Image(required(arg, "/image <prompt>")?),
        "projects" => Command::Projects,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => return Err(ParseError::UnknownCommand(name.to_owned())),
    };
    Ok(Some(command))
}

fn required(arg: &str, usage: &'static str) -> Result<String, ParseError> {
    if arg.is_empty() {
        return Err(ParseError::MissingArgument(usage));
    }
    Ok(arg.to_owned())
}

fn parse_id(
    arg: &str,
    usage: &'static str,
) -> Result<ConversationId, ParseError> {
    let arg = required(arg, usage)?;
    let digits = arg.strip_prefix('#').unwrap_or(&arg);
    digits.parse().map_err(|_| ParseError::InvalidId(arg.clone()))
}
