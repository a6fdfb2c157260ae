use thiserror::Error;

pub const HELP: &str = "\
Commands:
  list                    show every poll with its total
  show <poll>             show one poll's options and tallies
  vote <poll> <option>    cast this tab's vote in a poll
  reset <poll>            zero every tally in a poll
  reset-all               clear stored data, back to the starting tallies
  results                 ranked results for every poll
  help                    this text
  quit                    leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Show { poll_id: String },
    Vote { poll_id: String, option_id: String },
    Reset { poll_id: String },
    ResetAll,
    Results,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Result<Command, CommandError>> {
    let mut words = line.split_whitespace();
    let name = words.next()?;
    let args: Vec<&str> = words.collect();

    let command = match (name.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("list" | "ls", []) => Ok(Command::List),
        ("show", [poll]) => Ok(Command::Show {
            poll_id: poll.to_string(),
        }),
        ("show", _) => Err(CommandError::Usage("show <poll>")),
        ("vote", [poll, option]) => Ok(Command::Vote {
            poll_id: poll.to_string(),
            option_id: option.to_string(),
        }),
        ("vote", _) => Err(CommandError::Usage("vote <poll> <option>")),
        ("reset", [poll]) => Ok(Command::Reset {
            poll_id: poll.to_string(),
        }),
        ("reset", _) => Err(CommandError::Usage("reset <poll>")),
        ("reset-all", []) => Ok(Command::ResetAll),
        ("results", []) => Ok(Command::Results),
        ("help" | "?", _) => Ok(Command::Help),
        ("quit" | "exit", _) => Ok(Command::Quit),
        _ => Err(CommandError::Unknown(line.trim().to_string())),
    };
    Some(command)
}
