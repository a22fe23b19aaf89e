//! Message types for application events.
//!
//! Every command typed at the prompt becomes a [`Message`]; the app reacts to
//! one message at a time.

use std::str::FromStr;

use mailpane_core::{Filter, MessageId};

/// Application messages (events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Navigation
    /// Show the list for a filter.
    ShowList(Filter),
    /// Open a message in the detail pane.
    Open(MessageId),
    /// Collapse or expand the sidebar.
    ToggleSidebar,
    /// Refetch the visible list and message.
    Refresh,

    // Message Operations
    /// Archive a message, or move it back to the inbox if already archived.
    /// Defaults to the selected message.
    ToggleArchive(Option<MessageId>),
    /// Delete a message. Defaults to the selected message.
    Delete(Option<MessageId>),
    /// Mark a message unread. Defaults to the selected message.
    MarkUnread(Option<MessageId>),

    // Compose
    /// Start a new message.
    ComposeNew,
    /// Reply to the selected message.
    Reply,
    /// Set the draft's recipient.
    SetRecipient(String),
    /// Set the draft's subject.
    SetSubject(String),
    /// Set the draft's body.
    SetBody(String),
    /// Send the draft.
    Send,

    // Application
    /// Show the command summary.
    Help,
    /// Leave the application.
    Quit,
}

/// Command summary shown by `help`.
pub const HELP: &str = "\
commands:
  list <all|unread|archive>   show a mailbox
  open <id>                   read a message
  archive [id]                archive, or unarchive an archived message
  delete [id]                 delete a message
  unread [id]                 mark a message unread
  new | reply                 open the composer
  to | subject | body <text>  edit the draft
  send                        send the draft
  refresh | sidebar | help | quit";

/// Error returned when a command line cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseMessageError {
    /// Nothing was typed.
    #[error("empty command")]
    Empty,
    /// The command word is not known.
    #[error("unknown command: {0} (try `help`)")]
    UnknownCommand(String),
    /// The command needs an argument.
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    /// The argument could not be parsed.
    #[error("invalid argument for `{command}`: {reason}")]
    InvalidArgument {
        /// Command word.
        command: &'static str,
        /// What was wrong.
        reason: String,
    },
}

impl FromStr for Message {
    type Err = ParseMessageError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(command, rest)| (command, rest.trim()));
        let rest = (!rest.is_empty()).then_some(rest);

        match command.to_ascii_lowercase().as_str() {
            "" => Err(ParseMessageError::Empty),
            "list" => {
                let filter = rest.unwrap_or("all");
                filter
                    .parse()
                    .map(Self::ShowList)
                    .map_err(|e: mailpane_core::ParseFilterError| {
                        ParseMessageError::InvalidArgument {
                            command: "list",
                            reason: e.to_string(),
                        }
                    })
            }
            "open" => required_id("open", rest).map(Self::Open),
            "archive" => optional_id("archive", rest).map(Self::ToggleArchive),
            "delete" => optional_id("delete", rest).map(Self::Delete),
            "unread" => optional_id("unread", rest).map(Self::MarkUnread),
            "new" => Ok(Self::ComposeNew),
            "reply" => Ok(Self::Reply),
            "to" => required_text("to", rest).map(Self::SetRecipient),
            "subject" => Ok(Self::SetSubject(rest.unwrap_or_default().to_string())),
            "body" => required_text("body", rest).map(Self::SetBody),
            "send" => Ok(Self::Send),
            "refresh" => Ok(Self::Refresh),
            "sidebar" => Ok(Self::ToggleSidebar),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(ParseMessageError::UnknownCommand(other.to_string())),
        }
    }
}

fn optional_id(
    command: &'static str,
    arg: Option<&str>,
) -> Result<Option<MessageId>, ParseMessageError> {
    arg.map(|arg| {
        arg.parse()
            .map_err(|_| ParseMessageError::InvalidArgument {
                command,
                reason: format!("{arg:?} is not a message id"),
            })
    })
    .transpose()
}

fn required_id(command: &'static str, arg: Option<&str>) -> Result<MessageId, ParseMessageError> {
    optional_id(command, arg)?.ok_or(ParseMessageError::MissingArgument(command))
}

fn required_text(command: &'static str, arg: Option<&str>) -> Result<String, ParseMessageError> {
    arg.map(str::to_string)
        .ok_or(ParseMessageError::MissingArgument(command))
}
