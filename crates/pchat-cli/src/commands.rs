//! Line commands typed into the chat prompt.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use pchat_client::Intent;
use pchat_proto::MessageId;

pub const HELP: &str = "\
commands:
  <text>                              post a public message
  /say <text>                         post a public message
  /private <user> <text>              post a private message
  /upload <path> [caption]            share a file
  /private-upload <user> <path> [caption]
  /toggle <id>                        flip a message's status
  /view <id>                          verify liveness to read a private message
  /stop                               end verification
  /users                              refresh who is online
  /list                               redraw the conversation
  /fetch <file_id> <out>              save an attachment
  /quit";

/// Split off the first whitespace-delimited word.
fn word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.find(char::is_whitespace) {
        Some(at) => (&input[..at], input[at..].trim_start()),
        None => (input, ""),
    }
}

fn required<'a>(value: &'a str, what: &str, usage: &str) -> Result<&'a str> {
    if value.is_empty() {
        bail!("missing {what}; usage: {usage}");
    }
    Ok(value)
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Intent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Some(Intent::Say {
            text: line.to_string(),
            private: false,
            receiver: None,
        }));
    };

    let (name, rest) = word(command);
    let intent = match name {
        "say" => Intent::Say {
            text: required(rest, "text", "/say <text>")?.to_string(),
            private: false,
            receiver: None,
        },
        "private" => {
            let usage = "/private <user> <text>";
            let (user, text) = word(rest);
            Intent::Say {
                receiver: Some(required(user, "user", usage)?.to_string()),
                text: required(text, "text", usage)?.to_string(),
                private: true,
            }
        }
        "upload" => {
            let (path, caption) = word(rest);
            Intent::Upload {
                path: PathBuf::from(required(path, "path", "/upload <path> [caption]")?),
                caption: caption.to_string(),
                private: false,
                receiver: None,
            }
        }
        "private-upload" => {
            let usage = "/private-upload <user> <path> [caption]";
            let (user, rest) = word(rest);
            let (path, caption) = word(rest);
            Intent::Upload {
                receiver: Some(required(user, "user", usage)?.to_string()),
                path: PathBuf::from(required(path, "path", usage)?),
                caption: caption.to_string(),
                private: true,
            }
        }
        "toggle" => Intent::Toggle(MessageId::new(required(rest, "id", "/toggle <id>")?)),
        "view" => Intent::View(MessageId::new(required(rest, "id", "/view <id>")?)),
        "stop" => Intent::StopView,
        "users" => Intent::RefreshUsers,
        "list" => Intent::Show,
        "fetch" => {
            let usage = "/fetch <file_id> <out>";
            let (file_id, out) = word(rest);
            Intent::Fetch {
                file_id: required(file_id, "file id", usage)?.to_string(),
                out: PathBuf::from(required(out, "output path", usage)?),
            }
        }
        "quit" | "exit" => Intent::Quit,
        other => return Err(anyhow!("unknown command /{other}; try /help")),
    };
    Ok(Some(intent))
}
