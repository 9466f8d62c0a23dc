//! Plain-terminal presenter.

use chrono::Local;
use pchat_client::{ChatEngine, Notice, Presenter, RenderedMessage, Visibility};
use pchat_proto::MessageStatus;

const MASK: &str = "░░░░░░░░ (hidden)";

/// One message as a single terminal line.
pub fn format_line(row: &RenderedMessage<'_>) -> String {
    let record = row.record;
    let mut line = String::new();
    if let Some(ts) = record.timestamp {
        line.push_str(&ts.with_timezone(&Local).format("[%H:%M:%S] ").to_string());
    }
    line.push_str(&record.sender);
    if let Some(receiver) = record.receiver.as_deref().filter(|r| !r.is_empty()) {
        line.push_str(" -> ");
        line.push_str(receiver);
    }
    if record.private {
        line.push_str(" (private)");
    }
    if row.pending {
        line.push_str(" (sending)");
    } else {
        line.push_str(&format!(" #{}", record.id));
    }
    if record.status == MessageStatus::Invalid {
        line.push_str(" [invalid]");
    }
    line.push_str(": ");

    match row.visibility {
        Visibility::Obscure => {
            line.push_str(MASK);
            if row.can_validate {
                line.push_str(&format!("  /view {} to read", record.id));
            }
        }
        Visibility::Reveal => {
            if let Some(text) = record.display_text() {
                line.push_str(text);
            }
            if record.has_attachment() {
                let file_id = record.file_id.as_deref().unwrap_or_default();
                if record.display_text().is_some() {
                    line.push(' ');
                }
                let name = record.filename.as_deref().unwrap_or("attachment");
                let kind = if record.is_image() {
                    "image"
                } else {
                    record.content_type.as_deref().unwrap_or("file")
                };
                line.push_str(&format!("[{name} ({kind}) /fetch {file_id}]"));
            }
        }
    }
    if row.being_validated {
        line.push_str("  <verifying>");
    }
    line
}

/// Prints the conversation whenever what the user would see changes.
#[derive(Default)]
pub struct TerminalPresenter {
    last_frame: Vec<String>,
    last_status: Option<String>,
}

impl Presenter for TerminalPresenter {
    fn refresh(&mut self, engine: &ChatEngine) {
        let frame: Vec<String> = engine.rendered().iter().map(format_line).collect();
        if frame != self.last_frame {
            println!("──── {} ────", engine.presence().users().join(", "));
            for line in &frame {
                println!("{line}");
            }
            self.last_frame = frame;
        }

        let status = engine.session().status_line().map(str::to_string);
        if status != self.last_status {
            if let Some(status) = &status {
                println!("[camera] {status}");
            }
            self.last_status = status;
        }
    }

    fn notice(&mut self, notice: &Notice) {
        match notice {
            Notice::Changed => {}
            Notice::Info(msg) => println!("* {msg}"),
            Notice::Failure(msg) => eprintln!("! {msg}"),
            Notice::Disconnected(reason) => eprintln!(
                "! disconnected from chat{}; restart to reconnect",
                reason
                    .as_deref()
                    .map(|r| format!(" ({r})"))
                    .unwrap_or_default()
            ),
        }
    }
}
