//! Terminal rendering of the conversation

use banksie_core::{ChatMessage, Sender};
use std::io::{self, Write};

/// Writes streamed replies incrementally.
///
/// Partial snapshots are printed as deltas against what is already on
/// screen. When the filtered snapshot no longer extends the printed text
/// (a brace span closed), the line is restarted.
pub struct TerminalSink<W: Write> {
    out: W,
    /// Whether the `ai> ` header of the current reply is on screen
    started: bool,
    shown: String,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            started: false,
            shown: String::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn partial(&mut self, text: &str) -> io::Result<()> {
        if !self.started {
            // Nothing visible yet, e.g. a chunk that was only a control payload
            if text.is_empty() {
                return Ok(());
            }
            write!(self.out, "ai> ")?;
            self.started = true;
        }
        match text.strip_prefix(self.shown.as_str()) {
            Some(delta) => write!(self.out, "{}", delta)?,
            None => write!(self.out, "\nai> {}", text)?,
        }
        self.shown = text.to_string();
        self.out.flush()
    }

    /// Close the streamed reply with its finalized message
    pub fn finish(&mut self, message: &ChatMessage) -> io::Result<()> {
        let started = std::mem::take(&mut self.started);
        let shown = std::mem::take(&mut self.shown);

        if message.is_error {
            if started {
                writeln!(self.out)?;
            }
            writeln!(self.out, "error> {}", message.text)?;
        } else if !started {
            writeln!(self.out, "ai> {}", message.text)?;
        } else {
            match message.text.strip_prefix(shown.as_str()) {
                Some(rest) => writeln!(self.out, "{}", rest)?,
                None => writeln!(self.out, "\nai> {}", message.text)?,
            }
        }
        self.out.flush()
    }

    /// The reply was abandoned before completion
    pub fn interrupted(&mut self) -> io::Result<()> {
        self.shown.clear();
        if std::mem::take(&mut self.started) {
            writeln!(self.out)?;
        }
        writeln!(self.out, "(cancelled)")?;
        self.out.flush()
    }

    /// Print a finalized message, e.g. from history
    pub fn message(&mut self, message: &ChatMessage) -> io::Result<()> {
        let who = match message.sender {
            Sender::User => "you",
            Sender::Assistant if message.is_error => "error",
            Sender::Assistant => "ai",
        };
        writeln!(self.out, "[{}] {}> {}", message.timestamp, who, message.text)
    }
}
