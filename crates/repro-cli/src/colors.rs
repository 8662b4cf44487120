//! ANSI styling for progress output, disabled when the stream is not a
//! terminal.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::OnceLock;

/// A text style used by the progress printer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Bold,
    Dim,
    Accent,
    Good,
    Warn,
    Bad,
}

impl Tone {
    fn code(self) -> &'static str {
        match self {
            Tone::Bold => "\x1b[1m",
            Tone::Dim => "\x1b[2m",
            Tone::Accent => "\x1b[36m",
            Tone::Good => "\x1b[32m",
            Tone::Warn => "\x1b[33m",
            Tone::Bad => "\x1b[31m",
        }
    }

    /// Style `text` for stdout.
    pub fn paint(self, text: impl Display) -> String {
        static ENABLED: OnceLock<bool> = OnceLock::new();
        self.wrap(text, *ENABLED.get_or_init(|| io::stdout().is_terminal()))
    }

    /// Style `text` for stderr.
    pub fn paint_err(self, text: impl Display) -> String {
        static ENABLED: OnceLock<bool> = OnceLock::new();
        self.wrap(text, *ENABLED.get_or_init(|| io::stderr().is_terminal()))
    }

    fn wrap(self, text: impl Display, enabled: bool) -> String {
        if enabled {
            format!("{}{}\x1b[0m", self.code(), text)
        } else {
            text.to_string()
        }
    }
}

/// Flush stdout so a stage line shows before the next tool starts.
pub fn flush_stdout() {
    io::stdout().flush().ok();
}
