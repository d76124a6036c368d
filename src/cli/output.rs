//! Colored terminal output for packaging runs.
//!
//! Status lines go to stdout. Failures go to stderr so they stay visible
//! when stdout is redirected.

use std::io::{self, Write};
use termcolor::{BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Writes status lines prefixed with a colored marker.
#[derive(Debug)]
pub struct OutputManager {
    stdout: BufferWriter,
    stderr: BufferWriter,
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputManager {
    /// Creates a manager that colors output when the terminal supports it.
    pub fn new() -> Self {
        Self {
            stdout: BufferWriter::stdout(ColorChoice::Auto),
            stderr: BufferWriter::stderr(ColorChoice::Auto),
        }
    }

    /// Progress information.
    pub fn info(&self, message: &str) -> io::Result<()> {
        marked(&self.stdout, "ℹ", Color::Cyan, false, message)
    }

    /// A completed stage.
    pub fn success(&self, message: &str) -> io::Result<()> {
        marked(&self.stdout, "✓", Color::Green, false, message)
    }

    /// A soft failure; the run continues.
    pub fn warn(&self, message: &str) -> io::Result<()> {
        marked(&self.stdout, "⚠", Color::Yellow, true, message)
    }

    /// A hard failure, written to stderr.
    pub fn error(&self, message: &str) {
        let _ = marked(&self.stderr, "✗", Color::Red, true, message);
    }

    /// A follow-up line for an error, written to stderr.
    pub fn hint(&self, message: &str) {
        let mut buffer = self.stderr.buffer();
        if writeln!(buffer, "    • {message}").is_ok() {
            let _ = self.stderr.print(&buffer);
        }
    }

    /// Heading that opens a group of lines.
    pub fn section(&self, title: &str) -> io::Result<()> {
        let mut buffer = self.stdout.buffer();
        writeln!(buffer)?;
        buffer.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
        writeln!(buffer, "═══ {title} ═══")?;
        buffer.reset()?;
        self.stdout.print(&buffer)
    }

    /// Uncolored line.
    pub fn println(&self, message: &str) -> io::Result<()> {
        let mut buffer = self.stdout.buffer();
        writeln!(buffer, "{message}")?;
        self.stdout.print(&buffer)
    }
}

fn marked(
    writer: &BufferWriter,
    marker: &str,
    color: Color,
    tint_message: bool,
    message: &str,
) -> io::Result<()> {
    let mut buffer = writer.buffer();
    buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(buffer, "{marker}")?;
    if tint_message {
        buffer.set_color(ColorSpec::new().set_fg(Some(color)))?;
    } else {
        buffer.reset()?;
    }
    writeln!(buffer, " {message}")?;
    buffer.reset()?;
    writer.print(&buffer)
}
