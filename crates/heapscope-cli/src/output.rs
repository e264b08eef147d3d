//! Colored terminal output for CLI reports.
//!
//! Uses `termcolor` for cross-platform colored terminal output.
//! Respects `NO_COLOR` environment variable and `--color` flag.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Styled output writer for terminal.
pub struct StyledOutput {
    stdout: StandardStream,
    stderr: StandardStream,
}

impl StyledOutput {
    /// Create a new styled output with the given color choice.
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
            stderr: StandardStream::stderr(choice),
        }
    }

    fn styled(stream: &mut StandardStream, text: &str, color: Option<Color>, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        let _ = stream.set_color(&spec);
        let _ = write!(stream, "{}", text);
        let _ = stream.reset();
    }

    /// Print a command report.
    ///
    /// The first line is the report title; `label:` prefixes of the
    /// remaining lines are highlighted.
    pub fn report(&mut self, text: &str) {
        let mut lines = text.lines();
        if let Some(title) = lines.next() {
            Self::styled(&mut self.stdout, title, None, true);
            let _ = writeln!(self.stdout);
        }
        for line in lines {
            match line.split_once(": ") {
                Some((label, rest)) => {
                    Self::styled(&mut self.stdout, label, Some(Color::Cyan), false);
                    let _ = writeln!(self.stdout, ": {}", rest);
                }
                None => {
                    let _ = writeln!(self.stdout, "{}", line);
                }
            }
        }
        let _ = self.stdout.flush();
    }

    /// Print an error and its cause chain to stderr.
    pub fn error(&mut self, err: &anyhow::Error) {
        Self::styled(&mut self.stderr, "error", Some(Color::Red), true);
        let _ = writeln!(self.stderr, ": {}", err);
        for cause in err.chain().skip(1) {
            Self::styled(&mut self.stderr, "  caused by", Some(Color::Yellow), false);
            let _ = writeln!(self.stderr, ": {}", cause);
        }
        let _ = self.stderr.flush();
    }
}
