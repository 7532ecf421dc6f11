//! Diagnostics sink shared by the parser and the lowering pass
//!
//! Every error is rendered as
//!
//! ```text
//! ROW:COL Error: MESSAGE
//! <source line>
//!     ^---see here.
//! ```
//!
//! with the caret under the reported column. The text shape is fixed; color
//! is only added when echoing to a terminal.

use std::fmt;
use std::io::Write;

use crossterm::style::Stylize;
use crossterm::tty::IsTty;

use crate::parser::stream::FilePos;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub pos: FilePos,
    pub line: String,
    pub message: String,
}

impl Diagnostic {
    fn render(&self, color: bool) -> String {
        let label = if color {
            "Error:".red().bold().to_string()
        } else {
            "Error:".to_string()
        };
        format!(
            "{}:{} {} {}\n{}\n{}^---see here. \n\n",
            self.pos.row,
            self.pos.col,
            label,
            self.message,
            self.line,
            " ".repeat(self.pos.col.saturating_sub(1)),
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Echo {
    Silent,
    Stderr { color: bool },
}

#[derive(Debug, Clone)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
    echo: Echo,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Collect diagnostics without printing them.
    pub fn new() -> Self {
        Self { records: Vec::new(), echo: Echo::Silent }
    }

    /// Print each diagnostic to stderr as it is reported. `color` is honoured
    /// only when stderr is a terminal.
    pub fn stderr(color: bool) -> Self {
        let color = color && std::io::stderr().is_tty();
        Self { records: Vec::new(), echo: Echo::Stderr { color } }
    }

    /// Like [`stderr`](Self::stderr) but colors even when stderr is not a
    /// terminal.
    pub fn stderr_colored() -> Self {
        Self { records: Vec::new(), echo: Echo::Stderr { color: true } }
    }

    pub fn report(&mut self, pos: FilePos, line: impl Into<String>, message: impl Into<String>) {
        let diagnostic = Diagnostic { pos, line: line.into(), message: message.into() };
        tracing::debug!(%pos, message = %diagnostic.message, "diagnostic");
        if let Echo::Stderr { color } = self.echo {
            let _ = std::io::stderr().write_all(diagnostic.render(color).as_bytes());
        }
        self.records.push(diagnostic);
    }

    pub fn has_error(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }

    /// All diagnostics, uncolored, in report order.
    pub fn render(&self) -> String {
        self.records.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_shape() {
        let mut diagnostics = Diagnostics::new();
        assert!(!diagnostics.has_error());
        diagnostics.report(FilePos::new(3, 5, 20), "    x = 1", "invalid type");
        assert!(diagnostics.has_error());
        assert_eq!(
            diagnostics.render(),
            "3:5 Error: invalid type\n    x = 1\n    ^---see here. \n\n"
        );
    }

    #[test]
    fn test_caret_at_first_column() {
        let diagnostic = Diagnostic {
            pos: FilePos::new(1, 1, 0),
            line: "end".into(),
            message: "expected function".into(),
        };
        assert_eq!(
            diagnostic.to_string(),
            "1:1 Error: expected function\nend\n^---see here. \n\n"
        );
    }
}
