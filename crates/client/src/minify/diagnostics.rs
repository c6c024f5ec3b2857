//! Diagnostics reported by processors when source text cannot be transformed.

use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warn,
    Error,
    Runtime,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Runtime => "RUNTIME",
        })
    }
}

/// A single problem in the source, positioned when the position is known.
///
/// Lines are 1-based; a line of 0 means "no position".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn error_at(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, line, column, message: message.into() }
    }

    pub fn warn_at(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warn, line, column, message: message.into() }
    }

    /// A failure of the underlying tool rather than of a source position.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self { severity: Severity::Runtime, line: 0, column: 0, message: message.into() }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.severity)?;
        if self.line > 0 {
            write!(f, "{}:{} ", self.line, self.column)?;
        }
        f.write_str(&self.message)
    }
}

/// Collected diagnostics for one transformation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity != Severity::Warn)
    }

    /// Plain-text report: an `Errors:` header, then one diagnostic per line.
    pub fn report(&self) -> String {
        let mut out = String::from("Errors:\n");
        for diagnostic in &self.0 {
            out.push_str(&diagnostic.to_string());
            out.push('\n');
        }
        out
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
