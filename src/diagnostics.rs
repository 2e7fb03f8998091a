//! Structured diagnostics and the run report.
//!
//! Every failure mode of a run, from a malformed directive to a blocked
//! search, becomes a [`Diagnostic`] in the final [`Report`]. The verdict is
//! derived: a run succeeds iff no diagnostic with [`Severity::Error`] was
//! collected.

use crate::error::{ErrorKind, Location};
use std::fmt;

/// How bad a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Advisory only, e.g. a near-miss candidate.
    Note,
    /// Suspicious but not fatal, e.g. an empty capture.
    Warning,
    /// Fails the run.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Note => write!(f, "note"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A position in the input stream, for diagnostics that point at the place
/// where a search was exhausted or an excluded pattern matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPosition {
    /// 1-based input line number.
    pub line: usize,
    /// 1-based byte column.
    pub column: usize,
    /// Byte offset from the start of the input.
    pub offset: usize,
}

impl fmt::Display for InputPosition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "input line {}, column {}", self.line, self.column)
    }
}

/// One collected parse error, match failure, warning, or note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Error, warning, or note.
    pub severity: Severity,
    /// What went wrong.
    pub kind: ErrorKind,
    /// Check-file location of the owning directive.
    pub location: Location,
    /// Input position, when the failure points at the input stream.
    pub input: Option<InputPosition>,
    /// Human-readable description.
    pub message: String,
    /// Best candidate line when a positive directive failed, advisory only.
    pub near_miss: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub(crate) fn error(kind: ErrorKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            location,
            input: None,
            message: message.into(),
            near_miss: None,
        }
    }

    /// Create a warning diagnostic.
    pub(crate) fn warning(kind: ErrorKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(kind, location, message)
        }
    }

    /// Attach an input position.
    pub(crate) fn with_input(mut self, input: InputPosition) -> Self {
        self.input = Some(input);
        self
    }

    /// Attach a near-miss candidate line.
    pub(crate) fn with_near_miss(mut self, near_miss: impl Into<String>) -> Self {
        self.near_miss = Some(near_miss.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.location, self.message)?;
        if let Some(input) = &self.input {
            write!(f, " ({input})")?;
        }
        if let Some(near_miss) = &self.near_miss {
            write!(f, "\n  note: possible intended match: {near_miss}")?;
        }
        Ok(())
    }
}

/// The outcome of one run: the collected diagnostics plus the derived
/// verdict.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub(crate) fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    /// Did the input conform to every directive?
    pub fn success(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// All collected diagnostics, in collection order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The error diagnostics only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    /// The warning diagnostics only.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}
