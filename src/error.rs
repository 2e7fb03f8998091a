//! Define the `Location` and `ErrorKind` types shared by diagnostics.

use std::fmt;

/// The location of a directive in the check file.
///
/// Line number. Command-line definitions are line 0 and check file lines
/// start from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Line number in the check file.
    pub line_number: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.line_number == 0 {
            write!(f, "command line")
        } else {
            write!(f, "check line {}", self.line_number)
        }
    }
}

/// Classification of everything that can go wrong in a run.
///
/// Parse-time kinds are recorded while reading the check file, match-time
/// kinds while walking the input. The final verdict only looks at the
/// severity of the collected diagnostics, but the kind lets callers tell an
/// ill-formed check file from a mismatching input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed directive syntax.
    ParseError,
    /// Ill-formed embedded regex or numeric format.
    PatternError,
    /// Reference to a name with no binding at materialization time.
    UnboundVariable,
    /// A positive directive exhausted its search domain.
    NoMatch,
    /// A `CHECK-NOT` pattern matched inside its span.
    UnexpectedMatch,
    /// A capture bound an empty string.
    EmptyCapture,
    /// `CHECK-COUNT-n` with a non-positive count.
    InvalidCount,
    /// A `CHECK-LABEL` pattern containing a capture.
    LabelWithCapture,
    /// An unrecognized flag or option value.
    UnsupportedFlag,
    /// The input stream was empty.
    EmptyInput,
}

/// Errors produced while rendering a compiled pattern against the current
/// variable environment.
#[derive(Debug, thiserror::Error)]
pub(crate) enum MaterializeError {
    #[error("use of undefined variable '{0}'")]
    Unbound(String),
    #[error("variable '{0}' is not bound to a number")]
    NotNumeric(String),
    #[error("malformed pattern: {0}")]
    BadRegex(regex::Error),
}

impl MaterializeError {
    /// The diagnostic kind this error reports as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unbound(_) | Self::NotNumeric(_) => ErrorKind::UnboundVariable,
            Self::BadRegex(_) => ErrorKind::PatternError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display() {
        let loc = Location { line_number: 0 };
        assert_eq!(loc.to_string(), "command line");
        let loc = Location { line_number: 7 };
        assert_eq!(loc.to_string(), "check line 7");
    }
}
