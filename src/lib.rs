//! This crate verifies that a stream of text conforms to a sequence of
//! check directives embedded in a *check file*, in the manner of compiler
//! and IR regression test harnesses.
//!
//! A check file mixes ordinary text with directive lines. A directive is a
//! recognized prefix (`CHECK` by default), an optional kind suffix, and a
//! colon, followed by a pattern payload:
//!
//! ```text
//! ; CHECK: add i32
//! ; CHECK-NEXT: ret
//! ```
//!
//! The directive kinds are:
//!
//! - `CHECK:` match the pattern somewhere at or after the current position.
//! - `CHECK-NEXT:` match on exactly the line after the previous match.
//! - `CHECK-SAME:` match on the remainder of the previously matched line.
//! - `CHECK-EMPTY:` the line after the previous match must be empty.
//! - `CHECK-NOT:` the pattern must not match between the surrounding
//!   positive matches.
//! - `CHECK-DAG:` member of a group whose patterns may match in any order.
//! - `CHECK-LABEL:` partitions the input; surrounding directives cannot
//!   match across the labeled line.
//! - `CHECK-COUNT-n:` the pattern must match on `n` consecutive lines.
//!
//! A `{LITERAL}` tag between the kind and the colon disables all pattern
//! meta-syntax for that directive.
//!
//! # Patterns
//!
//! Payloads are literal text with three escape forms. Whitespace in literal
//! text matches one or more spaces or tabs unless `strict_whitespace` is
//! set.
//!
//! - `{{...}}` embeds a regular expression: `CHECK: v{{[0-9]+}}`.
//! - `[[name:expr]]` matches `expr` and binds the matched text to `name`;
//!   `[[name]]` matches the current binding of `name` verbatim:
//!
//! ```text
//! ; CHECK: assign [[V:[a-z]+]]
//! ; CHECK: print [[V]]
//! ```
//!
//! - `[[#fmt,name:]]` matches an integer in the given format (e.g. `%.8X`)
//!   and binds its value; `[[#name]]` matches the value of `name`
//!   re-rendered in its captured format. `[[#fmt,]]` matches a number
//!   without binding.
//!
//! # Example
//!
//! ```
//! use linecheck::{CheckerBuilder, Config};
//!
//! let mut builder = CheckerBuilder::new(Config::default());
//! builder.text("CHECK: one\nCHECK-NOT: skipped\nCHECK: two\n");
//! let checker = builder.finish();
//!
//! let report = checker.check("zero\none\ntwo\n");
//! assert!(report.success());
//!
//! let report = checker.check("one\nskipped\ntwo\n");
//! assert!(!report.success());
//! ```
//!
//! Parse errors do not abort [`CheckerBuilder::text`]; they are collected
//! so several malformed directives can be reported from one run, and they
//! fail the eventual [`Report`].

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

mod config;
mod cursor;
mod diagnostics;
mod error;
mod matcher;
mod parser;
mod pattern;
mod variable;

pub use crate::config::{Config, DefineError, Features, parse_define};
pub use crate::diagnostics::{Diagnostic, InputPosition, Report, Severity};
pub use crate::error::{ErrorKind, Location};
pub use crate::pattern::{Conversion, NumericFormat};
pub use crate::variable::Value;

use crate::parser::Directive;

/// Builds a [`Checker`] from the text of a check file.
///
/// `text` may be called repeatedly to append further check-file fragments;
/// directive locations keep counting across calls.
pub struct CheckerBuilder {
    config: Config,
    directives: Vec<Directive>,
    diagnostics: Vec<Diagnostic>,
    lines_consumed: usize,
}

impl CheckerBuilder {
    /// Create a builder for the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            directives: Vec::new(),
            diagnostics: Vec::new(),
            lines_consumed: 0,
        }
    }

    /// Parse the directives embedded in `text` and append them. Parse
    /// errors are collected rather than returned so that every malformed
    /// directive in the file surfaces in the final report.
    pub fn text(&mut self, text: &str) -> &mut Self {
        let directives = parser::parse_check_file(
            text,
            self.lines_consumed,
            &self.config,
            &mut self.diagnostics,
        );
        self.directives.extend(directives);
        self.lines_consumed += text.lines().count();
        self
    }

    /// Consume the accumulated directives into a checker.
    pub fn finish(&mut self) -> Checker {
        Checker {
            config: std::mem::take(&mut self.config),
            directives: std::mem::take(&mut self.directives),
            parse_diagnostics: std::mem::take(&mut self.diagnostics),
        }
    }
}

/// Verifies input streams against a parsed sequence of directives.
///
/// A checker is immutable once built and can verify any number of inputs;
/// every run starts from a fresh variable environment, so runs are
/// independent and deterministic.
pub struct Checker {
    config: Config,
    directives: Vec<Directive>,
    parse_diagnostics: Vec<Diagnostic>,
}

impl Checker {
    /// True if no directives were found in the check file.
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Verify `input` against the directives, producing the collected
    /// diagnostics and the derived verdict.
    pub fn check(&self, input: &str) -> Report {
        let mut diagnostics = self.parse_diagnostics.clone();

        if self.directives.is_empty() {
            diagnostics.push(Diagnostic::error(
                ErrorKind::ParseError,
                Location { line_number: 0 },
                format!(
                    "no check strings found with prefix{} {}",
                    if self.config.check_prefixes.len() == 1 { "" } else { "es" },
                    self.config.check_prefixes.join(", ")
                ),
            ));
            return Report::new(diagnostics);
        }
        if input.is_empty() && !self.config.allow_empty {
            diagnostics.push(Diagnostic::error(
                ErrorKind::EmptyInput,
                Location { line_number: 0 },
                "input stream is empty",
            ));
            return Report::new(diagnostics);
        }

        matcher::run(&self.directives, input, &self.config, &mut diagnostics);
        Report::new(diagnostics)
    }
}

impl Default for CheckerBuilder {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
