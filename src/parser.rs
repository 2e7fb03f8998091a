//! Directive parser: check-file lines to directive records.
//!
//! The check file is scanned once, line by line. A line carries a directive
//! iff it contains a recognized prefix label followed by a kind suffix and a
//! colon; everything after the colon is the payload handed to the pattern
//! compiler. Unknown labels are ordinary text, and a comment prefix occurring
//! before any check prefix neutralizes the whole line.

use crate::config::Config;
use crate::diagnostics::Diagnostic;
use crate::error::{ErrorKind, Location};
use crate::pattern::Pattern;
use regex::Regex;

/// The matching semantics of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    /// Forward search from the cursor.
    Check,
    /// Exactly the line after the previous match.
    Next,
    /// The remainder of the previously matched line.
    Same,
    /// Excluded from the span up to the next resolving match.
    Not,
    /// The line after the previous match must be empty.
    Empty,
    /// Partitions the input into regions.
    Label,
    /// Member of an unordered group.
    Dag,
    /// A run of consecutive matching lines.
    Count,
}

impl Kind {
    fn suffix(self) -> &'static str {
        match self {
            Kind::Check => "",
            Kind::Next => "-NEXT",
            Kind::Same => "-SAME",
            Kind::Not => "-NOT",
            Kind::Empty => "-EMPTY",
            Kind::Label => "-LABEL",
            Kind::Dag => "-DAG",
            Kind::Count => "-COUNT",
        }
    }
}

/// One parsed directive. Immutable after parsing.
#[derive(Debug, Clone)]
pub(crate) struct Directive {
    pub kind: Kind,
    pub pattern: Pattern,
    pub location: Location,
    pub prefix: String,
    /// The `{LITERAL}` tag was present and meta-syntax was disabled.
    pub literal: bool,
    /// Repetition count for `-COUNT-n`.
    pub count: Option<usize>,
    /// The raw payload, kept for diagnostics and near-miss scoring.
    pub payload: String,
}

impl Directive {
    /// The directive head as written, e.g. `CHECK-DAG` or `CHECK-COUNT-3`.
    pub fn head(&self) -> String {
        let mut head = format!("{}{}", self.prefix, self.kind.suffix());
        if let Some(n) = self.count {
            head.push_str(&format!("-{n}"));
        }
        if self.literal {
            head.push_str("{LITERAL}");
        }
        head
    }
}

/// Parse the whole check file. Errors are collected and parsing continues,
/// so several malformed directives surface in one run. `base_line` is the
/// number of check-file lines consumed by earlier `text` calls.
pub(crate) fn parse_check_file(
    text: &str,
    base_line: usize,
    config: &Config,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Directive> {
    let command_line = Location { line_number: 0 };
    if config.check_prefixes.is_empty() {
        diagnostics.push(Diagnostic::error(
            ErrorKind::ParseError,
            command_line,
            "no check prefixes configured",
        ));
        return Vec::new();
    }
    if let Some(bad) = invalid_prefix(&config.check_prefixes) {
        diagnostics.push(Diagnostic::error(
            ErrorKind::ParseError,
            command_line,
            format!("invalid check prefix '{bad}'"),
        ));
        return Vec::new();
    }
    if let Some(bad) = invalid_prefix(&config.comment_prefixes) {
        diagnostics.push(Diagnostic::error(
            ErrorKind::ParseError,
            command_line,
            format!("invalid comment prefix '{bad}'"),
        ));
        return Vec::new();
    }
    let Ok(directive_rx) = directive_regex(&config.check_prefixes) else {
        diagnostics.push(Diagnostic::error(
            ErrorKind::ParseError,
            command_line,
            "cannot build directive matcher from the configured prefixes",
        ));
        return Vec::new();
    };
    let comment_rx = if config.comment_prefixes.is_empty() {
        None
    } else {
        comment_regex(&config.comment_prefixes).ok()
    };

    let mut directives = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let location = Location {
            line_number: base_line + index + 1,
        };
        let Some(caps) = directive_rx.captures(line) else {
            continue;
        };
        let head_start = caps.get(0).map_or(0, |m| m.start());
        let head_end = caps.get(0).map_or(0, |m| m.end());
        if let Some(rx) = &comment_rx {
            if let Some(comment) = rx.find(line) {
                if comment.start() <= head_start {
                    log::debug!("{location}: line neutralized by comment prefix");
                    continue;
                }
            }
        }

        let prefix = caps.name("prefix").map_or("", |m| m.as_str());
        let kind = match caps.name("suffix").map(|m| m.as_str()) {
            None => Kind::Check,
            Some("-NEXT") => Kind::Next,
            Some("-SAME") => Kind::Same,
            Some("-NOT") => Kind::Not,
            Some("-EMPTY") => Kind::Empty,
            Some("-LABEL") => Kind::Label,
            Some("-DAG") => Kind::Dag,
            Some(_) => Kind::Count,
        };
        let literal = caps.name("lit").is_some();

        let count = match kind {
            Kind::Count => match caps.name("count").and_then(|m| m.as_str().parse::<usize>().ok()) {
                Some(0) | None => {
                    diagnostics.push(Diagnostic::error(
                        ErrorKind::InvalidCount,
                        location,
                        format!("invalid repetition count on '{prefix}-COUNT'"),
                    ));
                    continue;
                }
                some => some,
            },
            _ => None,
        };

        let mut payload = &line[head_end..];
        if !config.strict_whitespace {
            payload = payload.trim_matches([' ', '\t']);
        }

        let pattern = match Pattern::parse(payload, literal, config) {
            Ok(pattern) => pattern,
            Err(e) => {
                diagnostics.push(Diagnostic::error(e.kind, location, e.message));
                continue;
            }
        };
        if kind == Kind::Label && pattern.has_captures() {
            diagnostics.push(Diagnostic::error(
                ErrorKind::LabelWithCapture,
                location,
                format!("captures are not allowed in '{prefix}-LABEL' patterns"),
            ));
            continue;
        }
        for name in pattern.empty_capture_names() {
            diagnostics.push(Diagnostic::warning(
                ErrorKind::EmptyCapture,
                location,
                format!("pattern for variable '{name}' is empty and always captures the empty string"),
            ));
        }

        let directive = Directive {
            kind,
            pattern,
            location,
            prefix: prefix.to_string(),
            literal,
            count,
            payload: payload.to_string(),
        };
        log::debug!("{location}: parsed directive '{}'", directive.head());
        directives.push(directive);
    }

    // Adjacency directives need a previous positive match to anchor to.
    // Buffered NOTs do not provide one.
    while let Some(pos) = directives
        .iter()
        .position(|d| d.kind != Kind::Not)
        .filter(|&pos| {
            matches!(
                directives[pos].kind,
                Kind::Next | Kind::Same | Kind::Empty
            )
        })
    {
        let d = directives.remove(pos);
        diagnostics.push(Diagnostic::error(
            ErrorKind::ParseError,
            d.location,
            format!("found '{}' without a previous positive directive", d.head()),
        ));
    }

    directives
}

fn invalid_prefix(prefixes: &[String]) -> Option<&str> {
    prefixes
        .iter()
        .map(String::as_str)
        .find(|p| {
            !p.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
                || !p
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

fn directive_regex(prefixes: &[String]) -> Result<Regex, regex::Error> {
    let alternation = prefixes
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"\b(?P<prefix>{alternation})(?P<suffix>-NEXT|-SAME|-NOT|-EMPTY|-LABEL|-DAG|-COUNT-(?P<count>[0-9]+))?(?P<lit>\{{LITERAL\}})?:"
    ))
}

fn comment_regex(prefixes: &[String]) -> Result<Regex, regex::Error> {
    let alternation = prefixes
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation}):"))
}
