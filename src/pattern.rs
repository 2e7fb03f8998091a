//! Pattern compiler: directive payloads to compiled segment sequences.
//!
//! A payload is a mix of literal text, `{{...}}` regex escapes, and `[[...]]`
//! variable expressions. It compiles to an ordered list of [`Segment`]s,
//! which is materialized into one concrete `regex::Regex` per match attempt
//! by substituting the current variable bindings. Back-references are thus
//! handled by substitution rather than engine-side back-references, which
//! keeps the environment authoritative and allows numeric re-rendering.

use crate::config::Config;
use crate::error::{ErrorKind, MaterializeError};
use crate::variable::{Environment, Value};
use regex::Regex;

/// The regex class `\V` expands to when the SSA value-name extension is on.
const VALUE_CLASS_RX: &str = "%[A-Za-z_][A-Za-z_0-9]*(?:[:#][0-9]+)?";

/// POSIX character classes we rewrite into the engine's bracketed form.
const POSIX_CLASSES: &[&str] = &[
    "alnum", "alpha", "blank", "cntrl", "digit", "graph", "lower", "print", "punct", "space",
    "upper", "word", "xdigit",
];

/// True if `name` is usable as a variable name (and as a regex group name).
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Base and padding for a numeric capture or reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conversion {
    /// `d`: signed decimal.
    #[default]
    Decimal,
    /// `x`: lowercase hexadecimal.
    HexLower,
    /// `X`: uppercase hexadecimal.
    HexUpper,
}

/// A parsed numeric format specifier: optional `%`, optional precision
/// `.<digits>`, optional conversion letter (default `d`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumericFormat {
    /// The conversion base.
    pub conversion: Conversion,
    /// Minimum digit count; matched as a lower bound, rendered as
    /// zero-padding.
    pub precision: Option<u32>,
}

impl NumericFormat {
    /// Parse a format specifier, e.g. `%.8X`. Returns `None` when the text
    /// is not a format.
    pub(crate) fn parse(spec: &str) -> Option<Self> {
        let mut rest = spec.strip_prefix('%').unwrap_or(spec);
        let mut precision = None;
        if let Some(after) = rest.strip_prefix('.') {
            let end = after
                .char_indices()
                .find(|(_, c)| !c.is_ascii_digit())
                .map_or(after.len(), |(i, _)| i);
            let digits = &after[..end];
            if digits.is_empty() {
                return None;
            }
            precision = Some(digits.parse().ok()?);
            rest = &after[end..];
        }
        let conversion = match rest {
            "" | "d" => Conversion::Decimal,
            "x" => Conversion::HexLower,
            "X" => Conversion::HexUpper,
            _ => return None,
        };
        Some(Self {
            conversion,
            precision,
        })
    }

    /// The regex matching values of this format.
    pub(crate) fn value_regex(&self) -> String {
        let (class, sign) = match self.conversion {
            Conversion::Decimal => ("[0-9]", "-?"),
            Conversion::HexLower => ("[0-9a-f]", ""),
            Conversion::HexUpper => ("[0-9A-F]", ""),
        };
        match self.precision {
            Some(n) => format!("{sign}{class}{{{n},}}"),
            None => format!("{sign}{class}+"),
        }
    }

    /// Render a value in this format, zero-padded to the precision.
    pub(crate) fn render(&self, value: i64) -> String {
        let width = self.precision.unwrap_or(1) as usize;
        match self.conversion {
            Conversion::Decimal => {
                let digits = format!("{:0width$}", value.unsigned_abs());
                if value < 0 {
                    format!("-{digits}")
                } else {
                    digits
                }
            }
            Conversion::HexLower => format!("{value:0width$x}"),
            Conversion::HexUpper => format!("{value:0width$X}"),
        }
    }

    /// Parse input text matched by [`Self::value_regex`] back into a value.
    /// `None` on overflow.
    pub(crate) fn parse_value(&self, text: &str) -> Option<i64> {
        match self.conversion {
            Conversion::Decimal => text.parse().ok(),
            Conversion::HexLower | Conversion::HexUpper => i64::from_str_radix(text, 16).ok(),
        }
    }
}

/// One element of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    /// Verbatim text, whitespace-canonicalized unless strict.
    Literal(String),
    /// An embedded regex from `{{...}}`, already class-translated.
    Regex(String),
    /// `[[name:expr]]`: bind `name` to the text matched by `expr`.
    CaptureText {
        name: String,
        expr: String,
        /// The expression was exactly `\V`, so a multi-result SSA name
        /// binds its base.
        value_class: bool,
    },
    /// `[[#fmt,name:]]`: bind `name` to a matched integer.
    CaptureNumeric { name: String, format: NumericFormat },
    /// `[[#fmt,]]`: match a number without binding.
    MatchNumeric { format: NumericFormat },
    /// `[[name]]`: must equal the current binding of `name`.
    ReferenceText(String),
    /// `[[#name]]`: the numeric value of `name`, re-rendered in its
    /// captured format.
    ReferenceNumeric(String),
}

/// A structured pattern-compilation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PatternParseError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PatternParseError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// How the materialized regex is anchored within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Anchor {
    /// Plain substring search.
    Unanchored,
    /// `^...$`, for positive patterns under `--match-full-lines`.
    FullLine,
    /// `...$` only, for `CHECK-SAME` continuations under
    /// `--match-full-lines`.
    LineEnd,
}

/// A capture group the matcher must read back after a successful match.
#[derive(Debug, Clone)]
pub(crate) struct CaptureSlot {
    pub name: String,
    /// `Some` for numeric captures; carries the format to parse and rebind
    /// with.
    pub numeric: Option<NumericFormat>,
    pub value_class: bool,
}

/// A pattern rendered against a concrete environment, ready to search.
#[derive(Debug)]
pub(crate) struct Materialized {
    pub regex: Regex,
    pub slots: Vec<CaptureSlot>,
    /// The pattern references a variable it captures itself. Such a match
    /// is tentative: the engine has no back-references, so the matcher must
    /// re-materialize with the tentative bindings and confirm.
    pub self_referential: bool,
}

/// A compiled directive payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile a directive payload. With `literal` set the whole payload is
    /// one verbatim segment and no meta-syntax is recognized.
    pub fn parse(payload: &str, literal: bool, config: &Config) -> Result<Self, PatternParseError> {
        if literal {
            return Ok(Self {
                segments: vec![Segment::Literal(payload.to_string())],
            });
        }

        let mut segments = Vec::new();
        let mut lit = String::new();
        let mut rest = payload;
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix("{{") {
                let Some(end) = after.find("}}") else {
                    return Err(PatternParseError::new(
                        ErrorKind::PatternError,
                        "unterminated '{{'",
                    ));
                };
                let body = &after[..end];
                if body.contains("{{") {
                    return Err(PatternParseError::new(
                        ErrorKind::PatternError,
                        "nested '{{' is not allowed",
                    ));
                }
                let translated = translate_regex(body, config);
                probe_regex(&translated)?;
                flush_literal(&mut segments, &mut lit);
                segments.push(Segment::Regex(translated));
                rest = &after[end + 2..];
            } else if let Some(after) = rest.strip_prefix("[[") {
                match classify_var(after, config)? {
                    Some((segment, consumed)) => {
                        flush_literal(&mut segments, &mut lit);
                        segments.push(segment);
                        rest = &after[consumed..];
                    }
                    None => {
                        // Not a well-formed variable expression: the
                        // brackets are literal text.
                        lit.push_str("[[");
                        rest = after;
                    }
                }
            } else {
                let next = ["{{", "[["]
                    .iter()
                    .filter_map(|tok| rest.find(tok))
                    .min()
                    .unwrap_or(rest.len());
                lit.push_str(&rest[..next]);
                rest = &rest[next..];
            }
        }
        flush_literal(&mut segments, &mut lit);

        let pattern = Self { segments };
        if let Some(name) = pattern.duplicate_capture() {
            return Err(PatternParseError::new(
                ErrorKind::PatternError,
                format!("variable '{name}' is bound twice in one pattern"),
            ));
        }
        Ok(pattern)
    }

    /// True if any segment binds a variable. Used to reject captures in
    /// `CHECK-LABEL` patterns.
    pub fn has_captures(&self) -> bool {
        self.segments.iter().any(|s| {
            matches!(
                s,
                Segment::CaptureText { .. } | Segment::CaptureNumeric { .. }
            )
        })
    }

    /// Names of text captures whose expression is empty.
    pub fn empty_capture_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::CaptureText { name, expr, .. } if expr.is_empty() => Some(name.as_str()),
            _ => None,
        })
    }

    fn duplicate_capture(&self) -> Option<&str> {
        let mut seen = Vec::new();
        for segment in &self.segments {
            let name = match segment {
                Segment::CaptureText { name, .. } | Segment::CaptureNumeric { name, .. } => name,
                _ => continue,
            };
            if seen.contains(&name.as_str()) {
                return Some(name);
            }
            seen.push(name);
        }
        None
    }

    /// Render the pattern to a concrete regex by substituting references
    /// with the escaped current bindings and captures with named groups.
    ///
    /// References to variables captured earlier in the same pattern cannot
    /// be substituted yet; they render as the capture's own expression and
    /// mark the result [`Materialized::self_referential`].
    pub fn materialize(
        &self,
        env: &Environment,
        config: &Config,
        anchor: Anchor,
    ) -> Result<Materialized, MaterializeError> {
        self.materialize_inner(env, config, anchor, false)
    }

    /// Like [`Self::materialize`], but every reference resolves from `env`,
    /// including references to the pattern's own captures. Used for the
    /// confirm pass once a first pass has produced tentative bindings.
    pub fn materialize_resolved(
        &self,
        env: &Environment,
        config: &Config,
        anchor: Anchor,
    ) -> Result<Materialized, MaterializeError> {
        self.materialize_inner(env, config, anchor, true)
    }

    fn materialize_inner(
        &self,
        env: &Environment,
        config: &Config,
        anchor: Anchor,
        resolved: bool,
    ) -> Result<Materialized, MaterializeError> {
        enum Captured<'p> {
            Text(&'p str),
            Numeric(NumericFormat),
        }
        let mut captured: Vec<(&str, Captured)> = Vec::new();
        let mut self_referential = false;
        let mut src = String::new();
        let mut slots = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    src.push_str(&literal_to_regex(text, config.strict_whitespace));
                }
                Segment::Regex(expr) => {
                    src.push_str("(?:");
                    src.push_str(expr);
                    src.push(')');
                }
                Segment::CaptureText {
                    name,
                    expr,
                    value_class,
                } => {
                    src.push_str(&format!("(?P<{name}>{expr})"));
                    slots.push(CaptureSlot {
                        name: name.clone(),
                        numeric: None,
                        value_class: *value_class,
                    });
                    captured.push((name, Captured::Text(expr)));
                }
                Segment::CaptureNumeric { name, format } => {
                    src.push_str(&format!("(?P<{name}>{})", format.value_regex()));
                    slots.push(CaptureSlot {
                        name: name.clone(),
                        numeric: Some(*format),
                        value_class: false,
                    });
                    captured.push((name, Captured::Numeric(*format)));
                }
                Segment::MatchNumeric { format } => {
                    src.push_str(&format!("(?:{})", format.value_regex()));
                }
                Segment::ReferenceText(name) => {
                    let own = captured.iter().find(|(n, _)| *n == name.as_str());
                    match own {
                        Some((_, cap)) if !resolved => {
                            match cap {
                                Captured::Text(expr) => {
                                    src.push_str(&format!("(?:{expr})"));
                                }
                                Captured::Numeric(format) => {
                                    src.push_str(&format!("(?:{})", format.value_regex()));
                                }
                            }
                            self_referential = true;
                        }
                        _ => match env.lookup(name) {
                            Some(Value::Text(text)) => src.push_str(&regex::escape(text)),
                            Some(Value::Numeric { value, format }) => {
                                src.push_str(&regex::escape(&format.render(*value)));
                            }
                            None => return Err(MaterializeError::Unbound(name.clone())),
                        },
                    }
                }
                Segment::ReferenceNumeric(name) => {
                    let own = captured.iter().find(|(n, _)| *n == name.as_str());
                    match own {
                        Some((_, Captured::Text(_))) => {
                            return Err(MaterializeError::NotNumeric(name.clone()));
                        }
                        Some((_, Captured::Numeric(format))) if !resolved => {
                            src.push_str(&format!("(?:{})", format.value_regex()));
                            self_referential = true;
                        }
                        _ => match env.lookup(name) {
                            Some(Value::Numeric { value, format }) => {
                                src.push_str(&regex::escape(&format.render(*value)));
                            }
                            Some(Value::Text(_)) => {
                                return Err(MaterializeError::NotNumeric(name.clone()));
                            }
                            None => return Err(MaterializeError::Unbound(name.clone())),
                        },
                    }
                }
            }
        }

        let src = match anchor {
            Anchor::Unanchored => src,
            Anchor::FullLine if config.strict_whitespace => format!("^(?:{src})$"),
            Anchor::FullLine => format!("^[ \\t]*(?:{src})[ \\t]*$"),
            Anchor::LineEnd if config.strict_whitespace => format!("(?:{src})$"),
            Anchor::LineEnd => format!("(?:{src})[ \\t]*$"),
        };
        let regex = Regex::new(&src).map_err(MaterializeError::BadRegex)?;
        Ok(Materialized {
            regex,
            slots,
            self_referential,
        })
    }
}

fn flush_literal(segments: &mut Vec<Segment>, lit: &mut String) {
    if !lit.is_empty() {
        segments.push(Segment::Literal(std::mem::take(lit)));
    }
}

/// Classify the body of a `[[...]]` expression. `rest` starts right after
/// the opening brackets. `Ok(None)` means the brackets are not a well-formed
/// variable expression and demote to literal text.
fn classify_var(
    rest: &str,
    config: &Config,
) -> Result<Option<(Segment, usize)>, PatternParseError> {
    let Some(end) = rest.find("]]") else {
        return Ok(None);
    };
    let body = &rest[..end];
    let consumed = end + 2;

    let segment = if let Some(numeric) = body.strip_prefix('#') {
        if let Some((spec, tail)) = numeric.split_once(',') {
            let Some(format) = NumericFormat::parse(spec) else {
                return Ok(None);
            };
            if tail.is_empty() {
                Segment::MatchNumeric { format }
            } else if let Some(name) = tail.strip_suffix(':') {
                if !is_valid_name(name) {
                    return Ok(None);
                }
                Segment::CaptureNumeric {
                    name: name.to_string(),
                    format,
                }
            } else {
                return Ok(None);
            }
        } else if let Some(name) = numeric.strip_suffix(':') {
            if !is_valid_name(name) {
                return Ok(None);
            }
            Segment::CaptureNumeric {
                name: name.to_string(),
                format: NumericFormat::default(),
            }
        } else if is_valid_name(numeric) {
            Segment::ReferenceNumeric(numeric.to_string())
        } else {
            return Ok(None);
        }
    } else {
        match body.split_once(':') {
            Some((name, expr)) => {
                if !is_valid_name(name) {
                    return Ok(None);
                }
                let value_class = config.features.ssa_value_class && expr == "\\V";
                let translated = translate_regex(expr, config);
                probe_regex(&translated)?;
                Segment::CaptureText {
                    name: name.to_string(),
                    expr: translated,
                    value_class,
                }
            }
            None if is_valid_name(body) => Segment::ReferenceText(body.to_string()),
            None => return Ok(None),
        }
    };
    Ok(Some((segment, consumed)))
}

/// Check an embedded regex for validity at parse time so the error points
/// at the check file, not at a later match attempt.
fn probe_regex(expr: &str) -> Result<(), PatternParseError> {
    Regex::new(expr).map(|_| ()).map_err(|e| {
        PatternParseError::new(ErrorKind::PatternError, format!("malformed regex: {e}"))
    })
}

/// Apply the textual pre-compile transforms to an embedded regex: POSIX
/// class rewriting, and `\V` expansion when the SSA value-name extension is
/// enabled.
fn translate_regex(body: &str, config: &Config) -> String {
    let mut out = translate_posix_classes(body);
    if config.features.ssa_value_class {
        out = out.replace("\\V", &format!("(?:{VALUE_CLASS_RX})"));
    }
    out
}

/// Rewrite bare POSIX classes like `[:alnum:]` to the engine's bracketed
/// `[[:alnum:]]` form. Best effort: a purely textual transform that leaves
/// classes already inside a bracket expression alone.
fn translate_posix_classes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    let mut prev: Option<char> = None;
    while let Some(c) = rest.chars().next() {
        if c == '[' && rest.starts_with("[:") && prev != Some('[') {
            if let Some(end) = rest.find(":]") {
                let name = &rest[2..end];
                if POSIX_CLASSES.contains(&name) {
                    out.push_str("[[:");
                    out.push_str(name);
                    out.push_str(":]]");
                    prev = Some(']');
                    rest = &rest[end + 2..];
                    continue;
                }
            }
        }
        out.push(c);
        prev = Some(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

/// Escape a literal segment, collapsing whitespace runs to one-or-more
/// unless strict.
fn literal_to_regex(text: &str, strict: bool) -> String {
    if strict {
        return regex::escape(text);
    }
    let mut out = String::new();
    let mut chunk = String::new();
    let mut in_ws = false;
    for c in text.chars() {
        if c == ' ' || c == '\t' {
            if !in_ws {
                if !chunk.is_empty() {
                    out.push_str(&regex::escape(&chunk));
                    chunk.clear();
                }
                out.push_str("[ \\t]+");
                in_ws = true;
            }
        } else {
            chunk.push(c);
            in_ws = false;
        }
    }
    if !chunk.is_empty() {
        out.push_str(&regex::escape(&chunk));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Features;

    fn parse(payload: &str) -> Pattern {
        Pattern::parse(payload, false, &Config::default()).unwrap()
    }

    fn materialize(pattern: &Pattern, env: &Environment) -> Materialized {
        pattern
            .materialize(env, &Config::default(), Anchor::Unanchored)
            .unwrap()
    }

    #[test]
    fn names() {
        assert!(is_valid_name("V"));
        assert!(is_valid_name("_foo9"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("9v"));
        assert!(!is_valid_name("a-b"));
    }

    #[test]
    fn literal_only() {
        let p = parse("add i32 %x");
        let m = materialize(&p, &Environment::new(&[]));
        assert!(m.regex.is_match("  add i32 %x"));
        assert!(m.regex.is_match("add\ti32  %x"));
        assert!(!m.regex.is_match("addi32 %x"));
    }

    #[test]
    fn literal_mode_disables_meta() {
        let p = Pattern::parse("[[V:.*]] {{x}}", true, &Config::default()).unwrap();
        let m = materialize(&p, &Environment::new(&[]));
        assert!(m.regex.is_match("[[V:.*]] {{x}}"));
        assert!(!m.regex.is_match("anything else"));
    }

    #[test]
    fn embedded_regex() {
        let p = parse("v{{[0-9]+}}");
        let m = materialize(&p, &Environment::new(&[]));
        assert!(m.regex.is_match("v42"));
        assert!(!m.regex.is_match("vx"));
    }

    #[test]
    fn regex_body_may_contain_lone_closing_brace() {
        // `}}` terminates the body, a single `}` does not.
        let p = parse("{{ab}c}}");
        let m = materialize(&p, &Environment::new(&[]));
        assert!(m.regex.is_match("ab}c"));
    }

    #[test]
    fn unterminated_regex_is_an_error() {
        let err = Pattern::parse("{{abc", false, &Config::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PatternError);
    }

    #[test]
    fn bad_regex_is_an_error() {
        let err = Pattern::parse("{{a(}}", false, &Config::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PatternError);
    }

    #[test]
    fn capture_and_reference() {
        let p = parse("assign [[V:[a-z]+]]");
        let m = materialize(&p, &Environment::new(&[]));
        let caps = m.regex.captures("assign foo").unwrap();
        assert_eq!(&caps["V"], "foo");
        assert_eq!(m.slots.len(), 1);

        let mut env = Environment::new(&[]);
        env.bind_text("V", "foo".to_string());
        let p = parse("print [[V]]");
        let m = materialize(&p, &env);
        assert!(m.regex.is_match("print foo"));
        assert!(!m.regex.is_match("print bar"));
    }

    #[test]
    fn reference_is_escaped() {
        let mut env = Environment::new(&[]);
        env.bind_text("V", "a+b".to_string());
        let p = parse("[[V]]");
        let m = materialize(&p, &env);
        assert!(m.regex.is_match("a+b"));
        assert!(!m.regex.is_match("aab"));
    }

    #[test]
    fn unbound_reference() {
        let p = parse("[[MISSING]]");
        let err = p
            .materialize(&Environment::new(&[]), &Config::default(), Anchor::Unanchored)
            .unwrap_err();
        assert!(matches!(err, MaterializeError::Unbound(ref n) if n == "MISSING"));
    }

    #[test]
    fn malformed_brackets_are_literal() {
        // No closing brackets.
        let p = parse("a [[V");
        assert!(materialize(&p, &Environment::new(&[])).regex.is_match("a [[V"));

        // Invalid name.
        let p = parse("[[9x]]");
        assert!(materialize(&p, &Environment::new(&[])).regex.is_match("[[9x]]"));

        // Matching-constraint tail we do not support.
        let p = parse("[[#FOO:bar]]");
        assert!(
            materialize(&p, &Environment::new(&[]))
                .regex
                .is_match("[[#FOO:bar]]")
        );
    }

    #[test]
    fn numeric_formats() {
        assert_eq!(
            NumericFormat::parse("%.8X"),
            Some(NumericFormat {
                conversion: Conversion::HexUpper,
                precision: Some(8),
            })
        );
        assert_eq!(
            NumericFormat::parse("%.3"),
            Some(NumericFormat {
                conversion: Conversion::Decimal,
                precision: Some(3),
            })
        );
        assert_eq!(NumericFormat::parse(""), Some(NumericFormat::default()));
        assert_eq!(
            NumericFormat::parse("d"),
            Some(NumericFormat::default())
        );
        assert_eq!(NumericFormat::parse("%q"), None);
        assert_eq!(NumericFormat::parse("%."), None);
    }

    #[test]
    fn numeric_render_and_parse() {
        let fmt = NumericFormat::parse("%.3d").unwrap();
        assert_eq!(fmt.render(-100), "-100");
        assert_eq!(fmt.render(7), "007");
        assert_eq!(fmt.parse_value("-100"), Some(-100));

        let fmt = NumericFormat::parse("%.8X").unwrap();
        assert_eq!(fmt.render(0xFF00FF00), "FF00FF00");
        assert_eq!(fmt.parse_value("FF00FF00"), Some(0xFF00FF00));
    }

    #[test]
    fn numeric_capture_segment() {
        let p = parse("[[#%.3d,ARG:]]");
        let m = materialize(&p, &Environment::new(&[]));
        let caps = m.regex.captures("print -100").unwrap();
        assert_eq!(&caps["ARG"], "-100");
        assert_eq!(m.slots[0].numeric, Some(NumericFormat::parse("%.3d").unwrap()));
    }

    #[test]
    fn nonbinding_numeric_match() {
        let p = parse("[[#%.8X,]]");
        let m = materialize(&p, &Environment::new(&[]));
        assert!(m.slots.is_empty());
        assert!(m.regex.is_match("print 0xFF00FF00"));
        assert!(!m.regex.is_match("print 0xFF"));
    }

    #[test]
    fn numeric_reference_renders_in_captured_format() {
        let mut env = Environment::new(&[]);
        env.bind_numeric("N", 255, NumericFormat::parse("%.4X").unwrap());
        let p = parse("[[#N]]");
        let m = materialize(&p, &env);
        assert!(m.regex.is_match("00FF"));
        assert!(!m.regex.is_match("255"));
    }

    #[test]
    fn text_reference_to_numeric_binding() {
        let mut env = Environment::new(&[]);
        env.bind_numeric("ARG", -100, NumericFormat::parse("%.3d").unwrap());
        let p = parse("[[ARG]]");
        let m = materialize(&p, &env);
        assert!(m.regex.is_match("-100"));
    }

    #[test]
    fn duplicate_capture_is_an_error() {
        let err = Pattern::parse("[[V:a]] [[V:b]]", false, &Config::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::PatternError);
    }

    #[test]
    fn empty_capture_names() {
        let p = parse("test [[VAL:]]");
        assert_eq!(p.empty_capture_names().collect::<Vec<_>>(), ["VAL"]);
        assert!(p.has_captures());
    }

    #[test]
    fn posix_class_translation() {
        assert_eq!(translate_posix_classes("[:alnum:]+"), "[[:alnum:]]+");
        // Already bracketed: left alone.
        assert_eq!(translate_posix_classes("[[:alnum:]]"), "[[:alnum:]]");
        // Unknown class: left alone.
        assert_eq!(translate_posix_classes("[:nope:]"), "[:nope:]");

        let p = parse("{{[:digit:]+}}");
        let m = materialize(&p, &Environment::new(&[]));
        assert!(m.regex.is_match("123"));
    }

    #[test]
    fn value_class_expansion() {
        let config = Config {
            features: Features {
                ssa_value_class: true,
            },
            ..Config::default()
        };
        let p = Pattern::parse("{{\\V}}", false, &config).unwrap();
        let m = p
            .materialize(&Environment::new(&[]), &config, Anchor::Unanchored)
            .unwrap();
        assert!(m.regex.is_match("%value"));
        assert!(m.regex.is_match("%value#1"));
        assert!(m.regex.is_match("%value:2"));
        assert!(!m.regex.is_match("value"));

        // Without the feature the escape is rejected by the engine.
        assert!(Pattern::parse("{{\\V}}", false, &Config::default()).is_err());
    }

    #[test]
    fn value_class_capture_flag() {
        let config = Config {
            features: Features {
                ssa_value_class: true,
            },
            ..Config::default()
        };
        let p = Pattern::parse("[[X:\\V]]", false, &config).unwrap();
        let m = p
            .materialize(&Environment::new(&[]), &config, Anchor::Unanchored)
            .unwrap();
        assert!(m.slots[0].value_class);
        assert_eq!(&m.regex.captures("%v:2").unwrap()["X"], "%v:2");
    }

    #[test]
    fn anchoring() {
        let p = parse("mid");
        let env = Environment::new(&[]);
        let config = Config::default();
        let full = p.materialize(&env, &config, Anchor::FullLine).unwrap();
        assert!(full.regex.is_match("  mid  "));
        assert!(!full.regex.is_match("amid"));

        let strict = Config {
            strict_whitespace: true,
            ..Config::default()
        };
        let full = p.materialize(&env, &strict, Anchor::FullLine).unwrap();
        assert!(!full.regex.is_match("  mid"));
        assert!(full.regex.is_match("mid"));

        let end = p.materialize(&env, &config, Anchor::LineEnd).unwrap();
        assert!(end.regex.is_match("a mid "));
        assert!(!end.regex.is_match("mid a"));
    }

    #[test]
    fn self_reference_within_one_pattern() {
        let p = parse("[[#%.3d,ARG:]] [[ARG]]");
        let env = Environment::new(&[]);
        let config = Config::default();
        let m = p.materialize(&env, &config, Anchor::Unanchored).unwrap();
        assert!(m.self_referential);
        // The first pass approximates the reference with the capture's own
        // value regex, so it overmatches until confirmed.
        assert!(m.regex.is_match("-100 -100"));
        assert!(m.regex.is_match("-100 -200"));

        let mut env = Environment::new(&[]);
        env.bind_numeric("ARG", -100, NumericFormat::parse("%.3d").unwrap());
        let confirm = p.materialize_resolved(&env, &config, Anchor::Unanchored).unwrap();
        assert!(!confirm.self_referential);
        assert!(confirm.regex.is_match("-100 -100"));
        assert!(!confirm.regex.is_match("-100 -200"));
    }

    #[test]
    fn reparse_is_structurally_equal() {
        let payload = "test [[v:\\w+]] = {{[0-9]}} [[#%.3d,N:]] [[v]]";
        let a = parse(payload);
        let b = parse(payload);
        assert_eq!(a, b);
    }
}
