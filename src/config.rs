//! Configuration record consumed by the directive parser and the matcher.
//!
//! The argument parser in the binary maps flags one-to-one onto [`Config`]
//! fields; the library itself never looks at the process environment.

/// Optional syntax extensions, switched on by the driver from
/// `FILECHECK_FEATURE_ENABLE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Features {
    /// Recognize `\V` inside `{{...}}` bodies as an SSA value name class
    /// (`%[A-Za-z_][A-Za-z_0-9]*` with an optional `:N` or `#i` suffix).
    pub ssa_value_class: bool,
}

/// Everything the matching engine needs to know about one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directive prefixes to recognize, e.g. `CHECK`.
    pub check_prefixes: Vec<String>,
    /// Prefixes that neutralize a directive when they appear first on its
    /// line.
    pub comment_prefixes: Vec<String>,
    /// Anchor every positive pattern to the whole line.
    pub match_full_lines: bool,
    /// Disable whitespace canonicalization in patterns and payload trimming.
    pub strict_whitespace: bool,
    /// Discard variable bindings when leaving a `CHECK-LABEL` region.
    pub enable_var_scope: bool,
    /// Accept an empty input stream.
    pub allow_empty: bool,
    /// Promote the empty-capture warning to an error.
    pub reject_empty_vars: bool,
    /// Pre-bound textual variables from `-D NAME=VALUE`.
    pub variables: Vec<(String, String)>,
    /// Syntax extensions.
    pub features: Features,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_prefixes: vec!["CHECK".to_string()],
            comment_prefixes: vec!["COM".to_string(), "RUN".to_string()],
            match_full_lines: false,
            strict_whitespace: false,
            enable_var_scope: false,
            allow_empty: false,
            reject_empty_vars: false,
            variables: Vec::new(),
            features: Features::default(),
        }
    }
}

/// A malformed `-D` command-line definition.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DefineError {
    /// The argument has no `=` separator.
    #[error("missing '=' in definition '{0}'")]
    MissingSeparator(String),
    /// The part before `=` is not a valid variable name.
    #[error("invalid variable name '{0}'")]
    BadName(String),
}

/// Split a `-D NAME=VALUE` argument into its parts.
pub fn parse_define(arg: &str) -> Result<(String, String), DefineError> {
    let Some((name, value)) = arg.split_once('=') else {
        return Err(DefineError::MissingSeparator(arg.to_string()));
    };
    if !crate::pattern::is_valid_name(name) {
        return Err(DefineError::BadName(name.to_string()));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.check_prefixes, ["CHECK"]);
        assert_eq!(config.comment_prefixes, ["COM", "RUN"]);
        assert!(!config.match_full_lines);
    }

    #[test]
    fn defines() {
        assert_eq!(
            parse_define("V=x"),
            Ok(("V".to_string(), "x".to_string()))
        );
        assert_eq!(
            parse_define("EMPTY="),
            Ok(("EMPTY".to_string(), String::new()))
        );
        assert_eq!(
            parse_define("novalue"),
            Err(DefineError::MissingSeparator("novalue".to_string()))
        );
        assert_eq!(
            parse_define("1bad=x"),
            Err(DefineError::BadName("1bad".to_string()))
        );
    }
}
