//! Command-line driver for the check-directive verifier.
//!
//! Reads the check file named on the command line and an input stream from
//! `--input-file` or standard input, runs the matcher, and prints the
//! collected diagnostics to standard error. Exits 0 on success, 1 when any
//! check failed, and 2 on usage errors.

use anyhow::Context;
use clap::Parser;
use clap::error::{ContextKind, ContextValue, ErrorKind as ClapErrorKind};
use linecheck::{Checker, CheckerBuilder, Config, Features, parse_define};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

/// Verify test output against FileCheck-style check directives.
#[derive(Parser, Debug)]
#[command(name = "linecheck", version, about)]
struct Args {
    /// Path to the check file containing the directives.
    check_file: PathBuf,

    /// Directive prefix to recognize instead of CHECK. May be repeated.
    #[arg(long = "check-prefix", value_name = "PREFIX")]
    check_prefix: Vec<String>,

    /// Comma-separated list of directive prefixes to recognize.
    #[arg(long = "check-prefixes", value_name = "PREFIXES", value_delimiter = ',')]
    check_prefixes: Vec<String>,

    /// Comma-separated prefixes that neutralize directives on their line.
    #[arg(long = "comment-prefixes", value_name = "PREFIXES", value_delimiter = ',')]
    comment_prefixes: Vec<String>,

    /// Read the input from a file instead of standard input.
    #[arg(long = "input-file", value_name = "PATH")]
    input_file: Option<PathBuf>,

    /// Anchor every positive pattern to the whole line.
    #[arg(long)]
    match_full_lines: bool,

    /// Do not canonicalize horizontal whitespace.
    #[arg(long)]
    strict_whitespace: bool,

    /// Discard variable bindings when leaving a CHECK-LABEL region.
    #[arg(long)]
    enable_var_scope: bool,

    /// Pre-bind a textual variable.
    #[arg(short = 'D', value_name = "NAME=VALUE")]
    defines: Vec<String>,

    /// Do not fail on an empty input stream.
    #[arg(long)]
    allow_empty: bool,

    /// When to dump the annotated input to stderr: never or fail.
    #[arg(long = "dump-input", value_name = "MODE")]
    dump_input: Option<String>,

    /// Promote the empty-capture warning to an error.
    #[arg(long)]
    reject_empty_vars: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("linecheck: error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run() -> anyhow::Result<bool> {
    let args = parse_args()?;

    let mut config = Config::default();
    if !args.check_prefix.is_empty() || !args.check_prefixes.is_empty() {
        config.check_prefixes = args
            .check_prefix
            .iter()
            .chain(&args.check_prefixes)
            .cloned()
            .collect();
    }
    if !args.comment_prefixes.is_empty() {
        config.comment_prefixes = args.comment_prefixes.clone();
    }
    config.match_full_lines = args.match_full_lines;
    config.strict_whitespace = args.strict_whitespace;
    config.enable_var_scope = args.enable_var_scope;
    config.allow_empty = args.allow_empty;
    config.reject_empty_vars = args.reject_empty_vars;
    for define in &args.defines {
        let (name, value) = parse_define(define)?;
        config.variables.push((name, value));
    }
    config.features = features_from_env();

    let dump_on_fail = match args.dump_input.as_deref() {
        None | Some("never") => false,
        Some("fail") => true,
        Some(other) => {
            eprintln!("linecheck: warning: unsupported --dump-input mode '{other}', assuming 'fail'");
            true
        }
    };

    let check_text = std::fs::read_to_string(&args.check_file)
        .with_context(|| format!("cannot read check file '{}'", args.check_file.display()))?;
    let input = read_input(args.input_file.as_deref())?;

    let checker = build_checker(&check_text, config);
    let report = checker.check(&input);
    for diagnostic in report.diagnostics() {
        eprintln!("linecheck: {diagnostic}");
    }
    if !report.success() && dump_on_fail {
        dump_input(&input);
    }
    Ok(report.success())
}

/// Parse the command line, warning about and dropping unrecognized flags
/// instead of failing on them.
fn parse_args() -> anyhow::Result<Args> {
    let mut argv: Vec<String> = std::env::args().collect();
    loop {
        match Args::try_parse_from(&argv) {
            Ok(args) => return Ok(args),
            Err(e) if e.kind() == ClapErrorKind::UnknownArgument => {
                let Some(ContextValue::String(flag)) = e.get(ContextKind::InvalidArg) else {
                    e.exit();
                };
                let flag = flag.clone();
                let Some(pos) = argv.iter().position(|a| *a == flag) else {
                    e.exit();
                };
                eprintln!("linecheck: warning: ignoring unsupported flag '{flag}'");
                argv.remove(pos);
            }
            // --help/--version exit through clap's own printer.
            Err(e) => e.exit(),
        }
    }
}

fn build_checker(check_text: &str, config: Config) -> Checker {
    let mut builder = CheckerBuilder::new(config);
    builder.text(check_text);
    builder.finish()
}

fn read_input(path: Option<&std::path::Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read input file '{}'", path.display())),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("cannot read standard input")?;
            Ok(buffer)
        }
    }
}

/// Read `FILECHECK_FEATURE_ENABLE` and switch on the recognized feature
/// tokens, warning about the rest.
fn features_from_env() -> Features {
    let mut features = Features::default();
    let Ok(raw) = std::env::var("FILECHECK_FEATURE_ENABLE") else {
        return features;
    };
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token {
            "MLIR_REGEX_CLS" => features.ssa_value_class = true,
            other => {
                eprintln!("linecheck: warning: unknown feature '{other}' in FILECHECK_FEATURE_ENABLE");
            }
        }
    }
    features
}

/// Minimal rendition of the dump-input facility: the numbered input lines.
fn dump_input(input: &str) {
    eprintln!("linecheck: full input was:");
    for (index, line) in input.lines().enumerate() {
        eprintln!("{:>6}: {line}", index + 1);
    }
}
