//! The matcher: applies directive semantics against the input cursor.
//!
//! Directives are dispatched by kind through an exhaustive case analysis.
//! `CHECK-LABEL` directives are resolved in a pre-pass that partitions the
//! input into regions; within a region the matcher advances a line cursor,
//! buffers `CHECK-NOT` directives until the next resolving event, and
//! searches `CHECK-DAG` groups over an unordered assignment space with
//! overlap retry. All captures and references go through the variable
//! environment, which is threaded explicitly rather than held as ambient
//! state.

use crate::config::Config;
use crate::cursor::Cursor;
use crate::diagnostics::Diagnostic;
use crate::error::{ErrorKind, MaterializeError};
use crate::parser::{Directive, Kind};
use crate::pattern::{Anchor, Materialized};
use crate::variable::Environment;
use regex::Captures;

/// Run every directive against `input`, pushing diagnostics as they arise.
pub(crate) fn run(
    directives: &[Directive],
    input: &str,
    config: &Config,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut matcher = Matcher {
        config,
        cursor: Cursor::new(input),
        env: Environment::new(&config.variables),
        diagnostics,
    };
    matcher.run(directives);
}

/// A claimed DAG match: line index and byte span within the line.
#[derive(Debug, Clone, Copy)]
struct Span {
    line: usize,
    start: usize,
    end: usize,
}

impl Span {
    fn overlaps(&self, other: &Span) -> bool {
        self.line == other.line
            && (self.start.max(other.start) < self.end.min(other.end)
                || (self.start == other.start && self.end == other.end))
    }
}

/// One label-delimited slice of the directive list, with the input lines it
/// may match in.
struct Region<'d> {
    /// The label directive and its matched line and end column, when the
    /// region is label-delimited.
    label: Option<(&'d Directive, usize, usize)>,
    directives: &'d [Directive],
}

/// Per-region matching state. The line cursor itself lives on the matcher;
/// this tracks the region bound and the anchors derived from past matches.
struct RegionState<'d> {
    /// First line index past the region.
    region_end: usize,
    /// Line and end column of the last positive match.
    last_match: Option<(usize, usize)>,
    /// Buffered `CHECK-NOT` directives awaiting a resolving event.
    pending_nots: Vec<&'d Directive>,
}

struct Matcher<'a> {
    config: &'a Config,
    cursor: Cursor<'a>,
    env: Environment,
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl<'a> Matcher<'a> {
    fn run<'d>(&mut self, directives: &'d [Directive]) {
        let regions = self.resolve_labels(directives);
        for (index, region) in regions.iter().enumerate() {
            // The region is bounded by the next successfully matched label.
            let region_end = regions[index + 1..]
                .iter()
                .find_map(|r| r.label.map(|(_, line, _)| line))
                .unwrap_or(self.cursor.len());
            let scoped = self.config.enable_var_scope && region.label.is_some();
            if scoped {
                self.env.push_scope();
            }
            self.run_region(region, region_end);
            if scoped {
                self.env.pop_scope();
            }
        }
    }

    /// Split the directives at `CHECK-LABEL`s and match each label in a
    /// pre-pass. Labels carry no captures, so they are environment
    /// independent and can be resolved before any other directive runs.
    fn resolve_labels<'d>(&mut self, directives: &'d [Directive]) -> Vec<Region<'d>> {
        let mut regions = Vec::new();
        let mut rest = directives;
        let mut prev_line: Option<usize> = None;

        // Directives before the first label.
        let head_len = rest
            .iter()
            .position(|d| d.kind == Kind::Label)
            .unwrap_or(rest.len());
        if head_len > 0 {
            regions.push(Region {
                label: None,
                directives: &rest[..head_len],
            });
        }
        rest = &rest[head_len..];

        while let Some((label, tail)) = rest.split_first() {
            let body_len = tail
                .iter()
                .position(|d| d.kind == Kind::Label)
                .unwrap_or(tail.len());
            let body = &tail[..body_len];
            rest = &tail[body_len..];

            let search_from = prev_line.map_or(0, |line| line + 1);
            match self.match_label(label, search_from) {
                Some((line, end_col)) => {
                    log::debug!("{}: label matched input line {}", label.location, line + 1);
                    prev_line = Some(line);
                    regions.push(Region {
                        label: Some((label, line, end_col)),
                        directives: body,
                    });
                }
                // A failed label is fatal for the directives of its region,
                // but later labels are still attempted.
                None => continue,
            }
        }
        regions
    }

    fn match_label(&mut self, label: &Directive, from: usize) -> Option<(usize, usize)> {
        let mat = match label
            .pattern
            .materialize(&self.env, self.config, self.positive_anchor())
        {
            Ok(mat) => mat,
            Err(e) => {
                self.report_materialize(label, e);
                return None;
            }
        };
        for line in from..self.cursor.len() {
            if let Some(m) = mat.regex.find(self.cursor.line(line).text) {
                return Some((line, m.end()));
            }
        }
        let mut diag = Diagnostic::error(
            ErrorKind::NoMatch,
            label.location,
            format!("no matching label found for '{}: {}'", label.head(), label.payload),
        )
        .with_input(self.cursor.position(from, 0));
        if let Some(near) = self.near_miss(label, from, self.cursor.len()) {
            diag = diag.with_near_miss(near);
        }
        self.diagnostics.push(diag);
        None
    }

    fn run_region<'d>(&mut self, region: &Region<'d>, region_end: usize) {
        self.cursor
            .set_pos(region.label.map_or(0, |(_, line, _)| line + 1));
        let mut state = RegionState {
            region_end,
            last_match: region.label.map(|(_, line, end_col)| (line, end_col)),
            pending_nots: Vec::new(),
        };

        let mut index = 0;
        while index < region.directives.len() {
            let directive = &region.directives[index];
            let ok = match directive.kind {
                Kind::Not => {
                    state.pending_nots.push(directive);
                    index += 1;
                    continue;
                }
                Kind::Dag => {
                    let group_end = self.dag_group_end(region.directives, index);
                    let group = &region.directives[index..group_end];
                    let ok = self.apply_dag_group(group, &mut state);
                    index = group_end;
                    if !ok {
                        return;
                    }
                    continue;
                }
                Kind::Check => self.apply_check(directive, &mut state),
                Kind::Next => self.apply_next(directive, &mut state),
                Kind::Same => self.apply_same(directive, &mut state),
                Kind::Empty => self.apply_empty(directive, &mut state),
                Kind::Count => self.apply_count(directive, &mut state),
                // Labels never appear inside a region body.
                Kind::Label => true,
            };
            if !ok {
                // Subsequent directives in this region would anchor to a
                // match that never happened; move on to the next region.
                return;
            }
            index += 1;
        }

        // End of region: remaining NOTs resolve against everything up to
        // the region boundary.
        self.resolve_nots(&mut state, region_end);
    }

    // ---- positive directives -------------------------------------------

    fn apply_check<'d>(&mut self, directive: &Directive, state: &mut RegionState<'d>) -> bool {
        let from = self.cursor.pos();
        match self.find_match(directive, from, state.region_end) {
            Err(e) => {
                self.report_materialize(directive, e);
                false
            }
            Ok(Some((line, mat, caps))) => {
                self.resolve_nots(state, line);
                let end = caps.get(0).map_or(0, |m| m.end());
                self.commit_captures(&mat, &caps, directive, line, 0);
                state.last_match = Some((line, end));
                self.cursor.set_pos(line + 1);
                true
            }
            Ok(None) => {
                let mut diag = Diagnostic::error(
                    ErrorKind::NoMatch,
                    directive.location,
                    format!(
                        "no match found for '{}: {}'",
                        directive.head(),
                        directive.payload
                    ),
                )
                .with_input(self.cursor.position(from, 0));
                if let Some(near) = self.near_miss(directive, from, state.region_end) {
                    diag = diag.with_near_miss(near);
                }
                self.diagnostics.push(diag);
                false
            }
        }
    }

    fn apply_next<'d>(&mut self, directive: &Directive, state: &mut RegionState<'d>) -> bool {
        if state.last_match.is_none() {
            return self.missing_anchor(directive);
        }
        let line = self.cursor.pos();
        if line >= state.region_end {
            self.diagnostics.push(
                Diagnostic::error(
                    ErrorKind::NoMatch,
                    directive.location,
                    format!(
                        "no line left to match for '{}: {}'",
                        directive.head(),
                        directive.payload
                    ),
                )
                .with_input(self.cursor.position(line, 0)),
            );
            return false;
        }
        let text = self.cursor.line(line).text;
        match self.match_line(directive, text, self.positive_anchor()) {
            Err(e) => {
                self.report_materialize(directive, e);
                false
            }
            Ok(Some((mat, caps))) => {
                self.resolve_nots(state, line);
                let end = caps.get(0).map_or(0, |m| m.end());
                self.commit_captures(&mat, &caps, directive, line, 0);
                state.last_match = Some((line, end));
                self.cursor.advance();
                true
            }
            Ok(None) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        ErrorKind::NoMatch,
                        directive.location,
                        format!(
                            "no match on the line after the previous match for '{}: {}'",
                            directive.head(),
                            directive.payload
                        ),
                    )
                    .with_input(self.cursor.position(line, 0))
                    .with_near_miss(format!("input line {}: {}", line + 1, text)),
                );
                false
            }
        }
    }

    fn apply_same<'d>(&mut self, directive: &Directive, state: &mut RegionState<'d>) -> bool {
        let Some((line, col)) = state.last_match else {
            return self.missing_anchor(directive);
        };
        let anchor = if self.config.match_full_lines {
            Anchor::LineEnd
        } else {
            Anchor::Unanchored
        };
        let tail = &self.cursor.line(line).text[col..];
        match self.match_line(directive, tail, anchor) {
            Err(e) => {
                self.report_materialize(directive, e);
                false
            }
            Ok(Some((mat, caps))) => {
                self.resolve_nots(state, line);
                let end = caps.get(0).map_or(0, |m| m.end());
                self.commit_captures(&mat, &caps, directive, line, col);
                state.last_match = Some((line, col + end));
                true
            }
            Ok(None) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        ErrorKind::NoMatch,
                        directive.location,
                        format!(
                            "no match on the rest of the previous line for '{}: {}'",
                            directive.head(),
                            directive.payload
                        ),
                    )
                    .with_input(self.cursor.position(line, col)),
                );
                false
            }
        }
    }

    fn apply_empty<'d>(&mut self, directive: &Directive, state: &mut RegionState<'d>) -> bool {
        let line = self.cursor.pos();
        if line >= state.region_end {
            self.diagnostics.push(
                Diagnostic::error(
                    ErrorKind::NoMatch,
                    directive.location,
                    format!("no line left to match for '{}'", directive.head()),
                )
                .with_input(self.cursor.position(line, 0)),
            );
            return false;
        }
        let text = self.cursor.line(line).text;
        if !text.is_empty() {
            self.diagnostics.push(
                Diagnostic::error(
                    ErrorKind::NoMatch,
                    directive.location,
                    format!("expected an empty line for '{}'", directive.head()),
                )
                .with_input(self.cursor.position(line, 0))
                .with_near_miss(format!("input line {}: {}", line + 1, text)),
            );
            return false;
        }
        self.resolve_nots(state, line);
        state.last_match = Some((line, 0));
        self.cursor.advance();
        true
    }

    fn apply_count<'d>(&mut self, directive: &Directive, state: &mut RegionState<'d>) -> bool {
        let n = directive.count.unwrap_or(1);
        // Materialize once up front so an unbound reference is reported as
        // such instead of as a missing match.
        if self.materialize_positive(directive).is_none() {
            return false;
        }
        let from = self.cursor.pos();
        let last_start = state.region_end.saturating_sub(n.saturating_sub(1));
        for start in from..last_start {
            if let Some(window) = self.try_count_window(directive, start, n) {
                self.resolve_nots(state, start);
                self.env = window.env;
                if self.config.reject_empty_vars {
                    for (name, line, col) in window.empties {
                        self.diagnostics.push(
                            Diagnostic::error(
                                ErrorKind::EmptyCapture,
                                directive.location,
                                format!("empty value captured for variable '{name}'"),
                            )
                            .with_input(self.cursor.position(line, col)),
                        );
                    }
                }
                state.last_match = Some((start + n - 1, window.end_col));
                self.cursor.set_pos(start + n);
                return true;
            }
        }
        let mut diag = Diagnostic::error(
            ErrorKind::NoMatch,
            directive.location,
            format!(
                "expected {n} consecutive matching lines for '{}: {}'",
                directive.head(),
                directive.payload
            ),
        )
        .with_input(self.cursor.position(from, 0));
        if let Some(near) = self.near_miss(directive, from, state.region_end) {
            diag = diag.with_near_miss(near);
        }
        self.diagnostics.push(diag);
        false
    }

    /// Try to match `n` consecutive lines starting at `start`. Bindings are
    /// applied to a scratch environment so a failed window leaves no trace;
    /// successive lines see the bindings of earlier ones.
    fn try_count_window(&self, directive: &Directive, start: usize, n: usize) -> Option<Window> {
        let mut window = Window {
            env: self.env.clone(),
            end_col: 0,
            empties: Vec::new(),
        };
        for k in 0..n {
            let mat = directive
                .pattern
                .materialize(&window.env, self.config, self.positive_anchor())
                .ok()?;
            let text = self.cursor.line(start + k).text;
            let caps = mat.regex.captures(text)?;
            let (mat, caps) = if mat.self_referential {
                let mut tentative = window.env.clone();
                let _ = bind_captures(&mut tentative, &mat, &caps);
                let confirm = directive
                    .pattern
                    .materialize_resolved(&tentative, self.config, self.positive_anchor())
                    .ok()?;
                let caps = confirm.regex.captures(text)?;
                (confirm, caps)
            } else {
                (mat, caps)
            };
            window.end_col = caps.get(0).map_or(0, |m| m.end());
            let outcome = bind_captures(&mut window.env, &mat, &caps);
            if !outcome.ok {
                return None;
            }
            for (name, col) in outcome.empties {
                window.empties.push((name, start + k, col));
            }
        }
        Some(window)
    }

    // ---- DAG groups ----------------------------------------------------

    /// Index one past the end of the DAG group starting at `start`. The
    /// group extends over `CHECK-DAG` and interleaved `CHECK-NOT`
    /// directives, but trailing NOTs rejoin the ordinary pending buffer.
    fn dag_group_end(&self, directives: &[Directive], start: usize) -> usize {
        let mut end = start;
        while end < directives.len()
            && matches!(directives[end].kind, Kind::Dag | Kind::Not)
        {
            end += 1;
        }
        while end > start && directives[end - 1].kind == Kind::Not {
            end -= 1;
        }
        end
    }

    fn apply_dag_group<'d>(&mut self, group: &'d [Directive], state: &mut RegionState<'d>) -> bool {
        // Interleaved NOTs split the group into blocks that must match in
        // order; within a block matches may permute freely.
        let mut blocks: Vec<Vec<&Directive>> = vec![Vec::new()];
        let mut barriers: Vec<Vec<&Directive>> = Vec::new();
        for directive in group {
            match directive.kind {
                Kind::Dag => {
                    if barriers.len() == blocks.len() {
                        blocks.push(Vec::new());
                    }
                    if let Some(block) = blocks.last_mut() {
                        block.push(directive);
                    }
                }
                _ => {
                    if barriers.len() < blocks.len() {
                        barriers.push(Vec::new());
                    }
                    if let Some(barrier) = barriers.last_mut() {
                        barrier.push(directive);
                    }
                }
            }
        }

        let mut search_start = self.cursor.pos();
        let mut prev_block_max: Option<(usize, usize)> = None;
        let mut group_max: Option<(usize, usize)> = None;
        for (index, block) in blocks.iter().enumerate() {
            let mut claimed: Vec<Span> = Vec::new();
            let mut block_min: Option<usize> = None;
            let mut block_max: Option<(usize, usize)> = None;
            for directive in block {
                let Some(mat) = self.materialize_positive(directive) else {
                    return false;
                };
                let Some((span, caps_line)) =
                    self.dag_search(&mat, search_start, state.region_end, &claimed)
                else {
                    let mut diag = Diagnostic::error(
                        ErrorKind::NoMatch,
                        directive.location,
                        format!(
                            "no match found for '{}: {}'",
                            directive.head(),
                            directive.payload
                        ),
                    )
                    .with_input(self.cursor.position(search_start, 0));
                    if let Some(near) = self.near_miss(directive, search_start, state.region_end)
                    {
                        diag = diag.with_near_miss(near);
                    }
                    self.diagnostics.push(diag);
                    return false;
                };
                log::trace!(
                    "{}: DAG matched input line {} cols {}..{}",
                    directive.location,
                    span.line + 1,
                    span.start,
                    span.end
                );
                // Rerun on the winning slice to commit captures, with the
                // confirm pass for self-referential patterns. A DAG match
                // that fails its confirm pass is not retried elsewhere.
                let slice = &self.cursor.line(span.line).text[caps_line..];
                match self.match_line(directive, slice, self.positive_anchor()) {
                    Ok(Some((mat, caps))) => {
                        self.commit_captures(&mat, &caps, directive, span.line, caps_line);
                    }
                    Ok(None) => {
                        self.diagnostics.push(
                            Diagnostic::error(
                                ErrorKind::NoMatch,
                                directive.location,
                                format!(
                                    "no match found for '{}: {}'",
                                    directive.head(),
                                    directive.payload
                                ),
                            )
                            .with_input(self.cursor.position(span.line, span.start)),
                        );
                        return false;
                    }
                    Err(e) => {
                        self.report_materialize(directive, e);
                        return false;
                    }
                }
                claimed.push(span);
                block_min = Some(block_min.map_or(span.line, |m: usize| m.min(span.line)));
                if block_max.is_none_or(|(line, end)| (span.line, span.end) > (line, end)) {
                    block_max = Some((span.line, span.end));
                }
            }

            let block_min = block_min.unwrap_or(search_start);
            if index == 0 {
                // The group is the resolving event for NOTs buffered before
                // it.
                self.resolve_nots(state, block_min);
            } else if let Some(barrier) = barriers.get(index - 1) {
                let floor = prev_block_max.map(|(line, _)| line);
                for not in barrier {
                    self.check_not(not, floor, block_min);
                }
            }
            if let Some(max) = block_max {
                prev_block_max = Some(max);
                search_start = max.0 + 1;
                if group_max.is_none_or(|g| max > g) {
                    group_max = Some(max);
                }
            }
        }

        if let Some((line, end)) = group_max {
            state.last_match = Some((line, end));
            self.cursor.set_pos(line + 1);
        }
        true
    }

    /// Earliest match of `mat` at or after `from` that does not overlap a
    /// span already claimed by this DAG block.
    fn dag_search(
        &self,
        mat: &Materialized,
        from: usize,
        to: usize,
        claimed: &[Span],
    ) -> Option<(Span, usize)> {
        for line in from..to {
            let text = self.cursor.line(line).text;
            if self.config.match_full_lines {
                // Anchored patterns match the whole line or nothing, so a
                // collision cannot be retried within the line.
                if let Some(m) = mat.regex.find(text) {
                    let span = Span {
                        line,
                        start: m.start(),
                        end: m.end(),
                    };
                    if !claimed.iter().any(|c| span.overlaps(c)) {
                        return Some((span, 0));
                    }
                }
                continue;
            }
            let mut base = 0;
            while base <= text.len() {
                let Some(m) = mat.regex.find(&text[base..]) else {
                    break;
                };
                let span = Span {
                    line,
                    start: base + m.start(),
                    end: base + m.end(),
                };
                if !claimed.iter().any(|c| span.overlaps(c)) {
                    return Some((span, base));
                }
                // Collision: retry past the start of this match.
                let next = text[span.start..]
                    .chars()
                    .next()
                    .map_or(text.len() + 1, |c| span.start + c.len_utf8());
                if next <= base {
                    break;
                }
                base = next;
            }
        }
        None
    }

    // ---- NOT spans -----------------------------------------------------

    /// Resolve every pending NOT against the lines strictly between the
    /// last positive match and `upper` (exclusive).
    fn resolve_nots<'d>(&mut self, state: &mut RegionState<'d>, upper: usize) {
        if state.pending_nots.is_empty() {
            return;
        }
        let floor = state.last_match.map(|(line, _)| line);
        let pending = std::mem::take(&mut state.pending_nots);
        for not in pending {
            self.check_not(not, floor, upper);
        }
    }

    /// Check one NOT directive over the lines strictly between `floor` and
    /// `upper`.
    fn check_not(&mut self, not: &Directive, floor: Option<usize>, upper: usize) {
        let mat = match not
            .pattern
            .materialize(&self.env, self.config, Anchor::Unanchored)
        {
            Ok(mat) => mat,
            Err(e) => {
                self.report_materialize(not, e);
                return;
            }
        };
        let lower = floor.map_or(0, |line| line + 1);
        for line in lower..upper.min(self.cursor.len()) {
            let text = self.cursor.line(line).text;
            if let Some(m) = mat.regex.find(text) {
                self.diagnostics.push(
                    Diagnostic::error(
                        ErrorKind::UnexpectedMatch,
                        not.location,
                        format!(
                            "excluded pattern matched for '{}: {}'",
                            not.head(),
                            not.payload
                        ),
                    )
                    .with_input(self.cursor.position(line, m.start())),
                );
                return;
            }
        }
    }

    // ---- helpers -------------------------------------------------------

    fn positive_anchor(&self) -> Anchor {
        if self.config.match_full_lines {
            Anchor::FullLine
        } else {
            Anchor::Unanchored
        }
    }

    fn materialize_positive(&mut self, directive: &Directive) -> Option<Materialized> {
        match directive
            .pattern
            .materialize(&self.env, self.config, self.positive_anchor())
        {
            Ok(mat) => Some(mat),
            Err(e) => {
                self.report_materialize(directive, e);
                None
            }
        }
    }

    fn report_materialize(&mut self, directive: &Directive, error: MaterializeError) {
        self.diagnostics.push(Diagnostic::error(
            error.kind(),
            directive.location,
            format!("{error} in '{}: {}'", directive.head(), directive.payload),
        ));
    }

    fn missing_anchor(&mut self, directive: &Directive) -> bool {
        // The parser rejects leading adjacency directives, so this only
        // guards internal inconsistencies.
        self.diagnostics.push(Diagnostic::error(
            ErrorKind::ParseError,
            directive.location,
            format!("'{}' has no previous match to anchor to", directive.head()),
        ));
        false
    }

    /// Find the first line in `[from, to)` the directive's pattern matches,
    /// returning the materialization and captures that produced the match.
    ///
    /// Self-referential patterns match in two passes: the first pass
    /// approximates in-pattern references, then the pattern is
    /// re-materialized with the tentative bindings and must match again on
    /// the same line. A line that fails its confirm pass is skipped.
    fn find_match(
        &self,
        directive: &Directive,
        from: usize,
        to: usize,
    ) -> Result<Option<(usize, Materialized, Captures<'a>)>, MaterializeError> {
        let anchor = self.positive_anchor();
        let mat = directive.pattern.materialize(&self.env, self.config, anchor)?;
        for line in from..to.min(self.cursor.len()) {
            let text = self.cursor.line(line).text;
            let Some(caps) = mat.regex.captures(text) else {
                continue;
            };
            if !mat.self_referential {
                return Ok(Some((line, mat, caps)));
            }
            let mut tentative = self.env.clone();
            let _ = bind_captures(&mut tentative, &mat, &caps);
            let confirm = directive
                .pattern
                .materialize_resolved(&tentative, self.config, anchor)?;
            if let Some(confirmed) = confirm.regex.captures(text) {
                return Ok(Some((line, confirm, confirmed)));
            }
        }
        Ok(None)
    }

    /// Match the directive's pattern against one piece of text, with the
    /// confirm pass for self-referential patterns.
    fn match_line(
        &self,
        directive: &Directive,
        text: &'a str,
        anchor: Anchor,
    ) -> Result<Option<(Materialized, Captures<'a>)>, MaterializeError> {
        let mat = directive.pattern.materialize(&self.env, self.config, anchor)?;
        let Some(caps) = mat.regex.captures(text) else {
            return Ok(None);
        };
        if !mat.self_referential {
            return Ok(Some((mat, caps)));
        }
        let mut tentative = self.env.clone();
        let _ = bind_captures(&mut tentative, &mat, &caps);
        let confirm = directive
            .pattern
            .materialize_resolved(&tentative, self.config, anchor)?;
        match confirm.regex.captures(text) {
            Some(confirmed) => Ok(Some((confirm, confirmed))),
            None => Ok(None),
        }
    }

    /// Bind the captures of a successful match and report capture
    /// diagnostics.
    fn commit_captures(
        &mut self,
        mat: &Materialized,
        caps: &Captures,
        directive: &Directive,
        line: usize,
        base_col: usize,
    ) {
        let outcome = bind_captures(&mut self.env, mat, caps);
        for (name, col) in outcome.empties {
            if self.config.reject_empty_vars {
                self.diagnostics.push(
                    Diagnostic::error(
                        ErrorKind::EmptyCapture,
                        directive.location,
                        format!("empty value captured for variable '{name}'"),
                    )
                    .with_input(self.cursor.position(line, base_col + col)),
                );
            }
        }
        if let Some((name, text)) = outcome.overflow {
            self.diagnostics.push(
                Diagnostic::error(
                    ErrorKind::PatternError,
                    directive.location,
                    format!("numeric value '{text}' is out of range for variable '{name}'"),
                )
                .with_input(self.cursor.position(line, base_col)),
            );
        }
    }

    /// Pick the closest line in `[from, to)` as an advisory near-miss for a
    /// failed positive directive.
    fn near_miss(&self, directive: &Directive, from: usize, to: usize) -> Option<String> {
        let mut best: Option<(f32, usize)> = None;
        for line in from..to.min(self.cursor.len()) {
            let text = self.cursor.line(line).text;
            if text.is_empty() {
                continue;
            }
            let ratio = similar::TextDiff::from_chars(directive.payload.as_str(), text).ratio();
            if best.is_none_or(|(r, _)| ratio > r) {
                best = Some((ratio, line));
            }
        }
        let (ratio, line) = best?;
        if ratio < 0.4 {
            return None;
        }
        Some(format!(
            "input line {}: {}",
            line + 1,
            self.cursor.line(line).text
        ))
    }
}

/// A successfully matched `CHECK-COUNT` window, pending commit.
struct Window {
    env: Environment,
    end_col: usize,
    /// `(name, line, column)` of captures that bound the empty string.
    empties: Vec<(String, usize, usize)>,
}

/// The result of binding one match's captures into an environment.
struct BindOutcome {
    /// `(name, column)` of text captures that bound the empty string.
    empties: Vec<(String, usize)>,
    /// `(name, text)` of a numeric capture that overflowed.
    overflow: Option<(String, String)>,
    /// False when a binding failed outright.
    ok: bool,
}

fn bind_captures(env: &mut Environment, mat: &Materialized, caps: &Captures) -> BindOutcome {
    let mut outcome = BindOutcome {
        empties: Vec::new(),
        overflow: None,
        ok: true,
    };
    for slot in &mat.slots {
        let Some(m) = caps.name(&slot.name) else {
            continue;
        };
        let text = m.as_str();
        match slot.numeric {
            Some(format) => match format.parse_value(text) {
                Some(value) => env.bind_numeric(&slot.name, value, format),
                None => {
                    outcome.overflow = Some((slot.name.clone(), text.to_string()));
                    outcome.ok = false;
                }
            },
            None => {
                let value = if slot.value_class {
                    strip_result_arity(text)
                } else {
                    text
                };
                if value.is_empty() {
                    outcome.empties.push((slot.name.clone(), m.start()));
                }
                env.bind_text(&slot.name, value.to_string());
            }
        }
    }
    outcome
}

/// For SSA value-class captures, a multi-result name `%name:N` binds its
/// base so later references can select a result with a literal `#i`.
fn strip_result_arity(text: &str) -> &str {
    if let Some((base, tail)) = text.rsplit_once(':') {
        if base.starts_with('%') && !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
            return base;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_check_file;

    fn run_checks(check: &str, input: &str, config: &Config) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let directives = parse_check_file(check, 0, config, &mut diagnostics);
        run(&directives, input, config, &mut diagnostics);
        diagnostics
    }

    fn failed(diags: &[Diagnostic]) -> bool {
        diags
            .iter()
            .any(|d| d.severity == crate::Severity::Error)
    }

    #[test]
    fn dag_overlap_is_rejected() {
        let config = Config::default();
        // Two identical DAG patterns need two distinct matches.
        let diags = run_checks(
            "CHECK-DAG: value\nCHECK-DAG: value\n",
            "value\n",
            &config,
        );
        assert!(failed(&diags));

        let diags = run_checks(
            "CHECK-DAG: value\nCHECK-DAG: value\n",
            "value value\n",
            &config,
        );
        assert!(!failed(&diags), "{diags:?}");
    }

    #[test]
    fn dag_barrier_orders_blocks() {
        let config = Config::default();
        // The block after the NOT must match after the block before it.
        let check = "CHECK-DAG: alpha\nCHECK-NOT: gap\nCHECK-DAG: beta\n";
        let diags = run_checks(check, "alpha\nbeta\n", &config);
        assert!(!failed(&diags), "{diags:?}");

        // beta only occurs before alpha: the second block cannot match.
        let diags = run_checks(check, "beta\nalpha\n", &config);
        assert!(failed(&diags));

        // gap between the blocks trips the NOT.
        let diags = run_checks(check, "alpha\ngap\nbeta\n", &config);
        assert!(failed(&diags));
        assert!(
            diags
                .iter()
                .any(|d| d.kind == ErrorKind::UnexpectedMatch)
        );
    }

    #[test]
    fn not_span_is_strictly_between() {
        let config = Config::default();
        let check = "CHECK: first\nCHECK-NOT: bad\nCHECK: last\n";
        // 'bad' on the matched lines themselves is fine.
        let diags = run_checks(check, "first bad\nok\nbad last\n", &config);
        assert!(!failed(&diags), "{diags:?}");

        let diags = run_checks(check, "first\nbad\nlast\n", &config);
        assert!(failed(&diags));
    }

    #[test]
    fn trailing_not_resolves_at_region_end() {
        let config = Config::default();
        let diags = run_checks("CHECK: a\nCHECK-NOT: b\n", "a\nx\nb\n", &config);
        assert!(failed(&diags));

        let diags = run_checks("CHECK: a\nCHECK-NOT: b\n", "a\nx\n", &config);
        assert!(!failed(&diags), "{diags:?}");
    }

    #[test]
    fn count_needs_consecutive_lines() {
        let config = Config::default();
        let diags = run_checks("CHECK-COUNT-3: v\n", "v1\nv2\nv3\n", &config);
        assert!(!failed(&diags), "{diags:?}");

        let diags = run_checks("CHECK-COUNT-3: v\n", "v1\nv2\nx\nv3\n", &config);
        assert!(failed(&diags));
    }

    #[test]
    fn count_advances_past_window() {
        let config = Config::default();
        let diags = run_checks(
            "CHECK-COUNT-2: v\nCHECK-NEXT: after\n",
            "v1\nv2\nafter\n",
            &config,
        );
        assert!(!failed(&diags), "{diags:?}");
    }

    #[test]
    fn value_class_binding_strips_arity() {
        assert_eq!(strip_result_arity("%v:2"), "%v");
        assert_eq!(strip_result_arity("%v"), "%v");
        assert_eq!(strip_result_arity("v:2"), "v:2");
        assert_eq!(strip_result_arity("%v:"), "%v:");
    }

    #[test]
    fn failed_label_skips_region_but_later_labels_run() {
        let config = Config::default();
        let check = "CHECK-LABEL: one:\nCHECK: alpha\nCHECK-LABEL: two:\nCHECK: beta\n";
        let input = "two:\nbeta\n";
        let diags = run_checks(check, input, &config);
        // The first label fails; the second region still verifies.
        assert!(failed(&diags));
        let label_failures: Vec<_> = diags
            .iter()
            .filter(|d| d.kind == ErrorKind::NoMatch)
            .collect();
        assert_eq!(label_failures.len(), 1);
    }

    #[test]
    fn label_bounds_following_region() {
        let config = Config::default();
        let check = "CHECK-LABEL: one:\nCHECK: alpha\nCHECK-LABEL: two:\n";
        // alpha exists only after the second label: out of region.
        let diags = run_checks(check, "one:\ntwo:\nalpha\n", &config);
        assert!(failed(&diags));

        let diags = run_checks(check, "one:\nalpha\ntwo:\n", &config);
        assert!(!failed(&diags), "{diags:?}");
    }
}
