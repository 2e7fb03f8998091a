//! A forward-only view over the line-split input stream.
//!
//! The input is buffered eagerly and split once; the matcher then works in
//! line indices. The cursor tracks the next line eligible for a positive
//! search and converts (line, column) pairs into the 1-based positions
//! diagnostics carry.

use crate::diagnostics::InputPosition;

/// One input line with its byte offset from the start of the stream.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    /// The line text, without its terminator.
    pub text: &'a str,
    /// Byte offset of the first character.
    pub offset: usize,
}

/// The positional cursor over the input.
#[derive(Debug)]
pub(crate) struct Cursor<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Split `input` into lines. A trailing newline does not produce an
    /// extra empty line, matching `str::lines`, but line terminators may be
    /// `\n` or `\r\n`.
    pub fn new(input: &'a str) -> Self {
        let mut lines = Vec::new();
        let mut offset = 0;
        for raw in input.split_inclusive('\n') {
            let text = raw.strip_suffix('\n').unwrap_or(raw);
            let text = text.strip_suffix('\r').unwrap_or(text);
            lines.push(Line { text, offset });
            offset += raw.len();
        }
        Self { lines, pos: 0 }
    }

    /// Number of input lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// The line at `index`.
    pub fn line(&self, index: usize) -> Line<'a> {
        self.lines[index]
    }

    /// Index of the next line eligible for a positive search.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move the cursor. Positions only ever move forward except when a new
    /// label region pins the cursor to its start line.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Step past the current line.
    pub fn advance(&mut self) {
        self.pos += 1;
    }

    /// The 1-based diagnostic position for a byte column on a line. An
    /// index past the last line pins to the end of the stream.
    pub fn position(&self, index: usize, column: usize) -> InputPosition {
        match self.lines.get(index) {
            Some(line) => InputPosition {
                line: index + 1,
                column: column + 1,
                offset: line.offset + column,
            },
            None => InputPosition {
                line: self.lines.len() + 1,
                column: 1,
                offset: self.lines.last().map_or(0, |l| l.offset + l.text.len()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_lines_with_offsets() {
        let cursor = Cursor::new("one\ntwo\n\nfour");
        assert_eq!(cursor.len(), 4);
        assert_eq!(cursor.line(0).text, "one");
        assert_eq!(cursor.line(1).text, "two");
        assert_eq!(cursor.line(1).offset, 4);
        assert_eq!(cursor.line(2).text, "");
        assert_eq!(cursor.line(3).text, "four");
        assert_eq!(cursor.line(3).offset, 9);
    }

    #[test]
    fn trailing_newline() {
        let cursor = Cursor::new("one\ntwo\n");
        assert_eq!(cursor.len(), 2);
    }

    #[test]
    fn advancing() {
        let mut cursor = Cursor::new("a\nb\nc\n");
        assert_eq!(cursor.pos(), 0);
        cursor.advance();
        assert_eq!(cursor.pos(), 1);
        cursor.set_pos(2);
        assert_eq!(cursor.line(cursor.pos()).text, "c");
    }

    #[test]
    fn crlf() {
        let cursor = Cursor::new("one\r\ntwo\r\n");
        assert_eq!(cursor.len(), 2);
        assert_eq!(cursor.line(0).text, "one");
        assert_eq!(cursor.line(1).offset, 5);
    }

    #[test]
    fn positions() {
        let cursor = Cursor::new("ab\ncd");
        let pos = cursor.position(1, 1);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 2);
        assert_eq!(pos.offset, 4);

        // Past the end pins to the stream end.
        let pos = cursor.position(2, 0);
        assert_eq!(pos.line, 3);
        assert_eq!(pos.offset, 5);
    }
}
