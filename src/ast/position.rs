//! Source Positions
//!
//! `Pos` is the compact form stored in every node; `Position` is the
//! human-readable form produced on demand by the `LineIndex`.

use serde::Serialize;
use std::fmt;
use std::ops::Add;

/// A location in the source: the 1-based byte offset. Zero means unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Pos(usize);

impl Pos {
    pub const INVALID: Pos = Pos(0);

    /// Position of the byte at the given 0-based offset.
    pub fn at_offset(offset: usize) -> Self {
        Pos(offset + 1)
    }

    pub fn is_valid(self) -> bool {
        self.0 > 0
    }

    /// 0-based byte offset. Invalid positions map to 0.
    pub fn offset(self) -> usize {
        self.0.saturating_sub(1)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

impl Add<usize> for Pos {
    type Output = Pos;

    fn add(self, n: usize) -> Pos {
        Pos(self.0 + n)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn is_valid(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Positions of every newline byte seen so far, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineIndex {
    newlines: Vec<Pos>,
}

impl LineIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_newline(&mut self, pos: Pos) {
        debug_assert!(self.newlines.last().map_or(true, |&last| last < pos));
        self.newlines.push(pos);
    }

    /// Number of lines started so far.
    pub fn line_count(&self) -> usize {
        self.newlines.len() + 1
    }

    /// Resolves `pos` to line and column. A newline belongs to the line it
    /// terminates; the first byte after it is column 1 of the next line.
    pub fn resolve(&self, pos: Pos) -> Position {
        if !pos.is_valid() {
            return Position::default();
        }
        let idx = self.newlines.partition_point(|&nl| nl < pos);
        let line_start = match idx {
            0 => 0,
            i => self.newlines[i - 1].raw(),
        };
        Position {
            line: idx + 1,
            column: pos.raw() - line_start,
            offset: pos.offset(),
        }
    }
}
