//! Byte Source
//!
//! Buffered rune reader over any `io::Read`. Only a small window of the input
//! is held in memory at a time; newline positions are recorded into a
//! [`LineIndex`] as they are consumed.

use crate::ast::position::{LineIndex, Pos};
use std::io::{self, Read};
use thiserror::Error;

/// Size of the sliding window over the input
pub const BUF_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("invalid UTF-8 encoding")]
    Encoding { offset: usize },
}

/// Width of a UTF-8 sequence from its lead byte; 0 for bytes that cannot start one.
fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7f => 1,
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => 0,
    }
}

pub struct Source<R> {
    reader: R,
    buf: Box<[u8]>,
    /// Next unread byte in `buf`
    npos: usize,
    /// Valid bytes in `buf`
    len: usize,
    eof: bool,
    /// Absolute offset of the next rune to be returned
    offset: usize,
    lines: LineIndex,
}

impl<R: Read> Source<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: vec![0; BUF_SIZE].into_boxed_slice(),
            npos: 0,
            len: 0,
            eof: false,
            offset: 0,
            lines: LineIndex::new(),
        }
    }

    /// Absolute 0-based offset of the next rune.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the next code point, or `None` at end of input.
    pub fn next_rune(&mut self) -> Result<Option<char>, SourceError> {
        if self.npos >= self.len && !self.fill()? {
            return Ok(None);
        }
        let lead = self.buf[self.npos];
        if lead < 0x80 {
            self.npos += 1;
            let c = char::from(lead);
            self.consumed(c);
            return Ok(Some(c));
        }
        let width = utf8_width(lead);
        if width == 0 {
            return Err(SourceError::Encoding { offset: self.offset });
        }
        while self.len - self.npos < width {
            if !self.fill()? {
                return Err(SourceError::Encoding { offset: self.offset });
            }
        }
        let c = std::str::from_utf8(&self.buf[self.npos..self.npos + width])
            .ok()
            .and_then(|s| s.chars().next())
            .ok_or(SourceError::Encoding { offset: self.offset })?;
        self.npos += width;
        self.consumed(c);
        Ok(Some(c))
    }

    fn consumed(&mut self, c: char) {
        if c == '\n' {
            self.lines.record_newline(Pos::at_offset(self.offset));
        }
        self.offset += c.len_utf8();
    }

    /// Reports whether the next raw byte is `b`, without consuming it.
    pub fn peek_byte(&mut self, b: u8) -> Result<bool, SourceError> {
        if self.npos >= self.len && !self.fill()? {
            return Ok(false);
        }
        Ok(self.buf[self.npos] == b)
    }

    /// Slides unread bytes to the front and reads more. Returns false when
    /// no new bytes could be read.
    fn fill(&mut self) -> Result<bool, SourceError> {
        if self.eof {
            return Ok(false);
        }
        self.buf.copy_within(self.npos..self.len, 0);
        self.len -= self.npos;
        self.npos = 0;
        loop {
            match self.reader.read(&mut self.buf[self.len..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(false);
                }
                Ok(n) => {
                    self.len += n;
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.eof = true;
                    return Err(SourceError::Io(e));
                }
            }
        }
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    /// Hands over the newline positions gathered so far.
    pub fn take_lines(&mut self) -> LineIndex {
        std::mem::take(&mut self.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that hands out one byte per call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            match self.0.split_first() {
                Some((&b, rest)) if !out.is_empty() => {
                    out[0] = b;
                    self.0 = rest;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    fn collect<R: Read>(src: &mut Source<R>) -> String {
        let mut out = String::new();
        while let Some(c) = src.next_rune().unwrap() {
            out.push(c);
        }
        out
    }

    #[test]
    fn test_multibyte_across_reads() {
        let text = "añ€😀z";
        let mut src = Source::new(Trickle(text.as_bytes()));
        assert_eq!(collect(&mut src), text);
        assert_eq!(src.offset(), text.len());
    }

    #[test]
    fn test_larger_than_buffer() {
        let text = "é".repeat(BUF_SIZE);
        let mut src = Source::new(text.as_bytes());
        assert_eq!(collect(&mut src), text);
    }

    #[test]
    fn test_invalid_utf8() {
        let mut src = Source::new(&b"ab\xffc"[..]);
        assert_eq!(src.next_rune().unwrap(), Some('a'));
        assert_eq!(src.next_rune().unwrap(), Some('b'));
        match src.next_rune() {
            Err(SourceError::Encoding { offset }) => assert_eq!(offset, 2),
            other => panic!("Expected encoding error, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_sequence() {
        let mut src = Source::new(&b"\xe2\x82"[..]);
        assert!(matches!(src.next_rune(), Err(SourceError::Encoding { offset: 0 })));
    }

    #[test]
    fn test_peek_byte() {
        let mut src = Source::new(&b"&&"[..]);
        assert_eq!(src.next_rune().unwrap(), Some('&'));
        assert!(src.peek_byte(b'&').unwrap());
        assert!(!src.peek_byte(b'|').unwrap());
        src.next_rune().unwrap();
        assert!(!src.peek_byte(b'&').unwrap());
    }

    #[test]
    fn test_io_error() {
        let mut src = Source::new(Broken);
        assert!(matches!(src.next_rune(), Err(SourceError::Io(_))));
        assert_eq!(src.next_rune().unwrap(), None);
    }
}
