//! Position-tracked character stream
//!
//! [`SourceStream`] owns the bytes of one source file and hands them out one
//! at a time, keeping a [`FilePos`] (1-based row/column, 0-based byte offset)
//! in step with the cursor.
//!
//! Raw offsets are exposed through [`SourceStream::tellg`] and
//! [`SourceStream::seekg`] so the tokenizer can backtrack after lookahead.
//! Line-start offsets are cached when the file is loaded, which makes a seek
//! a binary search instead of a rescan from the start of the file.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// A position in the source: `row`/`col` are 1-based, `loc` is the 0-based
/// byte offset of the next character to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FilePos {
    pub row: usize,
    pub col: usize,
    pub loc: usize,
}

impl FilePos {
    pub fn new(row: usize, col: usize, loc: usize) -> Self {
        Self { row, col, loc }
    }

    /// Position of the first byte of a file.
    pub fn start() -> Self {
        Self::new(1, 1, 0)
    }
}

impl fmt::Display for FilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("cannot open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct SourceStream {
    bytes: Vec<u8>,
    /// Offsets of the first byte of every line; always starts with 0.
    line_starts: Vec<usize>,
    pos: FilePos,
    eof: bool,
    saved: Option<(FilePos, bool)>,
}

impl SourceStream {
    /// Load a file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| StreamError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn from_source(source: &str) -> Self {
        Self::from_bytes(source.as_bytes().to_vec())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            bytes
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            bytes,
            line_starts,
            pos: FilePos::start(),
            eof: false,
            saved: None,
        }
    }

    /// Consume one byte. Returns `None` and raises the eof flag when the
    /// cursor is already past the last byte.
    pub fn get(&mut self) -> Option<u8> {
        let Some(&c) = self.bytes.get(self.pos.loc) else {
            self.eof = true;
            return None;
        };
        self.eof = false;
        self.pos.loc += 1;
        if c == b'\n' {
            self.pos.row += 1;
            self.pos.col = 1;
        } else {
            self.pos.col += 1;
        }
        Some(c)
    }

    /// Look at the next byte without consuming it.
    pub fn peek(&mut self) -> Option<u8> {
        self.save_state();
        let c = self.get();
        self.restore_state();
        c
    }

    /// Whether the most recent [`get`](Self::get) ran off the end.
    pub fn eof(&self) -> bool {
        self.eof
    }

    pub fn tellg(&self) -> usize {
        self.pos.loc
    }

    /// Move the cursor to a raw byte offset, clamped to the end of the file.
    pub fn seekg(&mut self, loc: usize) {
        self.pos = self.pos_at(loc.min(self.bytes.len()));
        self.eof = false;
    }

    pub fn get_pos(&self) -> FilePos {
        self.pos
    }

    /// Row/column for an arbitrary byte offset.
    pub fn pos_at(&self, loc: usize) -> FilePos {
        let line = self.line_index(loc);
        FilePos::new(line + 1, loc - self.line_starts[line] + 1, loc)
    }

    /// The full source line containing `loc`, without its newline.
    pub fn get_line(&self, loc: usize) -> String {
        let line = self.line_index(loc.min(self.bytes.len()));
        let start = self.line_starts[line];
        let end = self.bytes[start..]
            .iter()
            .position(|b| *b == b'\n')
            .map_or(self.bytes.len(), |n| start + n);
        String::from_utf8_lossy(&self.bytes[start..end]).into_owned()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn line_index(&self, loc: usize) -> usize {
        match self.line_starts.binary_search(&loc) {
            Ok(line) => line,
            Err(next) => next - 1,
        }
    }

    fn save_state(&mut self) {
        assert!(self.saved.is_none(), "stream state saved twice");
        self.saved = Some((self.pos, self.eof));
    }

    fn restore_state(&mut self) {
        let (pos, eof) = self.saved.take().expect("stream state restored without save");
        self.pos = pos;
        self.eof = eof;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "This\nis a test\n";

    #[test]
    fn test_get_advances_position() {
        let mut stream = SourceStream::from_source(TEXT);
        assert_eq!(stream.get_pos(), FilePos::new(1, 1, 0));
        assert_eq!(stream.get(), Some(b'T'));
        assert_eq!(stream.get_pos(), FilePos::new(1, 2, 1));
        assert_eq!(stream.tellg(), 1);
    }

    #[test]
    fn test_newline_resets_column() {
        let mut stream = SourceStream::from_source(TEXT);
        for _ in 0..5 {
            stream.get();
        }
        assert_eq!(stream.get_pos(), FilePos::new(2, 1, 5));
        assert_eq!(stream.get(), Some(b'i'));
        assert_eq!(stream.get_pos(), FilePos::new(2, 2, 6));
    }

    #[test]
    fn test_peek_has_no_side_effect() {
        let mut stream = SourceStream::from_source(TEXT);
        stream.get();
        let before = stream.get_pos();
        for _ in 0..3 {
            assert_eq!(stream.peek(), Some(b'h'));
        }
        assert_eq!(stream.get_pos(), before);
        assert_eq!(stream.tellg(), 1);
        assert_eq!(stream.get(), Some(b'h'));
    }

    #[test]
    fn test_eof_reflects_last_read() {
        let mut stream = SourceStream::from_source("a");
        assert_eq!(stream.get(), Some(b'a'));
        assert!(!stream.eof());
        assert_eq!(stream.peek(), None);
        assert!(!stream.eof());
        assert_eq!(stream.get(), None);
        assert!(stream.eof());
    }

    #[test]
    fn test_seek_recomputes_position() {
        let mut stream = SourceStream::from_source(TEXT);
        stream.seekg(4);
        assert_eq!(stream.get_pos(), FilePos::new(1, 5, 4));
        assert_eq!(stream.get(), Some(b'\n'));
        assert_eq!(stream.tellg(), 5);
        stream.seekg(8);
        assert_eq!(stream.get_pos(), FilePos::new(2, 4, 8));
        stream.seekg(0);
        assert_eq!(stream.get_pos(), FilePos::start());
    }

    #[test]
    fn test_get_line_keeps_cursor() {
        let mut stream = SourceStream::from_source(TEXT);
        stream.get();
        assert_eq!(stream.get_line(6), "is a test");
        assert_eq!(stream.get_line(0), "This");
        assert_eq!(stream.get_line(4), "This");
        assert_eq!(stream.tellg(), 1);
    }

    #[test]
    fn test_open_reads_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEXT.as_bytes()).unwrap();
        let mut stream = SourceStream::open(file.path()).unwrap();
        assert_eq!(stream.len(), TEXT.len());
        assert_eq!(stream.get(), Some(b'T'));
    }

    #[test]
    fn test_open_missing_file_fails() {
        let err = SourceStream::open("/definitely/not/here.vc").unwrap_err();
        assert!(err.to_string().contains("cannot open"));
    }
}
