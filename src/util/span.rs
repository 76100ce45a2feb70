use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::rc::Rc;

simple_index! {
    /// Identifies a source file within one compilation
    pub struct FileId;
}

/// A region of a source file, counted in characters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero sized span at a position
    pub fn marker(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    /// Span of a single character
    pub fn single(pos: usize) -> Self {
        Self::new(pos, pos + 1)
    }

    /// The smallest span covering both spans
    pub fn to(self, other: Span) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

impl chumsky::Span for Span {
    type Context = ();
    type Offset = usize;

    fn new(_context: (), range: Range<usize>) -> Self {
        Span {
            start: range.start,
            end: range.end,
        }
    }

    fn context(&self) {}

    fn start(&self) -> usize {
        self.start
    }

    fn end(&self) -> usize {
        self.end
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

/// A source file with precomputed line starts
#[derive(Debug)]
pub struct SourceFile {
    pub id: FileId,
    pub name: String,
    pub text: String,
    line_starts: Vec<usize>,
    byte_offsets: Vec<usize>,
}

impl SourceFile {
    pub fn new(id: FileId, name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();

        let mut line_starts = vec![0];
        let mut byte_offsets = Vec::with_capacity(text.len() + 1);
        for (i, (byte, c)) in text.char_indices().enumerate() {
            byte_offsets.push(byte);
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }
        byte_offsets.push(text.len());

        Self {
            id,
            name: name.into(),
            text,
            line_starts,
            byte_offsets,
        }
    }

    /// Read a file from disk, naming it after its path
    pub fn load(id: FileId, path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(id, path.display().to_string(), text))
    }

    /// Number of characters in the file
    pub fn char_count(&self) -> usize {
        self.byte_offsets.len() - 1
    }

    /// Zero based line and column of a character offset
    pub fn line_col(&self, pos: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&pos) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        (line, pos - self.line_starts[line])
    }

    /// Byte offset of a character offset, clamped to the end of the file
    pub fn byte_offset(&self, pos: usize) -> usize {
        self.byte_offsets[pos.min(self.byte_offsets.len() - 1)]
    }

    pub fn slice(&self, span: Span) -> &str {
        &self.text[self.byte_offset(span.start)..self.byte_offset(span.end)]
    }
}

/// A span together with the file it points into
#[derive(Debug, Clone)]
pub struct TextLocation {
    pub source: Rc<SourceFile>,
    pub span: Span,
}

impl TextLocation {
    pub fn new(source: Rc<SourceFile>, span: Span) -> Self {
        Self { source, span }
    }

    fn sort_key(&self) -> (FileId, Span) {
        (self.source.id, self.span)
    }
}

impl PartialEq for TextLocation {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for TextLocation {}

impl PartialOrd for TextLocation {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TextLocation {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for TextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (start_line, start_col) = self.source.line_col(self.span.start);
        let (end_line, end_col) = self.source.line_col(self.span.end);
        write!(
            f,
            "{}[{}:{}..{}:{}]",
            self.source.name,
            start_line + 1,
            start_col + 1,
            end_line + 1,
            end_col + 1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Idx;

    #[test]
    fn location_rendering() {
        let source = Rc::new(SourceFile::new(FileId::new(0), "main.ql", "val a = 1\nval bb = 22\n"));
        let location = TextLocation::new(source.clone(), Span::new(14, 16));

        assert_eq!(location.to_string(), "main.ql[2:5..2:7]");
        assert_eq!(source.slice(location.span), "bb");
    }

    #[test]
    fn multibyte_offsets() {
        let source = SourceFile::new(FileId::new(0), "x", "é = 1");
        assert_eq!(source.byte_offset(1), 2);
        assert_eq!(source.slice(Span::new(2, 3)), "=");
        assert_eq!(source.char_count(), 5);
    }
}
